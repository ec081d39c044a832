// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory Kubernetes API server for exercising reconcilers end to end.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// (plural, namespace, name); namespace is empty for cluster-scoped objects
type ObjectKey = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    calls: Vec<(String, String)>,
    failures: Vec<(String, String, u16)>,
    resource_version: u64,
}

/// A fake API server keeping objects in memory. It understands GET, LIST
/// with `labelSelector`, POST, PUT (with resourceVersion conflicts), merge
/// PATCH and DELETE for any `/api/v1` or `/apis/<group>/<version>` path.
#[derive(Clone, Default)]
pub struct FakeApiServer {
    state: Arc<Mutex<State>>,
}

/// Parse a YAML manifest into JSON
pub fn manifest(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap()
}

fn plural_of(kind: &str) -> String {
    format!("{}s", kind.to_lowercase())
}

impl FakeApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a kube Client talking to this server
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Seed an object, keyed by its kind, namespace and name
    pub fn insert(&self, mut obj: Value) {
        let mut state = self.state.lock().unwrap();
        let plural = plural_of(obj["kind"].as_str().unwrap());
        let namespace = obj["metadata"]["namespace"].as_str().unwrap_or_default().to_string();
        let name = obj["metadata"]["name"].as_str().unwrap().to_string();
        if obj["metadata"]["resourceVersion"].is_null() {
            obj["metadata"]["resourceVersion"] = json!(state.next_resource_version());
        }
        state.objects.insert((plural, namespace, name), obj);
    }

    pub fn get(&self, plural: &str, namespace: &str, name: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(&(plural.to_string(), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn get_as<K: DeserializeOwned>(&self, plural: &str, namespace: &str, name: &str) -> Option<K> {
        self.get(plural, namespace, name)
            .map(|v| serde_json::from_value(v).unwrap())
    }

    /// (namespace, name) of every stored object of a kind, sorted
    pub fn objects(&self, plural: &str) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .keys()
            .filter(|(p, _, _)| p == plural)
            .map(|(_, ns, name)| (ns.clone(), name.clone()))
            .collect()
    }

    /// Mutate a stored object in place, as another writer would
    pub fn update(&self, plural: &str, namespace: &str, name: &str, f: impl FnOnce(&mut Value)) {
        let mut state = self.state.lock().unwrap();
        let rv = state.next_resource_version();
        let obj = state
            .objects
            .get_mut(&(plural.to_string(), namespace.to_string(), name.to_string()))
            .unwrap();
        f(obj);
        obj["metadata"]["resourceVersion"] = json!(rv);
    }

    /// Answer requests with `method` on exactly `path` with an error status
    pub fn fail_on(&self, method: &str, path: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((method.to_string(), path.to_string(), status));
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Every non-GET request received, as (method, path)
    pub fn mutations(&self) -> Vec<(String, String)> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter(|(method, _)| method != "GET")
            .cloned()
            .collect()
    }

    /// Number of requests with `method` whose path contains `fragment`
    pub fn count(&self, method: &str, fragment: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .calls
            .iter()
            .filter(|(m, p)| m == method && p.contains(fragment))
            .count()
    }
}

struct Target {
    plural: String,
    namespace: Option<String>,
    name: Option<String>,
    subresource: Option<String>,
}

fn parse_path(path: &str) -> Option<Target> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let rest = match segments.as_slice() {
        ["api", _version, rest @ ..] => rest,
        ["apis", _group, _version, rest @ ..] => rest,
        _ => return None,
    };
    let (namespace, rest) = match rest {
        ["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(ns.to_string()), rest),
        _ => (None, rest),
    };
    match rest {
        [plural] => Some(Target {
            plural: plural.to_string(),
            namespace,
            name: None,
            subresource: None,
        }),
        [plural, name] => Some(Target {
            plural: plural.to_string(),
            namespace,
            name: Some(name.to_string()),
            subresource: None,
        }),
        [plural, name, sub] => Some(Target {
            plural: plural.to_string(),
            namespace,
            name: Some(name.to_string()),
            subresource: Some(sub.to_string()),
        }),
        _ => None,
    }
}

fn label_selector(query: Option<&str>) -> Vec<(String, String)> {
    let Some(query) = query else {
        return vec![];
    };
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(k, _)| k == "labelSelector")
        .flat_map(|(_, v)| {
            v.split(',')
                .filter_map(|term| term.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>()
        })
        .collect()
}

fn matches_labels(obj: &Value, selector: &[(String, String)]) -> bool {
    selector
        .iter()
        .all(|(k, v)| obj["metadata"]["labels"][k].as_str() == Some(v.as_str()))
}

/// RFC 7386 JSON merge patch
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };
    for (key, value) in patch {
        if value.is_null() {
            map.remove(key);
        } else {
            merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
        }
    }
}

fn status_response(code: u16, message: String) -> (u16, String) {
    let reason = match code {
        404 => "NotFound",
        409 => "Conflict",
        405 => "MethodNotAllowed",
        400 => "BadRequest",
        _ => "InternalError",
    };
    let body = json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    });
    (code, body.to_string())
}

impl State {
    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn handle(&mut self, method: &str, path: &str, query: Option<&str>, body: &[u8]) -> (u16, String) {
        self.calls.push((method.to_string(), path.to_string()));

        if let Some((_, _, code)) = self
            .failures
            .iter()
            .find(|(m, p, _)| m == method && p == path)
        {
            return status_response(*code, format!("injected failure for {} {}", method, path));
        }

        let Some(target) = parse_path(path) else {
            return status_response(404, format!("unknown path {}", path));
        };
        let namespace = target.namespace.clone().unwrap_or_default();

        match (method, target.name.clone()) {
            ("GET", Some(name)) => self.read(&target.plural, &namespace, &name),
            ("GET", None) => self.list(&target, query),
            ("POST", None) => self.create(&target, body),
            ("PUT", Some(name)) => self.replace(&target.plural, &namespace, &name, body),
            ("PATCH", Some(name)) => self.patch(&target.plural, &namespace, &name, body),
            ("DELETE", Some(name)) => self.delete(&target.plural, &namespace, &name),
            _ => status_response(405, format!("{} {} is not supported", method, path)),
        }
    }

    fn key(plural: &str, namespace: &str, name: &str) -> ObjectKey {
        (plural.to_string(), namespace.to_string(), name.to_string())
    }

    fn not_found(plural: &str, name: &str) -> (u16, String) {
        status_response(404, format!("{} \"{}\" not found", plural, name))
    }

    fn read(&self, plural: &str, namespace: &str, name: &str) -> (u16, String) {
        match self.objects.get(&Self::key(plural, namespace, name)) {
            Some(obj) => (200, obj.to_string()),
            None => Self::not_found(plural, name),
        }
    }

    fn list(&self, target: &Target, query: Option<&str>) -> (u16, String) {
        let selector = label_selector(query);
        let items: Vec<&Value> = self
            .objects
            .iter()
            .filter(|((p, ns, _), _)| {
                *p == target.plural && target.namespace.as_ref().map_or(true, |t| t == ns)
            })
            .map(|(_, obj)| obj)
            .filter(|obj| matches_labels(obj, &selector))
            .collect();

        let body = json!({
            "apiVersion": "v1",
            "kind": "List",
            "metadata": {"resourceVersion": self.resource_version.to_string()},
            "items": items
        });
        (200, body.to_string())
    }

    fn create(&mut self, target: &Target, body: &[u8]) -> (u16, String) {
        let Ok(mut obj) = serde_json::from_slice::<Value>(body) else {
            return status_response(400, "request body is not JSON".to_string());
        };
        let Some(name) = obj["metadata"]["name"].as_str().map(str::to_string) else {
            return status_response(400, "metadata.name is required".to_string());
        };
        let namespace = target.namespace.clone().unwrap_or_default();
        let key = Self::key(&target.plural, &namespace, &name);
        if self.objects.contains_key(&key) {
            return status_response(409, format!("{} \"{}\" already exists", target.plural, name));
        }

        if let Some(ns) = &target.namespace {
            obj["metadata"]["namespace"] = json!(ns);
        }
        obj["metadata"]["uid"] = json!(format!("uid-{}-{}-{}", target.plural, namespace, name));
        obj["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        self.objects.insert(key, obj.clone());
        (201, obj.to_string())
    }

    fn replace(&mut self, plural: &str, namespace: &str, name: &str, body: &[u8]) -> (u16, String) {
        let Ok(mut obj) = serde_json::from_slice::<Value>(body) else {
            return status_response(400, "request body is not JSON".to_string());
        };
        let key = Self::key(plural, namespace, name);
        let Some(existing) = self.objects.get(&key) else {
            return Self::not_found(plural, name);
        };

        let sent_rv = &obj["metadata"]["resourceVersion"];
        if !sent_rv.is_null() && *sent_rv != existing["metadata"]["resourceVersion"] {
            return status_response(
                409,
                format!("Operation cannot be fulfilled on {} \"{}\": the object has been modified", plural, name),
            );
        }

        obj["metadata"]["uid"] = existing["metadata"]["uid"].clone();
        obj["metadata"]["resourceVersion"] = json!(self.next_resource_version());
        self.objects.insert(key, obj.clone());
        (200, obj.to_string())
    }

    fn patch(&mut self, plural: &str, namespace: &str, name: &str, body: &[u8]) -> (u16, String) {
        let Ok(patch) = serde_json::from_slice::<Value>(body) else {
            return status_response(400, "patch body is not JSON".to_string());
        };
        let rv = self.next_resource_version();
        let Some(obj) = self.objects.get_mut(&Self::key(plural, namespace, name)) else {
            return Self::not_found(plural, name);
        };

        merge_patch(obj, &patch);
        obj["metadata"]["resourceVersion"] = json!(rv);
        (200, obj.to_string())
    }

    fn delete(&mut self, plural: &str, namespace: &str, name: &str) -> (u16, String) {
        match self.objects.remove(&Self::key(plural, namespace, name)) {
            Some(obj) => (200, obj.to_string()),
            None => Self::not_found(plural, name),
        }
    }
}

impl Service<Request<Body>> for FakeApiServer {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| format!("failed to read request body: {}", e))?
                .to_bytes();

            let (status, body) = state.lock().unwrap().handle(
                parts.method.as_str(),
                parts.uri.path(),
                parts.uri.query(),
                &bytes,
            );

            Ok::<_, tower::BoxError>(
                Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(Bytes::from(body)))
                    .unwrap(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_namespaced_item_path() {
        let target = parse_path("/apis/rbac.authorization.k8s.io/v1/namespaces/dev/roles/tpl").unwrap();
        assert_eq!(target.plural, "roles");
        assert_eq!(target.namespace.as_deref(), Some("dev"));
        assert_eq!(target.name.as_deref(), Some("tpl"));
    }

    #[test]
    fn test_parse_status_subresource_path() {
        let target = parse_path("/apis/kobs.io/v1alpha1/roletemplates/tpl/status").unwrap();
        assert_eq!(target.plural, "roletemplates");
        assert!(target.namespace.is_none());
        assert_eq!(target.subresource.as_deref(), Some("status"));
    }

    #[test]
    fn test_label_selector_is_decoded() {
        let selector = label_selector(Some("labelSelector=kobs.io%2Ftemplaterole%3Dtpl1"));
        assert_eq!(selector, vec![("kobs.io/templaterole".to_string(), "tpl1".to_string())]);
    }

    #[test]
    fn test_merge_patch_replaces_lists_and_removes_nulls() {
        let mut target = json!({"status": {"roles": [1, 2], "selector": "a"}, "keep": true});
        merge_patch(&mut target, &json!({"status": {"roles": [], "selector": null}}));
        assert_eq!(target, json!({"status": {"roles": []}, "keep": true}));
    }
}
