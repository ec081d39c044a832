// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Scoped access and upsert for the RBAC objects the operator derives

use crate::constants::OPERATOR_NAME;
use crate::error::{OperatorError, Result};
use crate::types::DerivedRef;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, Subject};
use kube::{
    api::{ObjectMeta, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, info, instrument};

/// An RBAC kind the operator creates, replaces and garbage collects.
pub trait DerivedObject:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Api handle addressing objects of this kind in `namespace`.
    /// Cluster-scoped kinds ignore the namespace.
    fn scoped_api(client: Client, namespace: &str) -> Api<Self>;

    /// Whether `existing` already carries everything this desired object
    /// would write, so a replace can be skipped.
    fn content_matches(&self, existing: &Self) -> bool;
}

fn metadata_matches(desired: &ObjectMeta, existing: &ObjectMeta) -> bool {
    desired.labels == existing.labels && desired.owner_references == existing.owner_references
}

fn rules(rules: &Option<Vec<PolicyRule>>) -> &[PolicyRule] {
    rules.as_deref().unwrap_or_default()
}

fn subjects(subjects: &Option<Vec<Subject>>) -> &[Subject] {
    subjects.as_deref().unwrap_or_default()
}

impl DerivedObject for ClusterRole {
    fn scoped_api(client: Client, _namespace: &str) -> Api<Self> {
        Api::all(client)
    }

    fn content_matches(&self, existing: &Self) -> bool {
        metadata_matches(&self.metadata, &existing.metadata)
            && rules(&self.rules) == rules(&existing.rules)
            && self.aggregation_rule == existing.aggregation_rule
    }
}

impl DerivedObject for Role {
    fn scoped_api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }

    fn content_matches(&self, existing: &Self) -> bool {
        metadata_matches(&self.metadata, &existing.metadata)
            && rules(&self.rules) == rules(&existing.rules)
    }
}

impl DerivedObject for ClusterRoleBinding {
    fn scoped_api(client: Client, _namespace: &str) -> Api<Self> {
        Api::all(client)
    }

    fn content_matches(&self, existing: &Self) -> bool {
        metadata_matches(&self.metadata, &existing.metadata)
            && self.role_ref == existing.role_ref
            && subjects(&self.subjects) == subjects(&existing.subjects)
    }
}

impl DerivedObject for RoleBinding {
    fn scoped_api(client: Client, namespace: &str) -> Api<Self> {
        Api::namespaced(client, namespace)
    }

    fn content_matches(&self, existing: &Self) -> bool {
        metadata_matches(&self.metadata, &existing.metadata)
            && self.role_ref == existing.role_ref
            && subjects(&self.subjects) == subjects(&existing.subjects)
    }
}

/// What an upsert had to do to converge one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Replaced,
    Unchanged,
}

pub(crate) fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    }
}

/// Fetch the object by identity, create it when absent, otherwise replace it
/// in full. The existing resourceVersion is carried over so a concurrent
/// writer surfaces as a 409 conflict instead of being overwritten.
#[instrument(skip(client, desired), fields(kind = %K::kind(&()), object = %DerivedRef::of(&desired)))]
pub async fn upsert<K: DerivedObject>(client: &Client, mut desired: K) -> Result<UpsertOutcome> {
    let name = desired
        .meta()
        .name
        .clone()
        .ok_or(OperatorError::MissingObjectKey(".metadata.name"))?;
    let namespace = desired.namespace().unwrap_or_default();
    let api = K::scoped_api(client.clone(), &namespace);

    match api.get_opt(&name).await? {
        None => {
            api.create(&post_params(), &desired).await?;
            info!("Created {} {}", K::kind(&()), DerivedRef::of(&desired));
            Ok(UpsertOutcome::Created)
        }
        Some(existing) if desired.content_matches(&existing) => {
            debug!("{} {} is up to date", K::kind(&()), DerivedRef::of(&desired));
            Ok(UpsertOutcome::Unchanged)
        }
        Some(existing) => {
            desired.meta_mut().resource_version = existing.resource_version();
            api.replace(&name, &post_params(), &desired).await?;
            info!("Replaced {} {}", K::kind(&()), DerivedRef::of(&desired));
            Ok(UpsertOutcome::Replaced)
        }
    }
}
