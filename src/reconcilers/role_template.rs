// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! RoleTemplate reconciler - projects a RoleTemplate into a ClusterRole or per-namespace Roles.

use crate::config::Config;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{owner_reference, upsert};
use crate::reconcilers::orphans::collect_orphans;
use crate::reconcilers::{publish_status, PassStats};
use crate::types::{DerivedRef, RoleTemplate, RoleTemplateStatus, TemplateScope};
use futures::StreamExt;
use k8s_openapi::api::rbac::v1::{ClusterRole, Role};
use kube::{
    api::ObjectMeta,
    runtime::{
        controller::Action, reflector, watcher, Controller, WatchStreamExt,
    },
    Api, Client, ResourceExt,
};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct RoleTemplateReconciler {
    client: Client,
    config: Config,
}

impl RoleTemplateReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let templates: Api<RoleTemplate> = Api::all(self.client.clone());
        let (reader, writer) = reflector::store();

        // Status updates do not bump metadata.generation, so publishing the
        // status at the end of a pass does not trigger another pass.
        let stream = reflector(writer, watcher(templates, watcher::Config::default()))
            .default_backoff()
            .applied_objects()
            .predicate_filter(template_revision);

        let context = Arc::new(self);

        Controller::for_stream(stream, reader)
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled RoleTemplate: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Converge the derived roles of the named template and publish them in
    /// its status. Returns `None` when the template no longer exists.
    #[instrument(skip(self))]
    pub async fn reconcile_template(&self, name: &str) -> Result<Option<RoleTemplateStatus>> {
        let templates: Api<RoleTemplate> = Api::all(self.client.clone());
        let Some(template) = templates.get_opt(name).await? else {
            debug!("RoleTemplate {} not found, owned roles are garbage collected", name);
            return Ok(None);
        };

        let label_key = &self.config.template_label_key;
        let mut stats = PassStats::default();
        let mut cluster_roles = Vec::new();
        let mut roles = Vec::new();

        match template.spec.scope() {
            TemplateScope::Empty => {
                info!("RoleTemplate {} lists no namespaces, no roles are derived", name);
            }
            TemplateScope::Cluster => {
                let cluster_role = build_cluster_role(&template, label_key)?;
                stats.record(upsert(&self.client, cluster_role).await?);
                cluster_roles.push(DerivedRef::cluster(name));
            }
            TemplateScope::Namespaces(namespaces) => {
                // First failure aborts the pass; roles already written stay
                // in place until the retry converges them.
                for namespace in namespaces {
                    let role = build_role(&template, namespace, label_key)?;
                    stats.record(upsert(&self.client, role).await?);
                    roles.push(DerivedRef::namespaced(name, namespace));
                }
            }
        }

        let selector = self.config.template_selector(name);
        stats.deleted += collect_orphans::<ClusterRole>(&self.client, &selector, &cluster_roles)
            .await?
            .len();
        stats.deleted += collect_orphans::<Role>(&self.client, &selector, &roles)
            .await?
            .len();

        let status = RoleTemplateStatus {
            selector,
            cluster_roles,
            roles,
        };
        publish_status(&templates, name, &status).await?;

        info!("Reconciled RoleTemplate {}: {}", name, stats);
        Ok(Some(status))
    }
}

/// Hash of uid and generation. A template recreated under the same name
/// starts again at generation 1, so the uid must take part.
fn template_revision(template: &RoleTemplate) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    (&template.metadata.uid, template.metadata.generation).hash(&mut hasher);
    Some(hasher.finish())
}

fn owner_labels(label_key: &str, template_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(label_key.to_string(), template_name.to_string())])
}

fn template_name(template: &RoleTemplate) -> Result<String> {
    template
        .metadata
        .name
        .clone()
        .ok_or(OperatorError::MissingObjectKey(".metadata.name"))
}

/// ClusterRole named after the template, carrying its rules verbatim
pub fn build_cluster_role(template: &RoleTemplate, label_key: &str) -> Result<ClusterRole> {
    let name = template_name(template)?;

    Ok(ClusterRole {
        metadata: ObjectMeta {
            labels: Some(owner_labels(label_key, &name)),
            owner_references: Some(vec![owner_reference(template, None)?]),
            name: Some(name),
            ..Default::default()
        },
        rules: Some(template.spec.rules.clone()),
        ..Default::default()
    })
}

/// Role named after the template in `namespace`, carrying its rules verbatim
pub fn build_role(template: &RoleTemplate, namespace: &str, label_key: &str) -> Result<Role> {
    let name = template_name(template)?;

    Ok(Role {
        metadata: ObjectMeta {
            labels: Some(owner_labels(label_key, &name)),
            owner_references: Some(vec![owner_reference(template, Some(namespace))?]),
            name: Some(name),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        rules: Some(template.spec.rules.clone()),
    })
}

async fn reconcile(template: Arc<RoleTemplate>, ctx: Arc<RoleTemplateReconciler>) -> Result<Action> {
    ctx.reconcile_template(&template.name_any()).await?;

    // Level-triggered: the next spec change re-triggers a full pass
    Ok(Action::await_change())
}

fn error_policy(
    template: Arc<RoleTemplate>,
    error: &OperatorError,
    ctx: Arc<RoleTemplateReconciler>,
) -> Action {
    error!(
        "Reconciliation of RoleTemplate {} failed: {}",
        template.name_any(),
        error
    );
    Action::requeue(ctx.config.error_requeue)
}
