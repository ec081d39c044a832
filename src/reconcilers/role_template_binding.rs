// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! RoleTemplateBinding reconciler - binds subjects to every role a RoleTemplate currently owns.

use crate::config::Config;
use crate::constants::RBAC_API_GROUP;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{owner_reference, upsert};
use crate::reconcilers::orphans::collect_orphans;
use crate::reconcilers::{publish_status, PassStats};
use crate::types::{DerivedRef, RoleTemplate, RoleTemplateBinding, RoleTemplateBindingStatus};
use futures::StreamExt;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef};
use kube::{
    api::ObjectMeta,
    runtime::{controller::Action, reflector::ObjectRef, Controller},
    Api, Client, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

pub struct RoleTemplateBindingReconciler {
    client: Client,
    config: Config,
}

impl RoleTemplateBindingReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let bindings: Api<RoleTemplateBinding> = Api::all(self.client.clone());
        let templates: Api<RoleTemplate> = Api::all(self.client.clone());

        let controller = Controller::new(bindings, WatcherConfig::default());
        let store = controller.store();
        let context = Arc::new(self);

        // Any change to a template, its status included, re-runs the bindings referencing it
        controller
            .watches(templates, WatcherConfig::default(), move |template| {
                bindings_for_template(&store.state(), &template.name_any())
            })
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled RoleTemplateBinding: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }

    /// Converge the derived bindings of the named RoleTemplateBinding against
    /// the roles its template lists in its status. Returns `None` when the
    /// binding no longer exists.
    #[instrument(skip(self))]
    pub async fn reconcile_binding(&self, name: &str) -> Result<Option<RoleTemplateBindingStatus>> {
        let bindings: Api<RoleTemplateBinding> = Api::all(self.client.clone());
        let Some(binding) = bindings.get_opt(name).await? else {
            debug!("RoleTemplateBinding {} not found, nothing to do", name);
            return Ok(None);
        };

        let template_name = binding.spec.role_ref.name.as_str();
        let templates: Api<RoleTemplate> = Api::all(self.client.clone());
        let template = templates
            .get_opt(template_name)
            .await?
            .ok_or_else(|| OperatorError::TemplateNotFound(template_name.to_string()))?;

        let label_key = &self.config.binding_label_key;
        let mut stats = PassStats::default();
        let mut cluster_role_bindings = Vec::new();
        let mut role_bindings = Vec::new();

        for cluster_role in template.derived_cluster_roles() {
            let crb = build_cluster_role_binding(&binding, &template, &cluster_role.name, label_key)?;
            stats.record(upsert(&self.client, crb).await?);
            cluster_role_bindings.push(DerivedRef::cluster(name));
        }

        for role in template.derived_roles() {
            let rb = build_role_binding(&binding, &template, role, label_key)?;
            stats.record(upsert(&self.client, rb).await?);
            role_bindings.push(DerivedRef::namespaced(name, &role.namespace));
        }

        // Derived bindings are labelled with the template name, so orphans
        // are discovered by that value as well.
        let orphan_selector = self.config.binding_selector(template_name);
        stats.deleted += collect_orphans::<ClusterRoleBinding>(
            &self.client,
            &orphan_selector,
            &cluster_role_bindings,
        )
        .await?
        .len();
        stats.deleted +=
            collect_orphans::<RoleBinding>(&self.client, &orphan_selector, &role_bindings)
                .await?
                .len();

        let status = RoleTemplateBindingStatus {
            selector: self.config.binding_selector(name),
            cluster_role_bindings,
            role_bindings,
        };
        publish_status(&bindings, name, &status).await?;

        info!(
            "Reconciled RoleTemplateBinding {} for RoleTemplate {}: {}",
            name, template_name, stats
        );
        Ok(Some(status))
    }
}

/// Bindings in `bindings` whose roleRef names `template_name`
pub fn bindings_for_template(
    bindings: &[Arc<RoleTemplateBinding>],
    template_name: &str,
) -> Vec<ObjectRef<RoleTemplateBinding>> {
    bindings
        .iter()
        .filter(|b| b.spec.role_ref.name == template_name)
        .map(|b| ObjectRef::from_obj(b.as_ref()))
        .collect()
}

fn binding_metadata(
    binding: &RoleTemplateBinding,
    template: &RoleTemplate,
    namespace: Option<&str>,
    label_key: &str,
) -> Result<ObjectMeta> {
    let name = binding
        .metadata
        .name
        .clone()
        .ok_or(OperatorError::MissingObjectKey(".metadata.name"))?;

    Ok(ObjectMeta {
        name: Some(name),
        namespace: namespace.map(str::to_string),
        labels: Some(BTreeMap::from([(label_key.to_string(), template.name_any())])),
        owner_references: Some(vec![owner_reference(template, namespace)?]),
        ..Default::default()
    })
}

/// ClusterRoleBinding named after the binding, granting `cluster_role` to its subjects.
/// Owned by the template, so it is collected together with the template's roles.
pub fn build_cluster_role_binding(
    binding: &RoleTemplateBinding,
    template: &RoleTemplate,
    cluster_role: &str,
    label_key: &str,
) -> Result<ClusterRoleBinding> {
    Ok(ClusterRoleBinding {
        metadata: binding_metadata(binding, template, None, label_key)?,
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "ClusterRole".to_string(),
            name: cluster_role.to_string(),
        },
        subjects: Some(binding.spec.subjects.clone()),
    })
}

/// RoleBinding named after the binding in the role's namespace
pub fn build_role_binding(
    binding: &RoleTemplateBinding,
    template: &RoleTemplate,
    role: &DerivedRef,
    label_key: &str,
) -> Result<RoleBinding> {
    Ok(RoleBinding {
        metadata: binding_metadata(binding, template, Some(&role.namespace), label_key)?,
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_string(),
            kind: "Role".to_string(),
            name: role.name.clone(),
        },
        subjects: Some(binding.spec.subjects.clone()),
    })
}

async fn reconcile(
    binding: Arc<RoleTemplateBinding>,
    ctx: Arc<RoleTemplateBindingReconciler>,
) -> Result<Action> {
    ctx.reconcile_binding(&binding.name_any()).await?;
    Ok(Action::await_change())
}

fn error_policy(
    binding: Arc<RoleTemplateBinding>,
    error: &OperatorError,
    ctx: Arc<RoleTemplateBindingReconciler>,
) -> Action {
    error!(
        "Reconciliation of RoleTemplateBinding {} failed: {}",
        binding.name_any(),
        error
    );
    Action::requeue(ctx.config.error_requeue)
}
