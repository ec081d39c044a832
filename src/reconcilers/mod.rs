// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that project RoleTemplates and RoleTemplateBindings into RBAC objects.

pub mod orphans;
pub mod role_template;
pub mod role_template_binding;

pub use role_template::RoleTemplateReconciler;
pub use role_template_binding::RoleTemplateBindingReconciler;

use crate::constants::OPERATOR_NAME;
use crate::error::Result;
use crate::kubernetes::UpsertOutcome;
use kube::{
    api::{Patch, PatchParams},
    Api,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use tracing::instrument;

/// Counts of the writes one reconcile pass performed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub created: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub deleted: usize,
}

impl PassStats {
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Replaced => self.replaced += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created={} replaced={} unchanged={} deleted={}",
            self.created, self.replaced, self.unchanged, self.deleted
        )
    }
}

/// Overwrite the status subresource. Every list is serialized, so an empty
/// list clears what a previous pass published.
#[instrument(skip(api, status))]
pub(crate) async fn publish_status<K, S>(api: &Api<K>, name: &str, status: &S) -> Result<()>
where
    K: Clone + DeserializeOwned + fmt::Debug,
    S: Serialize,
{
    let pp = PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };
    let patch = serde_json::json!({ "status": status });
    api.patch_status(name, &pp, &Patch::Merge(&patch)).await?;
    Ok(())
}
