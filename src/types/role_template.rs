// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::WILDCARD_NAMESPACE;
use crate::types::DerivedRef;
use k8s_openapi::api::rbac::v1::PolicyRule;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A set of permission rules projected into a ClusterRole, or into one Role
/// per listed namespace.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "kobs.io", version = "v1alpha1", kind = "RoleTemplate")]
#[kube(status = "RoleTemplateStatus", shortname = "rt")]
#[kube(
    printcolumn = r#"{"name":"Selector","type":"string","jsonPath":".status.selector","description":"Selector to get all ClusterRoles / Roles created for the RoleTemplate"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp","description":"Time since the RoleTemplate was created"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateSpec {
    /// Namespaces to create Roles in. When the list only contains "*", a
    /// single ClusterRole is created instead.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateStatus {
    /// Label selector matching every ClusterRole / Role derived from this template
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub cluster_roles: Vec<DerivedRef>,
    #[serde(default)]
    pub roles: Vec<DerivedRef>,
}

/// Where the roles of a template are projected to, decided once per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateScope<'a> {
    /// No namespaces listed: nothing is derived.
    Empty,
    /// Exactly `["*"]`: one ClusterRole.
    Cluster,
    /// One Role per entry, in list order. A "*" mixed with other entries
    /// lands here and is used as a literal namespace name.
    Namespaces(&'a [String]),
}

impl RoleTemplateSpec {
    pub fn scope(&self) -> TemplateScope<'_> {
        match self.namespaces.as_slice() {
            [] => TemplateScope::Empty,
            [only] if only == WILDCARD_NAMESPACE => TemplateScope::Cluster,
            namespaces => TemplateScope::Namespaces(namespaces),
        }
    }
}

impl RoleTemplate {
    /// ClusterRoles this template currently owns, according to its status
    pub fn derived_cluster_roles(&self) -> &[DerivedRef] {
        self.status
            .as_ref()
            .map(|s| s.cluster_roles.as_slice())
            .unwrap_or_default()
    }

    /// Roles this template currently owns, according to its status
    pub fn derived_roles(&self) -> &[DerivedRef] {
        self.status
            .as_ref()
            .map(|s| s.roles.as_slice())
            .unwrap_or_default()
    }
}
