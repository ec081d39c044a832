// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::types::DerivedRef;
use k8s_openapi::api::rbac::v1::Subject;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Binds subjects to whatever ClusterRoles / Roles the referenced
/// RoleTemplate currently lists in its status.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[kube(group = "kobs.io", version = "v1alpha1", kind = "RoleTemplateBinding")]
#[kube(status = "RoleTemplateBindingStatus", shortname = "rtb")]
#[kube(
    printcolumn = r#"{"name":"RoleTemplate","type":"string","jsonPath":".spec.roleRef.name","description":"The RoleTemplate used by the RoleTemplateBinding"}"#,
    printcolumn = r#"{"name":"Selector","type":"string","jsonPath":".status.selector","description":"Selector to get all ClusterRoleBindings / RoleBindings created for the RoleTemplateBinding"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp","description":"Time since the RoleTemplateBinding was created"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateBindingSpec {
    pub role_ref: TemplateRef,
    #[serde(default)]
    pub subjects: Vec<Subject>,
}

/// Reference to a RoleTemplate by name
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct TemplateRef {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleTemplateBindingStatus {
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub cluster_role_bindings: Vec<DerivedRef>,
    #[serde(default)]
    pub role_bindings: Vec<DerivedRef>,
}
