// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Ownership label keys stamped on every derived object
pub mod labels {
    /// Label domain used when `LABEL_DOMAIN` is not set
    pub const DEFAULT_DOMAIN: &str = "kobs.io";
    /// Suffix of the key labelling ClusterRoles and Roles derived from a RoleTemplate
    pub const TEMPLATE_SUFFIX: &str = "templaterole";
    /// Suffix of the key labelling ClusterRoleBindings and RoleBindings
    pub const BINDING_SUFFIX: &str = "templatebinding";
}

/// A RoleTemplate whose namespaces are exactly `["*"]` is cluster-wide
pub const WILDCARD_NAMESPACE: &str = "*";

/// API group referenced by the roleRef of every derived binding
pub const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

/// Field manager recorded on every write
pub const OPERATOR_NAME: &str = "roletemplate-operator";

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRDs
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Delay before a failed reconcile pass is retried
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;
