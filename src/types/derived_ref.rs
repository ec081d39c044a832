// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an object derived by the operator, as published in a status.
/// `namespace` is empty for cluster-scoped objects.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct DerivedRef {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

impl DerivedRef {
    pub fn cluster(name: &str) -> Self {
        DerivedRef {
            name: name.to_string(),
            namespace: String::new(),
        }
    }

    pub fn namespaced(name: &str, namespace: &str) -> Self {
        DerivedRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        DerivedRef {
            name: obj.name_any(),
            namespace: obj.namespace().unwrap_or_default(),
        }
    }

    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for DerivedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cluster_scoped() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}
