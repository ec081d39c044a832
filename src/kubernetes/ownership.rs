// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owner references linking derived objects to the resource that generated them

use crate::error::{OperatorError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

/// Controller owner reference from `owner` to a child living in
/// `child_namespace` (`None` for cluster-scoped children).
///
/// The garbage collector only honours references that point at a
/// cluster-scoped owner or at an owner in the child's own namespace, so any
/// other combination is rejected.
pub fn owner_reference<K>(owner: &K, child_namespace: Option<&str>) -> Result<OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    if let Some(owner_namespace) = owner.namespace() {
        match child_namespace {
            None => {
                return Err(OperatorError::OwnerReference(format!(
                    "namespaced {} {}/{} cannot own a cluster-scoped object",
                    K::kind(&()),
                    owner_namespace,
                    owner.name_any()
                )))
            }
            Some(child_namespace) if child_namespace != owner_namespace => {
                return Err(OperatorError::OwnerReference(format!(
                    "{} {}/{} cannot own an object in namespace {}",
                    K::kind(&()),
                    owner_namespace,
                    owner.name_any(),
                    child_namespace
                )))
            }
            Some(_) => {}
        }
    }

    let oref = owner.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::OwnerReference(format!(
            "{} {} has no name or uid yet",
            K::kind(&()),
            owner.name_any()
        ))
    })?;

    Ok(OwnerReference {
        block_owner_deletion: Some(true),
        ..oref
    })
}
