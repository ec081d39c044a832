// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Removal of derived objects that the current pass no longer produces.

use crate::error::Result;
use crate::kubernetes::DerivedObject;
use crate::types::DerivedRef;
use kube::{
    api::{DeleteParams, ListParams},
    Api, Client, Resource,
};
use tracing::{debug, info, instrument};

pub fn is_processed(name: &str, namespace: &str, processed: &[DerivedRef]) -> bool {
    processed
        .iter()
        .any(|r| r.name == name && r.namespace == namespace)
}

/// Delete every `K` matching `selector` whose identity is not in `processed`.
/// Returns the identities that were deleted.
#[instrument(skip(client, processed), fields(kind = %K::kind(&())))]
pub async fn collect_orphans<K: DerivedObject>(
    client: &Client,
    selector: &str,
    processed: &[DerivedRef],
) -> Result<Vec<DerivedRef>> {
    let all: Api<K> = Api::all(client.clone());
    let existing = all.list(&ListParams::default().labels(selector)).await?;

    let mut deleted = Vec::new();
    for obj in existing.items {
        let orphan = DerivedRef::of(&obj);
        if is_processed(&orphan.name, &orphan.namespace, processed) {
            continue;
        }

        let api = K::scoped_api(client.clone(), &orphan.namespace);
        match api.delete(&orphan.name, &DeleteParams::default()).await {
            Ok(_) => info!("Deleted orphaned {} {}", K::kind(&()), orphan),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("Orphaned {} {} already gone", K::kind(&()), orphan)
            }
            Err(e) => return Err(e.into()),
        }
        deleted.push(orphan);
    }

    Ok(deleted)
}
