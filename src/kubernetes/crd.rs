// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use crate::types::{RoleTemplate, RoleTemplateBinding};
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the RoleTemplate and RoleTemplateBinding CRDs to be served.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let api_version = RoleTemplate::api_version(&());
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match find_unserved_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("RoleTemplate CRDs ({}) are available", api_version);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "CRDs {} ({}) not yet available, waiting {} seconds...",
                    missing.join(", "),
                    api_version,
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for RoleTemplate CRDs: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn find_unserved_kinds(client: &Client) -> Result<Vec<String>> {
    let group = RoleTemplate::group(&()).to_string();
    let discovery = Discovery::new(client.clone())
        .filter(&[group.as_str()])
        .run()
        .await?;

    let served: Vec<(String, String)> = discovery
        .groups()
        .filter(|g| g.name() == group)
        .flat_map(|g| g.recommended_resources())
        .map(|(ar, _)| (ar.kind, ar.version))
        .collect();

    Ok(unserved_kinds(&served))
}

/// Kinds the operator needs that are missing from the served (kind, version) pairs
fn unserved_kinds(served: &[(String, String)]) -> Vec<String> {
    let version = RoleTemplate::version(&()).to_string();

    [
        RoleTemplate::kind(&()).to_string(),
        RoleTemplateBinding::kind(&()).to_string(),
    ]
    .into_iter()
    .filter(|kind| !served.iter().any(|(k, v)| k == kind && *v == version))
    .collect()
}
