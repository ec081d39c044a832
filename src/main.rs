// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use roletemplate_operator::config::Config;
use roletemplate_operator::kubernetes::wait_for_crds;
use roletemplate_operator::reconcilers::{RoleTemplateBindingReconciler, RoleTemplateReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting RoleTemplate operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: template_label_key={}, binding_label_key={}",
        config.template_label_key, config.binding_label_key
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    if config.wait_for_crds {
        info!("Waiting for RoleTemplate CRDs to become available...");
        wait_for_crds(&client).await?;
    }

    let template_reconciler = RoleTemplateReconciler::new(client.clone(), config.clone());
    let binding_reconciler = RoleTemplateBindingReconciler::new(client, config);

    info!("Starting reconcilers...");

    tokio::try_join!(template_reconciler.run(), binding_reconciler.run())?;

    warn!("All reconcilers stopped");
    Ok(())
}
