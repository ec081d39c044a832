// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{labels, DEFAULT_ERROR_REQUEUE_SECS};
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Label key stamped on ClusterRoles and Roles, e.g. `kobs.io/templaterole`
    pub template_label_key: String,
    /// Label key stamped on ClusterRoleBindings and RoleBindings, e.g. `kobs.io/templatebinding`
    pub binding_label_key: String,
    /// How long a failed reconcile pass waits before it is retried
    pub error_requeue: Duration,
    /// Block startup until both CRDs are served by the API server
    pub wait_for_crds: bool,
}

impl Config {
    /// Default configuration for the given label domain
    pub fn new(label_domain: &str) -> Self {
        Config {
            template_label_key: format!("{}/{}", label_domain, labels::TEMPLATE_SUFFIX),
            binding_label_key: format!("{}/{}", label_domain, labels::BINDING_SUFFIX),
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
            wait_for_crds: true,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let label_domain =
            lookup("LABEL_DOMAIN").unwrap_or_else(|| labels::DEFAULT_DOMAIN.to_string());
        if label_domain.is_empty() || label_domain.contains('/') {
            anyhow::bail!("LABEL_DOMAIN must be a non-empty DNS prefix, got {:?}", label_domain);
        }

        let mut config = Config::new(&label_domain);

        if let Some(secs) = lookup("ERROR_REQUEUE_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("ERROR_REQUEUE_SECS is not a number: {}", secs))?;
            config.error_requeue = Duration::from_secs(secs);
        }

        if let Some(wait) = lookup("WAIT_FOR_CRDS") {
            config.wait_for_crds = wait
                .parse()
                .with_context(|| format!("WAIT_FOR_CRDS is not a boolean: {}", wait))?;
        }

        Ok(config)
    }

    /// Label selector matching every role object derived from the named template
    pub fn template_selector(&self, template_name: &str) -> String {
        format!("{}={}", self.template_label_key, template_name)
    }

    /// Label selector over binding objects carrying the given label value
    pub fn binding_selector(&self, value: &str) -> String {
        format!("{}={}", self.binding_label_key, value)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(labels::DEFAULT_DOMAIN)
    }
}
