// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, owner references and derived object upserts.

pub mod crd;
pub mod derived;
pub mod ownership;

pub use crd::wait_for_crds;
pub use derived::{upsert, DerivedObject, UpsertOutcome};
pub use ownership::owner_reference;
