// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources served under `kobs.io/v1alpha1`.

pub mod derived_ref;
pub mod role_template;
pub mod role_template_binding;

pub use derived_ref::DerivedRef;
pub use role_template::{RoleTemplate, RoleTemplateSpec, RoleTemplateStatus, TemplateScope};
pub use role_template_binding::{
    RoleTemplateBinding, RoleTemplateBindingSpec, RoleTemplateBindingStatus, TemplateRef,
};
