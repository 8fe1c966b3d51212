// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Providers
//!
//! Configuration and host integration shared by all hooks. The auth
//! provider becomes an [`AuthContext`] built once and passed by reference;
//! the organization provider is its optional [`OrganizationConfig`].
//!
//! ## Modules
//!
//! - [`options`]: raw inputs and normalization
//! - [`organization`]: organization options, roles, path modes
//! - [`context`]: [`AuthContext`] and its builder
//! - [`cookie`]: last-visited organization cookie
//! - [`host`]: navigation, toasts, image storage

pub mod context;
pub mod cookie;
pub mod host;
pub mod options;
pub mod organization;

pub use context::{AuthContext, AuthContextBuilder};
pub use cookie::{Cookie, CookieStore, MemoryCookieStore};
pub use host::{ImageFile, ImageHandler, Navigator, Notifier, ToastVariant, TracingNavigator, TracingNotifier};
pub use options::{
    AccountConfig, AccountView, AuthUiConfig, AuthUiOptions, AuthView, CredentialsConfig, DeleteUserConfig,
    ImageConfig, SignUpConfig, Toggle,
};
pub use organization::{OrganizationConfig, OrganizationOptions, OrganizationView, PathMode, Role};
