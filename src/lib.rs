// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pelatform Auth Sync - Client-side query cache for better-auth
//!
//! Wraps better-auth client calls in session-gated cached queries and
//! optimistic mutations, tracks bearer token freshness, and normalizes
//! provider configuration.
//!
//! ## Modules
//!
//! - `cache` - Query keys and the shared LRU query cache
//! - `client` - Auth client traits and the HTTP implementation
//! - `query` / `mutation` - Generic cache-aware read and write wrappers
//! - `hooks` - Resource bindings on [`AuthContext`]
//! - `token` - Session token decoding and expiry scheduling
//! - `provider` - Provider configuration, cookies, host integration

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod models;
pub mod mutation;
pub mod provider;
pub mod query;
pub mod token;

pub use cache::{CacheEvent, QueryCache, QueryKey, QueryKeys};
pub use client::{AuthClient, FetchOptions, HttpAuthClient};
pub use config::SyncSettings;
pub use error::{AuthClientError, SyncError, SyncResult};
pub use hooks::{SessionQuery, SwitchOptions};
pub use mutation::AuthMutation;
pub use provider::{AuthContext, AuthContextBuilder, AuthUiConfig, AuthUiOptions};
pub use query::{AuthQuery, QueryState, QueryStatus};
pub use token::{decode_token, SessionToken, TokenState, TokenWatcher};
