// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Hooks
//!
//! Fixed bindings of a cache key and an [`AuthClient`] call into
//! [`AuthQuery`] or [`AuthMutation`]. Parameters are passed to the client
//! unchanged; only the fetch options get the default `throw`.
//!
//! Every query except the session itself is gated on the session key.
//!
//! ## Families
//!
//! - [`session`]: session, token, sessions, device sessions
//! - [`account`]: linked accounts, user profile, API keys, passkeys
//! - [`organization`]: organizations, permissions, invitations, members

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::QueryKey;
use crate::client::{AuthClient, FetchOptions};
use crate::error::ClientResult;
use crate::mutation::AuthMutation;
use crate::provider::AuthContext;
use crate::query::AuthQuery;

pub mod account;
pub mod organization;
pub mod session;

pub use organization::SwitchOptions;
pub use session::SessionQuery;

impl AuthContext {
    /// Query bound to `key`, skipped while signed out.
    pub(crate) fn gated_query<T, F, Fut>(&self, key: QueryKey, fetch: F) -> AuthQuery<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(Arc<dyn AuthClient>, FetchOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        let client = self.client.clone();
        AuthQuery::new(key, self.cache.clone(), move |options| fetch(client.clone(), options))
            .gated_on(self.keys.session.clone())
    }

    /// Mutation bound to `key`, honoring the provider's optimistic flag.
    pub(crate) fn bound_mutation<P, R, F, Fut>(&self, key: QueryKey, call: F) -> AuthMutation<P, R>
    where
        P: Send + 'static,
        R: Send + 'static,
        F: Fn(Arc<dyn AuthClient>, P, FetchOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<R>> + Send + 'static,
    {
        let client = self.client.clone();
        AuthMutation::new(key, self.cache.clone(), move |params, options| {
            call(client.clone(), params, options)
        })
        .optimistic_updates(self.optimistic())
    }
}
