// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session, token and device-session hooks.

use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::cache::{QueryKey, QueryKeys};
use crate::models::{
    RevokeDeviceSessionParams, RevokeSessionParams, Session, SessionData, SetActiveSessionParams,
};
use crate::mutation::AuthMutation;
use crate::provider::AuthContext;
use crate::query::{AuthQuery, QueryState};
use crate::token::TokenWatcher;

/// The session query plus login/logout transition handling.
///
/// When the observed user changes every dependent query is invalidated.
/// When the session disappears dependent entries are evicted outright, so
/// nothing from the previous user survives a logout.
#[derive(Debug, Clone)]
pub struct SessionQuery {
    query: AuthQuery<Option<SessionData>>,
    keys: QueryKeys,
    session_user: Arc<Mutex<Option<String>>>,
}

impl SessionQuery {
    pub fn key(&self) -> &QueryKey {
        self.query.key()
    }

    pub fn peek(&self) -> QueryState<Option<SessionData>> {
        self.query.peek()
    }

    pub async fn fetch(&self) -> QueryState<Option<SessionData>> {
        let state = self.query.fetch().await;
        self.observe(&state);
        state
    }

    pub async fn refetch(&self) -> QueryState<Option<SessionData>> {
        let state = self.query.refetch().await;
        self.observe(&state);
        state
    }

    fn observe(&self, state: &QueryState<Option<SessionData>>) {
        if !state.is_success() {
            return;
        }
        let current = state
            .data
            .as_ref()
            .and_then(Option::as_ref)
            .map(|session| session.user_id().to_string());

        let previous = {
            let mut user = self.session_user.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *user, current.clone())
        };

        let cache = self.query.cache();
        match (previous, current) {
            (Some(previous), Some(current)) if previous != current => {
                // Fetches started for the previous user must not land afterwards
                cache.cancel_queries_where(|key| self.keys.is_dependent(key));
                let count = cache.invalidate_where(|key| self.keys.is_dependent(key));
                info!(from = %previous, to = %current, invalidated = count, "Session user changed");
            }
            (Some(previous), None) => {
                cache.cancel_queries_where(|key| self.keys.is_dependent(key));
                let count = cache.remove_where(|key| self.keys.is_dependent(key));
                info!(user = %previous, evicted = count, "Signed out, evicted dependent queries");
            }
            (None, Some(current)) => {
                let count = cache.invalidate_where(|key| self.keys.is_dependent(key));
                debug!(user = %current, invalidated = count, "Signed in");
            }
            _ => {}
        }
    }
}

impl AuthContext {
    /// Current session. Never gated: it is what the other queries gate on.
    pub fn session(&self) -> SessionQuery {
        let client = self.client.clone();
        let query = AuthQuery::new(self.keys.session.clone(), self.cache.clone(), move |options| {
            let client = client.clone();
            async move { client.get_session(options).await }
        });
        SessionQuery {
            query,
            keys: self.keys.clone(),
            session_user: self.session_user.clone(),
        }
    }

    /// Token freshness tracker for the current session.
    pub fn token_watcher(&self) -> TokenWatcher {
        let query = self.gated_query(self.keys.token.clone(), |client, options| async move {
            client.get_token(options).await
        });
        TokenWatcher::new(query, self.keys.session.clone())
    }

    pub fn list_sessions(&self) -> AuthQuery<Vec<Session>> {
        self.gated_query(self.keys.list_sessions.clone(), |client, options| async move {
            client.list_sessions(options).await
        })
    }

    pub fn revoke_session(&self) -> AuthMutation<RevokeSessionParams, ()> {
        self.bound_mutation(
            self.keys.list_sessions.clone(),
            |client, params, options| async move { client.revoke_session(params, options).await },
        )
        .optimistic(|sessions: &Vec<Session>, params: &RevokeSessionParams| {
            sessions
                .iter()
                .filter(|session| session.token != params.token)
                .cloned()
                .collect()
        })
    }

    /// Revoke every session except the current one.
    pub fn revoke_other_sessions(&self) -> AuthMutation<(), ()> {
        let cache = self.cache.clone();
        let session_key = self.keys.session.clone();
        self.bound_mutation(
            self.keys.list_sessions.clone(),
            |client, _: (), options| async move { client.revoke_other_sessions(options).await },
        )
        .optimistic(move |sessions: &Vec<Session>, _: &()| {
            let current = cache
                .get::<Option<SessionData>>(&session_key)
                .ok()
                .flatten()
                .flatten()
                .map(|data| data.session.token);
            match current {
                Some(token) => sessions
                    .iter()
                    .filter(|session| session.token == token)
                    .cloned()
                    .collect(),
                None => sessions.clone(),
            }
        })
    }

    pub fn list_device_sessions(&self) -> AuthQuery<Vec<SessionData>> {
        self.gated_query(self.keys.list_device_sessions.clone(), |client, options| async move {
            client.list_device_sessions(options).await
        })
    }

    pub fn revoke_device_session(&self) -> AuthMutation<RevokeDeviceSessionParams, ()> {
        self.bound_mutation(
            self.keys.list_device_sessions.clone(),
            |client, params, options| async move {
                client.revoke_device_session(params, options).await
            },
        )
        .optimistic(|sessions: &Vec<SessionData>, params: &RevokeDeviceSessionParams| {
            sessions
                .iter()
                .filter(|data| data.session.token != params.session_token)
                .cloned()
                .collect()
        })
    }

    /// Switch the active device session. The session entry goes stale; the
    /// next session fetch sees the new user and invalidates dependents.
    pub fn set_active_session(&self) -> AuthMutation<SetActiveSessionParams, SessionData> {
        self.bound_mutation(
            self.keys.session.clone(),
            |client, params, options| async move { client.set_active_session(params, options).await },
        )
        .invalidates(self.keys.list_device_sessions.clone())
    }
}
