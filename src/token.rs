// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session token freshness tracking.
//!
//! ## States
//!
//! - `NoSession`: nothing cached under the session key
//! - `SessionWithoutToken`: signed in, but no usable token yet
//! - `SessionWithValidToken`: token subject matches the session user and
//!   its expiry is in the future
//!
//! A valid token arms one timer at its expiry instant; when it fires the
//! token query is refetched. A subject mismatch (account switch) or an
//! elapsed expiry triggers an immediate refetch instead.
//!
//! ## Security
//!
//! Token payloads are decoded locally **without** signature verification.
//! The claims are only used to drive cache lifetimes and must never be
//! treated as proof of identity.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::error::{SyncError, SyncResult};
use crate::models::{SessionData, TokenResponse};
use crate::query::AuthQuery;

/// Claims read from the token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration timestamp (seconds)
    pub exp: i64,
    /// Issued at timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Locally decoded bearer token. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionToken {
    pub raw: String,
    pub claims: TokenClaims,
}

impl SessionToken {
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.claims.exp, 0).single()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map_or(true, |exp| exp <= now)
    }

    /// Subject matches `user_id` and expiry has not elapsed.
    pub fn is_valid_for(&self, user_id: &str, now: DateTime<Utc>) -> bool {
        self.subject() == user_id && !self.is_expired_at(now)
    }

    /// Time left until expiry, zero once elapsed.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at()
            .and_then(|exp| (exp - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

/// Decode `header.payload.signature` without verifying anything.
pub fn decode_token(raw: &str) -> SyncResult<SessionToken> {
    let payload = raw
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| SyncError::MalformedToken("missing payload segment".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| SyncError::MalformedToken(format!("payload is not base64url: {e}")))?;

    let claims: TokenClaims = serde_json::from_slice(&bytes)
        .map_err(|e| SyncError::MalformedToken(format!("payload is not valid claims JSON: {e}")))?;

    Ok(SessionToken {
        raw: raw.to_string(),
        claims,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    NoSession,
    SessionWithoutToken,
    SessionWithValidToken(SessionToken),
}

impl TokenState {
    pub fn token(&self) -> Option<&SessionToken> {
        match self {
            TokenState::SessionWithValidToken(token) => Some(token),
            _ => None,
        }
    }
}

struct ScheduledRefresh {
    raw: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Derives [`TokenState`] from the session and token cache entries.
pub struct TokenWatcher {
    query: AuthQuery<TokenResponse>,
    session_key: QueryKey,
    timer: Mutex<Option<ScheduledRefresh>>,
}

impl std::fmt::Debug for TokenWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenWatcher")
            .field("token_key", self.query.key())
            .field("scheduled_for", &self.scheduled_for())
            .finish()
    }
}

impl TokenWatcher {
    /// Watch `query` (the token fetch), gated on `session_key`.
    pub fn new(query: AuthQuery<TokenResponse>, session_key: QueryKey) -> Self {
        Self {
            query: query.gated_on(session_key.clone()),
            session_key,
            timer: Mutex::new(None),
        }
    }

    fn cache(&self) -> &Arc<QueryCache> {
        self.query.cache()
    }

    fn session(&self) -> Option<SessionData> {
        // A signed-out session is cached as `null`
        match self.cache().get::<Option<SessionData>>(&self.session_key) {
            Ok(session) => session.flatten(),
            Err(err) => {
                warn!(error = %err, "Cached session is unreadable");
                None
            }
        }
    }

    /// Resolve the current state, refetching the token when it is stale,
    /// expired, or issued for another user.
    pub async fn state(&self) -> TokenState {
        let Some(session) = self.session() else {
            self.clear();
            return TokenState::NoSession;
        };

        let fetched = self.query.fetch().await;
        let Some(response) = fetched.data else {
            return TokenState::SessionWithoutToken;
        };

        if let Some(token) = self.validate(&response, &session) {
            self.schedule(&token);
            return TokenState::SessionWithValidToken(token);
        }

        // Expired, foreign or unreadable token: one unconditional refetch
        self.cache().invalidate(self.query.key());
        let refetched = self.query.refetch().await;
        match refetched
            .data
            .and_then(|response| self.validate(&response, &session))
        {
            Some(token) => {
                self.schedule(&token);
                TokenState::SessionWithValidToken(token)
            }
            None => {
                self.clear();
                TokenState::SessionWithoutToken
            }
        }
    }

    /// Valid token for the current session, if any.
    pub async fn token(&self) -> Option<SessionToken> {
        match self.state().await {
            TokenState::SessionWithValidToken(token) => Some(token),
            _ => None,
        }
    }

    fn validate(&self, response: &TokenResponse, session: &SessionData) -> Option<SessionToken> {
        let token = match decode_token(&response.token) {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Discarding undecodable session token");
                return None;
            }
        };

        let now = Utc::now();
        if token.subject() != session.user_id() {
            info!(
                token_subject = %token.subject(),
                session_user = %session.user_id(),
                "Token subject does not match session user"
            );
            return None;
        }
        if token.is_expired_at(now) {
            debug!(exp = token.claims.exp, "Session token expired");
            return None;
        }
        Some(token)
    }

    /// Arm the expiry timer for `token`, replacing a timer for any other token.
    fn schedule(&self, token: &SessionToken) {
        let mut slot = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(current) = slot.as_ref() {
            if current.raw == token.raw && !current.handle.is_finished() {
                return;
            }
        }
        if let Some(previous) = slot.take() {
            previous.cancel.cancel();
        }

        let delay = token.time_until_expiry(Utc::now());
        let cancel = CancellationToken::new();
        let cancelled = cancel.clone();
        let query = self.query.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    debug!(key = %query.key(), "Session token reached expiry, refetching");
                    query.cache().invalidate(query.key());
                    query.refetch().await;
                }
            }
        });

        debug!(delay_secs = delay.as_secs(), "Scheduled token refresh");
        *slot = Some(ScheduledRefresh {
            raw: token.raw.clone(),
            cancel,
            handle,
        });
    }

    /// Raw token the live timer is armed for.
    pub fn scheduled_for(&self) -> Option<String> {
        self.timer
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .filter(|scheduled| !scheduled.handle.is_finished())
            .map(|scheduled| scheduled.raw.clone())
    }

    /// Cancel the expiry timer.
    pub fn clear(&self) {
        if let Some(previous) = self.timer.lock().unwrap_or_else(|p| p.into_inner()).take() {
            previous.cancel.cancel();
        }
    }
}

impl Drop for TokenWatcher {
    fn drop(&mut self) {
        self.clear();
    }
}
