// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error types shared by the cache, the wrappers and the auth client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structured error returned by the better-auth server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthClientError {
    /// HTTP status, when the error came from a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Machine-readable code (e.g. `SESSION_EXPIRED`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

impl AuthClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Error code, or `unknown_error` when the server sent none.
    pub fn error_code(&self) -> &str {
        self.code.as_deref().unwrap_or("unknown_error")
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

impl fmt::Display for AuthClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, &self.code) {
            (Some(status), Some(code)) => write!(f, "{code} ({status}): {}", self.message),
            (Some(status), None) => write!(f, "HTTP {status}: {}", self.message),
            (None, Some(code)) => write!(f, "{code}: {}", self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AuthClientError {}

/// Error type for the sync layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("auth request failed: {0}")]
    Remote(#[from] AuthClientError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A hook was used without the provider it depends on.
    #[error("{hook} must be used within {provider}")]
    MissingProvider {
        hook: &'static str,
        provider: &'static str,
    },

    #[error("authClient is required to build AuthUIProvider")]
    MissingAuthClient,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Stable code used for logging and notifications.
    pub fn error_code(&self) -> &str {
        match self {
            SyncError::Remote(e) => e.error_code(),
            SyncError::Serialization(_) => "serialization_error",
            SyncError::MalformedToken(_) => "malformed_token",
            SyncError::MissingProvider { .. } => "missing_provider",
            SyncError::MissingAuthClient => "missing_auth_client",
            SyncError::Config(_) => "invalid_config",
        }
    }

    /// Remote error, if this is one.
    pub fn as_remote(&self) -> Option<&AuthClientError> {
        match self {
            SyncError::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for auth client calls.
pub type ClientResult<T> = Result<T, AuthClientError>;
