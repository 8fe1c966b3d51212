// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Inspect the auth state visible to a cookie or bearer token.
//!
//! Reads `AUTH_BASE_URL` plus `AUTH_COOKIE` or `AUTH_BEARER_TOKEN`, then
//! prints the session, token state and organization list as JSON.

use std::process::ExitCode;

use serde_json::{json, Value};
use tracing::{error, info};

use pelatform_auth_sync::logging::init_tracing;
use pelatform_auth_sync::{AuthContext, AuthUiOptions, QueryState, SyncSettings, TokenState};

fn state_json<T: serde::Serialize>(state: &QueryState<T>) -> Value {
    json!({
        "status": format!("{:?}", state.status),
        "data": state.data.as_ref().and_then(|data| serde_json::to_value(data).ok()),
        "error": state.error.as_ref().map(|e| json!({"code": e.error_code(), "message": e.to_string()})),
    })
}

fn token_json(state: &TokenState) -> Value {
    match state {
        TokenState::NoSession => json!({"state": "no-session"}),
        TokenState::SessionWithoutToken => json!({"state": "session-without-token"}),
        TokenState::SessionWithValidToken(token) => json!({
            "state": "session-with-valid-token",
            "subject": token.subject(),
            "expiresAt": token.expires_at(),
        }),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = SyncSettings::from_env();
    init_tracing(settings.log_format);

    let context = match AuthContext::from_settings(&settings, AuthUiOptions::default()) {
        Ok(context) => context,
        Err(e) => {
            error!(error = %e, "Failed to build auth context");
            return ExitCode::FAILURE;
        }
    };
    info!(cache = ?context.cache(), "Inspecting auth state");

    let session = context.session().fetch().await;
    let token = context.token_watcher().state().await;
    let organizations = context.list_organizations().fetch().await;

    let report = json!({
        "session": state_json(&session),
        "token": token_json(&token),
        "organizations": state_json(&organizations),
    });

    match serde_json::to_string_pretty(&report) {
        Ok(rendered) => {
            println!("{rendered}");
            if session.is_error() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(error = %e, "Failed to render report");
            ExitCode::FAILURE
        }
    }
}
