// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP implementation of the auth client traits against better-auth's
//! REST endpoints.
//!
//! ## Errors
//!
//! - Non-2xx responses decode the server's `{code, message}` body into an
//!   [`AuthClientError`] carrying the HTTP status.
//! - Transport failures map to `NETWORK_ERROR`, undecodable bodies to
//!   `INVALID_RESPONSE`.
//! - Calls made with `throw = false` log failures at debug level only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, header::COOKIE, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use super::{
    AccountClient, ApiKeyClient, FetchOptions, MultiSessionClient, OrganizationClient,
    PasskeyClient, SessionClient,
};
use crate::config::SyncSettings;
use crate::error::{AuthClientError, ClientResult, SyncError, SyncResult};
use crate::models::{
    Account, ApiKey, CreateApiKeyParams, CreatedApiKey, DeleteApiKeyParams, DeletePasskeyParams,
    HasPermissionParams, Invitation, InvitationQuery, MemberList, Organization, OrganizationQuery,
    OrganizationScope, Passkey, PermissionCheck, RevokeDeviceSessionParams, RevokeSessionParams,
    Session, SessionData, SetActiveOrganizationParams, SetActiveSessionParams, TokenResponse,
    UnlinkAccountParams, UpdateOrganizationParams, UpdateUserParams,
};

/// better-auth client over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    /// Origin plus handler mount path, always ending with `/`
    base_url: Url,
    cookie: Option<String>,
    bearer_token: Option<String>,
    http: Client,
}

impl HttpAuthClient {
    /// Create a client for `origin` with the handler mounted at `base_path`.
    pub fn new(origin: &str, base_path: &str, timeout: Duration) -> SyncResult<Self> {
        let base_url = build_base_url(origin, base_path)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            cookie: None,
            bearer_token: None,
            http,
        })
    }

    /// Create a client from environment settings. `AUTH_BASE_URL` is required.
    pub fn from_settings(settings: &SyncSettings) -> SyncResult<Self> {
        let origin = settings.auth_base_url.as_deref().ok_or_else(|| {
            SyncError::Config(format!("{} is not set", crate::config::AUTH_BASE_URL_ENV))
        })?;

        let mut client = Self::new(origin, &settings.auth_base_path, settings.http_timeout)?;
        client.cookie = settings.cookie.clone();
        client.bearer_token = settings.bearer_token.clone();
        Ok(client)
    }

    /// Forward a cookie header with every request.
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Forward a bearer token with every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url.join(path.trim_start_matches('/')).map_err(|e| {
            AuthClientError::new(format!("invalid endpoint {path}: {e}")).with_code("INVALID_URL")
        })
    }

    fn decorate(&self, mut request: RequestBuilder, options: &FetchOptions) -> RequestBuilder {
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request
    }

    async fn get<Q, T>(&self, path: &str, query: &Q, options: FetchOptions) -> ClientResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let request = self.decorate(self.http.get(url).query(query), &options);
        let body = self.send(request, path, &options).await?;
        decode_body(path, &body)
    }

    async fn post<B, T>(&self, path: &str, body: &B, options: FetchOptions) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let request = self.decorate(self.http.post(url).json(body), &options);
        let body = self.send(request, path, &options).await?;
        decode_body(path, &body)
    }

    /// POST whose response body carries nothing the caller needs.
    async fn post_unit<B>(&self, path: &str, body: &B, options: FetchOptions) -> ClientResult<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let request = self.decorate(self.http.post(url).json(body), &options);
        self.send(request, path, &options).await.map(|_| ())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        path: &str,
        options: &FetchOptions,
    ) -> ClientResult<Vec<u8>> {
        let response = request.send().await.map_err(|e| {
            let err = AuthClientError::new(e.to_string()).with_code("NETWORK_ERROR");
            log_failure(path, &err, options);
            err
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            AuthClientError::new(e.to_string())
                .with_code("NETWORK_ERROR")
                .with_status(status.as_u16())
        })?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let err = error_from_response(status, &body);
        log_failure(path, &err, options);
        Err(err)
    }
}

fn build_base_url(origin: &str, base_path: &str) -> SyncResult<Url> {
    let path = base_path.trim_matches('/');
    let joined = if path.is_empty() {
        format!("{}/", origin.trim_end_matches('/'))
    } else {
        format!("{}/{}/", origin.trim_end_matches('/'), path)
    };
    Url::parse(&joined).map_err(|e| SyncError::Config(format!("invalid auth base URL {joined}: {e}")))
}

fn decode_body<T: DeserializeOwned>(path: &str, body: &[u8]) -> ClientResult<T> {
    // better-auth answers some reads with an empty body instead of `null`
    let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| {
        AuthClientError::new(format!("invalid response from {path}: {e}")).with_code("INVALID_RESPONSE")
    })
}

fn error_from_response(status: StatusCode, body: &[u8]) -> AuthClientError {
    let parsed = serde_json::from_slice::<AuthClientError>(body).ok();
    let mut err = match parsed {
        Some(err) if !err.message.is_empty() || err.code.is_some() => err,
        _ => AuthClientError::new(status.canonical_reason().unwrap_or("request failed")),
    };
    err.status = Some(status.as_u16());
    err
}

fn log_failure(path: &str, err: &AuthClientError, options: &FetchOptions) {
    if options.throws() {
        warn!(path, error = %err, "Auth request failed");
    } else {
        debug!(path, error = %err, "Auth request failed (not thrown)");
    }
}

/// Query string for calls without parameters.
const NO_QUERY: &[(&str, &str)] = &[];

#[async_trait]
impl SessionClient for HttpAuthClient {
    async fn get_session(&self, options: FetchOptions) -> ClientResult<Option<SessionData>> {
        self.get("get-session", NO_QUERY, options).await
    }

    async fn get_token(&self, options: FetchOptions) -> ClientResult<TokenResponse> {
        self.get("token", NO_QUERY, options).await
    }

    async fn list_sessions(&self, options: FetchOptions) -> ClientResult<Vec<Session>> {
        self.get("list-sessions", NO_QUERY, options).await
    }

    async fn revoke_session(
        &self,
        params: RevokeSessionParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.post_unit("revoke-session", &params, options).await
    }

    async fn revoke_other_sessions(&self, options: FetchOptions) -> ClientResult<()> {
        self.post_unit("revoke-other-sessions", &json!({}), options).await
    }
}

#[async_trait]
impl MultiSessionClient for HttpAuthClient {
    async fn list_device_sessions(&self, options: FetchOptions) -> ClientResult<Vec<SessionData>> {
        self.get("multi-session/list-device-sessions", NO_QUERY, options)
            .await
    }

    async fn revoke_device_session(
        &self,
        params: RevokeDeviceSessionParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.post_unit("multi-session/revoke", &params, options).await
    }

    async fn set_active_session(
        &self,
        params: SetActiveSessionParams,
        options: FetchOptions,
    ) -> ClientResult<SessionData> {
        self.post("multi-session/set-active", &params, options).await
    }
}

#[async_trait]
impl AccountClient for HttpAuthClient {
    async fn list_accounts(&self, options: FetchOptions) -> ClientResult<Vec<Account>> {
        self.get("list-accounts", NO_QUERY, options).await
    }

    async fn unlink_account(
        &self,
        params: UnlinkAccountParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.post_unit("unlink-account", &params, options).await
    }

    async fn update_user(&self, params: UpdateUserParams, options: FetchOptions) -> ClientResult<()> {
        self.post_unit("update-user", &params, options).await
    }
}

#[async_trait]
impl ApiKeyClient for HttpAuthClient {
    async fn list_api_keys(&self, options: FetchOptions) -> ClientResult<Vec<ApiKey>> {
        self.get("api-key/list", NO_QUERY, options).await
    }

    async fn create_api_key(
        &self,
        params: CreateApiKeyParams,
        options: FetchOptions,
    ) -> ClientResult<CreatedApiKey> {
        self.post("api-key/create", &params, options).await
    }

    async fn delete_api_key(
        &self,
        params: DeleteApiKeyParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.post_unit("api-key/delete", &params, options).await
    }
}

#[async_trait]
impl PasskeyClient for HttpAuthClient {
    async fn list_passkeys(&self, options: FetchOptions) -> ClientResult<Vec<Passkey>> {
        self.get("passkey/list-user-passkeys", NO_QUERY, options).await
    }

    async fn delete_passkey(
        &self,
        params: DeletePasskeyParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.post_unit("passkey/delete-passkey", &params, options).await
    }
}

#[async_trait]
impl OrganizationClient for HttpAuthClient {
    async fn list_organizations(&self, options: FetchOptions) -> ClientResult<Vec<Organization>> {
        self.get("organization/list", NO_QUERY, options).await
    }

    async fn get_full_organization(
        &self,
        query: OrganizationQuery,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>> {
        self.get("organization/get-full-organization", &query, options)
            .await
    }

    async fn update_organization(
        &self,
        params: UpdateOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Organization> {
        self.post("organization/update", &params, options).await
    }

    async fn set_active_organization(
        &self,
        params: SetActiveOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>> {
        self.post("organization/set-active", &params, options).await
    }

    async fn has_permission(
        &self,
        params: HasPermissionParams,
        options: FetchOptions,
    ) -> ClientResult<PermissionCheck> {
        self.post("organization/has-permission", &params, options).await
    }

    async fn get_invitation(
        &self,
        query: InvitationQuery,
        options: FetchOptions,
    ) -> ClientResult<Invitation> {
        self.get("organization/get-invitation", &query, options).await
    }

    async fn list_invitations(
        &self,
        scope: OrganizationScope,
        options: FetchOptions,
    ) -> ClientResult<Vec<Invitation>> {
        self.get("organization/list-invitations", &scope, options).await
    }

    async fn list_user_invitations(&self, options: FetchOptions) -> ClientResult<Vec<Invitation>> {
        self.get("organization/list-user-invitations", NO_QUERY, options)
            .await
    }

    async fn list_members(
        &self,
        scope: OrganizationScope,
        options: FetchOptions,
    ) -> ClientResult<MemberList> {
        self.get("organization/list-members", &scope, options).await
    }
}
