// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth Client Surface
//!
//! One trait per better-auth resource family. The query and mutation
//! wrappers only ever talk to these traits, so any transport (the bundled
//! [`HttpAuthClient`], a test double) can sit behind them.
//!
//! Every call takes [`FetchOptions`]. The wrappers inject `throw = true`
//! unless the caller set it explicitly; everything else passes through.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::models::{
    Account, ApiKey, CreateApiKeyParams, CreatedApiKey, DeleteApiKeyParams, DeletePasskeyParams,
    HasPermissionParams, Invitation, InvitationQuery, MemberList, Organization, OrganizationQuery,
    OrganizationScope, Passkey, PermissionCheck, RevokeDeviceSessionParams, RevokeSessionParams,
    Session, SessionData, SetActiveOrganizationParams, SetActiveSessionParams, TokenResponse,
    UnlinkAccountParams, UpdateOrganizationParams, UpdateUserParams,
};

pub mod http;

pub use http::HttpAuthClient;

/// Per-call request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Whether failures should be raised to the error sink. `None` means
    /// "not chosen by the caller".
    pub throw: Option<bool>,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_throw() -> Self {
        Self {
            throw: Some(false),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Effective throw mode (defaults to `true`).
    pub fn throws(&self) -> bool {
        self.throw.unwrap_or(true)
    }

    /// Fill in `throw = true` if the caller left it unset.
    pub fn with_default_throw(mut self) -> Self {
        if self.throw.is_none() {
            self.throw = Some(true);
        }
        self
    }
}

#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Current session, `None` when signed out.
    async fn get_session(&self, options: FetchOptions) -> ClientResult<Option<SessionData>>;

    /// Bearer token for the current session.
    async fn get_token(&self, options: FetchOptions) -> ClientResult<TokenResponse>;

    async fn list_sessions(&self, options: FetchOptions) -> ClientResult<Vec<Session>>;

    async fn revoke_session(
        &self,
        params: RevokeSessionParams,
        options: FetchOptions,
    ) -> ClientResult<()>;

    async fn revoke_other_sessions(&self, options: FetchOptions) -> ClientResult<()>;
}

#[async_trait]
pub trait MultiSessionClient: Send + Sync {
    async fn list_device_sessions(&self, options: FetchOptions) -> ClientResult<Vec<SessionData>>;

    async fn revoke_device_session(
        &self,
        params: RevokeDeviceSessionParams,
        options: FetchOptions,
    ) -> ClientResult<()>;

    async fn set_active_session(
        &self,
        params: SetActiveSessionParams,
        options: FetchOptions,
    ) -> ClientResult<SessionData>;
}

#[async_trait]
pub trait AccountClient: Send + Sync {
    async fn list_accounts(&self, options: FetchOptions) -> ClientResult<Vec<Account>>;

    async fn unlink_account(
        &self,
        params: UnlinkAccountParams,
        options: FetchOptions,
    ) -> ClientResult<()>;

    async fn update_user(&self, params: UpdateUserParams, options: FetchOptions) -> ClientResult<()>;
}

#[async_trait]
pub trait ApiKeyClient: Send + Sync {
    async fn list_api_keys(&self, options: FetchOptions) -> ClientResult<Vec<ApiKey>>;

    async fn create_api_key(
        &self,
        params: CreateApiKeyParams,
        options: FetchOptions,
    ) -> ClientResult<CreatedApiKey>;

    async fn delete_api_key(
        &self,
        params: DeleteApiKeyParams,
        options: FetchOptions,
    ) -> ClientResult<()>;
}

#[async_trait]
pub trait PasskeyClient: Send + Sync {
    async fn list_passkeys(&self, options: FetchOptions) -> ClientResult<Vec<Passkey>>;

    async fn delete_passkey(
        &self,
        params: DeletePasskeyParams,
        options: FetchOptions,
    ) -> ClientResult<()>;
}

#[async_trait]
pub trait OrganizationClient: Send + Sync {
    async fn list_organizations(&self, options: FetchOptions) -> ClientResult<Vec<Organization>>;

    /// Full organization; the active one when the query is empty.
    async fn get_full_organization(
        &self,
        query: OrganizationQuery,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>>;

    async fn update_organization(
        &self,
        params: UpdateOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Organization>;

    async fn set_active_organization(
        &self,
        params: SetActiveOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>>;

    async fn has_permission(
        &self,
        params: HasPermissionParams,
        options: FetchOptions,
    ) -> ClientResult<PermissionCheck>;

    async fn get_invitation(
        &self,
        query: InvitationQuery,
        options: FetchOptions,
    ) -> ClientResult<Invitation>;

    async fn list_invitations(
        &self,
        scope: OrganizationScope,
        options: FetchOptions,
    ) -> ClientResult<Vec<Invitation>>;

    async fn list_user_invitations(&self, options: FetchOptions) -> ClientResult<Vec<Invitation>>;

    async fn list_members(
        &self,
        scope: OrganizationScope,
        options: FetchOptions,
    ) -> ClientResult<MemberList>;
}

/// Everything the hooks need from a better-auth client.
pub trait AuthClient:
    SessionClient + MultiSessionClient + AccountClient + ApiKeyClient + PasskeyClient + OrganizationClient
{
}

impl<T> AuthClient for T where
    T: SessionClient
        + MultiSessionClient
        + AccountClient
        + ApiKeyClient
        + PasskeyClient
        + OrganizationClient
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_throw_is_injected_only_when_unset() {
        assert_eq!(FetchOptions::new().with_default_throw().throw, Some(true));
        assert_eq!(FetchOptions::no_throw().with_default_throw().throw, Some(false));
    }

    #[test]
    fn default_throw_keeps_headers() {
        let options = FetchOptions::new()
            .header("x-request-id", "abc")
            .with_default_throw();
        assert_eq!(options.headers.get("x-request-id").map(String::as_str), Some("abc"));
        assert!(options.throws());
    }
}
