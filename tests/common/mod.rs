// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory better-auth double shared by the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;

use pelatform_auth_sync::client::{
    AccountClient, ApiKeyClient, MultiSessionClient, OrganizationClient, PasskeyClient, SessionClient,
};
use pelatform_auth_sync::error::ClientResult;
use pelatform_auth_sync::models::*;
use pelatform_auth_sync::provider::{ImageFile, ImageHandler, Navigator, Notifier, ToastVariant};
use pelatform_auth_sync::{AuthClientError, FetchOptions};

pub fn session_data(user_id: &str) -> SessionData {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    SessionData {
        session: Session {
            id: format!("sess_{user_id}"),
            token: format!("tok_{user_id}"),
            user_id: user_id.to_string(),
            expires_at: Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap(),
            ip_address: None,
            user_agent: None,
            active_organization_id: None,
            created_at: at,
            updated_at: at,
        },
        user: User {
            id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            email_verified: true,
            name: "Ada".to_string(),
            image: None,
            username: None,
            created_at: at,
            updated_at: at,
            extra: Default::default(),
        },
    }
}

pub fn organization(id: &str, name: &str) -> Organization {
    Organization {
        id: id.to_string(),
        name: name.to_string(),
        slug: id.replace('_', "-"),
        logo: None,
        metadata: None,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
    }
}

pub fn api_key(id: &str) -> ApiKey {
    let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    ApiKey {
        id: id.to_string(),
        name: Some(format!("key {id}")),
        start: None,
        prefix: None,
        user_id: "user_1".to_string(),
        enabled: true,
        expires_at: None,
        metadata: None,
        created_at: at,
        updated_at: at,
    }
}

/// Unsigned token with the given claims.
pub fn token_for(sub: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({"sub": sub, "exp": exp}).to_string());
    format!("{header}.{payload}.sig")
}

/// Scriptable client that counts every call by method name.
#[derive(Default)]
pub struct MockAuthClient {
    pub session: Mutex<Option<SessionData>>,
    pub token: Mutex<String>,
    pub sessions: Mutex<Vec<Session>>,
    pub organizations: Mutex<Vec<Organization>>,
    pub api_keys: Mutex<Vec<ApiKey>>,
    /// Every mutation rejects while set
    pub fail_mutations: AtomicBool,
    /// `update_organization` waits for `release` while set
    pub hold_updates: AtomicBool,
    pub update_started: Notify,
    pub release: Notify,
    /// `list_organizations` answers with the list it saw on entry, after `list_release`
    pub hold_lists: AtomicBool,
    pub list_started: Notify,
    pub list_release: Notify,
    calls: Mutex<BTreeMap<&'static str, usize>>,
    seen_options: Mutex<Vec<FetchOptions>>,
}

impl MockAuthClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(user_id: &str) -> Arc<Self> {
        let client = Self::default();
        *client.session.lock().unwrap() = Some(session_data(user_id));
        Arc::new(client)
    }

    pub fn set_session(&self, session: Option<SessionData>) {
        *self.session.lock().unwrap() = session;
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn last_options(&self) -> Option<FetchOptions> {
        self.seen_options.lock().unwrap().last().cloned()
    }

    fn record(&self, method: &'static str, options: &FetchOptions) {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        self.seen_options.lock().unwrap().push(options.clone());
    }

    fn mutation_result(&self) -> ClientResult<()> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(AuthClientError::new("rejected by server")
                .with_status(400)
                .with_code("BAD_REQUEST"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionClient for MockAuthClient {
    async fn get_session(&self, options: FetchOptions) -> ClientResult<Option<SessionData>> {
        self.record("get_session", &options);
        Ok(self.session.lock().unwrap().clone())
    }

    async fn get_token(&self, options: FetchOptions) -> ClientResult<TokenResponse> {
        self.record("get_token", &options);
        Ok(TokenResponse {
            token: self.token.lock().unwrap().clone(),
        })
    }

    async fn list_sessions(&self, options: FetchOptions) -> ClientResult<Vec<Session>> {
        self.record("list_sessions", &options);
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn revoke_session(&self, params: RevokeSessionParams, options: FetchOptions) -> ClientResult<()> {
        self.record("revoke_session", &options);
        self.mutation_result()?;
        self.sessions.lock().unwrap().retain(|s| s.token != params.token);
        Ok(())
    }

    async fn revoke_other_sessions(&self, options: FetchOptions) -> ClientResult<()> {
        self.record("revoke_other_sessions", &options);
        self.mutation_result()
    }
}

#[async_trait]
impl MultiSessionClient for MockAuthClient {
    async fn list_device_sessions(&self, options: FetchOptions) -> ClientResult<Vec<SessionData>> {
        self.record("list_device_sessions", &options);
        Ok(self.session.lock().unwrap().clone().into_iter().collect())
    }

    async fn revoke_device_session(
        &self,
        _params: RevokeDeviceSessionParams,
        options: FetchOptions,
    ) -> ClientResult<()> {
        self.record("revoke_device_session", &options);
        self.mutation_result()
    }

    async fn set_active_session(
        &self,
        params: SetActiveSessionParams,
        options: FetchOptions,
    ) -> ClientResult<SessionData> {
        self.record("set_active_session", &options);
        self.mutation_result()?;
        let user = params.session_token.trim_start_matches("tok_").to_string();
        let data = session_data(&user);
        self.set_session(Some(data.clone()));
        Ok(data)
    }
}

#[async_trait]
impl AccountClient for MockAuthClient {
    async fn list_accounts(&self, options: FetchOptions) -> ClientResult<Vec<Account>> {
        self.record("list_accounts", &options);
        Ok(Vec::new())
    }

    async fn unlink_account(&self, _params: UnlinkAccountParams, options: FetchOptions) -> ClientResult<()> {
        self.record("unlink_account", &options);
        self.mutation_result()
    }

    async fn update_user(&self, params: UpdateUserParams, options: FetchOptions) -> ClientResult<()> {
        self.record("update_user", &options);
        self.mutation_result()?;
        if let Some(data) = self.session.lock().unwrap().as_mut() {
            data.user = params.apply_to(&data.user);
        }
        Ok(())
    }
}

#[async_trait]
impl ApiKeyClient for MockAuthClient {
    async fn list_api_keys(&self, options: FetchOptions) -> ClientResult<Vec<ApiKey>> {
        self.record("list_api_keys", &options);
        Ok(self.api_keys.lock().unwrap().clone())
    }

    async fn create_api_key(
        &self,
        params: CreateApiKeyParams,
        options: FetchOptions,
    ) -> ClientResult<CreatedApiKey> {
        self.record("create_api_key", &options);
        self.mutation_result()?;
        let mut key = api_key("key_new");
        key.name = params.name;
        self.api_keys.lock().unwrap().push(key.clone());
        Ok(CreatedApiKey {
            key: "sk_live_secret".to_string(),
            api_key: key,
        })
    }

    async fn delete_api_key(&self, params: DeleteApiKeyParams, options: FetchOptions) -> ClientResult<()> {
        self.record("delete_api_key", &options);
        self.mutation_result()?;
        self.api_keys.lock().unwrap().retain(|k| k.id != params.key_id);
        Ok(())
    }
}

#[async_trait]
impl PasskeyClient for MockAuthClient {
    async fn list_passkeys(&self, options: FetchOptions) -> ClientResult<Vec<Passkey>> {
        self.record("list_passkeys", &options);
        Ok(Vec::new())
    }

    async fn delete_passkey(&self, _params: DeletePasskeyParams, options: FetchOptions) -> ClientResult<()> {
        self.record("delete_passkey", &options);
        self.mutation_result()
    }
}

#[async_trait]
impl OrganizationClient for MockAuthClient {
    async fn list_organizations(&self, options: FetchOptions) -> ClientResult<Vec<Organization>> {
        self.record("list_organizations", &options);
        let organizations = self.organizations.lock().unwrap().clone();
        if self.hold_lists.load(Ordering::SeqCst) {
            self.list_started.notify_one();
            self.list_release.notified().await;
        }
        Ok(organizations)
    }

    async fn get_full_organization(
        &self,
        query: OrganizationQuery,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>> {
        self.record("get_full_organization", &options);
        let organizations = self.organizations.lock().unwrap();
        Ok(match (&query.organization_id, &query.organization_slug) {
            (Some(id), _) => organizations.iter().find(|o| &o.id == id).cloned(),
            (None, Some(slug)) => organizations.iter().find(|o| &o.slug == slug).cloned(),
            (None, None) => organizations.first().cloned(),
        })
    }

    async fn update_organization(
        &self,
        params: UpdateOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Organization> {
        self.record("update_organization", &options);
        if self.hold_updates.load(Ordering::SeqCst) {
            self.update_started.notify_one();
            self.release.notified().await;
        }
        self.mutation_result()?;

        let mut organizations = self.organizations.lock().unwrap();
        let org = organizations
            .iter_mut()
            .find(|o| o.id == params.organization_id)
            .ok_or_else(|| AuthClientError::new("not found").with_status(404))?;
        *org = params.data.apply_to(org);
        Ok(org.clone())
    }

    async fn set_active_organization(
        &self,
        params: SetActiveOrganizationParams,
        options: FetchOptions,
    ) -> ClientResult<Option<Organization>> {
        self.record("set_active_organization", &options);
        self.mutation_result()?;
        let organizations = self.organizations.lock().unwrap();
        Ok(params
            .organization_id
            .and_then(|id| organizations.iter().find(|o| o.id == id).cloned()))
    }

    async fn has_permission(
        &self,
        _params: HasPermissionParams,
        options: FetchOptions,
    ) -> ClientResult<PermissionCheck> {
        self.record("has_permission", &options);
        Ok(PermissionCheck {
            success: true,
            error: None,
        })
    }

    async fn get_invitation(&self, query: InvitationQuery, options: FetchOptions) -> ClientResult<Invitation> {
        self.record("get_invitation", &options);
        Err(AuthClientError::new(format!("invitation {} not found", query.id)).with_status(404))
    }

    async fn list_invitations(
        &self,
        _scope: OrganizationScope,
        options: FetchOptions,
    ) -> ClientResult<Vec<Invitation>> {
        self.record("list_invitations", &options);
        Ok(Vec::new())
    }

    async fn list_user_invitations(&self, options: FetchOptions) -> ClientResult<Vec<Invitation>> {
        self.record("list_user_invitations", &options);
        Ok(Vec::new())
    }

    async fn list_members(&self, _scope: OrganizationScope, options: FetchOptions) -> ClientResult<MemberList> {
        self.record("list_members", &options);
        Ok(MemberList {
            members: Vec::new(),
            total: 0,
        })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub visited: Mutex<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, href: &str) {
        self.visited.lock().unwrap().push(href.to_string());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub toasts: Mutex<Vec<(ToastVariant, String)>>,
}

impl Notifier for RecordingNotifier {
    fn toast(&self, variant: ToastVariant, message: &str) {
        self.toasts.lock().unwrap().push((variant, message.to_string()));
    }
}

/// Stores uploads under `https://images.test/<name>` and records deletions.
#[derive(Default)]
pub struct RecordingImageHandler {
    pub uploaded: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageHandler for RecordingImageHandler {
    async fn upload(&self, image: ImageFile) -> ClientResult<String> {
        let url = format!("https://images.test/{}", image.name);
        self.uploaded.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> ClientResult<()> {
        self.deleted.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn png(name: &str) -> ImageFile {
    ImageFile {
        name: name.to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}
