// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared context handed to every hook.
//!
//! Built once per provider tree. Cloning is cheap: every field is shared.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use super::cookie::{Cookie, CookieStore, MemoryCookieStore};
use super::host::{ImageHandler, Navigator, Notifier, ToastVariant, TracingNavigator, TracingNotifier};
use super::options::{AuthUiConfig, AuthUiOptions};
use super::organization::{OrganizationConfig, PathMode};
use crate::cache::{QueryCache, QueryKeys};
use crate::client::{AuthClient, HttpAuthClient};
use crate::config::{SyncSettings, DEFAULT_LAST_VISITED_ORG_MAX_AGE, LAST_VISITED_ORG_COOKIE};
use crate::error::{SyncError, SyncResult};
use crate::models::Organization;

#[derive(Clone)]
pub struct AuthContext {
    pub(crate) client: Arc<dyn AuthClient>,
    pub(crate) cache: Arc<QueryCache>,
    pub(crate) keys: QueryKeys,
    pub(crate) config: Arc<AuthUiConfig>,
    pub(crate) navigator: Arc<dyn Navigator>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) cookies: Arc<dyn CookieStore>,
    pub(crate) image_handler: Option<Arc<dyn ImageHandler>>,
    pub(crate) last_visited_org_max_age: Duration,
    /// User id of the last observed session, for login/logout transitions
    pub(crate) session_user: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .field("has_image_handler", &self.image_handler.is_some())
            .finish()
    }
}

impl AuthContext {
    pub fn builder() -> AuthContextBuilder {
        AuthContextBuilder::default()
    }

    /// Context over an [`HttpAuthClient`] configured from `settings`.
    pub fn from_settings(settings: &SyncSettings, options: AuthUiOptions) -> SyncResult<Self> {
        let client = HttpAuthClient::from_settings(settings)?;
        Self::builder()
            .client(Arc::new(client))
            .settings(settings)
            .options(options)
            .build()
    }

    pub fn client(&self) -> &Arc<dyn AuthClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn keys(&self) -> &QueryKeys {
        &self.keys
    }

    pub fn config(&self) -> &AuthUiConfig {
        &self.config
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn image_handler(&self) -> Option<&Arc<dyn ImageHandler>> {
        self.image_handler.as_ref()
    }

    /// Organization configuration; fails when the organization provider is absent.
    pub fn organization(&self) -> SyncResult<&OrganizationConfig> {
        self.config
            .organization
            .as_ref()
            .ok_or(SyncError::MissingProvider {
                hook: "useOrganization",
                provider: "OrganizationProvider",
            })
    }

    /// Organization remembered across reloads.
    pub fn last_visited_organization(&self) -> Option<String> {
        self.cookies
            .get(LAST_VISITED_ORG_COOKIE)
            .filter(|value| !value.is_empty())
    }

    /// Remember `organization`, or forget the last one when `None`.
    ///
    /// Slug path mode stores the slug, otherwise the organization id.
    pub fn set_last_visited_organization(&self, organization: Option<&Organization>) {
        let slug_mode = self
            .config
            .organization
            .as_ref()
            .map_or(false, |org| org.path_mode == PathMode::Slug);

        match organization {
            Some(org) => {
                let value = if slug_mode { &org.slug } else { &org.id };
                debug!(organization = %value, "Remembering last visited organization");
                self.cookies.set(
                    Cookie::new(LAST_VISITED_ORG_COOKIE, value.as_str())
                        .with_max_age(self.last_visited_org_max_age),
                );
            }
            None => self.cookies.set(Cookie::removal(LAST_VISITED_ORG_COOKIE)),
        }
    }

    pub(crate) fn optimistic(&self) -> bool {
        self.config.optimistic
    }
}

/// Builder for [`AuthContext`].
#[derive(Default)]
pub struct AuthContextBuilder {
    client: Option<Arc<dyn AuthClient>>,
    cache: Option<Arc<QueryCache>>,
    options: AuthUiOptions,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
    cookies: Option<Arc<dyn CookieStore>>,
    image_handler: Option<Arc<dyn ImageHandler>>,
    settings: Option<SyncSettings>,
}

impl AuthContextBuilder {
    pub fn client(mut self, client: Arc<dyn AuthClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Share an existing cache instead of creating one.
    pub fn cache(mut self, cache: Arc<QueryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(mut self, options: AuthUiOptions) -> Self {
        self.options = options;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn cookies(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = Some(cookies);
        self
    }

    pub fn image_handler(mut self, handler: Arc<dyn ImageHandler>) -> Self {
        self.image_handler = Some(handler);
        self
    }

    pub fn settings(mut self, settings: &SyncSettings) -> Self {
        self.settings = Some(settings.clone());
        self
    }

    pub fn build(self) -> SyncResult<AuthContext> {
        let client = self.client.ok_or(SyncError::MissingAuthClient)?;
        let settings = self.settings.unwrap_or_default();

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(QueryCache::from_settings(&settings)));
        let notifier: Arc<dyn Notifier> = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));

        // Every reported query/mutation failure becomes a toast
        let sink_notifier = notifier.clone();
        cache.set_error_sink(Arc::new(move |key, err| {
            debug!(key = %key, code = err.error_code(), "Forwarding error to notifier");
            sink_notifier.toast(ToastVariant::Error, &err.to_string());
        }));

        let keys = QueryKeys::default();
        cache.pin(keys.session.clone());

        let config = AuthUiConfig::resolve(self.options, self.image_handler.is_some());
        info!(
            base_path = %config.base_path,
            organization = config.organization.is_some(),
            optimistic = config.optimistic,
            "Auth context ready"
        );

        Ok(AuthContext {
            client,
            cache,
            keys,
            config: Arc::new(config),
            navigator: self.navigator.unwrap_or_else(|| Arc::new(TracingNavigator)),
            notifier,
            cookies: self
                .cookies
                .unwrap_or_else(|| Arc::new(MemoryCookieStore::new())),
            image_handler: self.image_handler,
            last_visited_org_max_age: if settings.last_visited_org_max_age.is_zero() {
                DEFAULT_LAST_VISITED_ORG_MAX_AGE
            } else {
                settings.last_visited_org_max_age
            },
            session_user: Arc::new(Mutex::new(None)),
        })
    }
}
