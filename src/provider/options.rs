// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth UI Options
//!
//! Raw provider inputs and their normalized form. Normalization runs once
//! when the context is built; the resulting [`AuthUiConfig`] is immutable.
//!
//! ## Toggles
//!
//! Sub-features accept `true`, `false`, or an options object:
//!
//! | Input        | Result                              |
//! |--------------|-------------------------------------|
//! | omitted      | disabled                            |
//! | `false`      | disabled                            |
//! | `true`       | the feature's default configuration |
//! | `{ ... }`    | object fields merged over defaults  |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::organization::{OrganizationConfig, OrganizationOptions};

/// Boolean shorthand or an options object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Flag(bool),
    Options(T),
}

/// Partial options that can be layered over a resolved default.
pub trait Overrides<C> {
    fn apply(self, base: C) -> C;
}

impl<T> Toggle<T> {
    /// Resolve an optional toggle against `base`.
    pub fn resolve<C>(toggle: Option<Self>, base: C) -> Option<C>
    where
        T: Overrides<C>,
    {
        match toggle {
            None | Some(Toggle::Flag(false)) => None,
            Some(Toggle::Flag(true)) => Some(base),
            Some(Toggle::Options(options)) => Some(options.apply(base)),
        }
    }
}

/// Strip one trailing slash; `/` becomes the empty root.
pub fn normalize_base_path(path: &str) -> String {
    path.strip_suffix('/').unwrap_or(path).to_string()
}

/// Join a base path and a view path segment.
pub(crate) fn join_path(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}

// =============================================================================
// Sub-feature options
// =============================================================================

/// Image settings shared by avatars and organization logos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageConfig {
    pub extension: String,
    pub size: u32,
}

impl ImageConfig {
    pub const DEFAULT_SIZE: u32 = 128;
    /// Default size when a custom upload handler is installed
    pub const UPLOAD_SIZE: u32 = 256;

    pub fn defaults(has_upload: bool) -> Self {
        Self {
            extension: "png".to_string(),
            size: if has_upload {
                Self::UPLOAD_SIZE
            } else {
                Self::DEFAULT_SIZE
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageOptions {
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

impl Overrides<ImageConfig> for ImageOptions {
    fn apply(self, base: ImageConfig) -> ImageConfig {
        ImageConfig {
            extension: self.extension.unwrap_or(base.extension),
            size: self.size.unwrap_or(base.size),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteUserConfig {
    /// Require email verification before deleting
    pub verification: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteUserOptions {
    #[serde(default)]
    pub verification: Option<bool>,
}

impl Overrides<DeleteUserConfig> for DeleteUserOptions {
    fn apply(self, base: DeleteUserConfig) -> DeleteUserConfig {
        DeleteUserConfig {
            verification: self.verification.unwrap_or(base.verification),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsConfig {
    pub forgot_password: bool,
    pub confirm_password: bool,
    pub remember_me: bool,
    pub username: bool,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            forgot_password: true,
            confirm_password: false,
            remember_me: false,
            username: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsOptions {
    #[serde(default)]
    pub forgot_password: Option<bool>,
    #[serde(default)]
    pub confirm_password: Option<bool>,
    #[serde(default)]
    pub remember_me: Option<bool>,
    #[serde(default)]
    pub username: Option<bool>,
}

impl Overrides<CredentialsConfig> for CredentialsOptions {
    fn apply(self, base: CredentialsConfig) -> CredentialsConfig {
        CredentialsConfig {
            forgot_password: self.forgot_password.unwrap_or(base.forgot_password),
            confirm_password: self.confirm_password.unwrap_or(base.confirm_password),
            remember_me: self.remember_me.unwrap_or(base.remember_me),
            username: self.username.unwrap_or(base.username),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignUpConfig {
    pub fields: Vec<String>,
}

impl Default for SignUpConfig {
    fn default() -> Self {
        Self {
            fields: vec!["name".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUpOptions {
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl Overrides<SignUpConfig> for SignUpOptions {
    fn apply(self, base: SignUpConfig) -> SignUpConfig {
        SignUpConfig {
            fields: self.fields.unwrap_or(base.fields),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountConfig {
    pub base_path: String,
    pub fields: Vec<String>,
    pub view_paths: ViewPaths<AccountView>,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            base_path: "/account".to_string(),
            fields: vec!["image".to_string(), "name".to_string()],
            view_paths: ViewPaths::default(),
        }
    }
}

impl AccountConfig {
    pub fn path(&self, view: AccountView) -> String {
        join_path(&self.base_path, self.view_paths.get(view))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOptions {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub view_paths: BTreeMap<AccountView, String>,
}

impl Overrides<AccountConfig> for AccountOptions {
    fn apply(self, base: AccountConfig) -> AccountConfig {
        AccountConfig {
            base_path: self
                .base_path
                .as_deref()
                .map(normalize_base_path)
                .unwrap_or(base.base_path),
            fields: self.fields.unwrap_or(base.fields),
            view_paths: base.view_paths.with_overrides(self.view_paths),
        }
    }
}

// =============================================================================
// Views
// =============================================================================

/// A named screen whose URL segment can be overridden.
pub trait View: Copy + Ord + 'static {
    const ALL: &'static [Self];

    fn default_path(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthView {
    SignIn,
    SignUp,
    SignOut,
    MagicLink,
    EmailOtp,
    ForgotPassword,
    ResetPassword,
    TwoFactor,
    RecoverAccount,
    Callback,
    AcceptInvitation,
}

impl View for AuthView {
    const ALL: &'static [Self] = &[
        AuthView::SignIn,
        AuthView::SignUp,
        AuthView::SignOut,
        AuthView::MagicLink,
        AuthView::EmailOtp,
        AuthView::ForgotPassword,
        AuthView::ResetPassword,
        AuthView::TwoFactor,
        AuthView::RecoverAccount,
        AuthView::Callback,
        AuthView::AcceptInvitation,
    ];

    fn default_path(self) -> &'static str {
        match self {
            AuthView::SignIn => "sign-in",
            AuthView::SignUp => "sign-up",
            AuthView::SignOut => "sign-out",
            AuthView::MagicLink => "magic-link",
            AuthView::EmailOtp => "email-otp",
            AuthView::ForgotPassword => "forgot-password",
            AuthView::ResetPassword => "reset-password",
            AuthView::TwoFactor => "two-factor",
            AuthView::RecoverAccount => "recover-account",
            AuthView::Callback => "callback",
            AuthView::AcceptInvitation => "accept-invitation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccountView {
    Settings,
    Security,
    ApiKeys,
    Organizations,
}

impl View for AccountView {
    const ALL: &'static [Self] = &[
        AccountView::Settings,
        AccountView::Security,
        AccountView::ApiKeys,
        AccountView::Organizations,
    ];

    fn default_path(self) -> &'static str {
        match self {
            AccountView::Settings => "settings",
            AccountView::Security => "security",
            AccountView::ApiKeys => "api-keys",
            AccountView::Organizations => "organizations",
        }
    }
}

/// Resolved URL segment for every view of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewPaths<V: View>(BTreeMap<V, String>);

impl<V: View> Default for ViewPaths<V> {
    fn default() -> Self {
        ViewPaths(
            V::ALL
                .iter()
                .map(|view| (*view, view.default_path().to_string()))
                .collect(),
        )
    }
}

impl<V: View> ViewPaths<V> {
    pub fn with_overrides(mut self, overrides: BTreeMap<V, String>) -> Self {
        for (view, path) in overrides {
            self.0.insert(view, path.trim_matches('/').to_string());
        }
        self
    }

    pub fn get(&self, view: V) -> &str {
        self.0
            .get(&view)
            .map(String::as_str)
            .unwrap_or_else(|| view.default_path())
    }
}

// =============================================================================
// Provider options
// =============================================================================

/// Inputs accepted by the auth provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUiOptions {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub view_paths: BTreeMap<AuthView, String>,
    #[serde(default)]
    pub avatar: Option<Toggle<ImageOptions>>,
    #[serde(default)]
    pub delete_user: Option<Toggle<DeleteUserOptions>>,
    #[serde(default)]
    pub credentials: Option<Toggle<CredentialsOptions>>,
    #[serde(default)]
    pub sign_up: Option<Toggle<SignUpOptions>>,
    #[serde(default)]
    pub account: Option<Toggle<AccountOptions>>,
    #[serde(default)]
    pub organization: Option<Toggle<OrganizationOptions>>,
    #[serde(default)]
    pub api_key: bool,
    #[serde(default)]
    pub multi_session: bool,
    #[serde(default)]
    pub passkey: bool,
    /// Apply mutations optimistically
    #[serde(default)]
    pub optimistic: Option<bool>,
}

/// Normalized, immutable provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUiConfig {
    pub base_path: String,
    pub redirect_to: String,
    pub view_paths: ViewPaths<AuthView>,
    pub avatar: Option<ImageConfig>,
    pub delete_user: Option<DeleteUserConfig>,
    pub credentials: Option<CredentialsConfig>,
    pub sign_up: Option<SignUpConfig>,
    pub account: Option<AccountConfig>,
    pub organization: Option<OrganizationConfig>,
    pub api_key: bool,
    pub multi_session: bool,
    pub passkey: bool,
    pub optimistic: bool,
}

impl AuthUiConfig {
    pub const DEFAULT_BASE_PATH: &'static str = "/auth";

    /// Normalize `options`. `has_image_upload` reports whether a custom
    /// image handler was installed, which changes the image size default.
    pub fn resolve(options: AuthUiOptions, has_image_upload: bool) -> Self {
        let base_path = normalize_base_path(
            options
                .base_path
                .as_deref()
                .unwrap_or(Self::DEFAULT_BASE_PATH),
        );

        Self {
            base_path,
            redirect_to: options.redirect_to.unwrap_or_else(|| "/".to_string()),
            view_paths: ViewPaths::default().with_overrides(options.view_paths),
            avatar: Toggle::resolve(options.avatar, ImageConfig::defaults(has_image_upload)),
            delete_user: Toggle::resolve(options.delete_user, DeleteUserConfig::default()),
            credentials: Toggle::resolve(options.credentials, CredentialsConfig::default()),
            sign_up: Toggle::resolve(options.sign_up, SignUpConfig::default()),
            account: Toggle::resolve(options.account, AccountConfig::default()),
            organization: Toggle::resolve(options.organization, OrganizationConfig::defaults(has_image_upload)),
            api_key: options.api_key,
            multi_session: options.multi_session,
            passkey: options.passkey,
            optimistic: options.optimistic.unwrap_or(true),
        }
    }

    /// Full URL path of an auth view.
    pub fn auth_path(&self, view: AuthView) -> String {
        join_path(&self.base_path, self.view_paths.get(view))
    }

    /// Full URL path of an account view, when account pages are enabled.
    pub fn account_path(&self, view: AccountView) -> Option<String> {
        self.account.as_ref().map(|account| account.path(view))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(options: serde_json::Value, has_upload: bool) -> AuthUiConfig {
        AuthUiConfig::resolve(serde_json::from_value(options).unwrap(), has_upload)
    }

    #[test]
    fn avatar_true_expands_to_defaults() {
        let config = resolve(json!({"avatar": true}), false);
        assert_eq!(
            config.avatar,
            Some(ImageConfig {
                extension: "png".to_string(),
                size: 128
            })
        );
    }

    #[test]
    fn avatar_with_upload_defaults_to_256() {
        let config = resolve(json!({"avatar": {}}), true);
        assert_eq!(config.avatar.map(|a| a.size), Some(256));

        let explicit = resolve(json!({"avatar": {"size": 64, "extension": "webp"}}), true);
        let avatar = explicit.avatar.unwrap();
        assert_eq!((avatar.extension.as_str(), avatar.size), ("webp", 64));
    }

    #[test]
    fn omitted_and_false_disable() {
        let config = resolve(json!({"deleteUser": false}), false);
        assert!(config.avatar.is_none());
        assert!(config.delete_user.is_none());
        assert!(config.credentials.is_none());
        assert!(config.sign_up.is_none());
        assert!(config.account.is_none());
        assert!(config.organization.is_none());
    }

    #[test]
    fn true_shorthands_expand() {
        let config = resolve(
            json!({"deleteUser": true, "credentials": true, "signUp": true, "account": true}),
            false,
        );
        assert_eq!(config.delete_user, Some(DeleteUserConfig { verification: false }));
        assert!(config.credentials.unwrap().forgot_password);
        assert_eq!(config.sign_up.unwrap().fields, vec!["name"]);
        let account = config.account.unwrap();
        assert_eq!(account.base_path, "/account");
        assert_eq!(account.fields, vec!["image", "name"]);
    }

    #[test]
    fn objects_merge_over_defaults() {
        let config = resolve(
            json!({
                "credentials": {"username": true},
                "account": {"basePath": "/me/", "viewPaths": {"security": "safety"}}
            }),
            false,
        );
        let credentials = config.credentials.unwrap();
        assert!(credentials.username);
        assert!(credentials.forgot_password);

        let account = config.account.unwrap();
        assert_eq!(account.base_path, "/me");
        assert_eq!(account.fields, vec!["image", "name"]);
        assert_eq!(account.path(AccountView::Security), "/me/safety");
        assert_eq!(account.path(AccountView::Settings), "/me/settings");
    }

    #[test]
    fn base_paths_lose_trailing_slash() {
        assert_eq!(normalize_base_path("/auth/"), "/auth");
        assert_eq!(normalize_base_path("/auth"), "/auth");
        assert_eq!(normalize_base_path("/"), "");

        let config = resolve(json!({"basePath": "/login/"}), false);
        assert_eq!(config.base_path, "/login");
        assert_eq!(config.auth_path(AuthView::SignIn), "/login/sign-in");
    }

    #[test]
    fn auth_view_paths_can_be_overridden() {
        let config = resolve(json!({"viewPaths": {"signIn": "/login"}}), false);
        assert_eq!(config.auth_path(AuthView::SignIn), "/auth/login");
        assert_eq!(config.auth_path(AuthView::SignUp), "/auth/sign-up");
        assert!(config.account_path(AccountView::Settings).is_none());
    }

    #[test]
    fn optimistic_defaults_on() {
        assert!(resolve(json!({}), false).optimistic);
        assert!(!resolve(json!({"optimistic": false}), false).optimistic);
    }
}
