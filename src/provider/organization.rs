// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Organization provider options and their normalized form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::options::{join_path, normalize_base_path, ImageConfig, ImageOptions, Overrides, Toggle, View, ViewPaths};

/// A role a member can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role: String,
    pub label: String,
}

impl Role {
    pub fn new(role: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            label: label.into(),
        }
    }
}

/// Roles every organization has, in display order.
pub fn builtin_roles() -> Vec<Role> {
    vec![
        Role::new("owner", "Owner"),
        Role::new("admin", "Admin"),
        Role::new("member", "Member"),
    ]
}

/// How organization pages are addressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathMode {
    /// `/organization/<view>`, acting on the active organization
    #[default]
    Default,
    /// `/organization/<slug>/<view>`
    Slug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrganizationView {
    Settings,
    Members,
    ApiKeys,
}

impl View for OrganizationView {
    const ALL: &'static [Self] = &[
        OrganizationView::Settings,
        OrganizationView::Members,
        OrganizationView::ApiKeys,
    ];

    fn default_path(self) -> &'static str {
        match self {
            OrganizationView::Settings => "settings",
            OrganizationView::Members => "members",
            OrganizationView::ApiKeys => "api-keys",
        }
    }
}

/// Inputs accepted by the organization provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationOptions {
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub path_mode: Option<PathMode>,
    /// Slug of the organization shown in slug mode
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub personal_path: Option<String>,
    #[serde(default)]
    pub logo: Option<Toggle<ImageOptions>>,
    #[serde(default)]
    pub custom_roles: Vec<Role>,
    #[serde(default)]
    pub view_paths: BTreeMap<OrganizationView, String>,
    #[serde(default)]
    pub api_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationConfig {
    pub base_path: String,
    pub path_mode: PathMode,
    pub slug: Option<String>,
    /// Where to go after switching to the personal workspace
    pub personal_path: Option<String>,
    pub logo: Option<ImageConfig>,
    pub roles: Vec<Role>,
    pub view_paths: ViewPaths<OrganizationView>,
    pub api_key: bool,
    /// Logo defaults, applied when the logo toggle is `true` or an object
    #[serde(skip)]
    logo_defaults: ImageConfig,
}

impl OrganizationConfig {
    pub const DEFAULT_BASE_PATH: &'static str = "/organization";

    /// Configuration for `organization: true`.
    pub fn defaults(has_image_upload: bool) -> Self {
        Self {
            base_path: Self::DEFAULT_BASE_PATH.to_string(),
            path_mode: PathMode::Default,
            slug: None,
            personal_path: None,
            logo: None,
            roles: builtin_roles(),
            view_paths: ViewPaths::default(),
            api_key: false,
            logo_defaults: ImageConfig::defaults(has_image_upload),
        }
    }

    /// Path of `view` for the organization identified by `slug`.
    pub fn path(&self, view: OrganizationView, slug: Option<&str>) -> String {
        let base = match (self.path_mode, slug.or(self.slug.as_deref())) {
            (PathMode::Slug, Some(slug)) => join_path(&self.base_path, slug),
            _ => self.base_path.clone(),
        };
        join_path(&base, self.view_paths.get(view))
    }

    pub fn role(&self, role: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.role == role)
    }
}

impl Overrides<OrganizationConfig> for OrganizationOptions {
    fn apply(self, base: OrganizationConfig) -> OrganizationConfig {
        let mut roles = base.roles;
        roles.extend(self.custom_roles);

        OrganizationConfig {
            base_path: self
                .base_path
                .as_deref()
                .map(normalize_base_path)
                .unwrap_or(base.base_path),
            path_mode: self.path_mode.unwrap_or(base.path_mode),
            slug: self.slug.or(base.slug),
            personal_path: self.personal_path.or(base.personal_path),
            logo: Toggle::resolve(self.logo, base.logo_defaults.clone()),
            roles,
            view_paths: base.view_paths.with_overrides(self.view_paths),
            api_key: self.api_key || base.api_key,
            logo_defaults: base.logo_defaults,
        }
    }
}
