// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Query keys and the fixed key registry.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Identity of one cached query: `[name]` or `[name, serializedParams]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(name: impl Into<String>) -> Self {
        QueryKey(vec![name.into()])
    }

    /// Key for a parameterized query. Params that serialize to `null` (or
    /// fail to serialize) produce the bare `[name]` key.
    pub fn with_params<P: Serialize + ?Sized>(name: impl Into<String>, params: &P) -> Self {
        let mut segments = vec![name.into()];
        match serde_json::to_value(params) {
            Ok(Value::Null) | Err(_) => {}
            Ok(value) => segments.push(value.to_string()),
        }
        QueryKey(segments)
    }

    pub fn name(&self) -> &str {
        &self.0[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this key shares the name of `other`, regardless of params.
    pub fn same_resource(&self, other: &QueryKey) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(":"))
    }
}

/// Fixed mapping of logical resources to cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryKeys {
    pub session: QueryKey,
    pub token: QueryKey,
    pub list_sessions: QueryKey,
    pub list_device_sessions: QueryKey,
    pub list_accounts: QueryKey,
    pub list_api_keys: QueryKey,
    pub list_passkeys: QueryKey,
    pub list_organizations: QueryKey,
    pub full_organization: QueryKey,
    pub has_permission: QueryKey,
    pub invitation: QueryKey,
    pub list_invitations: QueryKey,
    pub list_user_invitations: QueryKey,
    pub list_members: QueryKey,
}

impl Default for QueryKeys {
    fn default() -> Self {
        Self {
            session: QueryKey::new("session"),
            token: QueryKey::new("token"),
            list_sessions: QueryKey::new("list-sessions"),
            list_device_sessions: QueryKey::new("list-device-sessions"),
            list_accounts: QueryKey::new("list-accounts"),
            list_api_keys: QueryKey::new("list-api-keys"),
            list_passkeys: QueryKey::new("list-passkeys"),
            list_organizations: QueryKey::new("list-organizations"),
            full_organization: QueryKey::new("full-organization"),
            has_permission: QueryKey::new("has-permission"),
            invitation: QueryKey::new("invitation"),
            list_invitations: QueryKey::new("list-invitations"),
            list_user_invitations: QueryKey::new("list-user-invitations"),
            list_members: QueryKey::new("list-members"),
        }
    }
}

impl QueryKeys {
    /// Key for a parameterized variant of one of the registry keys.
    pub fn scoped<P: Serialize + ?Sized>(base: &QueryKey, params: &P) -> QueryKey {
        QueryKey::with_params(base.name(), params)
    }

    /// Every registry key except the session itself.
    pub fn dependents(&self) -> Vec<&QueryKey> {
        vec![
            &self.token,
            &self.list_sessions,
            &self.list_device_sessions,
            &self.list_accounts,
            &self.list_api_keys,
            &self.list_passkeys,
            &self.list_organizations,
            &self.full_organization,
            &self.has_permission,
            &self.invitation,
            &self.list_invitations,
            &self.list_user_invitations,
            &self.list_members,
        ]
    }

    /// Whether `key` belongs to a session-dependent resource.
    pub fn is_dependent(&self, key: &QueryKey) -> bool {
        !key.same_resource(&self.session)
            && self.dependents().iter().any(|base| key.same_resource(base))
    }
}
