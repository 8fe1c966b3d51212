// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the crate. Settings are loaded from the environment once and
//! passed by reference into the cache and client constructors.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_BASE_URL` | Origin of the better-auth server | Required for the inspector |
//! | `AUTH_BASE_PATH` | Mount path of the auth handler | `/api/auth` |
//! | `AUTH_COOKIE` | Cookie header forwarded with every call | Optional |
//! | `AUTH_BEARER_TOKEN` | Bearer token forwarded with every call | Optional |
//! | `QUERY_CACHE_CAPACITY` | Max number of cached query entries | `256` |
//! | `QUERY_STALE_SECS` | Seconds before a cached entry is considered stale | `60` |
//! | `LAST_VISITED_ORG_MAX_AGE` | Max-age of the last visited organization cookie | `2592000` |
//! | `HTTP_TIMEOUT_SECS` | Timeout for auth client requests | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::logging::LogFormat;

/// Environment variable name for the better-auth server origin.
pub const AUTH_BASE_URL_ENV: &str = "AUTH_BASE_URL";

/// Environment variable name for the auth handler mount path.
pub const AUTH_BASE_PATH_ENV: &str = "AUTH_BASE_PATH";

/// Environment variable name for a forwarded cookie header.
pub const AUTH_COOKIE_ENV: &str = "AUTH_COOKIE";

/// Environment variable name for a forwarded bearer token.
pub const AUTH_BEARER_TOKEN_ENV: &str = "AUTH_BEARER_TOKEN";

pub const QUERY_CACHE_CAPACITY_ENV: &str = "QUERY_CACHE_CAPACITY";
pub const QUERY_STALE_SECS_ENV: &str = "QUERY_STALE_SECS";
pub const LAST_VISITED_ORG_MAX_AGE_ENV: &str = "LAST_VISITED_ORG_MAX_AGE";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "HTTP_TIMEOUT_SECS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default mount path of the better-auth handler.
pub const DEFAULT_AUTH_BASE_PATH: &str = "/api/auth";

/// Default number of query entries kept in the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Default staleness window for cached query results.
pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);

/// Name of the cookie tracking the last visited organization.
pub const LAST_VISITED_ORG_COOKIE: &str = "last-visited-org";

/// Default max-age of the last visited organization cookie (30 days).
pub const DEFAULT_LAST_VISITED_ORG_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default timeout for auth client requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub auth_base_url: Option<String>,
    pub auth_base_path: String,
    pub cookie: Option<String>,
    pub bearer_token: Option<String>,
    pub cache_capacity: usize,
    pub stale_time: Duration,
    pub last_visited_org_max_age: Duration,
    pub http_timeout: Duration,
    pub log_format: LogFormat,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auth_base_url: None,
            auth_base_path: DEFAULT_AUTH_BASE_PATH.to_string(),
            cookie: None,
            bearer_token: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            stale_time: DEFAULT_STALE_TIME,
            last_visited_org_max_age: DEFAULT_LAST_VISITED_ORG_MAX_AGE,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            log_format: LogFormat::Pretty,
        }
    }
}

impl SyncSettings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            auth_base_url: non_empty(AUTH_BASE_URL_ENV),
            auth_base_path: non_empty(AUTH_BASE_PATH_ENV).unwrap_or(defaults.auth_base_path),
            cookie: non_empty(AUTH_COOKIE_ENV),
            bearer_token: non_empty(AUTH_BEARER_TOKEN_ENV),
            cache_capacity: parse_or(
                QUERY_CACHE_CAPACITY_ENV,
                non_empty(QUERY_CACHE_CAPACITY_ENV),
                defaults.cache_capacity,
            ),
            stale_time: Duration::from_secs(parse_or(
                QUERY_STALE_SECS_ENV,
                non_empty(QUERY_STALE_SECS_ENV),
                defaults.stale_time.as_secs(),
            )),
            last_visited_org_max_age: Duration::from_secs(parse_or(
                LAST_VISITED_ORG_MAX_AGE_ENV,
                non_empty(LAST_VISITED_ORG_MAX_AGE_ENV),
                defaults.last_visited_org_max_age.as_secs(),
            )),
            http_timeout: Duration::from_secs(parse_or(
                HTTP_TIMEOUT_SECS_ENV,
                non_empty(HTTP_TIMEOUT_SECS_ENV),
                defaults.http_timeout.as_secs(),
            )),
            log_format: non_empty(LOG_FORMAT_ENV)
                .map(|v| LogFormat::from_name(&v))
                .unwrap_or(defaults.log_format),
        }
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!(variable = name, value = %value, default = %default, "Invalid setting, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let settings = SyncSettings::from_lookup(lookup(&[]));
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.last_visited_org_max_age.as_secs(), 2_592_000);
    }

    #[test]
    fn values_are_read_from_environment() {
        let settings = SyncSettings::from_lookup(lookup(&[
            (AUTH_BASE_URL_ENV, "https://auth.example.com"),
            (QUERY_CACHE_CAPACITY_ENV, "32"),
            (QUERY_STALE_SECS_ENV, "5"),
            (LOG_FORMAT_ENV, "json"),
        ]));
        assert_eq!(settings.auth_base_url.as_deref(), Some("https://auth.example.com"));
        assert_eq!(settings.cache_capacity, 32);
        assert_eq!(settings.stale_time, Duration::from_secs(5));
        assert_eq!(settings.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let settings = SyncSettings::from_lookup(lookup(&[
            (QUERY_CACHE_CAPACITY_ENV, "lots"),
            (HTTP_TIMEOUT_SECS_ENV, "-3"),
        ]));
        assert_eq!(settings.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(settings.http_timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn blank_values_are_ignored() {
        let settings = SyncSettings::from_lookup(lookup(&[(AUTH_COOKIE_ENV, "  ")]));
        assert!(settings.cookie.is_none());
    }
}
