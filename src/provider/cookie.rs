// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plain cookies for UX state that must survive reloads.
//!
//! Only the last visited organization lives here. It is a convenience
//! value, never security-bearing, and is stored outside the query cache.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use url::form_urlencoded;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub max_age: Option<Duration>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: "/".to_string(),
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Deletion cookie: empty value, zero max-age.
    pub fn removal(name: impl Into<String>) -> Self {
        Self::new(name, "").with_max_age(Duration::ZERO)
    }

    pub fn is_removal(&self) -> bool {
        self.max_age == Some(Duration::ZERO)
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header(&self) -> String {
        let mut header = format!("{}={}; path={}", self.name, encode(&self.value), self.path);
        if let Some(max_age) = self.max_age {
            header.push_str(&format!("; max-age={}", max_age.as_secs()));
        }
        header
    }

    /// Parse a `Set-Cookie` header value. Unknown attributes are ignored.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';').map(str::trim);
        let (name, value) = parts.next()?.split_once('=')?;
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, decode(value));
        for attribute in parts {
            let (key, val) = attribute.split_once('=').unwrap_or((attribute, ""));
            match key.to_ascii_lowercase().as_str() {
                "path" => cookie.path = val.to_string(),
                "max-age" => cookie.max_age = val.parse().ok().map(Duration::from_secs),
                _ => {}
            }
        }
        Some(cookie)
    }
}

/// Split a request `Cookie` header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, value)| (name.to_string(), decode(value)))
        .collect()
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn decode(value: &str) -> String {
    form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

/// Cookie access for the hosting environment.
pub trait CookieStore: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    /// Write `cookie`; a removal cookie deletes it.
    fn set(&self, cookie: Cookie);
}

/// In-memory jar that also records the `Set-Cookie` headers it produced.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    jar: Mutex<BTreeMap<String, Cookie>>,
    written: Mutex<Vec<String>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the jar from a request `Cookie` header.
    pub fn from_header(header: &str) -> Self {
        let jar = parse_cookie_header(header)
            .into_iter()
            .map(|(name, value)| (name.clone(), Cookie::new(name, value)))
            .collect();
        Self {
            jar: Mutex::new(jar),
            written: Mutex::new(Vec::new()),
        }
    }

    /// `Set-Cookie` values written so far, oldest first.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl CookieStore for MemoryCookieStore {
    fn get(&self, name: &str) -> Option<String> {
        self.jar
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(name)
            .map(|cookie| cookie.value.clone())
    }

    fn set(&self, cookie: Cookie) {
        self.written
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(cookie.to_header());

        let mut jar = self.jar.lock().unwrap_or_else(|p| p.into_inner());
        if cookie.is_removal() {
            jar.remove(&cookie.name);
        } else {
            jar.insert(cookie.name.clone(), cookie);
        }
    }
}
