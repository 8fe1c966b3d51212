// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hooks into the hosting application: navigation, toasts, image storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::ClientResult;

/// Client-side routing.
pub trait Navigator: Send + Sync {
    /// Push a new location.
    fn navigate(&self, href: &str);
}

/// Logs navigation requests; used when the host supplies no router.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, href: &str) {
        info!(href = %href, "Navigate");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Success,
    Error,
    Info,
    Warning,
}

/// User-facing notifications.
pub trait Notifier: Send + Sync {
    fn toast(&self, variant: ToastVariant, message: &str);
}

/// Logs toasts at a level matching their variant.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn toast(&self, variant: ToastVariant, message: &str) {
        match variant {
            ToastVariant::Error => error!(message = %message, "Toast"),
            ToastVariant::Warning => warn!(message = %message, "Toast"),
            _ => info!(variant = ?variant, message = %message, "Toast"),
        }
    }
}

/// Image picked by the user for an avatar or organization logo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Custom storage for avatars and logos.
#[async_trait]
pub trait ImageHandler: Send + Sync {
    /// Store the image and return its public URL.
    async fn upload(&self, image: ImageFile) -> ClientResult<String>;

    /// Remove an image. URLs the handler did not upload should be ignored.
    async fn delete(&self, url: &str) -> ClientResult<()>;
}
