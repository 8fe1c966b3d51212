// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Query Cache
//!
//! Transient, client-side records of auth resources. Nothing here is
//! persisted: the server stays the source of truth and every mutation ends
//! with an invalidation that forces a refetch.

pub mod keys;
pub mod store;

pub use keys::{QueryKey, QueryKeys};
pub use store::{CacheEvent, ErrorSink, FetchGuard, QueryCache};
