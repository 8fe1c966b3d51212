// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared query cache.
//!
//! One `QueryCache` exists per provider tree. It is the only shared mutable
//! state in the crate: the query and mutation wrappers are its sole writers.
//! Locks are never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::keys::QueryKey;
use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};

/// Capacity of the cache event channel.
const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Last-known value of one query.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    updated_at: Instant,
    invalidated: bool,
}

/// LRU entries plus pinned entries that capacity pressure never evicts.
struct Entries {
    lru: LruCache<QueryKey, CacheEntry>,
    pinned_keys: HashSet<QueryKey>,
    pinned: HashMap<QueryKey, CacheEntry>,
}

impl Entries {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            lru: LruCache::new(capacity),
            pinned_keys: HashSet::new(),
            pinned: HashMap::new(),
        }
    }

    fn pin(&mut self, key: QueryKey) {
        if let Some(entry) = self.lru.pop(&key) {
            self.pinned.insert(key.clone(), entry);
        }
        self.pinned_keys.insert(key);
    }

    fn len(&self) -> usize {
        self.pinned.len() + self.lru.len()
    }

    fn contains(&self, key: &QueryKey) -> bool {
        self.pinned.contains_key(key) || self.lru.contains(key)
    }

    /// Lookup that counts as a use for LRU ordering.
    fn get(&mut self, key: &QueryKey) -> Option<&CacheEntry> {
        match self.pinned.get(key) {
            Some(entry) => Some(entry),
            None => self.lru.get(key),
        }
    }

    fn peek(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.pinned.get(key).or_else(|| self.lru.peek(key))
    }

    fn peek_mut(&mut self, key: &QueryKey) -> Option<&mut CacheEntry> {
        match self.pinned.get_mut(key) {
            Some(entry) => Some(entry),
            None => self.lru.peek_mut(key),
        }
    }

    fn put(&mut self, key: QueryKey, entry: CacheEntry) {
        if self.pinned_keys.contains(&key) {
            self.pinned.insert(key, entry);
        } else {
            self.lru.put(key, entry);
        }
    }

    fn pop(&mut self, key: &QueryKey) -> Option<CacheEntry> {
        self.pinned.remove(key).or_else(|| self.lru.pop(key))
    }

    fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.pinned.keys().chain(self.lru.iter().map(|(key, _)| key))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&QueryKey, &mut CacheEntry)> {
        self.pinned.iter_mut().chain(self.lru.iter_mut())
    }

    /// Drops every entry; pinned keys stay pinned.
    fn clear(&mut self) {
        self.pinned.clear();
        self.lru.clear();
    }
}

/// Change notification for subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Invalidated(QueryKey),
    Removed(QueryKey),
    Cleared,
}

/// Receives every error reported by queries and mutations.
pub type ErrorSink = Arc<dyn Fn(&QueryKey, &SyncError) + Send + Sync>;

/// Handle for one in-flight fetch.
#[derive(Debug, Clone)]
pub struct FetchGuard {
    id: u64,
    token: CancellationToken,
}

impl FetchGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// In-process LRU query cache.
pub struct QueryCache {
    entries: Mutex<Entries>,
    in_flight: Mutex<HashMap<QueryKey, FetchGuard>>,
    next_fetch_id: AtomicU64,
    stale_time: Duration,
    events: broadcast::Sender<CacheEvent>,
    error_sink: RwLock<Option<ErrorSink>>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("len", &self.len())
            .field("stale_time", &self.stale_time)
            .finish()
    }
}

impl QueryCache {
    /// Create a cache holding at most `capacity` entries, each fresh for `stale_time`.
    pub fn new(capacity: usize, stale_time: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(Entries::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
            next_fetch_id: AtomicU64::new(1),
            stale_time,
            events,
            error_sink: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self::new(settings.cache_capacity, settings.stale_time)
    }

    fn lock_entries(&self) -> MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<QueryKey, FetchGuard>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.lock_entries().contains(key)
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.lock_entries().keys().cloned().collect()
    }

    /// Keep `key` out of LRU eviction. Gated queries read the session
    /// entry, so losing it to capacity pressure would look like a logout.
    pub fn pin(&self, key: QueryKey) {
        self.lock_entries().pin(key);
    }

    /// Raw cached value, stale or not.
    pub fn get_value(&self, key: &QueryKey) -> Option<Value> {
        self.lock_entries().get(key).map(|entry| entry.value.clone())
    }

    /// Typed cached value, stale or not.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> SyncResult<Option<T>> {
        match self.get_value(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Store a fresh value.
    pub fn set_value(&self, key: &QueryKey, value: Value) {
        self.lock_entries().put(
            key.clone(),
            CacheEntry {
                value,
                updated_at: Instant::now(),
                invalidated: false,
            },
        );
        self.emit(CacheEvent::Updated(key.clone()));
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &QueryKey, value: &T) -> SyncResult<()> {
        let value = serde_json::to_value(value)?;
        self.set_value(key, value);
        Ok(())
    }

    /// Put back a snapshot taken with [`get_value`](Self::get_value).
    /// `None` removes the entry.
    pub fn restore(&self, key: &QueryKey, snapshot: Option<Value>) {
        match snapshot {
            Some(value) => self.set_value(key, value),
            None => self.remove(key),
        }
    }

    /// True when the entry is missing, invalidated, or older than the stale time.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        match self.lock_entries().peek(key) {
            Some(entry) => entry.invalidated || entry.updated_at.elapsed() >= self.stale_time,
            None => true,
        }
    }

    /// Mark an entry stale so the next read refetches. The value is kept.
    pub fn invalidate(&self, key: &QueryKey) {
        let marked = match self.lock_entries().peek_mut(key) {
            Some(entry) => {
                entry.invalidated = true;
                true
            }
            None => false,
        };
        debug!(key = %key, present = marked, "Invalidated query");
        self.emit(CacheEvent::Invalidated(key.clone()));
    }

    /// Invalidate every entry whose key matches.
    pub fn invalidate_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let matched: Vec<QueryKey> = {
            let mut entries = self.lock_entries();
            let mut matched = Vec::new();
            for (key, entry) in entries.iter_mut() {
                if predicate(key) {
                    entry.invalidated = true;
                    matched.push(key.clone());
                }
            }
            matched
        };
        let count = matched.len();
        for key in matched {
            self.emit(CacheEvent::Invalidated(key));
        }
        count
    }

    pub fn remove(&self, key: &QueryKey) {
        if self.lock_entries().pop(key).is_some() {
            self.emit(CacheEvent::Removed(key.clone()));
        }
    }

    /// Evict every entry whose key matches.
    pub fn remove_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let removed: Vec<QueryKey> = {
            let mut entries = self.lock_entries();
            let matched: Vec<QueryKey> = entries.keys().filter(|key| predicate(key)).cloned().collect();
            for key in &matched {
                entries.pop(key);
            }
            matched
        };
        let count = removed.len();
        for key in removed {
            self.emit(CacheEvent::Removed(key));
        }
        count
    }

    /// Drop every entry and cancel every in-flight fetch.
    pub fn clear(&self) {
        self.lock_entries().clear();
        for (_, guard) in self.lock_in_flight().drain() {
            guard.token.cancel();
        }
        self.emit(CacheEvent::Cleared);
    }

    /// Register a fetch for `key`. A fetch already in flight for the same
    /// key is cancelled and superseded.
    pub fn begin_fetch(&self, key: &QueryKey) -> FetchGuard {
        let guard = FetchGuard {
            id: self.next_fetch_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.lock_in_flight().insert(key.clone(), guard.clone()) {
            previous.token.cancel();
        }
        guard
    }

    /// Unregister a fetch, unless it was already superseded.
    pub fn finish_fetch(&self, key: &QueryKey, guard: &FetchGuard) {
        let mut in_flight = self.lock_in_flight();
        if in_flight.get(key).map(|g| g.id) == Some(guard.id) {
            in_flight.remove(key);
        }
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.lock_in_flight().contains_key(key)
    }

    /// Cancel the in-flight fetch for `key`; its result will not be written.
    pub fn cancel_queries(&self, key: &QueryKey) -> bool {
        match self.lock_in_flight().remove(key) {
            Some(guard) => {
                guard.token.cancel();
                debug!(key = %key, "Cancelled in-flight query");
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight fetch whose key matches.
    pub fn cancel_queries_where(&self, predicate: impl Fn(&QueryKey) -> bool) -> usize {
        let cancelled: Vec<FetchGuard> = {
            let mut in_flight = self.lock_in_flight();
            let matched: Vec<QueryKey> = in_flight.keys().filter(|key| predicate(key)).cloned().collect();
            matched.iter().filter_map(|key| in_flight.remove(key)).collect()
        };
        for guard in &cancelled {
            guard.token.cancel();
        }
        if !cancelled.is_empty() {
            debug!(count = cancelled.len(), "Cancelled in-flight queries");
        }
        cancelled.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Replace the process-wide error sink.
    pub fn set_error_sink(&self, sink: ErrorSink) {
        let mut slot = self.error_sink.write().unwrap_or_else(|p| p.into_inner());
        *slot = Some(sink);
    }

    /// Forward an error to the sink, or log it when none is installed.
    pub fn report_error(&self, key: &QueryKey, err: &SyncError) {
        let sink = self
            .error_sink
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        match sink {
            Some(sink) => sink(key, err),
            None => error!(key = %key, error = %err, code = err.error_code(), "Query cache error"),
        }
    }
}
