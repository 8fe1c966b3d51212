// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic session-gated query wrapper.
//!
//! An [`AuthQuery`] binds a cache key to a remote read. When it is gated on
//! the session key and no session is cached, the remote call is replaced by
//! a skip: nothing is sent and the state reports [`QueryStatus::Disabled`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::cache::{QueryCache, QueryKey};
use crate::client::FetchOptions;
use crate::error::{ClientResult, SyncError};

/// Boxed future returned by remote call closures.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Remote read bound into a query.
pub type QueryFn<T> = Arc<dyn Fn(FetchOptions) -> BoxFuture<ClientResult<T>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Skipped: gated on a session that is not there, or disabled by the caller
    Disabled,
    /// No data yet
    Pending,
    Success,
    Error,
}

/// Snapshot of a query as seen by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub data: Option<T>,
    pub error: Option<SyncError>,
    pub status: QueryStatus,
}

impl<T> QueryState<T> {
    pub fn disabled() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Disabled,
        }
    }

    fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            status: QueryStatus::Success,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.status == QueryStatus::Disabled
    }

    pub fn is_pending(&self) -> bool {
        self.status == QueryStatus::Pending
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

/// Cache-aware remote read.
pub struct AuthQuery<T> {
    key: QueryKey,
    cache: Arc<QueryCache>,
    /// Session entry this query depends on; `None` means ungated
    session_key: Option<QueryKey>,
    fetcher: QueryFn<T>,
    options: FetchOptions,
    enabled: bool,
}

impl<T> Clone for AuthQuery<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            cache: self.cache.clone(),
            session_key: self.session_key.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options.clone(),
            enabled: self.enabled,
        }
    }
}

impl<T> std::fmt::Debug for AuthQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthQuery")
            .field("key", &self.key)
            .field("session_key", &self.session_key)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Whether the session entry holds a signed-in session.
pub(crate) fn has_session(cache: &QueryCache, session_key: &QueryKey) -> bool {
    cache
        .get_value(session_key)
        .map_or(false, |value| !value.is_null())
}

impl<T> AuthQuery<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, cache: Arc<QueryCache>, fetcher: F) -> Self
    where
        F: Fn(FetchOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<T>> + Send + 'static,
    {
        Self {
            key,
            cache,
            session_key: None,
            fetcher: Arc::new(move |options| Box::pin(fetcher(options))),
            options: FetchOptions::default(),
            enabled: true,
        }
    }

    /// Only run while `session_key` holds a session.
    pub fn gated_on(mut self, session_key: QueryKey) -> Self {
        self.session_key = Some(session_key);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Whether a fetch would reach the network right now.
    pub fn is_enabled(&self) -> bool {
        self.enabled
            && self
                .session_key
                .as_ref()
                .map_or(true, |session_key| has_session(&self.cache, session_key))
    }

    /// Current state from the cache, without fetching.
    pub fn peek(&self) -> QueryState<T> {
        if !self.is_enabled() {
            return QueryState::disabled();
        }
        self.cached_state()
    }

    /// Serve fresh cached data, or fetch when missing or stale.
    pub async fn fetch(&self) -> QueryState<T> {
        if !self.is_enabled() {
            return QueryState::disabled();
        }
        if !self.cache.is_stale(&self.key) {
            return self.cached_state();
        }
        self.refetch().await
    }

    /// Fetch unconditionally (still gated).
    pub async fn refetch(&self) -> QueryState<T> {
        if !self.is_enabled() {
            debug!(key = %self.key, "Query skipped: no session");
            return QueryState::disabled();
        }

        let guard = self.cache.begin_fetch(&self.key);
        let options = self.options.clone().with_default_throw();
        let throws = options.throws();
        let call = (self.fetcher)(options);

        let outcome = tokio::select! {
            biased;
            _ = guard.token().cancelled() => None,
            result = call => Some(result),
        };
        self.cache.finish_fetch(&self.key, &guard);

        match outcome {
            Some(Ok(data)) if !guard.is_cancelled() => match self.cache.set(&self.key, &data) {
                Ok(()) => {
                    debug!(key = %self.key, "Query fetched");
                    QueryState::success(data)
                }
                Err(err) => self.error_state(err, true),
            },
            Some(Err(err)) => self.error_state(SyncError::Remote(err), throws),
            _ => {
                debug!(key = %self.key, "Query cancelled, keeping cached value");
                self.cached_state()
            }
        }
    }

    fn error_state(&self, err: SyncError, report: bool) -> QueryState<T> {
        if report {
            self.cache.report_error(&self.key, &err);
        }
        let data = self.cached_state().data;
        QueryState {
            data,
            error: Some(err),
            status: QueryStatus::Error,
        }
    }

    fn cached_state(&self) -> QueryState<T> {
        match self.cache.get_value(&self.key) {
            Some(value) => match decode::<T>(value) {
                Ok(data) => QueryState::success(data),
                Err(err) => QueryState {
                    data: None,
                    error: Some(err),
                    status: QueryStatus::Error,
                },
            },
            None => QueryState {
                data: None,
                error: None,
                status: QueryStatus::Pending,
            },
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, SyncError> {
    serde_json::from_value(value).map_err(SyncError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthClientError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn cache() -> Arc<QueryCache> {
        Arc::new(QueryCache::new(16, Duration::from_secs(60)))
    }

    fn counting_query(cache: &Arc<QueryCache>, calls: &Arc<AtomicUsize>) -> AuthQuery<Vec<String>> {
        let calls = calls.clone();
        AuthQuery::new(QueryKey::new("list-organizations"), cache.clone(), move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(vec!["org_1".to_string()]) }
        })
        .gated_on(QueryKey::new("session"))
    }

    #[tokio::test]
    async fn gated_query_skips_without_session() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&cache, &calls);

        let state = query.fetch().await;
        assert!(state.is_disabled());
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!cache.contains(query.key()));
    }

    #[tokio::test]
    async fn null_session_counts_as_signed_out() {
        let cache = cache();
        cache.set_value(&QueryKey::new("session"), Value::Null);
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&cache, &calls);

        assert!(query.refetch().await.is_disabled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_data_is_served_from_cache() {
        let cache = cache();
        cache.set_value(&QueryKey::new("session"), json!({"user": {"id": "u"}}));
        let calls = Arc::new(AtomicUsize::new(0));
        let query = counting_query(&cache, &calls);

        let first = query.fetch().await;
        let second = query.fetch().await;
        assert_eq!(first.data, Some(vec!["org_1".to_string()]));
        assert_eq!(second.data, first.data);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(query.key());
        query.fetch().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_keep_cached_data_and_reach_sink() {
        let cache = cache();
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        cache.set_error_sink(Arc::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let key = QueryKey::new("list-api-keys");
        cache.set_value(&key, json!(["old"]));
        cache.invalidate(&key);

        let query: AuthQuery<Vec<String>> = AuthQuery::new(key, cache.clone(), |_| async {
            Err(AuthClientError::new("down").with_status(503))
        });
        let state = query.fetch().await;
        assert!(state.is_error());
        assert_eq!(state.data, Some(vec!["old".to_string()]));
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_throw_errors_are_not_reported() {
        let cache = cache();
        let reported = Arc::new(AtomicUsize::new(0));
        let seen = reported.clone();
        cache.set_error_sink(Arc::new(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let query: AuthQuery<Vec<String>> =
            AuthQuery::new(QueryKey::new("list-passkeys"), cache.clone(), |_| async {
                Err(AuthClientError::new("down"))
            })
            .with_options(FetchOptions::no_throw());
        assert!(query.fetch().await.is_error());
        assert_eq!(reported.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_fetch_does_not_write_cache() {
        let cache = cache();
        let key = QueryKey::new("list-sessions");
        let release = Arc::new(tokio::sync::Notify::new());
        let started = Arc::new(tokio::sync::Notify::new());

        let (gate, signal) = (release.clone(), started.clone());
        let query: AuthQuery<Vec<String>> = AuthQuery::new(key.clone(), cache.clone(), move |_| {
            let gate = gate.clone();
            let signal = signal.clone();
            async move {
                signal.notify_one();
                gate.notified().await;
                Ok(vec!["late".to_string()])
            }
        });

        let task = {
            let query = query.clone();
            tokio::spawn(async move { query.refetch().await })
        };
        started.notified().await;
        assert!(cache.cancel_queries(&key));
        release.notify_one();

        let state = task.await.unwrap();
        assert!(state.is_pending());
        assert!(!cache.contains(&key));
    }

    #[tokio::test]
    async fn disabled_query_never_calls() {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let query: AuthQuery<u32> = AuthQuery::new(QueryKey::new("x"), cache, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .enabled(false);

        assert!(query.fetch().await.is_disabled());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
