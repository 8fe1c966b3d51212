// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generic mutation wrapper with optimistic patching.
//!
//! ## Mutation Lifecycle
//!
//! 1. If optimistic updates are on, for every bound patch: cancel any
//!    in-flight query for its cache entry, snapshot the cached value and
//!    write the patched value. No cached value means no patch.
//! 2. Call the remote function with `throw` defaulted to `true`.
//! 3. On error, put the snapshots back, report to the cache error sink (when
//!    throwing) and return the error to the caller.
//! 4. Success or failure, invalidate the target key, every patched entry and
//!    every related key.
//!
//! Two mutations racing on the same key are not ordered: whichever settles
//! last triggers the final invalidation, and the refetch reconciles.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{QueryCache, QueryKey};
use crate::client::FetchOptions;
use crate::error::{ClientResult, SyncError, SyncResult};
use crate::query::BoxFuture;

/// Remote write bound into a mutation.
pub type MutationFn<P, R> = Arc<dyn Fn(P, FetchOptions) -> BoxFuture<ClientResult<R>> + Send + Sync>;

/// Computes the speculative cache value from the current one; `None`
/// leaves the entry untouched.
pub type PatchFn<P> = Arc<dyn Fn(&Value, &P) -> SyncResult<Option<Value>> + Send + Sync>;

/// Picks the cache entry a patch applies to from the call's parameters.
pub type TargetFn<P> = Arc<dyn Fn(&P) -> QueryKey + Send + Sync>;

struct OptimisticPatch<P> {
    /// `None` patches the mutation's own key
    target: Option<TargetFn<P>>,
    apply: PatchFn<P>,
}

impl<P> Clone for OptimisticPatch<P> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            apply: self.apply.clone(),
        }
    }
}

#[derive(Default)]
struct MutationState {
    pending: AtomicUsize,
    last_error: Mutex<Option<SyncError>>,
}

impl MutationState {
    fn set_error(&self, err: Option<SyncError>) {
        *self.last_error.lock().unwrap_or_else(|p| p.into_inner()) = err;
    }
}

/// Decrements the pending counter even if the mutation future is dropped.
struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        PendingGuard(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cache-aware remote write.
pub struct AuthMutation<P, R> {
    key: QueryKey,
    related: Vec<QueryKey>,
    /// Invalidated with every parameterized variant
    related_resources: Vec<QueryKey>,
    cache: Arc<QueryCache>,
    mutate_fn: MutationFn<P, R>,
    patches: Vec<OptimisticPatch<P>>,
    optimistic: bool,
    options: FetchOptions,
    state: Arc<MutationState>,
}

impl<P, R> Clone for AuthMutation<P, R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            related: self.related.clone(),
            related_resources: self.related_resources.clone(),
            cache: self.cache.clone(),
            mutate_fn: self.mutate_fn.clone(),
            patches: self.patches.clone(),
            optimistic: self.optimistic,
            options: self.options.clone(),
            state: self.state.clone(),
        }
    }
}

impl<P, R> std::fmt::Debug for AuthMutation<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMutation")
            .field("key", &self.key)
            .field("related", &self.related)
            .field("optimistic", &(self.optimistic && !self.patches.is_empty()))
            .finish()
    }
}

impl<P, R> AuthMutation<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F, Fut>(key: QueryKey, cache: Arc<QueryCache>, mutate_fn: F) -> Self
    where
        F: Fn(P, FetchOptions) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ClientResult<R>> + Send + 'static,
    {
        Self {
            key,
            related: Vec::new(),
            related_resources: Vec::new(),
            cache,
            mutate_fn: Arc::new(move |params, options| Box::pin(mutate_fn(params, options))),
            patches: Vec::new(),
            optimistic: true,
            options: FetchOptions::default(),
            state: Arc::new(MutationState::default()),
        }
    }

    /// Bind a typed optimistic patch for the target key.
    pub fn optimistic<T, G>(mut self, patch: G) -> Self
    where
        T: Serialize + DeserializeOwned,
        G: Fn(&T, &P) -> T + Send + Sync + 'static,
    {
        self.patches.push(OptimisticPatch {
            target: None,
            apply: typed_patch(move |current: &T, params: &P| Some(patch(current, params))),
        });
        self
    }

    /// Bind a typed optimistic patch for the entry `target` picks from the
    /// parameters. The patch returns `None` to leave that entry alone.
    pub fn optimistic_at<T, K, G>(mut self, target: K, patch: G) -> Self
    where
        T: Serialize + DeserializeOwned,
        K: Fn(&P) -> QueryKey + Send + Sync + 'static,
        G: Fn(&T, &P) -> Option<T> + Send + Sync + 'static,
    {
        self.patches.push(OptimisticPatch {
            target: Some(Arc::new(target)),
            apply: typed_patch(patch),
        });
        self
    }

    /// Turn optimistic patching on or off without unbinding the patch.
    pub fn optimistic_updates(mut self, enabled: bool) -> Self {
        self.optimistic = enabled;
        self
    }

    /// Also invalidate `key` when the mutation settles.
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        if key != self.key && !self.related.contains(&key) {
            self.related.push(key);
        }
        self
    }

    /// Invalidate every cached variant of `key`'s resource on settle.
    pub fn invalidates_resource(mut self, key: QueryKey) -> Self {
        if !self.related_resources.iter().any(|k| k.same_resource(&key)) {
            self.related_resources.push(key);
        }
        self
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.load(Ordering::SeqCst) > 0
    }

    /// Error of the last settled call, if it failed.
    pub fn error(&self) -> Option<SyncError> {
        self.state
            .last_error
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn reset(&self) {
        self.state.set_error(None);
    }

    /// Fire and forget. Failures land in the error sink and [`error`](Self::error).
    pub fn mutate(&self, params: P) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.mutate_async(params).await;
        })
    }

    pub async fn mutate_async(&self, params: P) -> SyncResult<R> {
        self.mutate_async_with(params, self.options.clone()).await
    }

    /// Run with caller-supplied fetch options; only `throw` gets a default.
    pub async fn mutate_async_with(&self, params: P, options: FetchOptions) -> SyncResult<R> {
        let _pending = PendingGuard::enter(&self.state.pending);
        self.state.set_error(None);

        let options = options.with_default_throw();
        let throws = options.throws();
        let snapshots = self.apply_optimistic(&params);
        let patched: Vec<QueryKey> = snapshots.iter().map(|(key, _)| key.clone()).collect();

        let outcome = match (self.mutate_fn)(params, options).await {
            Ok(result) => Ok(result),
            Err(err) => {
                let err = SyncError::Remote(err);
                for (key, previous) in snapshots.into_iter().rev() {
                    self.cache.restore(&key, Some(previous));
                    debug!(key = %key, "Rolled back optimistic update");
                }
                if throws {
                    self.cache.report_error(&self.key, &err);
                }
                self.state.set_error(Some(err.clone()));
                Err(err)
            }
        };

        self.settle(&patched);
        outcome
    }

    /// Write the patched values; returns the snapshots to roll back to.
    fn apply_optimistic(&self, params: &P) -> Vec<(QueryKey, Value)> {
        let mut snapshots: Vec<(QueryKey, Value)> = Vec::new();
        if !self.optimistic {
            return snapshots;
        }

        for patch in &self.patches {
            let key = match &patch.target {
                Some(target) => target(params),
                None => self.key.clone(),
            };
            if snapshots.iter().any(|(patched, _)| *patched == key) {
                continue;
            }

            self.cache.cancel_queries(&key);
            let Some(previous) = self.cache.get_value(&key) else {
                continue;
            };
            match (patch.apply)(&previous, params) {
                Ok(Some(patched)) => {
                    self.cache.set_value(&key, patched);
                    snapshots.push((key, previous));
                }
                Ok(None) => {}
                Err(err) => warn!(key = %key, error = %err, "Skipping optimistic update"),
            }
        }
        snapshots
    }

    fn settle(&self, patched: &[QueryKey]) {
        self.cache.invalidate(&self.key);
        for key in patched.iter().filter(|key| **key != self.key) {
            self.cache.invalidate(key);
        }
        for key in &self.related {
            self.cache.invalidate(key);
        }
        for base in &self.related_resources {
            self.cache.invalidate_where(|key| key.same_resource(base));
        }
    }
}

/// Lift a typed patch onto cached JSON values.
fn typed_patch<T, P, G>(patch: G) -> PatchFn<P>
where
    T: Serialize + DeserializeOwned,
    G: Fn(&T, &P) -> Option<T> + Send + Sync + 'static,
{
    Arc::new(move |current: &Value, params: &P| -> SyncResult<Option<Value>> {
        let current: T = serde_json::from_value(current.clone())?;
        match patch(&current, params) {
            Some(next) => Ok(Some(serde_json::to_value(next)?)),
            None => Ok(None),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthClientError;
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Item {
        id: String,
        name: String,
    }

    fn cache() -> Arc<QueryCache> {
        Arc::new(QueryCache::new(16, Duration::from_secs(60)))
    }

    fn rename(key: QueryKey, cache: Arc<QueryCache>, fail: bool) -> AuthMutation<String, ()> {
        AuthMutation::new(key, cache, move |_name: String, _| async move {
            if fail {
                Err(AuthClientError::new("rejected").with_status(400))
            } else {
                Ok(())
            }
        })
        .optimistic(|item: &Item, name: &String| Item {
            id: item.id.clone(),
            name: name.clone(),
        })
    }

    #[tokio::test]
    async fn rollback_restores_exact_snapshot() {
        let cache = cache();
        let key = QueryKey::new("item");
        let original = json!({"id": "1", "name": "Old", "extra": {"nested": [1, 2, 3]}});
        cache.set_value(&key, original.clone());

        let mutation = rename(key.clone(), cache.clone(), true);
        let result = mutation.mutate_async("New".to_string()).await;

        assert!(result.is_err());
        assert_eq!(cache.get_value(&key), Some(original));
        assert!(mutation.error().is_some());
        assert!(!mutation.is_pending());
    }

    #[tokio::test]
    async fn settle_always_invalidates() {
        let cache = cache();
        let key = QueryKey::new("item");
        let related = QueryKey::new("items");
        cache.set_value(&key, json!({"id": "1", "name": "Old"}));
        cache.set_value(&related, json!([]));

        let ok = rename(key.clone(), cache.clone(), false).invalidates(related.clone());
        ok.mutate_async("New".to_string()).await.unwrap();
        assert!(cache.is_stale(&key));
        assert!(cache.is_stale(&related));
        // Success keeps the optimistic value until the refetch replaces it
        assert_eq!(cache.get::<Item>(&key).unwrap().unwrap().name, "New");

        cache.set_value(&key, json!({"id": "1", "name": "Old"}));
        let failing = rename(key.clone(), cache.clone(), true);
        let _ = failing.mutate_async("New".to_string()).await;
        assert!(cache.is_stale(&key));
    }

    #[tokio::test]
    async fn resource_invalidation_covers_every_variant() {
        let cache = cache();
        let key = QueryKey::new("item");
        let members_a = QueryKey::with_params("members", &json!({"organizationId": "a"}));
        let members_b = QueryKey::with_params("members", &json!({"organizationId": "b"}));
        let other = QueryKey::new("other");
        for k in [&members_a, &members_b, &other] {
            cache.set_value(k, json!([]));
        }

        rename(key, cache.clone(), false)
            .invalidates_resource(QueryKey::new("members"))
            .mutate_async("x".to_string())
            .await
            .unwrap();
        assert!(cache.is_stale(&members_a));
        assert!(cache.is_stale(&members_b));
        assert!(!cache.is_stale(&other));
    }

    fn rename_by_id(cache: Arc<QueryCache>, fail: bool) -> AuthMutation<Item, ()> {
        // The bare "item" key holds whichever item is current
        AuthMutation::new(QueryKey::new("item"), cache, move |_item: Item, _| async move {
            if fail {
                Err(AuthClientError::new("rejected"))
            } else {
                Ok(())
            }
        })
        .optimistic_at(
            |item: &Item| QueryKey::with_params("item", &json!({"id": item.id})),
            |cached: &Item, item: &Item| (cached.id == item.id).then(|| item.clone()),
        )
        .optimistic_at(
            |_: &Item| QueryKey::new("item"),
            |cached: &Item, item: &Item| (cached.id == item.id).then(|| item.clone()),
        )
    }

    fn item(id: &str, name: &str) -> Item {
        Item {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn targeted_patches_follow_parameters() {
        let cache = cache();
        let current = QueryKey::new("item");
        let one = QueryKey::with_params("item", &json!({"id": "1"}));
        let two = QueryKey::with_params("item", &json!({"id": "2"}));
        cache.set(&current, &item("1", "Old")).unwrap();
        cache.set(&one, &item("1", "Old")).unwrap();
        cache.set(&two, &item("2", "Other")).unwrap();

        // Updating item 2 must not touch the current item 1
        rename_by_id(cache.clone(), false)
            .mutate_async(item("2", "New"))
            .await
            .unwrap();
        assert_eq!(cache.get::<Item>(&current).unwrap().unwrap().name, "Old");
        assert_eq!(cache.get::<Item>(&one).unwrap().unwrap().name, "Old");
        assert_eq!(cache.get::<Item>(&two).unwrap().unwrap().name, "New");
        assert!(cache.is_stale(&two));

        rename_by_id(cache.clone(), false)
            .mutate_async(item("1", "New"))
            .await
            .unwrap();
        assert_eq!(cache.get::<Item>(&current).unwrap().unwrap().name, "New");
        assert_eq!(cache.get::<Item>(&one).unwrap().unwrap().name, "New");
    }

    #[tokio::test]
    async fn targeted_patches_roll_back_together() {
        let cache = cache();
        let current = QueryKey::new("item");
        let one = QueryKey::with_params("item", &json!({"id": "1"}));
        cache.set(&current, &item("1", "Old")).unwrap();
        cache.set(&one, &item("1", "Old")).unwrap();
        let before = (cache.get_value(&current), cache.get_value(&one));

        let result = rename_by_id(cache.clone(), true).mutate_async(item("1", "New")).await;
        assert!(result.is_err());
        assert_eq!((cache.get_value(&current), cache.get_value(&one)), before);
    }

    #[tokio::test]
    async fn no_previous_value_skips_patch() {
        let cache = cache();
        let key = QueryKey::new("item");
        let mutation = rename(key.clone(), cache.clone(), false);
        mutation.mutate_async("New".to_string()).await.unwrap();
        assert!(!cache.contains(&key));
    }

    #[tokio::test]
    async fn optimistic_value_visible_before_remote_resolves() {
        let cache = cache();
        let key = QueryKey::new("item");
        cache.set_value(&key, json!({"id": "1", "name": "Old"}));

        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (signal, gate) = (started.clone(), release.clone());
        let mutation = AuthMutation::new(key.clone(), cache.clone(), move |_name: String, _| {
            let (signal, gate) = (signal.clone(), gate.clone());
            async move {
                signal.notify_one();
                gate.notified().await;
                Err::<(), _>(AuthClientError::new("rejected"))
            }
        })
        .optimistic(|item: &Item, name: &String| Item {
            id: item.id.clone(),
            name: name.clone(),
        });

        let handle = mutation.mutate("New".to_string());
        started.notified().await;
        assert!(mutation.is_pending());
        assert_eq!(cache.get::<Item>(&key).unwrap().unwrap().name, "New");

        release.notify_one();
        handle.await.unwrap();
        assert_eq!(cache.get::<Item>(&key).unwrap().unwrap().name, "Old");
        assert!(!mutation.is_pending());
    }

    #[tokio::test]
    async fn patch_cancels_in_flight_query() {
        let cache = cache();
        let key = QueryKey::new("item");
        cache.set_value(&key, json!({"id": "1", "name": "Old"}));
        let in_flight = cache.begin_fetch(&key);

        rename(key.clone(), cache.clone(), false)
            .mutate_async("New".to_string())
            .await
            .unwrap();
        assert!(in_flight.is_cancelled());
    }

    #[tokio::test]
    async fn disabled_optimistic_mode_leaves_cache_alone() {
        let cache = cache();
        let key = QueryKey::new("item");
        cache.set_value(&key, json!({"id": "1", "name": "Old"}));
        let in_flight = cache.begin_fetch(&key);

        let mutation = rename(key.clone(), cache.clone(), false).optimistic_updates(false);
        mutation.mutate_async("New".to_string()).await.unwrap();
        assert_eq!(cache.get::<Item>(&key).unwrap().unwrap().name, "Old");
        assert!(!in_flight.is_cancelled());
    }

    #[tokio::test]
    async fn default_throw_is_injected_and_caller_choice_kept() {
        let cache = cache();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let mutation: AuthMutation<(), ()> =
            AuthMutation::new(QueryKey::new("x"), cache, move |_, options: FetchOptions| {
                log.lock().unwrap().push(options.throw);
                async { Ok(()) }
            });

        mutation.mutate_async(()).await.unwrap();
        mutation
            .mutate_async_with((), FetchOptions::no_throw())
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![Some(true), Some(false)]);
    }

    #[tokio::test]
    async fn no_throw_failures_skip_the_sink() {
        let cache = cache();
        let reported = Arc::new(AtomicUsize::new(0));
        let counter = reported.clone();
        cache.set_error_sink(Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let mutation = rename(QueryKey::new("item"), cache, true);
        let _ = mutation.mutate_async("a".to_string()).await;
        let _ = mutation
            .mutate_async_with("b".to_string(), FetchOptions::no_throw())
            .await;
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }
}
