use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use crate::config::{StoreConfig, DEFAULT_TTL, MAX_TTL, MIN_CLEANUP_INTERVAL};
use crate::entry::Entry;

/// A live entry plus the task that will delete it
struct Slot {
    entry: Entry,
    expiry: Option<AbortHandle>,
}

impl Slot {
    fn cancel_expiry(&self) {
        if let Some(handle) = &self.expiry {
            handle.abort();
        }
    }
}

/// Internal shared state for the store
struct StoreInner {
    data: DashMap<String, Slot>,
    ttl: Duration,
    /// Last generation handed out by `put`
    generation: AtomicU64,
    /// Runtime the expiration tasks are spawned on
    runtime: Handle,
    /// Sender to signal shutdown to the cleanup task
    shutdown_tx: watch::Sender<bool>,
}

impl StoreInner {
    fn abort_all_expiries(&self) {
        for slot in self.data.iter() {
            slot.value().cancel_expiry();
        }
    }
}

/// Thread-safe in-memory message store with a fixed per-entry TTL
///
/// Uses `DashMap` for concurrent access. Every operation, expiration included,
/// goes through the map's shard locks, so each one is atomic with respect to
/// the others for the identifier it touches.
///
/// Each `put` spawns an expiration task that sleeps until the entry's
/// `expires_at` and then deletes the entry, but only if it still carries the
/// generation that scheduled it. Replacing an entry aborts the old task; the
/// generation check covers the case where the abort arrives too late.
///
/// A background sweep runs every `cleanup_interval` as well. Reads never depend
/// on either: an entry past its `expires_at` is invisible to `get` even if it
/// is still physically present.
///
/// # Example
///
/// ```rust,no_run
/// use ferry_core::{Store, StoreConfig};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let store = Store::with_config(StoreConfig::default().with_ttl(Duration::from_secs(300)));
///
///     store.put("calm-moon-42", "see you at noon");
///     assert_eq!(store.get("calm-moon-42").as_deref(), Some("see you at noon"));
///     assert_eq!(store.get("never-stored"), None);
/// }
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Creates a new store with default configuration (24 hour TTL)
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. The store requires
    /// a runtime to spawn its expiration and cleanup tasks.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a new store with custom configuration
    ///
    /// A TTL above [`MAX_TTL`] is clamped to it, and a cleanup interval below
    /// [`MIN_CLEANUP_INTERVAL`] (zero included) is raised to it.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime context. The store requires
    /// a runtime to spawn its expiration and cleanup tasks.
    pub fn with_config(config: StoreConfig) -> Self {
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => panic!(
                "ferry_core::Store requires a Tokio runtime. \
                 Ensure you are calling Store::new() or Store::with_config() \
                 from within a #[tokio::main] or #[tokio::test] context, \
                 or from code running on a Tokio runtime."
            ),
        };

        let ttl = config.ttl.min(MAX_TTL);
        if ttl < config.ttl {
            tracing::warn!(requested = ?config.ttl, applied = ?ttl, "ttl clamped");
        }
        let cleanup_interval = config.cleanup_interval.max(MIN_CLEANUP_INTERVAL);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(StoreInner {
            data: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
            runtime,
            shutdown_tx,
        });

        inner.runtime.spawn(Self::cleanup_task(
            Arc::downgrade(&inner),
            cleanup_interval,
            shutdown_rx,
        ));

        Self { inner }
    }

    /// Background task that periodically sweeps expired entries
    async fn cleanup_task(
        inner: Weak<StoreInner>,
        interval: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick - we want to wait for the interval first
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    let removed = Self::cleanup_internal(&inner);
                    if removed > 0 {
                        tracing::debug!(removed, remaining = inner.data.len(), "swept expired entries");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Internal sweep logic (shared between manual and background cleanup)
    fn cleanup_internal(inner: &StoreInner) -> usize {
        let now = Instant::now();
        let mut removed_count = 0;

        inner.data.retain(|_, slot| {
            if slot.entry.is_expired_at(now) {
                slot.cancel_expiry();
                removed_count += 1;
                false
            } else {
                true
            }
        });

        removed_count
    }

    /// Deletes `identifier` if the stored entry was written by `generation`.
    ///
    /// Returns `true` if something was removed.
    fn expire(inner: &StoreInner, identifier: &str, generation: u64) -> bool {
        let removed = inner
            .data
            .remove_if(identifier, |_, slot| slot.entry.generation() == generation)
            .is_some();

        if removed {
            tracing::debug!(generation, "entry expired");
        }
        removed
    }

    /// Spawns the task that deletes this write of `identifier` at `expires_at`
    fn schedule_expiry(&self, identifier: String, generation: u64, expires_at: Instant) -> AbortHandle {
        let inner = Arc::downgrade(&self.inner);
        self.inner
            .runtime
            .spawn(async move {
                tokio::time::sleep_until(expires_at).await;
                if let Some(inner) = inner.upgrade() {
                    Self::expire(&inner, &identifier, generation);
                }
            })
            .abort_handle()
    }

    /// Stores `content` under `identifier`
    ///
    /// If the identifier already holds an entry it is replaced, and the
    /// expiration window restarts from now. The replaced entry's expiration
    /// task can no longer delete anything.
    pub fn put(&self, identifier: impl Into<String>, content: impl Into<String>) {
        let identifier = identifier.into();
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let created_at = Instant::now();
        let expires_at = created_at
            .checked_add(self.inner.ttl)
            .or_else(|| created_at.checked_add(DEFAULT_TTL))
            .unwrap_or(created_at);
        let slot = Slot {
            entry: Entry::new(Arc::from(content.into()), created_at, expires_at, generation),
            expiry: None,
        };

        // The shard stays locked until the expiry handle is attached, so the
        // new task cannot observe the map before the entry is in place.
        let mut stored = match self.inner.data.entry(identifier.clone()) {
            MapEntry::Occupied(mut occupied) => {
                let replaced = occupied.insert(slot);
                replaced.cancel_expiry();
                occupied.into_ref()
            }
            MapEntry::Vacant(vacant) => vacant.insert(slot),
        };
        stored.expiry = Some(self.schedule_expiry(identifier, generation, expires_at));
    }

    /// Stores an entry that is already expired, with no expiration task (for testing purposes)
    #[cfg(test)]
    fn put_expired(&self, identifier: impl Into<String>, content: impl Into<String>) {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let now = Instant::now();
        let entry = Entry::new(
            Arc::from(content.into()),
            now - Duration::from_secs(2),
            now - Duration::from_secs(1),
            generation,
        );
        self.inner.data.insert(identifier.into(), Slot { entry, expiry: None });
    }

    /// Retrieves the content stored under `identifier`
    ///
    /// Returns `None` if the identifier was never stored or its entry has
    /// expired. Stored empty content is returned as `Some("")`.
    ///
    /// Reading never changes the entry or its expiry.
    pub fn get(&self, identifier: &str) -> Option<String> {
        self.entry(identifier).map(|entry| entry.content().to_string())
    }

    /// Returns a snapshot of the live entry stored under `identifier`
    pub fn entry(&self, identifier: &str) -> Option<Entry> {
        let slot = self.inner.data.get(identifier)?;
        if slot.entry.is_expired() {
            return None;
        }
        Some(slot.entry.clone())
    }

    /// Checks if an identifier holds a live entry
    #[must_use]
    pub fn contains_key(&self, identifier: &str) -> bool {
        self.inner
            .data
            .get(identifier)
            .is_some_and(|slot| !slot.entry.is_expired())
    }

    /// Manually triggers a sweep of all expired entries
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        Self::cleanup_internal(&self.inner)
    }

    /// Returns the number of entries held (including expired ones not yet removed)
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    /// Returns `true` if the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }

    /// Returns the time-to-live applied to new entries
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Stops the background sweep and every pending expiration task
    ///
    /// Entries left in the store still stop being readable once they expire.
    /// This is called automatically when the last handle is dropped.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        self.inner.abort_all_expiries();
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.abort_all_expiries();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    /// Helper to create a store within a tokio runtime for thread-based tests
    fn create_test_store() -> Store {
        create_test_store_with_config(StoreConfig::default())
    }

    fn create_test_store_with_config(config: StoreConfig) -> Store {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();

        // Keep the runtime alive by leaking it (fine for tests)
        let rt = Box::leak(Box::new(rt));
        let _guard = rt.enter();

        Store::with_config(config)
    }

    const TTL: Duration = Duration::from_secs(60);

    fn paused_store() -> Store {
        Store::with_config(
            StoreConfig::default()
                .with_ttl(TTL)
                .with_cleanup_interval(Duration::from_secs(3600)),
        )
    }

    #[test]
    fn test_put_and_get() {
        let store = create_test_store();
        store.put("id1", "hello");

        assert_eq!(store.get("id1"), Some("hello".to_string()));
    }

    #[test]
    fn test_get_unknown_identifier() {
        let store = create_test_store();
        assert_eq!(store.get("never-stored"), None);
        assert!(!store.contains_key("never-stored"));
    }

    #[test]
    fn test_empty_content_is_found() {
        let store = create_test_store();
        store.put("id1", "");

        assert_eq!(store.get("id1"), Some(String::new()));
        assert!(store.contains_key("id1"));
    }

    #[test]
    fn test_replace_keeps_single_entry() {
        let store = create_test_store();
        store.put("id1", "a");
        store.put("id1", "b");

        assert_eq!(store.get("id1"), Some("b".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_assigns_new_generation() {
        let store = create_test_store();
        store.put("id1", "a");
        let first = store.entry("id1").unwrap().generation();
        store.put("id1", "b");
        let second = store.entry("id1").unwrap().generation();

        assert!(second > first);
    }

    #[test]
    fn test_len_and_is_empty() {
        let store = create_test_store();

        assert!(store.is_empty());
        assert_eq!(store.len(), 0);

        store.put("id1", "value1");

        assert!(!store.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_unreachable_before_removal() {
        let store = create_test_store();
        store.put_expired("id1", "value1");

        // Still physically present, but never observable
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("id1"), None);
        assert!(store.entry("id1").is_none());
        assert!(!store.contains_key("id1"));
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let store = create_test_store_with_config(
            StoreConfig::default().with_cleanup_interval(Duration::from_secs(3600)),
        );

        store.put_expired("expired1", "value1");
        store.put_expired("expired2", "value2");
        store.put("valid", "value3");

        let removed = store.cleanup();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("valid"), Some("value3".to_string()));
    }

    #[test]
    fn test_concurrent_distinct_identifiers() {
        let store = create_test_store();
        let mut handles = vec![];

        for thread_id in 0..10 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    store.put(format!("thread{}:id{}", thread_id, i), format!("content{}:{}", thread_id, i));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(store.len(), 1000);
        for thread_id in 0..10 {
            for i in 0..100 {
                assert_eq!(
                    store.get(&format!("thread{}:id{}", thread_id, i)),
                    Some(format!("content{}:{}", thread_id, i))
                );
            }
        }
    }

    #[test]
    fn test_concurrent_puts_to_same_identifier() {
        let store = create_test_store();
        let mut handles = vec![];

        for thread_id in 0..10 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    store.put("contested", format!("thread{}:iteration{}", thread_id, i));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(store.len(), 1);
        let content = store.get("contested").unwrap();
        assert!(content.ends_with(":iteration99"), "last write of some thread wins, got {content}");
    }

    #[test]
    fn test_concurrent_reads_and_writes() {
        use std::sync::atomic::AtomicUsize;

        let store = create_test_store();
        for i in 0..100 {
            store.put(format!("id{}", i), format!("content{}", i));
        }

        let successful_reads = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..5 {
            let store = store.clone();
            let successful_reads = Arc::clone(&successful_reads);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    if store.get(&format!("id{}", i)) == Some(format!("content{}", i)) {
                        successful_reads.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }));
        }

        for thread_id in 0..5 {
            let store = store.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    store.put(format!("new_thread{}:id{}", thread_id, i), "new_content");
                }
            }));
        }

        for handle in handles {
            handle.join().expect("Thread panicked");
        }

        assert_eq!(successful_reads.load(Ordering::SeqCst), 500);
        assert_eq!(store.len(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = paused_store();
        store.put("id1", "x");

        tokio::time::sleep(TTL - Duration::from_millis(1)).await;
        assert_eq!(store.get("id1"), Some("x".to_string()));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(store.get("id1"), None);
        // The expiration task has removed it physically as well
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_resets_expiry() {
        let store = paused_store();
        let epsilon = Duration::from_millis(10);

        store.put("id1", "x");
        tokio::time::sleep(TTL - epsilon).await;
        store.put("id1", "y");

        // Past the first write's deadline: the second write governs
        tokio::time::sleep(epsilon * 2).await;
        assert_eq!(store.get("id1"), Some("y".to_string()));
        assert_eq!(store.len(), 1);

        tokio::time::sleep(TTL).await;
        assert_eq!(store.get("id1"), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_ttl() {
        let store = paused_store();
        store.put("id1", "x");

        for _ in 0..5 {
            tokio::time::sleep(TTL / 6).await;
            assert_eq!(store.get("id1"), Some("x".to_string()));
        }

        tokio::time::sleep(TTL / 6 + Duration::from_millis(1)).await;
        assert_eq!(store.get("id1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_miss_after_expiry() {
        let store = paused_store();
        store.put("id1", "x");
        tokio::time::sleep(TTL + Duration::from_millis(1)).await;

        for _ in 0..10 {
            assert_eq!(store.get("id1"), None);
            assert_eq!(store.get("never-stored"), None);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_reports_lifetime() {
        let store = paused_store();
        store.put("id1", "x");

        let entry = store.entry("id1").unwrap();
        assert_eq!(entry.expires_at() - entry.created_at(), TTL);
        assert_eq!(entry.remaining(), TTL);
        assert_eq!(store.ttl(), TTL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_cannot_delete_replacement() {
        let store = paused_store();
        store.put("id1", "a");
        let stale = store.entry("id1").unwrap().generation();
        store.put("id1", "b");

        // A late-firing task from the first write must be a no-op
        assert!(!Store::expire(&store.inner, "id1", stale));
        assert_eq!(store.get("id1"), Some("b".to_string()));

        let current = store.entry("id1").unwrap().generation();
        assert!(Store::expire(&store.inner, "id1", current));
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_identifiers_expire_independently() {
        let store = paused_store();
        store.put("early", "1");
        tokio::time::sleep(TTL / 2).await;
        store.put("late", "2");

        tokio::time::sleep(TTL / 2 + Duration::from_millis(1)).await;
        assert_eq!(store.get("early"), None);
        assert_eq!(store.get("late"), Some("2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup_runs() {
        let store = Store::with_config(
            StoreConfig::default()
                .with_ttl(TTL)
                .with_cleanup_interval(Duration::from_millis(50)),
        );

        store.put_expired("expire1", "value1");
        store.put_expired("expire2", "value2");
        store.put("keep", "value3");
        assert_eq!(store.len(), 3);

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("keep"), Some("value3".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_expiry_tasks() {
        let store = paused_store();
        store.put("id1", "x");

        store.shutdown();
        tokio::time::sleep(TTL * 2).await;

        // Nothing removed it physically, but it is still unreadable
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("id1"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_ttl_is_clamped() {
        let store = Store::with_config(StoreConfig::default().with_ttl(Duration::MAX));
        assert_eq!(store.ttl(), MAX_TTL);

        store.put("id1", "far future");
        let entry = store.entry("id1").unwrap();
        assert_eq!(entry.expires_at() - entry.created_at(), MAX_TTL);
        assert_eq!(store.get("id1"), Some("far future".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cleanup_interval_is_raised() {
        let store = Store::with_config(StoreConfig::default().with_cleanup_interval(Duration::ZERO));
        store.put_expired("stale", "x");
        store.put("live", "y");

        tokio::time::sleep(MIN_CLEANUP_INTERVAL * 5).await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live"), Some("y".to_string()));
    }

    #[tokio::test]
    async fn test_store_clone_shares_data() {
        let store1 = Store::new();
        let store2 = store1.clone();

        store1.put("id1", "value1");
        assert_eq!(store2.get("id1"), Some("value1".to_string()));

        store2.put("id2", "value2");
        assert_eq!(store1.get("id2"), Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_multiple_stores_are_independent() {
        let store1 = Store::new();
        let store2 = Store::new();

        store1.put("id1", "one");

        assert_eq!(store2.get("id1"), None);
        assert_eq!(store2.len(), 0);
    }
}
