//! In-memory service cache.
//!
//! The snapshot lives behind an [`ArcSwap`], so readers never take a lock and
//! always see one complete snapshot. Writers are serialized by the refresher,
//! not here.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shared::types::{ServiceRecord, Snapshot};
use crate::error::ResolveError;

/// Outcome bookkeeping of the most recent refresh attempts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshState {
    /// Last time a resolve succeeded
    pub last_success: Option<DateTime<Utc>>,
    /// Last time a resolve was attempted, successful or not
    pub last_attempt: Option<DateTime<Utc>>,
    /// Error of the last attempt; cleared by the next success
    pub last_error: Option<ResolveError>,
    /// Fingerprint of the snapshot currently served
    pub fingerprint: Option<String>,
}

pub struct ServiceCache {
    snapshot: ArcSwap<Snapshot>,
    installed: AtomicBool,
    state: Mutex<RefreshState>,
}

impl Default for ServiceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::new()),
            installed: AtomicBool::new(false),
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Look up one service in the current snapshot
    pub fn get(&self, name: &str) -> Option<ServiceRecord> {
        self.snapshot.load().get(name).cloned()
    }

    /// Owned copy of the current snapshot
    pub fn get_all(&self) -> Snapshot {
        self.snapshot.load().as_ref().clone()
    }

    /// Shared handle to the current snapshot, without copying it
    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Atomically swap in a new snapshot
    pub fn replace(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot));
        self.installed.store(true, Ordering::Release);
    }

    /// Whether any snapshot was ever installed, even an empty one.
    /// The startup placeholder does not count.
    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.state.lock().clone()
    }

    /// Record a successful resolve. Returns the previous fingerprint.
    pub(crate) fn record_success(&self, at: DateTime<Utc>, fingerprint: String) -> Option<String> {
        let mut state = self.state.lock();
        state.last_success = Some(at);
        state.last_attempt = Some(at);
        state.last_error = None;
        state.fingerprint.replace(fingerprint)
    }

    pub(crate) fn record_failure(&self, at: DateTime<Utc>, error: ResolveError) {
        let mut state = self.state.lock();
        state.last_attempt = Some(at);
        state.last_error = Some(error);
    }

    /// Record the fingerprint of a snapshot that came from the durable store
    pub(crate) fn record_fallback(&self, fingerprint: String) {
        self.state.lock().fingerprint = Some(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            url: url.to_string(),
            host: None,
            port: None,
            health_path: "/health".to_string(),
            scheme: "http".to_string(),
            description: None,
            last_updated: Utc::now(),
        }
    }

    /// Snapshot number `generation`: `generation + 1` services whose URLs all end in the generation
    fn generation_snapshot(generation: usize) -> Snapshot {
        (0..=generation)
            .map(|i| {
                let name = format!("svc-{}", i);
                let url = format!("http://host-{}:1234/{}", i, generation);
                (name.clone(), record(&name, &url))
            })
            .collect()
    }

    #[test]
    fn test_get_and_replace() {
        let cache = ServiceCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("x").is_none());

        cache.replace(Snapshot::from([("x".to_string(), record("x", "http://host:1234"))]));
        assert_eq!(cache.get("x").unwrap().url, "http://host:1234");
        assert_eq!(cache.len(), 1);

        cache.replace(Snapshot::from([("y".to_string(), record("y", "http://other:1"))]));
        assert!(cache.get("x").is_none(), "Replace must not merge with the previous snapshot");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_snapshot_counts_as_installed() {
        let cache = ServiceCache::new();
        assert!(!cache.is_installed());

        cache.replace(Snapshot::new());
        assert!(cache.is_empty());
        assert!(cache.is_installed());
    }

    #[test]
    fn test_get_all_is_a_copy() {
        let cache = ServiceCache::new();
        cache.replace(generation_snapshot(1));

        let before = cache.get_all();
        cache.replace(generation_snapshot(5));

        assert_eq!(before.len(), 2);
        assert!(before.values().all(|r| r.url.ends_with("/1")));
        assert_eq!(cache.get_all().len(), 6);
    }

    #[test]
    fn test_readers_never_see_partial_snapshot() {
        let cache = ServiceCache::new();
        cache.replace(generation_snapshot(0));
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    while !done.load(Ordering::Relaxed) {
                        let snapshot = cache.get_all();
                        let generation = snapshot.len() - 1;
                        let suffix = format!("/{}", generation);
                        assert!(
                            snapshot.values().all(|r| r.url.ends_with(&suffix)),
                            "Observed a mix of snapshots"
                        );
                    }
                });
            }

            s.spawn(|| {
                for generation in 1..200 {
                    cache.replace(generation_snapshot(generation));
                }
                done.store(true, Ordering::Relaxed);
            });
        });

        assert_eq!(cache.len(), 200);
    }

    #[test]
    fn test_refresh_state_bookkeeping() {
        let cache = ServiceCache::new();
        assert_eq!(cache.refresh_state(), RefreshState::default());

        let failed_at = Utc::now();
        let error = ResolveError::Timeout { url: "http://config/services".to_string() };
        cache.record_failure(failed_at, error.clone());
        let state = cache.refresh_state();
        assert_eq!(state.last_attempt, Some(failed_at));
        assert_eq!(state.last_error, Some(error));
        assert!(state.last_success.is_none());

        let ok_at = Utc::now();
        assert!(cache.record_success(ok_at, "abc".to_string()).is_none());
        let state = cache.refresh_state();
        assert_eq!(state.last_success, Some(ok_at));
        assert!(state.last_error.is_none());
        assert_eq!(cache.record_success(ok_at, "def".to_string()).as_deref(), Some("abc"));
    }
}
