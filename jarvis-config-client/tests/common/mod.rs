#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use jarvis_config_client::{PersistenceError, ResolveError, Resolver, ServiceRecord, ServiceStore, Snapshot};

pub fn record(name: &str, url: &str) -> ServiceRecord {
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

pub fn snapshot(entries: &[(&str, &str)]) -> Snapshot {
    entries
        .iter()
        .map(|(name, url)| (name.to_string(), record(name, url)))
        .collect()
}

pub fn jarvis_services() -> Snapshot {
    snapshot(&[
        ("jarvis-auth", "http://localhost:8007"),
        ("jarvis-logs", "http://localhost:8006"),
    ])
}

/// In-process stand-in for the config service
pub struct FakeResolver {
    services: Mutex<Snapshot>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn serving(services: Snapshot) -> Arc<Self> {
        Arc::new(Self {
            services: Mutex::new(services),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn down() -> Arc<Self> {
        let resolver = Self::serving(Snapshot::new());
        resolver.set_failing(true);
        resolver
    }

    pub fn set_services(&self, services: Snapshot) {
        *self.services.lock() = services;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self) -> Result<Snapshot, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ResolveError::Transport {
                url: "http://config.test/services".to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(self.services.lock().clone())
    }
}

/// Durable store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Option<Snapshot>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn preloaded(services: Snapshot) -> Arc<Self> {
        let store = Self::default();
        *store.saved.lock() = Some(services);
        Arc::new(store)
    }

    pub fn saved(&self) -> Option<Snapshot> {
        self.saved.lock().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceStore for MemoryStore {
    async fn save(&self, snapshot: Arc<Snapshot>) -> Result<(), PersistenceError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.saved.lock() = Some(snapshot.as_ref().clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(self.saved.lock().clone())
    }
}
