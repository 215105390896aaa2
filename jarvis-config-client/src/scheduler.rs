//! Refreshing the cache: the per-refresh algorithm and the background loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use crate::cache::ServiceCache;
use crate::error::ResolveError;
use crate::hash;
use crate::listener::{self, RefreshListener};
use crate::resolver::Resolver;
use crate::store::ServiceStore;

/// Result of a refresh that left usable data in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The resolve succeeded and the snapshot was replaced
    Refreshed { services: usize },
    /// The resolve failed; the cache still serves earlier data
    Stale { error: ResolveError },
}

type Outcome = Result<RefreshOutcome, ResolveError>;

/// Completed refreshes, guarded by the refresh-in-progress lock
#[derive(Default)]
struct Flight {
    generation: u64,
    last: Option<Outcome>,
}

pub(crate) struct Refresher {
    cache: Arc<ServiceCache>,
    resolver: Arc<dyn Resolver>,
    store: Arc<dyn ServiceStore>,
    listener: Arc<dyn RefreshListener>,
    request_timeout: Duration,
    label: String,
    flight: Mutex<Flight>,
    completed: AtomicU64,
    timer_reset: Notify,
    stopped: CancellationToken,
}

impl Refresher {
    pub(crate) fn new(
        cache: Arc<ServiceCache>,
        resolver: Arc<dyn Resolver>,
        store: Arc<dyn ServiceStore>,
        listener: Arc<dyn RefreshListener>,
        request_timeout: Duration,
        label: String,
        stopped: CancellationToken,
    ) -> Self {
        Self {
            cache,
            resolver,
            store,
            listener,
            request_timeout,
            label,
            flight: Mutex::new(Flight::default()),
            completed: AtomicU64::new(0),
            timer_reset: Notify::new(),
            stopped,
        }
    }

    /// Refresh outside the timer, then push the next tick one full interval out
    pub(crate) async fn refresh_now(&self) -> Option<Outcome> {
        let outcome = self.refresh().await;
        self.timer_reset.notify_one();
        outcome
    }

    /// Run one refresh. Only one runs at a time; a caller arriving while one
    /// is in flight waits for it and gets its outcome.
    ///
    /// Returns `None` once the client has been stopped.
    pub(crate) async fn refresh(&self) -> Option<Outcome> {
        let seen = self.completed.load(Ordering::Acquire);
        let mut flight = self.flight.lock().await;

        if flight.generation != seen {
            if let Some(last) = &flight.last {
                tracing::debug!("Joined an in-flight refresh");
                return Some(last.clone());
            }
        }

        if self.stopped.is_cancelled() {
            return None;
        }

        let outcome = self.run_once().await;
        flight.generation += 1;
        flight.last = Some(outcome.clone());
        self.completed.store(flight.generation, Ordering::Release);
        Some(outcome)
    }

    /// Wait until no refresh is in flight
    pub(crate) async fn wait_idle(&self) {
        drop(self.flight.lock().await);
    }

    async fn run_once(&self) -> Outcome {
        let resolved = match tokio::time::timeout(self.request_timeout, self.resolver.resolve()).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout { url: self.label.clone() }),
        };

        match resolved {
            Ok(snapshot) => {
                let services = snapshot.len();
                let fingerprint = hash::fingerprint(&snapshot);
                self.cache.replace(snapshot);
                let current = self.cache.current();

                let previous = self.cache.record_success(Utc::now(), fingerprint.clone());
                if previous.as_deref() == Some(fingerprint.as_str()) {
                    tracing::debug!("Service map unchanged ({} services)", services);
                } else {
                    tracing::info!("Service map updated: {} services", services);
                }

                if let Err(e) = self.store.save(current.clone()).await {
                    tracing::warn!("Failed to save services to database: {}", e);
                }

                listener::notify(self.listener.as_ref(), &current);

                Ok(RefreshOutcome::Refreshed { services })
            }
            Err(error) => {
                tracing::warn!("Failed to refresh services: {}", error);
                self.cache.record_failure(Utc::now(), error.clone());

                // Only the startup placeholder may be seeded from the store;
                // any installed snapshot, even an empty one, is kept as is
                if self.cache.is_installed() || self.load_fallback().await {
                    Ok(RefreshOutcome::Stale { error })
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Seed a cache that has never been filled from the durable store. Returns true if data was installed.
    async fn load_fallback(&self) -> bool {
        if !self.store.is_configured() {
            return false;
        }

        match self.store.load().await {
            Ok(Some(snapshot)) => {
                tracing::info!("Using {} cached services from database", snapshot.len());
                self.cache.record_fallback(hash::fingerprint(&snapshot));
                self.cache.replace(snapshot);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Failed to load services from database: {}", e);
                false
            }
        }
    }
}

/// Background refresh loop. The first tick fires one `period` after start,
/// since start already performed a refresh.
pub(crate) async fn run(refresher: Arc<Refresher>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                tracing::info!("Refresh scheduler shutting down");
                break;
            }
            _ = refresher.timer_reset.notified() => {
                interval.reset();
            }
            _ = interval.tick() => {
                tracing::debug!("Background refresh triggered");
                if let Some(Err(e)) = refresher.refresh().await {
                    tracing::debug!("Background refresh left the cache empty: {}", e);
                }
            }
        }
    }
}
