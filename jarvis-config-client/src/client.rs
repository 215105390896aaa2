//! The client handle: startup, accessors and shutdown.

use std::sync::Arc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use shared::protocol::SERVICES_PATH;
use shared::types::{ServiceRecord, Snapshot};
use crate::cache::{RefreshState, ServiceCache};
use crate::config::{ClientConfig, Settings};
use crate::error::{ClientError, ClientResult};
use crate::listener::{NoopListener, RefreshListener};
use crate::resolver::{HttpResolver, Resolver};
use crate::scheduler::{self, RefreshOutcome, Refresher};
use crate::store::{NoopStore, ServiceStore, SqliteStore};

/// Collects the optional collaborators before starting a [`ConfigClient`]
pub struct ClientBuilder {
    config: ClientConfig,
    resolver: Option<Arc<dyn Resolver>>,
    store: Option<Arc<dyn ServiceStore>>,
    listener: Arc<dyn RefreshListener>,
}

impl ClientBuilder {
    /// Use a custom resolver instead of HTTP
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Persist snapshots through `store`. Takes precedence over `db_path`.
    /// The caller keeps ownership: shutdown does not close it.
    pub fn store(mut self, store: Arc<dyn ServiceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Called with the new snapshot after every successful refresh
    pub fn on_refresh(mut self, listener: impl RefreshListener + 'static) -> Self {
        self.listener = Arc::new(listener);
        self
    }

    /// Validate the configuration, do the initial fetch and start background refresh.
    ///
    /// An unreachable config service does not fail startup: the client falls
    /// back to the durable store, or starts empty and keeps retrying.
    pub async fn start(self) -> ClientResult<ConfigClient> {
        let settings = self.config.resolve()?;

        let resolver: Arc<dyn Resolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HttpResolver::new(&settings)?),
        };

        let (store, owns_store): (Arc<dyn ServiceStore>, bool) = match (self.store, &self.config.db_path) {
            (Some(store), _) => (store, false),
            (None, Some(path)) => match SqliteStore::open(path) {
                Ok(store) => {
                    tracing::info!("Opened service database at {:?}", path);
                    (Arc::new(store), true)
                }
                Err(e) => {
                    tracing::warn!("Continuing without persistence: {:#}", e);
                    (Arc::new(NoopStore), false)
                }
            },
            (None, None) => (Arc::new(NoopStore), false),
        };

        let cache = Arc::new(ServiceCache::new());
        let cancel = CancellationToken::new();
        let refresher = Arc::new(Refresher::new(
            cache.clone(),
            resolver,
            store.clone(),
            self.listener,
            settings.request_timeout,
            format!("{}{}", settings.endpoint, SERVICES_PATH),
            cancel.clone(),
        ));

        let initial_fetch_succeeded = match refresher.refresh().await {
            Some(Ok(RefreshOutcome::Refreshed { .. })) => true,
            Some(Ok(RefreshOutcome::Stale { .. })) => {
                tracing::info!("Starting with {} cached services", cache.len());
                false
            }
            Some(Err(e)) => {
                tracing::warn!("Starting with no services, will retry: {}", e);
                false
            }
            None => false,
        };

        let task = tokio::spawn(scheduler::run(
            refresher.clone(),
            settings.refresh_interval,
            cancel.clone(),
        ));

        tracing::info!(
            "Config client started (refresh every {}s)",
            settings.refresh_interval.as_secs()
        );

        Ok(ConfigClient {
            inner: Arc::new(Inner {
                cache,
                refresher,
                store,
                owns_store,
                settings,
                cancel,
                task: Mutex::new(Some(task)),
                initial_fetch_succeeded,
            }),
        })
    }
}

/// Handle to a running service-discovery cache.
///
/// Cheap to clone. Dropping the last clone stops background refresh;
/// call [`ConfigClient::shutdown`] to also wait for it and close an owned store.
#[derive(Clone)]
pub struct ConfigClient {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Arc<ServiceCache>,
    refresher: Arc<Refresher>,
    store: Arc<dyn ServiceStore>,
    owns_store: bool,
    settings: Settings,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    initial_fetch_succeeded: bool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ConfigClient {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder {
            config,
            resolver: None,
            store: None,
            listener: Arc::new(NoopListener),
        }
    }

    /// Start with default collaborators
    pub async fn start(config: ClientConfig) -> ClientResult<Self> {
        Self::builder(config).start().await
    }

    pub fn service(&self, name: &str) -> ClientResult<ServiceRecord> {
        self.inner
            .cache
            .get(name)
            .ok_or_else(|| ClientError::ServiceNotFound(name.to_string()))
    }

    /// URL of the named service, e.g. `service_url("jarvis-auth")`
    pub fn service_url(&self, name: &str) -> ClientResult<String> {
        self.service(name).map(|record| record.url)
    }

    pub fn all_services(&self) -> Snapshot {
        self.inner.cache.get_all()
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.inner.cache.refresh_state()
    }

    /// Whether the fetch during start reached the config service
    pub fn initial_fetch_succeeded(&self) -> bool {
        self.inner.initial_fetch_succeeded
    }

    /// Refresh now. Fails only when the resolve failed and nothing is cached.
    pub async fn refresh(&self) -> ClientResult<RefreshOutcome> {
        match self.inner.refresher.refresh_now().await {
            Some(outcome) => outcome.map_err(ClientError::Refresh),
            None => Err(ClientError::NotInitialized),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Stop background refresh without waiting, aborting a refresh in flight.
    /// For places that cannot await; prefer [`ConfigClient::shutdown`].
    pub fn stop(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
        }
    }

    /// Stop background refresh and release an owned store. Idempotent.
    ///
    /// Waits up to the configured shutdown timeout for an in-flight refresh,
    /// then aborts it.
    pub async fn shutdown(&self) {
        let Some(mut task) = self.inner.task.lock().take() else {
            return;
        };

        self.inner.cancel.cancel();
        let timeout = self.inner.settings.shutdown_timeout;

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Refresh task failed: {}", e),
            Err(_) => {
                tracing::warn!("Refresh still in flight after {:?}, aborting it", timeout);
                task.abort();
            }
        }

        // A manual refresh may still be resolving
        if tokio::time::timeout(timeout, self.inner.refresher.wait_idle()).await.is_err() {
            tracing::warn!("Manual refresh still in flight after {:?}", timeout);
        }

        if self.inner.owns_store {
            if let Err(e) = self.inner.store.close().await {
                tracing::warn!("Failed to close service database: {}", e);
            }
        }

        tracing::info!("Config client stopped");
    }
}
