//! Durable persistence of the last known snapshot.

pub mod db;
pub mod handle;

use std::sync::Arc;
use async_trait::async_trait;
use shared::types::Snapshot;
use crate::error::PersistenceError;

pub use handle::SqliteStore;

/// Port for persisting snapshots across restarts.
///
/// Failures are logged by the caller and never surface to users of the cache.
#[async_trait]
pub trait ServiceStore: Send + Sync {
    /// Persist `snapshot` as the complete set of known services
    async fn save(&self, snapshot: Arc<Snapshot>) -> Result<(), PersistenceError>;

    /// Load the last persisted snapshot, `None` when nothing was stored
    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError>;

    /// Release resources held by the store
    async fn close(&self) -> Result<(), PersistenceError> {
        Ok(())
    }

    /// `false` only for the no-op store
    fn is_configured(&self) -> bool {
        true
    }
}

/// Store used when persistence is not configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStore;

#[async_trait]
impl ServiceStore for NoopStore {
    async fn save(&self, _snapshot: Arc<Snapshot>) -> Result<(), PersistenceError> {
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        Ok(None)
    }

    fn is_configured(&self) -> bool {
        false
    }
}
