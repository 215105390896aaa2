use std::path::Path;
use std::sync::Arc;
use std::thread;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use anyhow::{Context, Result};
use shared::types::Snapshot;
use crate::error::PersistenceError;
use super::db::SnapshotDb;
use super::ServiceStore;

/// Commands sent to the store thread
pub enum StoreCommand {
    Save(Arc<Snapshot>, oneshot::Sender<Result<()>>),
    Load(oneshot::Sender<Result<Snapshot>>),
    Shutdown,
}

/// SQLite-backed [`ServiceStore`].
///
/// The connection lives on its own thread so database latency never lands on
/// the async workers.
#[derive(Clone)]
pub struct SqliteStore {
    tx: mpsc::Sender<StoreCommand>,
}

impl SqliteStore {
    /// Open the database at `path` and spawn its thread
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = SnapshotDb::open(path)?;
        Self::spawn(db)
    }

    /// Spawn a new store thread with the given database
    pub fn spawn(mut db: SnapshotDb) -> Result<Self> {
        let (tx, mut rx) = mpsc::channel::<StoreCommand>(16);

        thread::Builder::new()
            .name("jarvis-config-store".to_string())
            .spawn(move || {
                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        StoreCommand::Save(snapshot, reply) => {
                            let result = db.save_snapshot(&snapshot);
                            if result.is_ok() {
                                tracing::debug!("Saved {} services to database", snapshot.len());
                            }
                            let _ = reply.send(result);
                        }
                        StoreCommand::Load(reply) => {
                            let result = db.load_snapshot();
                            let _ = reply.send(result);
                        }
                        StoreCommand::Shutdown => {
                            tracing::info!("Store thread shutting down");
                            break;
                        }
                    }
                }
            })
            .context("Failed to spawn store thread")?;

        Ok(Self { tx })
    }

    async fn save_snapshot(&self, snapshot: Arc<Snapshot>) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Save(snapshot, reply))
            .await
            .map_err(|_| anyhow::anyhow!("store thread is not running"))?;
        rx.await.context("store thread dropped the reply")?
    }

    async fn load_snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(StoreCommand::Load(reply))
            .await
            .map_err(|_| anyhow::anyhow!("store thread is not running"))?;
        rx.await.context("store thread dropped the reply")?
    }

    /// Shutdown the store thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| anyhow::anyhow!("store thread is not running"))?;
        Ok(())
    }
}

#[async_trait]
impl ServiceStore for SqliteStore {
    async fn save(&self, snapshot: Arc<Snapshot>) -> Result<(), PersistenceError> {
        Ok(self.save_snapshot(snapshot).await?)
    }

    async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let snapshot = self.load_snapshot().await?;
        Ok((!snapshot.is_empty()).then_some(snapshot))
    }

    async fn close(&self) -> Result<(), PersistenceError> {
        Ok(self.shutdown().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::types::ServiceRecord;

    fn snapshot(name: &str, url: &str) -> Snapshot {
        Snapshot::from([(
            name.to_string(),
            ServiceRecord {
                name: name.to_string(),
                url: url.to_string(),
                host: None,
                port: None,
                health_path: "/health".to_string(),
                scheme: "http".to_string(),
                description: None,
                last_updated: Utc::now(),
            },
        )])
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert!(store.load().await.unwrap().is_none(), "Empty table loads as None");

        store.save(Arc::new(snapshot("svc-a", "http://h:1"))).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded["svc-a"].url, "http://h:1");
    }

    #[tokio::test]
    async fn test_closed_store_reports_errors() {
        let store = SqliteStore::open(":memory:").unwrap();
        store.close().await.unwrap();

        assert!(store.load().await.is_err());
        assert!(store.save(Arc::new(Snapshot::new())).await.is_err());
    }
}
