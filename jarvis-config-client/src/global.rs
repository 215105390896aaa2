//! Process-wide client for the common single-instance case.
//!
//! ```ignore
//! jarvis_config_client::init(ClientConfig::new("http://localhost:8013")).await?;
//! let auth_url = jarvis_config_client::get_service_url("jarvis-auth")?;
//! jarvis_config_client::shutdown().await;
//! ```

use parking_lot::RwLock;
use shared::types::Snapshot;
use crate::client::{ClientBuilder, ConfigClient};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::scheduler::RefreshOutcome;

static CLIENT: RwLock<Option<ConfigClient>> = parking_lot::const_rwlock(None);

/// Serializes init and shutdown
static LIFECYCLE: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());

/// Initialize the global client with default collaborators.
///
/// Returns true if the initial fetch succeeded, false if starting from
/// cached or no data.
pub async fn init(config: ClientConfig) -> ClientResult<bool> {
    init_with(ConfigClient::builder(config)).await
}

/// Initialize the global client from a configured builder.
///
/// If a client is already running it is shut down first and replaced.
pub async fn init_with(builder: ClientBuilder) -> ClientResult<bool> {
    let _lifecycle = LIFECYCLE.lock().await;

    let previous = CLIENT.write().take();
    if let Some(previous) = previous {
        tracing::warn!("Config client already initialized, reinitializing");
        previous.shutdown().await;
    }

    let client = builder.start().await?;
    let initial_fetch_succeeded = client.initial_fetch_succeeded();
    *CLIENT.write() = Some(client);

    Ok(initial_fetch_succeeded)
}

/// Shut down the global client. A no-op when not initialized.
pub async fn shutdown() {
    let _lifecycle = LIFECYCLE.lock().await;

    let client = CLIENT.write().take();
    if let Some(client) = client {
        client.shutdown().await;
    }
}

/// Stops the global client when dropped. Hold it for the life of `main`.
///
/// Drop cannot await, so this stops background refresh without the bounded
/// wait of [`shutdown`]. An owned store's thread exits once the client's
/// last handle is gone.
#[must_use = "the global client is stopped when the guard is dropped"]
pub struct ExitGuard {
    _private: (),
}

pub fn exit_guard() -> ExitGuard {
    ExitGuard { _private: () }
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        let client = CLIENT.write().take();
        if let Some(client) = client {
            tracing::info!("Stopping config client on exit");
            client.stop();
        }
    }
}

/// The running global client
pub fn client() -> ClientResult<ConfigClient> {
    CLIENT.read().clone().ok_or(ClientError::NotInitialized)
}

pub fn get_service_url(name: &str) -> ClientResult<String> {
    client()?.service_url(name)
}

pub fn get_all_services() -> ClientResult<Snapshot> {
    Ok(client()?.all_services())
}

pub async fn refresh_services() -> ClientResult<RefreshOutcome> {
    client()?.refresh().await
}
