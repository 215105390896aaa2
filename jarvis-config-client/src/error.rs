//! Error taxonomy for the config client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration at start
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Accessor used before `init` or after `shutdown`
    #[error("config client not initialized, call init() first")]
    NotInitialized,

    /// Name absent from the current snapshot
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// Explicit refresh failed and there is no data to fall back on
    #[error("refresh failed with no fallback data: {0}")]
    Refresh(#[source] ResolveError),
}

/// A failed resolve against the config service.
///
/// Cloneable so a single in-flight refresh can hand its outcome to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

/// Durable store failure. Logged by the scheduler, never returned to callers.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct PersistenceError(#[from] pub anyhow::Error);
