//! Service discovery for jarvis microservices.
//!
//! Resolves service names to URLs through jarvis-config-service, caches the
//! answer in memory, refreshes it in the background and falls back to the last
//! known services (optionally persisted in SQLite) when the config service is
//! unreachable.
//!
//! Use [`ConfigClient`] directly, or the process-wide functions
//! [`init`], [`get_service_url`], [`get_all_services`], [`refresh_services`]
//! and [`shutdown`].

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod global;
pub mod hash;
pub mod listener;
pub mod resolver;
pub mod scheduler;
pub mod store;

pub use cache::{RefreshState, ServiceCache};
pub use client::{ClientBuilder, ConfigClient};
pub use config::{ClientConfig, Settings};
pub use error::{ClientError, ClientResult, PersistenceError, ResolveError};
pub use global::{exit_guard, get_all_services, get_service_url, init, init_with, refresh_services, shutdown, ExitGuard};
pub use listener::{NoopListener, RefreshListener};
pub use resolver::{HttpResolver, Resolver};
pub use scheduler::RefreshOutcome;
pub use shared::types::{ServiceRecord, Snapshot};
pub use store::{NoopStore, ServiceStore, SqliteStore};
