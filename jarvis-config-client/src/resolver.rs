//! Fetching the service listing from jarvis-config-service.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::protocol::{SERVICES_PATH, STYLE_DOCKERIZED, STYLE_PARAM};
use shared::types::{ServiceListing, Snapshot};
use crate::config::Settings;
use crate::error::{ClientError, ResolveError};

/// Source of the full name → record mapping.
///
/// One call is one resolve: it returns a complete snapshot or fails.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self) -> Result<Snapshot, ResolveError>;
}

/// Resolver issuing `GET {endpoint}/services`
pub struct HttpResolver {
    client: reqwest::Client,
    url: String,
    dockerized: bool,
}

impl HttpResolver {
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| ClientError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}{}", settings.endpoint, SERVICES_PATH),
            dockerized: settings.dockerized,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> ResolveError {
        if e.is_timeout() {
            ResolveError::Timeout { url: self.url.clone() }
        } else {
            ResolveError::Transport { url: self.url.clone(), message: e.to_string() }
        }
    }
}

#[async_trait]
impl Resolver for HttpResolver {
    async fn resolve(&self) -> Result<Snapshot, ResolveError> {
        let mut request = self.client.get(&self.url);
        if self.dockerized {
            request = request.query(&[(STYLE_PARAM, STYLE_DOCKERIZED)]);
        }

        let response = request.send().await.map_err(|e| self.request_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::Status { status: status.as_u16(), url: self.url.clone() });
        }

        let body = response.bytes().await.map_err(|e| self.request_error(e))?;
        let snapshot = parse_listing(&body, Utc::now()).map_err(|e| ResolveError::Malformed {
            url: self.url.clone(),
            message: e.to_string(),
        })?;

        tracing::info!("Fetched {} services from {}", snapshot.len(), self.url);
        Ok(snapshot)
    }
}

/// Decode a `/services` body into a snapshot stamped with `fetched_at`
pub fn parse_listing(body: &[u8], fetched_at: DateTime<Utc>) -> Result<Snapshot, serde_json::Error> {
    let listing: ServiceListing = serde_json::from_slice(body)?;
    Ok(listing.into_snapshot(fetched_at))
}
