use std::collections::HashMap;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use crate::protocol::{DEFAULT_HEALTH_PATH, DEFAULT_SCHEME};

/// A resolved service.
/// Records are never mutated in place; a refresh replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Logical service name, e.g. "jarvis-auth"
    pub name: String,

    /// Base URL callers should use, e.g. "http://localhost:8007"
    pub url: String,

    pub host: Option<String>,

    pub port: Option<u16>,

    /// Health check path, "/health" unless the service says otherwise
    pub health_path: String,

    pub scheme: String,

    pub description: Option<String>,

    /// When this record was fetched (or last persisted)
    pub last_updated: DateTime<Utc>,
}

/// The complete mapping of service name to record
pub type Snapshot = HashMap<String, ServiceRecord>;

/// One entry of the `/services` listing as sent by the config service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_health_path")]
    pub health_path: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body of the `/services` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceListing {
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

impl ServiceDescriptor {
    pub fn into_record(self, fetched_at: DateTime<Utc>) -> ServiceRecord {
        ServiceRecord {
            name: self.name,
            url: self.url,
            host: self.host,
            port: self.port,
            health_path: self.health_path,
            scheme: self.scheme,
            description: self.description,
            last_updated: fetched_at,
        }
    }
}

impl ServiceListing {
    /// Build a snapshot from the listing. When a name appears twice the later entry wins.
    pub fn into_snapshot(self, fetched_at: DateTime<Utc>) -> Snapshot {
        self.services
            .into_iter()
            .map(|svc| (svc.name.clone(), svc.into_record(fetched_at)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_defaults() {
        let listing: ServiceListing = serde_json::from_str(
            r#"{"services": [{"name": "jarvis-auth", "url": "http://localhost:8007"}]}"#,
        )
        .unwrap();

        let snapshot = listing.into_snapshot(Utc::now());
        let auth = &snapshot["jarvis-auth"];
        assert_eq!(auth.url, "http://localhost:8007");
        assert_eq!(auth.health_path, "/health");
        assert_eq!(auth.scheme, "http");
        assert!(auth.host.is_none());
        assert!(auth.port.is_none());
    }

    #[test]
    fn test_listing_missing_services_is_empty() {
        let listing: ServiceListing = serde_json::from_str("{}").unwrap();
        assert!(listing.into_snapshot(Utc::now()).is_empty());
    }

    #[test]
    fn test_duplicate_names_later_wins() {
        let listing: ServiceListing = serde_json::from_str(
            r#"{"services": [
                {"name": "jarvis-logs", "url": "http://old:1"},
                {"name": "jarvis-logs", "url": "http://new:2", "port": 2}
            ]}"#,
        )
        .unwrap();

        let snapshot = listing.into_snapshot(Utc::now());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot["jarvis-logs"].url, "http://new:2");
        assert_eq!(snapshot["jarvis-logs"].port, Some(2));
    }
}
