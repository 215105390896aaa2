use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::Snapshot;

/// Only the stable fields. `last_updated` moves on every refresh but does not
/// mean the service moved.
#[derive(Serialize)]
struct FingerprintView<'a> {
    name: &'a str,
    url: &'a str,
    host: Option<&'a str>,
    port: Option<u16>,
    health_path: &'a str,
    scheme: &'a str,
    description: Option<&'a str>,
}

/// Computes a SHA-256 fingerprint of a snapshot.
/// Records are sorted by name for deterministic output.
pub fn fingerprint(snapshot: &Snapshot) -> String {
    let mut records: Vec<_> = snapshot.values().collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = Sha256::new();
    for record in records {
        let view = FingerprintView {
            name: &record.name,
            url: &record.url,
            host: record.host.as_deref(),
            port: record.port,
            health_path: &record.health_path,
            scheme: &record.scheme,
            description: record.description.as_deref(),
        };
        // Serializing plain strings and integers cannot fail
        if let Ok(line) = serde_json::to_vec(&view) {
            hasher.update(&line);
            hasher.update(b"\n");
        }
    }

    hex::encode(hasher.finalize())
}
