use std::path::Path;
use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use shared::types::{ServiceRecord, Snapshot};
use chrono::Utc;

pub struct SnapshotDb {
    conn: Connection,
}

impl SnapshotDb {
    /// Open or create the SQLite database with WAL mode enabled
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // Enable WAL mode for better concurrency and crash recovery
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS service_configs (
                name         TEXT PRIMARY KEY,
                host         TEXT,
                port         INTEGER,
                url          TEXT NOT NULL,
                health_path  TEXT NOT NULL,
                scheme       TEXT NOT NULL DEFAULT 'http',
                description  TEXT,
                updated_at   TEXT NOT NULL
            );
            "#,
        )
        .context("Failed to create database schema")?;

        Ok(Self { conn })
    }

    /// Make the table hold exactly `snapshot`, in one transaction
    pub fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let tx = self.conn.transaction().context("Failed to begin transaction")?;

        {
            let mut upsert = tx
                .prepare(
                    r#"
                    INSERT INTO service_configs (
                        name, host, port, url, health_path, scheme, description, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(name) DO UPDATE SET
                        host = excluded.host,
                        port = excluded.port,
                        url = excluded.url,
                        health_path = excluded.health_path,
                        scheme = excluded.scheme,
                        description = excluded.description,
                        updated_at = excluded.updated_at
                    "#,
                )
                .context("Failed to prepare upsert")?;

            for record in snapshot.values() {
                upsert
                    .execute(params![
                        &record.name,
                        &record.host,
                        record.port,
                        &record.url,
                        &record.health_path,
                        &record.scheme,
                        &record.description,
                        record.last_updated.to_rfc3339(),
                    ])
                    .with_context(|| format!("Failed to upsert service {}", record.name))?;
            }

            let stored: Vec<String> = tx
                .prepare("SELECT name FROM service_configs")
                .context("Failed to prepare query")?
                .query_map([], |row| row.get(0))
                .context("Failed to query service names")?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to collect service names")?;

            let mut delete = tx
                .prepare("DELETE FROM service_configs WHERE name = ?1")
                .context("Failed to prepare delete")?;
            for name in stored.iter().filter(|name| !snapshot.contains_key(name.as_str())) {
                delete
                    .execute(params![name])
                    .with_context(|| format!("Failed to remove service {}", name))?;
            }
        }

        tx.commit().context("Failed to commit snapshot")?;
        Ok(())
    }

    /// Load every stored service
    pub fn load_snapshot(&self) -> Result<Snapshot> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name, host, port, url, health_path, scheme, description, updated_at
                 FROM service_configs"
            )
            .context("Failed to prepare query")?;

        let records = stmt
            .query_map([], Self::row_to_record)
            .context("Failed to query services")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect services")?;

        Ok(records.into_iter().map(|r| (r.name.clone(), r)).collect())
    }

    /// Helper to convert a database row to ServiceRecord
    fn row_to_record(row: &rusqlite::Row) -> Result<ServiceRecord, rusqlite::Error> {
        let updated_at: String = row.get(7)?;

        let last_updated = chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                Box::new(e),
            ))?
            .with_timezone(&Utc);

        Ok(ServiceRecord {
            name: row.get(0)?,
            host: row.get(1)?,
            port: row.get::<_, Option<u16>>(2)?,
            url: row.get(3)?,
            health_path: row.get(4)?,
            scheme: row.get(5)?,
            description: row.get(6)?,
            last_updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, url: &str) -> ServiceRecord {
        ServiceRecord {
            name: name.to_string(),
            url: url.to_string(),
            host: Some("localhost".to_string()),
            port: Some(8007),
            health_path: "/health".to_string(),
            scheme: "http".to_string(),
            description: Some("Authentication service".to_string()),
            last_updated: Utc::now(),
        }
    }

    fn snapshot(records: Vec<ServiceRecord>) -> Snapshot {
        records.into_iter().map(|r| (r.name.clone(), r)).collect()
    }

    #[test]
    fn test_save_and_load() {
        let mut db = SnapshotDb::open(":memory:").unwrap();
        assert!(db.load_snapshot().unwrap().is_empty());

        let saved = snapshot(vec![record("jarvis-auth", "http://localhost:8007")]);
        db.save_snapshot(&saved).unwrap();

        let loaded = db.load_snapshot().unwrap();
        let auth = &loaded["jarvis-auth"];
        assert_eq!(auth.url, "http://localhost:8007");
        assert_eq!(auth.port, Some(8007));
        assert_eq!(auth.description.as_deref(), Some("Authentication service"));
        assert_eq!(auth.last_updated.timestamp(), saved["jarvis-auth"].last_updated.timestamp());
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let mut db = SnapshotDb::open(":memory:").unwrap();

        db.save_snapshot(&snapshot(vec![
            record("jarvis-auth", "http://localhost:8007"),
            record("jarvis-logs", "http://localhost:8006"),
        ]))
        .unwrap();

        db.save_snapshot(&snapshot(vec![record("jarvis-auth", "http://auth:9000")])).unwrap();

        let loaded = db.load_snapshot().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["jarvis-auth"].url, "http://auth:9000");
    }

    #[test]
    fn test_optional_fields_round_trip_as_null() {
        let mut db = SnapshotDb::open(":memory:").unwrap();
        let mut bare = record("svc-a", "http://h:1");
        bare.host = None;
        bare.port = None;
        bare.description = None;

        db.save_snapshot(&snapshot(vec![bare])).unwrap();

        let loaded = db.load_snapshot().unwrap();
        assert!(loaded["svc-a"].host.is_none());
        assert!(loaded["svc-a"].port.is_none());
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("services.db");

        {
            let mut db = SnapshotDb::open(&path).unwrap();
            db.save_snapshot(&snapshot(vec![record("svc-a", "http://h:1")])).unwrap();
        }

        let db = SnapshotDb::open(&path).unwrap();
        assert_eq!(db.load_snapshot().unwrap()["svc-a"].url, "http://h:1");
    }
}
