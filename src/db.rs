use std::path::Path;
use std::sync::Mutex;

use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::ExtractError;
use crate::types::AuditRecord;

pub const DEFAULT_DB_PATH: &str = "data/aeo.sqlite";

/// Where finished audit records go.
pub trait AuditStore: Send + Sync {
    fn persist(&self, record: &AuditRecord) -> Result<(), ExtractError>;
}

// ── SQLite ──

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn connect(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| ExtractError::Storage(format!("{}: {}", dir.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, ExtractError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ExtractError> {
        init_schema(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, ExtractError> {
        self.conn
            .lock()
            .map_err(|_| ExtractError::Storage("connection lock poisoned".into()))
    }

    /// Most recent audits first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AuditSummary>, ExtractError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, site_id, url, pages_crawled, pages_failed, success, partial,
                    COALESCE(brand_name, ''), issue_count, created_at
             FROM audits
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AuditSummary {
                    id: row.get(0)?,
                    site_id: row.get(1)?,
                    url: row.get(2)?,
                    pages_crawled: row.get(3)?,
                    pages_failed: row.get(4)?,
                    success: row.get(5)?,
                    partial: row.get(6)?,
                    brand_name: row.get(7)?,
                    issue_count: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Latest full record stored for a site.
    pub fn latest(&self, site_id: &str) -> Result<Option<AuditRecord>, ExtractError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT record FROM audits WHERE site_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![site_id],
                |r| r.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<Stats, ExtractError> {
        let conn = self.conn()?;
        let audits: usize = conn.query_row("SELECT COUNT(*) FROM audits", [], |r| r.get(0))?;
        let sites: usize =
            conn.query_row("SELECT COUNT(DISTINCT site_id) FROM audits", [], |r| r.get(0))?;
        let succeeded: usize =
            conn.query_row("SELECT COUNT(*) FROM audits WHERE success = 1", [], |r| r.get(0))?;
        let partial: usize =
            conn.query_row("SELECT COUNT(*) FROM audits WHERE partial = 1", [], |r| r.get(0))?;
        let pages: usize = conn.query_row(
            "SELECT COALESCE(SUM(pages_crawled), 0) FROM audits",
            [],
            |r| r.get(0),
        )?;
        Ok(Stats {
            audits,
            sites,
            succeeded,
            failed: audits - succeeded,
            partial,
            pages,
        })
    }
}

impl AuditStore for SqliteStore {
    fn persist(&self, record: &AuditRecord) -> Result<(), ExtractError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO audits
                (site_id, url, pages_crawled, pages_failed, success, partial,
                 brand_name, bundle, issues, issue_count, record, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.site_id,
                record.url,
                record.pages_crawled as i64,
                record.pages_failed as i64,
                record.success,
                record.partial,
                record.signal_bundle.brand_name,
                serde_json::to_string(&record.signal_bundle)?,
                serde_json::to_string(&record.issues)?,
                record.issues.len() as i64,
                serde_json::to_string(record)?,
                record.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

pub fn init_schema(conn: &Connection) -> Result<(), ExtractError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS audits (
            id            INTEGER PRIMARY KEY,
            site_id       TEXT NOT NULL,
            url           TEXT NOT NULL,
            pages_crawled INTEGER NOT NULL,
            pages_failed  INTEGER NOT NULL DEFAULT 0,
            success       BOOLEAN NOT NULL,
            partial       BOOLEAN NOT NULL DEFAULT 0,
            brand_name    TEXT,
            bundle        TEXT NOT NULL,
            issues        TEXT NOT NULL DEFAULT '[]',
            issue_count   INTEGER NOT NULL DEFAULT 0,
            record        TEXT NOT NULL,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audits_site ON audits(site_id, created_at);
        ",
    )?;
    Ok(())
}

// ── In-memory ──

/// Keeps records in a vector.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditStore for MemoryStore {
    fn persist(&self, record: &AuditRecord) -> Result<(), ExtractError> {
        self.records
            .lock()
            .map_err(|_| ExtractError::Storage("memory store lock poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

// ── Reporting ──

pub struct AuditSummary {
    pub id: i64,
    pub site_id: String,
    pub url: String,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub success: bool,
    pub partial: bool,
    pub brand_name: String,
    pub issue_count: usize,
    pub created_at: String,
}

pub struct Stats {
    pub audits: usize,
    pub sites: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub partial: usize,
    pub pages: usize,
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{build_record, AuditTarget};
    use crate::types::SignalBundle;

    fn record(url: &str, crawled: usize, failed: usize) -> AuditRecord {
        let bundle = SignalBundle {
            brand_name: Some("Acme".into()),
            topics: vec!["widgets".into()],
            ..Default::default()
        };
        build_record(&AuditTarget::from_url(url), bundle, crawled, failed, vec![])
    }

    #[test]
    fn record_round_trips_through_sqlite() {
        let store = SqliteStore::open_in_memory().unwrap();
        let rec = record("https://www.acme.test", 3, 1);
        store.persist(&rec).unwrap();

        let back = store.latest("acme.test").unwrap().unwrap();
        assert_eq!(back, rec);
        assert!(store.latest("globex.test").unwrap().is_none());
    }

    #[test]
    fn recent_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::connect(dir.path().join("nested/aeo.sqlite")).unwrap();
        store.persist(&record("https://acme.test", 3, 0)).unwrap();
        store.persist(&record("https://acme.test", 2, 1)).unwrap();
        store.persist(&record("https://globex.test", 0, 4)).unwrap();

        let recent = store.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].site_id, "globex.test");
        assert!(!recent[0].success);
        assert_eq!(recent[0].brand_name, "");
        assert_eq!(recent[0].issue_count, 1);

        let s = store.stats().unwrap();
        assert_eq!(s.audits, 3);
        assert_eq!(s.sites, 2);
        assert_eq!(s.succeeded, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.partial, 1);
        assert_eq!(s.pages, 5);
    }

    #[test]
    fn memory_store_collects_records() {
        let store = MemoryStore::new();
        store.persist(&record("https://acme.test", 1, 0)).unwrap();
        assert_eq!(store.records().len(), 1);
    }
}
