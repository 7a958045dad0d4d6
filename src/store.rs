/// SQLite persistence for decoded sidecars and their matched videos
///
/// Every statement is parameterized; field values never reach SQL text.
use anyhow::{Context, Result};
use modd_core::{MetadataRecord, VideoDescriptor, VideoIndex};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sidecar (
    check_code TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    date_time INTEGER,
    duration REAL NOT NULL,
    declared_size INTEGER NOT NULL,
    source_path TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS video (
    content_hash TEXT PRIMARY KEY,
    check_code TEXT REFERENCES sidecar(check_code),
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    size INTEGER NOT NULL,
    container TEXT NOT NULL,
    date_time INTEGER,
    duration REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_video_check_code ON video(check_code);
"#;

/// What an upsert did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

/// Counts from a sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records skipped because a later record carried the same check code
    pub superseded: usize,
    pub videos: usize,
}

impl SyncStats {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

/// Column values of a `sidecar` row
#[derive(Debug, PartialEq)]
struct SidecarRow {
    display_name: String,
    date_time: Option<i64>,
    duration: f64,
    declared_size: i64,
    source_path: String,
}

impl SidecarRow {
    fn from_record(record: &MetadataRecord) -> Self {
        Self {
            display_name: record.display_name.clone(),
            date_time: record.actual_timestamp.map(|t| t.timestamp()),
            duration: record.duration_seconds,
            declared_size: size_to_sql(record.file_size_bytes),
            source_path: record.source_path.to_string_lossy().into_owned(),
        }
    }
}

/// SQLite integers are signed
fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open or create the database and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("Failed to create schema")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self { conn })
    }

    /// Insert a record, or bring the row with the same check code up to date
    pub fn upsert_record(&self, record: &MetadataRecord) -> Result<UpsertOutcome> {
        upsert_record(&self.conn, record)
    }

    /// Store a matched video; a row with the same hash is replaced. The linked
    /// sidecar row is only written when none exists for its check code.
    pub fn upsert_video(&self, video: &VideoDescriptor) -> Result<Option<UpsertOutcome>> {
        upsert_video(&self.conn, video)
    }

    /// Upsert every record, then every indexed video, in one transaction.
    ///
    /// Records sharing a check code (copies of the same sidecar) are written
    /// once, last one wins, so repeating a sync reports everything unchanged.
    pub fn sync<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a MetadataRecord>,
        index: &VideoIndex,
    ) -> Result<SyncStats> {
        let records: Vec<&MetadataRecord> = records.into_iter().collect();
        let last_seen: HashMap<&str, usize> = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.check_code.as_str(), i))
            .collect();

        let tx = self.conn.transaction()?;

        let mut stats = SyncStats::default();
        for (i, record) in records.iter().enumerate() {
            if last_seen[record.check_code.as_str()] != i {
                debug!("Sidecar {} superseded by a later copy", record.source_path.display());
                stats.superseded += 1;
                continue;
            }
            stats.record(upsert_record(&tx, record)?);
        }
        for video in index.descriptors() {
            if let Some(outcome) = upsert_video(&tx, video)? {
                stats.record(outcome);
            }
            stats.videos += 1;
        }
        tx.commit()?;

        info!(
            "💾 Sync complete: {} inserted, {} updated, {} unchanged, {} videos",
            stats.inserted, stats.updated, stats.unchanged, stats.videos
        );
        Ok(stats)
    }

    pub fn sidecar_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sidecar", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn video_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM video", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Check code stored for a content hash (hex), if any
    pub fn check_code_for_hash(&self, hash: &str) -> Result<Option<String>> {
        let code = self
            .conn
            .query_row(
                "SELECT check_code FROM video WHERE content_hash = ?1",
                [hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(code)
    }
}

fn upsert_record(conn: &Connection, record: &MetadataRecord) -> Result<UpsertOutcome> {
    let incoming = SidecarRow::from_record(record);

    let existing = conn
        .query_row(
            "SELECT display_name, date_time, duration, declared_size, source_path \
             FROM sidecar WHERE check_code = ?1",
            [&record.check_code],
            |row| {
                Ok(SidecarRow {
                    display_name: row.get(0)?,
                    date_time: row.get(1)?,
                    duration: row.get(2)?,
                    declared_size: row.get(3)?,
                    source_path: row.get(4)?,
                })
            },
        )
        .optional()?;

    let sql = match existing {
        None => {
            "INSERT INTO sidecar (check_code, display_name, date_time, duration, declared_size, source_path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        }
        Some(stored) if stored == incoming => return Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            "UPDATE sidecar SET display_name = ?2, date_time = ?3, duration = ?4, \
             declared_size = ?5, source_path = ?6 WHERE check_code = ?1"
        }
    };
    let outcome = if sql.starts_with("INSERT") {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Updated
    };

    conn.execute(
        sql,
        params![
            record.check_code,
            incoming.display_name,
            incoming.date_time,
            incoming.duration,
            incoming.declared_size,
            incoming.source_path
        ],
    )?;

    debug!("{:?} sidecar {}", outcome, record.check_code);
    Ok(outcome)
}

/// Insert the record only if its check code is not stored yet
fn insert_missing_record(conn: &Connection, record: &MetadataRecord) -> Result<Option<UpsertOutcome>> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM sidecar WHERE check_code = ?1",
            [&record.check_code],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if exists {
        Ok(None)
    } else {
        upsert_record(conn, record).map(Some)
    }
}

fn upsert_video(conn: &Connection, video: &VideoDescriptor) -> Result<Option<UpsertOutcome>> {
    let linked = insert_missing_record(conn, &video.linked_record)?;

    let container = serde_json::to_value(video.container_kind)?;
    conn.execute(
        "INSERT INTO video (content_hash, check_code, name, location, size, container, date_time, duration) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT(content_hash) DO UPDATE SET \
            check_code = excluded.check_code, name = excluded.name, location = excluded.location, \
            size = excluded.size, container = excluded.container, \
            date_time = excluded.date_time, duration = excluded.duration",
        params![
            video.content_hash.to_string(),
            video.linked_record.check_code,
            video.name,
            video.matched_path.to_string_lossy(),
            size_to_sql(video.size),
            container.as_str().unwrap_or("unknown"),
            video.creation_time.map(|t| t.timestamp()),
            video.duration_seconds
        ],
    )?;
    Ok(linked)
}
