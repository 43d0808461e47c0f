//! Durable history of derived samples, backed by SQLite.
//!
//! One [`Store`] owns the writable connection and lives on the collection
//! thread. Presentation code opens its own [`StoreReader`]; the database
//! runs in WAL mode so readers never block the writer.

mod cursor;
pub mod schema;

pub use cursor::RecordCursor;
pub use schema::CURRENT_VERSION;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::core::pressure::DerivedSample;
use crate::core::sampling::{RawSample, SampleTime};
use crate::error::{BwError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) const RECORD_COLUMNS: &str = "id, timestamp, monotonic, pressure_smoothed, \
    pressure_raw, page_faults, available_ram_bytes, available_ram_percent, committed_bytes, \
    committed_ratio, page_io_bytes_per_sec, disk_read_bytes_per_sec, disk_write_bytes_per_sec, \
    disk_percent_busy";

/// A persisted sample and its row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    #[serde(flatten)]
    pub sample: DerivedSample,
}

pub(crate) fn record_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecord> {
    let wall: f64 = row.get(1)?;
    // Rows migrated from before the monotonic column reuse wall time.
    let monotonic: Option<f64> = row.get(2)?;
    let bytes = |idx: usize| -> rusqlite::Result<Option<u64>> {
        Ok(row.get::<_, Option<i64>>(idx)?.map(|v| v.max(0) as u64))
    };

    Ok(StoredRecord {
        id: row.get(0)?,
        sample: DerivedSample {
            raw: RawSample {
                timestamp: SampleTime {
                    wall,
                    monotonic: monotonic.unwrap_or(wall),
                },
                page_faults_per_sec: row.get(5)?,
                available_ram_bytes: bytes(6)?,
                available_ram_percent: row.get(7)?,
                committed_bytes: bytes(8)?,
                committed_ratio: row.get(9)?,
                page_io_bytes_per_sec: row.get(10)?,
                disk_read_bytes_per_sec: row.get(11)?,
                disk_write_bytes_per_sec: row.get(12)?,
                disk_percent_busy: row.get(13)?,
            },
            pressure_smoothed: row.get(3)?,
            pressure_raw: row.get(4)?,
        },
    })
}

/// Force SQLite to read the header so a foreign or damaged file fails here.
fn probe(conn: &Connection, path: &Path) -> Result<()> {
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|_| ())
    .map_err(|e| {
        BwError::store(format!(
            "{} is not a readable history database: {}",
            path.display(),
            e
        ))
    })
}

fn latest_in(conn: &Connection) -> Result<Option<StoredRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT {} FROM samples ORDER BY timestamp DESC, id DESC LIMIT 1",
                RECORD_COLUMNS
            ),
            [],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn count_in(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM samples", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

fn since(span: Duration) -> (f64, f64) {
    let now = SampleTime::now().wall;
    (now - span.as_secs_f64(), now)
}

/// Writable handle to the history database.
pub struct Store {
    conn: Connection,
    path: PathBuf,
    last_timestamp: Option<f64>,
}

impl Store {
    /// Open (creating if needed) and migrate the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            BwError::store(format!("failed to open {}: {}", path.display(), e))
        })?;
        probe(&conn, path)?;

        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        log::debug!("Store journal mode: {}", mode);
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Self::initialize(conn, path.to_path_buf())
    }

    /// Store that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, PathBuf::from(":memory:"))
    }

    fn initialize(mut conn: Connection, path: PathBuf) -> Result<Self> {
        let found = schema::migrate(&mut conn)?;
        log::info!(
            "Store opened at {} (schema version {}, was {})",
            path.display(),
            CURRENT_VERSION,
            found
        );

        let last_timestamp = latest_in(&conn)?.map(|r| r.sample.raw.timestamp.wall);
        Ok(Self {
            conn,
            path,
            last_timestamp,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist one derived sample; returns its row id.
    pub fn append(&mut self, sample: &DerivedSample) -> Result<i64> {
        let raw = &sample.raw;
        if let Some(last) = self.last_timestamp {
            if raw.timestamp.wall < last {
                log::warn!(
                    "Appending sample at {:.3} older than previous {:.3}; wall clock moved backwards",
                    raw.timestamp.wall,
                    last
                );
            }
        }

        self.conn.execute(
            "INSERT INTO samples (
                timestamp, monotonic, pressure_smoothed, pressure_raw, page_faults,
                available_ram_bytes, available_ram_percent, committed_bytes, committed_ratio,
                page_io_bytes_per_sec, disk_read_bytes_per_sec, disk_write_bytes_per_sec,
                disk_percent_busy
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                raw.timestamp.wall,
                raw.timestamp.monotonic,
                sample.pressure_smoothed,
                sample.pressure_raw,
                raw.page_faults_per_sec,
                raw.available_ram_bytes.map(|v| v.min(i64::MAX as u64) as i64),
                raw.available_ram_percent,
                raw.committed_bytes.map(|v| v.min(i64::MAX as u64) as i64),
                raw.committed_ratio,
                raw.page_io_bytes_per_sec,
                raw.disk_read_bytes_per_sec,
                raw.disk_write_bytes_per_sec,
                raw.disk_percent_busy,
            ],
        )?;

        self.last_timestamp = Some(
            self.last_timestamp
                .map_or(raw.timestamp.wall, |last| last.max(raw.timestamp.wall)),
        );
        Ok(self.conn.last_insert_rowid())
    }

    /// Records with `start <= timestamp <= end`, ascending.
    pub fn query(&self, start: f64, end: f64) -> RecordCursor<'_> {
        RecordCursor::new(&self.conn, start, end)
    }

    /// Records from the last `span` of wall-clock time.
    pub fn query_last(&self, span: Duration) -> RecordCursor<'_> {
        let (start, end) = since(span);
        self.query(start, end)
    }

    pub fn latest(&self) -> Result<Option<StoredRecord>> {
        latest_in(&self.conn)
    }

    pub fn count(&self) -> Result<u64> {
        count_in(&self.conn)
    }

    pub fn schema_version(&self) -> Result<i64> {
        schema::read_version(&self.conn)
    }

    /// Delete records older than `older_than` relative to now.
    pub fn prune(&mut self, older_than: Duration) -> Result<usize> {
        let cutoff = SampleTime::now().wall - older_than.as_secs_f64();
        self.prune_before(cutoff)
    }

    /// Delete records with `timestamp < cutoff` and reclaim their space.
    pub fn prune_before(&mut self, cutoff: f64) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM samples WHERE timestamp < ?1", params![cutoff])?;

        if deleted > 0 {
            log::info!("Pruned {} samples older than {:.0}", deleted, cutoff);
            self.vacuum()?;
        } else {
            log::debug!("Nothing to prune before {:.0}", cutoff);
        }
        Ok(deleted)
    }

    /// Delete every record.
    pub fn clear_all(&mut self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM samples", [])?;
        self.vacuum()?;
        self.last_timestamp = None;
        log::info!("Cleared {} samples", deleted);
        Ok(deleted)
    }

    fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM")?;
        Ok(())
    }
}

/// Read-only handle for presentation queries.
///
/// Refuses stores that are not at [`CURRENT_VERSION`]; only a [`Store`]
/// migrates.
pub struct StoreReader {
    conn: Connection,
}

impl StoreReader {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BwError::store(format!(
                "no history database at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| BwError::store(format!("failed to open {}: {}", path.display(), e)))?;
        probe(&conn, path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        let version = schema::read_version(&conn)?;
        if version > CURRENT_VERSION {
            return Err(BwError::IncompatibleSchema {
                found: version,
                supported: CURRENT_VERSION,
            });
        }
        if version < CURRENT_VERSION {
            return Err(BwError::store(format!(
                "history database is at schema version {}; run the collector once to migrate it",
                version
            )));
        }

        Ok(Self { conn })
    }

    pub fn query(&self, start: f64, end: f64) -> RecordCursor<'_> {
        RecordCursor::new(&self.conn, start, end)
    }

    pub fn query_last(&self, span: Duration) -> RecordCursor<'_> {
        let (start, end) = since(span);
        self.query(start, end)
    }

    pub fn latest(&self) -> Result<Option<StoredRecord>> {
        latest_in(&self.conn)
    }

    pub fn count(&self) -> Result<u64> {
        count_in(&self.conn)
    }

    pub fn schema_version(&self) -> Result<i64> {
        schema::read_version(&self.conn)
    }
}
