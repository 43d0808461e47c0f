//! Versioned schema for the sample history.
//!
//! The on-disk version lives in `meta.schema_version`. Each step below is
//! applied in its own transaction together with the version bump, and each
//! is written so that running it again against a store that already has
//! its changes is a no-op.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{BwError, Result};

/// Version written by this build
pub const CURRENT_VERSION: i64 = 3;

/// One forward schema step.
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub apply: fn(&Connection) -> rusqlite::Result<()>,
}

/// Every step, ascending by version
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create samples and meta tables",
        apply: create_base_tables,
    },
    Migration {
        version: 2,
        description: "add disk I/O columns",
        apply: add_disk_io_columns,
    },
    Migration {
        version: 3,
        description: "nullable metric columns, monotonic clock, committed ratio as fraction",
        apply: rebuild_with_nullable_metrics,
    },
];

fn create_base_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS samples (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            pressure_smoothed REAL NOT NULL,
            pressure_raw REAL NOT NULL,
            page_faults REAL NOT NULL,
            available_ram_bytes INTEGER NOT NULL,
            available_ram_percent REAL NOT NULL,
            committed_bytes INTEGER NOT NULL,
            committed_ratio REAL NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_samples_timestamp ON samples(timestamp);
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

const DISK_IO_COLUMNS: [&str; 4] = [
    "page_io_bytes_per_sec",
    "disk_read_bytes_per_sec",
    "disk_write_bytes_per_sec",
    "disk_percent_busy",
];

fn add_disk_io_columns(conn: &Connection) -> rusqlite::Result<()> {
    // Rows from before this step never measured disk I/O: leave them NULL.
    for column in DISK_IO_COLUMNS {
        if !column_exists(conn, "samples", column)? {
            conn.execute_batch(&format!("ALTER TABLE samples ADD COLUMN {} REAL", column))?;
        }
    }
    Ok(())
}

fn rebuild_with_nullable_metrics(conn: &Connection) -> rusqlite::Result<()> {
    if column_exists(conn, "samples", "monotonic")? {
        return Ok(());
    }
    // Version 2 stored committed_ratio in percent.
    conn.execute_batch(
        "CREATE TABLE samples_v3 (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            monotonic REAL,
            pressure_smoothed REAL NOT NULL,
            pressure_raw REAL NOT NULL,
            page_faults REAL,
            available_ram_bytes INTEGER,
            available_ram_percent REAL,
            committed_bytes INTEGER,
            committed_ratio REAL,
            page_io_bytes_per_sec REAL,
            disk_read_bytes_per_sec REAL,
            disk_write_bytes_per_sec REAL,
            disk_percent_busy REAL
        );
        INSERT INTO samples_v3 (
            id, timestamp, monotonic, pressure_smoothed, pressure_raw, page_faults,
            available_ram_bytes, available_ram_percent, committed_bytes, committed_ratio,
            page_io_bytes_per_sec, disk_read_bytes_per_sec, disk_write_bytes_per_sec,
            disk_percent_busy
        )
        SELECT
            id, timestamp, NULL, pressure_smoothed, pressure_raw, page_faults,
            available_ram_bytes, available_ram_percent, committed_bytes, committed_ratio / 100.0,
            page_io_bytes_per_sec, disk_read_bytes_per_sec, disk_write_bytes_per_sec,
            disk_percent_busy
        FROM samples;
        DROP TABLE samples;
        ALTER TABLE samples_v3 RENAME TO samples;
        CREATE INDEX IF NOT EXISTS idx_samples_timestamp ON samples(timestamp);",
    )
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
}

/// Schema version recorded in the store; 0 for an empty file.
pub fn read_version(conn: &Connection) -> Result<i64> {
    if !table_exists(conn, "meta")? {
        // A samples table without meta predates version tracking.
        return Ok(if table_exists(conn, "samples")? { 1 } else { 0 });
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(if table_exists(conn, "samples")? { 1 } else { 0 }),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| BwError::store(format!("unreadable schema version marker: {:?}", value))),
    }
}

fn ensure_meta_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn write_version(conn: &Connection, version: i64) -> rusqlite::Result<()> {
    ensure_meta_table(conn)?;
    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![version.to_string()],
    )?;
    Ok(())
}

/// Bring the store up to [`CURRENT_VERSION`]; returns the version found.
pub fn migrate(conn: &mut Connection) -> Result<i64> {
    let found = read_version(conn)?;
    if found > CURRENT_VERSION {
        return Err(BwError::IncompatibleSchema {
            found,
            supported: CURRENT_VERSION,
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > found) {
        log::info!(
            "Migrating store to schema version {} ({})",
            migration.version,
            migration.description
        );
        let tx = conn.transaction()?;
        (migration.apply)(&tx).map_err(|e| {
            BwError::store(format!(
                "migration to version {} failed: {}",
                migration.version, e
            ))
        })?;
        write_version(&tx, migration.version)?;
        tx.commit()?;
    }

    if found < CURRENT_VERSION {
        log::info!("Store migrated from version {} to {}", found, CURRENT_VERSION);
    }
    Ok(found)
}
