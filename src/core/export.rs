use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::SecondsFormat;

use crate::core::store::StoredRecord;
use crate::error::Result;

pub const CSV_HEADER: &str = "timestamp,datetime,pressure_smoothed,pressure_raw,\
page_faults_per_sec,available_ram_bytes,available_ram_percent,committed_bytes,\
committed_ratio,page_io_bytes_per_sec,disk_read_bytes_per_sec,disk_write_bytes_per_sec,\
disk_percent_busy";

fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write records as CSV. Unavailable metrics are empty cells.
pub fn write_csv<W, I>(out: &mut W, records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = Result<StoredRecord>>,
{
    writeln!(out, "{}", CSV_HEADER)?;

    let mut rows = 0;
    for record in records {
        let record = record?;
        let raw = &record.sample.raw;
        let datetime = raw
            .timestamp
            .as_datetime()
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            raw.timestamp.wall,
            datetime,
            record.sample.pressure_smoothed,
            record.sample.pressure_raw,
            cell(raw.page_faults_per_sec),
            cell(raw.available_ram_bytes),
            cell(raw.available_ram_percent),
            cell(raw.committed_bytes),
            cell(raw.committed_ratio),
            cell(raw.page_io_bytes_per_sec),
            cell(raw.disk_read_bytes_per_sec),
            cell(raw.disk_write_bytes_per_sec),
            cell(raw.disk_percent_busy),
        )?;
        rows += 1;
    }

    out.flush()?;
    Ok(rows)
}

/// Export records to a CSV file at `path`; returns the row count.
pub fn export_to_file<I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = Result<StoredRecord>>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    let rows = write_csv(&mut writer, records)?;
    log::info!("Exported {} samples to {}", rows, path.display());
    Ok(rows)
}
