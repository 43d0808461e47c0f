use std::collections::VecDeque;

use rusqlite::{params, Connection};

use super::{record_from_row, StoredRecord, RECORD_COLUMNS};
use crate::error::Result;

const DEFAULT_PAGE_SIZE: usize = 512;

/// Lazy, ordered iteration over a timestamp range.
///
/// Rows are fetched a page at a time with keyset pagination on
/// `(timestamp, id)`, so an arbitrarily large range never sits in memory
/// and no statement stays open between pages. Records appended behind the
/// cursor while it is being consumed show up if they fall in the range.
pub struct RecordCursor<'c> {
    conn: &'c Connection,
    start: f64,
    end: f64,
    page_size: usize,
    after: Option<(f64, i64)>,
    buffer: VecDeque<StoredRecord>,
    exhausted: bool,
}

impl<'c> RecordCursor<'c> {
    pub(crate) fn new(conn: &'c Connection, start: f64, end: f64) -> Self {
        Self {
            conn,
            start,
            end,
            page_size: DEFAULT_PAGE_SIZE,
            after: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Start over from the beginning of the range.
    pub fn restart(&mut self) {
        self.after = None;
        self.buffer.clear();
        self.exhausted = false;
    }

    /// Drain the remaining records into a vector.
    pub fn collect_all(self) -> Result<Vec<StoredRecord>> {
        self.collect()
    }

    fn fetch_page(&mut self) -> Result<()> {
        let limit = self.page_size as i64;
        let rows: Vec<StoredRecord> = match self.after {
            None => {
                let mut stmt = self.conn.prepare_cached(&format!(
                    "SELECT {} FROM samples
                     WHERE timestamp >= ?1 AND timestamp <= ?2
                     ORDER BY timestamp ASC, id ASC
                     LIMIT ?3",
                    RECORD_COLUMNS
                ))?;
                let rows = stmt.query_map(params![self.start, self.end, limit], record_from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
            Some((timestamp, id)) => {
                let mut stmt = self.conn.prepare_cached(&format!(
                    "SELECT {} FROM samples
                     WHERE timestamp <= ?1
                       AND (timestamp > ?2 OR (timestamp = ?2 AND id > ?3))
                     ORDER BY timestamp ASC, id ASC
                     LIMIT ?4",
                    RECORD_COLUMNS
                ))?;
                let rows = stmt.query_map(params![self.end, timestamp, id, limit], record_from_row)?;
                rows.collect::<rusqlite::Result<_>>()?
            }
        };

        if rows.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.after = Some((last.sample.raw.timestamp.wall, last.id));
        }
        self.buffer.extend(rows);
        Ok(())
    }
}

impl Iterator for RecordCursor<'_> {
    type Item = Result<StoredRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
