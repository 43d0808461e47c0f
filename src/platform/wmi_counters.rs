//! Windows performance counters via WMI.
//!
//! WMI sits on COM, whose objects are bound to the thread that created them.
//! Each thread therefore lazily opens its own connection on first use and
//! keeps it in thread-local storage; connections are never handed across
//! threads.

use serde::Deserialize;
use std::cell::{Cell, RefCell};
use wmi::WMIConnection;

use crate::core::sampling::{RawSample, SampleTime};

thread_local! {
    static CONNECTION: RefCell<Option<WMIConnection>> = const { RefCell::new(None) };
    static CONNECT_FAILED: Cell<bool> = const { Cell::new(false) };
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct PerfOsMemory {
    page_reads_persec: Option<u64>,
    pages_input_persec: Option<u64>,
    pages_output_persec: Option<u64>,
    available_bytes: Option<u64>,
    committed_bytes: Option<u64>,
    commit_limit: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct PerfPhysicalDisk {
    disk_read_bytes_persec: Option<u64>,
    disk_write_bytes_persec: Option<u64>,
    percent_disk_time: Option<u64>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct ComputerSystem {
    total_physical_memory: Option<u64>,
}

const PAGE_SIZE: f64 = 4096.0;

/// Run `f` with this thread's WMI connection, creating it on first use.
fn with_connection<R>(f: impl FnOnce(&WMIConnection) -> Option<R>) -> Option<R> {
    CONNECTION.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_none() {
            match WMIConnection::new() {
                Ok(conn) => {
                    log::info!(
                        "WMI connection opened on thread {:?}",
                        std::thread::current().id()
                    );
                    CONNECT_FAILED.with(|failed| failed.set(false));
                    *slot = Some(conn);
                }
                Err(e) => {
                    if !CONNECT_FAILED.with(|failed| failed.replace(true)) {
                        log::warn!("Failed to connect to WMI: {}", e);
                    }
                    return None;
                }
            }
        }
        slot.as_ref().and_then(f)
    })
}

fn query_first<T: serde::de::DeserializeOwned>(conn: &WMIConnection, query: &str) -> Option<T> {
    match conn.raw_query::<T>(query) {
        Ok(rows) => rows.into_iter().next(),
        Err(e) => {
            log::debug!("WMI query failed ({}): {}", query, e);
            None
        }
    }
}

/// Reader over the formatted (already rate-converted) perf counters.
pub struct WmiCounters {
    total_physical_memory: Option<u64>,
}

impl WmiCounters {
    pub fn new() -> Self {
        Self {
            total_physical_memory: None,
        }
    }

    pub fn read(&mut self, at: SampleTime) -> RawSample {
        let mut sample = RawSample::at(at);

        if self.total_physical_memory.is_none() {
            self.total_physical_memory = with_connection(|conn| {
                query_first::<ComputerSystem>(
                    conn,
                    "SELECT TotalPhysicalMemory FROM Win32_ComputerSystem",
                )
                .and_then(|cs| cs.total_physical_memory)
            });
        }

        let memory = with_connection(|conn| {
            query_first::<PerfOsMemory>(
                conn,
                "SELECT PageReadsPersec, PagesInputPersec, PagesOutputPersec, AvailableBytes, \
                 CommittedBytes, CommitLimit FROM Win32_PerfFormattedData_PerfOS_Memory",
            )
        });

        if let Some(memory) = memory {
            sample.page_faults_per_sec = memory.page_reads_persec.map(|v| v as f64);
            sample.page_io_bytes_per_sec = match (memory.pages_input_persec, memory.pages_output_persec) {
                (Some(input), Some(output)) => Some((input + output) as f64 * PAGE_SIZE),
                _ => None,
            };

            sample.available_ram_bytes = memory.available_bytes;
            if let (Some(available), Some(total)) =
                (memory.available_bytes, self.total_physical_memory.filter(|t| *t > 0))
            {
                sample.available_ram_percent = Some(available as f64 / total as f64 * 100.0);
            }

            sample.committed_bytes = memory.committed_bytes;
            if let (Some(committed), Some(limit)) =
                (memory.committed_bytes, memory.commit_limit.filter(|l| *l > 0))
            {
                sample.committed_ratio = Some(committed as f64 / limit as f64);
            }
        }

        let disk = with_connection(|conn| {
            query_first::<PerfPhysicalDisk>(
                conn,
                "SELECT DiskReadBytesPersec, DiskWriteBytesPersec, PercentDiskTime \
                 FROM Win32_PerfFormattedData_PerfDisk_PhysicalDisk WHERE Name = '_Total'",
            )
        });

        if let Some(disk) = disk {
            sample.disk_read_bytes_per_sec = disk.disk_read_bytes_persec.map(|v| v as f64);
            sample.disk_write_bytes_per_sec = disk.disk_write_bytes_persec.map(|v| v as f64);
            // _Total can exceed 100 with several disks
            sample.disk_percent_busy = disk.percent_disk_time.map(|v| (v as f64).min(100.0));
        }

        sample
    }
}

impl Default for WmiCounters {
    fn default() -> Self {
        Self::new()
    }
}
