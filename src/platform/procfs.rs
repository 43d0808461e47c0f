//! Linux counters read from procfs.

use std::fs;
use std::path::{Path, PathBuf};

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::core::sampling::{RawSample, SampleTime};

const SECTOR_SIZE: u64 = 512;

/// Subset of `/proc/vmstat` used for paging rates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VmStat {
    pub pgmajfault: Option<u64>,
    pub pswpin: Option<u64>,
    pub pswpout: Option<u64>,
}

/// Subset of `/proc/meminfo`, in kB as the kernel reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemInfo {
    pub mem_total_kb: Option<u64>,
    pub mem_available_kb: Option<u64>,
    pub committed_as_kb: Option<u64>,
    pub commit_limit_kb: Option<u64>,
}

/// Totals across whole disks from `/proc/diskstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskTotals {
    pub sectors_read: u64,
    pub sectors_written: u64,
    pub io_ticks_ms: u64,
    pub devices: usize,
}

pub fn parse_vmstat(text: &str) -> VmStat {
    let mut stat = VmStat::default();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let value = value.parse().ok();
        match key {
            "pgmajfault" => stat.pgmajfault = value,
            "pswpin" => stat.pswpin = value,
            "pswpout" => stat.pswpout = value,
            _ => {}
        }
    }
    stat
}

pub fn parse_meminfo(text: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value = rest.split_whitespace().next().and_then(|v| v.parse().ok());
        match key.trim() {
            "MemTotal" => info.mem_total_kb = value,
            "MemAvailable" => info.mem_available_kb = value,
            "Committed_AS" => info.committed_as_kb = value,
            "CommitLimit" => info.commit_limit_kb = value,
            _ => {}
        }
    }
    info
}

/// Sum the counters of every device accepted by `is_whole_disk`.
///
/// Returns `None` when no device matched.
pub fn parse_diskstats(text: &str, is_whole_disk: impl Fn(&str) -> bool) -> Option<DiskTotals> {
    let mut totals = DiskTotals::default();
    for line in text.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // major minor name reads merged sectors_read ms writes merged sectors_written ms in_flight io_ticks ...
        if fields.len() < 13 || !is_whole_disk(fields[2]) {
            continue;
        }
        let field = |i: usize| fields[i].parse::<u64>().unwrap_or(0);
        totals.sectors_read += field(5);
        totals.sectors_written += field(9);
        totals.io_ticks_ms += field(12);
        totals.devices += 1;
    }
    (totals.devices > 0).then_some(totals)
}

fn is_virtual_device(name: &str) -> bool {
    ["loop", "ram", "zram", "dm-", "md", "sr", "fd"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[derive(Debug, Clone, Copy)]
struct CounterSnapshot {
    at: f64,
    vmstat: VmStat,
    disks: Option<DiskTotals>,
}

fn rate(current: Option<u64>, previous: Option<u64>, elapsed: f64) -> Option<f64> {
    let (current, previous) = (current?, previous?);
    if elapsed <= 0.0 {
        return Some(0.0);
    }
    Some(current.saturating_sub(previous) as f64 / elapsed)
}

/// Rate-based reader over `/proc` and `/sys/block`.
pub struct ProcfsCounters {
    root: PathBuf,
    page_size: u64,
    previous: CounterSnapshot,
    system: Option<System>,
}

impl ProcfsCounters {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/"), SampleTime::now())
    }

    /// Read counters below `root` (expects `proc/` and `sys/block/`),
    /// priming the rate baseline at `at`.
    pub fn with_root(root: PathBuf, at: SampleTime) -> Self {
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = if page_size > 0 { page_size as u64 } else { 4096 };

        let mut counters = Self {
            root,
            page_size,
            previous: CounterSnapshot {
                at: at.monotonic,
                vmstat: VmStat::default(),
                disks: None,
            },
            system: None,
        };
        counters.previous = counters.snapshot(at.monotonic);
        counters
    }

    fn read_file(&self, relative: &str) -> Option<String> {
        fs::read_to_string(self.root.join(relative)).ok()
    }

    fn is_whole_disk(block_dir: &Path, name: &str) -> bool {
        !is_virtual_device(name) && block_dir.join(name).exists()
    }

    fn snapshot(&self, at: f64) -> CounterSnapshot {
        let vmstat = self
            .read_file("proc/vmstat")
            .map(|text| parse_vmstat(&text))
            .unwrap_or_default();

        let block_dir = self.root.join("sys/block");
        let disks = self
            .read_file("proc/diskstats")
            .and_then(|text| parse_diskstats(&text, |name| Self::is_whole_disk(&block_dir, name)));

        CounterSnapshot { at, vmstat, disks }
    }

    /// Memory totals in bytes: (available, total)
    fn memory_from_sysinfo(&mut self) -> Option<(u64, u64)> {
        let system = self.system.get_or_insert_with(|| {
            System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
            )
        });
        system.refresh_memory();
        let total = system.total_memory();
        (total > 0).then(|| (system.available_memory(), total))
    }

    pub fn read(&mut self, at: SampleTime) -> RawSample {
        let mut sample = RawSample::at(at);

        let meminfo = self
            .read_file("proc/meminfo")
            .map(|text| parse_meminfo(&text))
            .unwrap_or_default();

        let memory = match (meminfo.mem_available_kb, meminfo.mem_total_kb) {
            (Some(available), Some(total)) if total > 0 => Some((available * 1024, total * 1024)),
            _ => self.memory_from_sysinfo(),
        };
        if let Some((available, total)) = memory {
            sample.available_ram_bytes = Some(available);
            sample.available_ram_percent = Some(available as f64 / total as f64 * 100.0);
        }

        if let Some(committed) = meminfo.committed_as_kb {
            sample.committed_bytes = Some(committed * 1024);
            sample.committed_ratio = meminfo
                .commit_limit_kb
                .filter(|limit| *limit > 0)
                .map(|limit| committed as f64 / limit as f64);
        }

        let current = self.snapshot(at.monotonic);
        let previous = self.previous;
        let elapsed = current.at - previous.at;

        sample.page_faults_per_sec =
            rate(current.vmstat.pgmajfault, previous.vmstat.pgmajfault, elapsed);

        let swapped = |v: VmStat| Some(v.pswpin? + v.pswpout?);
        sample.page_io_bytes_per_sec = rate(swapped(current.vmstat), swapped(previous.vmstat), elapsed)
            .map(|pages| pages * self.page_size as f64);

        if let (Some(now), Some(before)) = (current.disks, previous.disks) {
            if now.devices == before.devices {
                let bytes = |sectors: u64| sectors * SECTOR_SIZE;
                sample.disk_read_bytes_per_sec =
                    rate(Some(bytes(now.sectors_read)), Some(bytes(before.sectors_read)), elapsed);
                sample.disk_write_bytes_per_sec = rate(
                    Some(bytes(now.sectors_written)),
                    Some(bytes(before.sectors_written)),
                    elapsed,
                );
                sample.disk_percent_busy =
                    rate(Some(now.io_ticks_ms), Some(before.io_ticks_ms), elapsed).map(|ms_per_sec| {
                        (ms_per_sec / 1000.0 / now.devices as f64 * 100.0).min(100.0)
                    });
            } else {
                log::debug!(
                    "Disk set changed ({} -> {} devices), skipping disk rates",
                    before.devices,
                    now.devices
                );
            }
        }

        self.previous = current;
        sample
    }
}

impl Default for ProcfsCounters {
    fn default() -> Self {
        Self::new()
    }
}
