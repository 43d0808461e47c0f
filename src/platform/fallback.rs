//! Portable backend: memory availability from sysinfo, nothing else.

use sysinfo::{MemoryRefreshKind, RefreshKind, System};

use crate::core::sampling::{RawSample, SampleTime};

pub struct SysinfoCounters {
    system: System,
}

impl SysinfoCounters {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
            ),
        }
    }

    pub fn read(&mut self, at: SampleTime) -> RawSample {
        self.system.refresh_memory();
        let mut sample = RawSample::at(at);
        let total = self.system.total_memory();
        if total > 0 {
            let available = self.system.available_memory();
            sample.available_ram_bytes = Some(available);
            sample.available_ram_percent = Some(available as f64 / total as f64 * 100.0);
        }
        sample
    }
}

impl Default for SysinfoCounters {
    fn default() -> Self {
        Self::new()
    }
}
