//! Process resource probe backed by `sysinfo`

use faultline_core::SystemProbe;
use faultline_domain::SystemSnapshot;
use parking_lot::Mutex;
use sysinfo::{Pid, System};

/// Snapshots memory and uptime of the current process.
///
/// Only the current process is refreshed per snapshot, never the full
/// process table.
pub struct SysinfoProbe {
    pid: Option<Pid>,
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| tracing::warn!(error = e, "Current pid unavailable, snapshots disabled"))
            .ok();
        Self { pid, system: Mutex::new(System::new()) }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SysinfoProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoProbe").field("pid", &self.pid).finish_non_exhaustive()
    }
}

impl SystemProbe for SysinfoProbe {
    fn snapshot(&self) -> Option<SystemSnapshot> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        let process = system.process(pid)?;
        Some(SystemSnapshot {
            pid: pid.as_u32(),
            memory_bytes: process.memory(),
            virtual_memory_bytes: process.virtual_memory(),
            uptime_secs: process.run_time(),
        })
    }
}
