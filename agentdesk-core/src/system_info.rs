//! Host and process information via the `sysinfo` crate.
//!
//! One in-process `System` behind `parking_lot::Mutex` + `OnceLock`
//! serves both the snapshot summary and per-pid process-name lookups
//! used by the browser classifier and app launcher.

use std::sync::OnceLock;

use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{
    CpuRefreshKind, Disks, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate,
    RefreshKind, System,
};

static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

fn get_system() -> &'static Mutex<System> {
    SYSTEM.get_or_init(|| {
        Mutex::new(System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        ))
    })
}

/// Owned snapshot of host state -- fully `Send` and serializable.
#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub os_name: String,
    pub os_version: String,
    pub hostname: String,
    pub cpu_count: usize,
    pub cpu_usage: Vec<f32>,
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
    pub disks: Vec<DiskSnapshot>,
}

/// Owned snapshot of a single disk.
#[derive(Debug, Clone, Serialize)]
pub struct DiskSnapshot {
    pub name: String,
    pub mount_point: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Collect host information.  Blocking (holds the sysinfo mutex).
pub fn collect_system_info() -> SystemSnapshot {
    let mut sys = get_system().lock();

    sys.refresh_cpu_usage();
    sys.refresh_memory();

    let disks = Disks::new_with_refreshed_list()
        .iter()
        .map(|d| DiskSnapshot {
            name: d.name().to_string_lossy().into_owned(),
            mount_point: d.mount_point().to_string_lossy().into_owned(),
            total_bytes: d.total_space(),
            available_bytes: d.available_space(),
        })
        .collect();

    SystemSnapshot {
        os_name: System::long_os_version().unwrap_or_else(|| "Unknown".to_owned()),
        os_version: System::os_version().unwrap_or_else(|| "Unknown".to_owned()),
        hostname: System::host_name().unwrap_or_else(|| "Unknown".to_owned()),
        cpu_count: sys.cpus().len(),
        cpu_usage: sys.cpus().iter().map(|c| c.cpu_usage()).collect(),
        total_memory_bytes: sys.total_memory(),
        used_memory_bytes: sys.used_memory(),
        disks,
    }
}

/// Human-readable one-paragraph summary for tool output.
pub fn summary() -> String {
    let info = collect_system_info();
    let avg_cpu = if info.cpu_usage.is_empty() {
        0.0
    } else {
        info.cpu_usage.iter().sum::<f32>() / info.cpu_usage.len() as f32
    };
    let disk_total: u64 = info.disks.iter().map(|d| d.total_bytes).sum();
    let disk_free: u64 = info.disks.iter().map(|d| d.available_bytes).sum();
    format!(
        "{} ({}) on {} | {} CPUs at {:.1}% | memory {} / {} MiB used | disk {} / {} GiB free",
        info.os_name,
        info.os_version,
        info.hostname,
        info.cpu_count,
        avg_cpu,
        info.used_memory_bytes / (1024 * 1024),
        info.total_memory_bytes / (1024 * 1024),
        disk_free / (1024 * 1024 * 1024),
        disk_total / (1024 * 1024 * 1024),
    )
}

/// Executable name for `pid`, or `None` when the process is gone.
pub fn process_name(pid: u32) -> Option<String> {
    let mut sys = get_system().lock();
    let pid = Pid::from_u32(pid);
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    sys.process(pid)
        .map(|p| p.name().to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_populated() {
        let info = collect_system_info();
        assert!(info.cpu_count > 0);
        assert!(info.total_memory_bytes > 0);
        assert_eq!(info.cpu_usage.len(), info.cpu_count);
    }

    #[test]
    fn test_summary_mentions_host() {
        let text = summary();
        assert!(text.contains("CPUs"));
        assert!(text.contains("memory"));
        assert!(text.contains("disk"));
    }

    #[test]
    fn test_process_name_of_self() {
        let name = process_name(std::process::id());
        assert!(name.is_some());
        assert!(process_name(u32::MAX - 1).is_none());
    }
}
