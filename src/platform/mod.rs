// Platform-specific counter backends

#[cfg(target_os = "linux")]
pub mod procfs;

#[cfg(windows)]
pub mod wmi_counters;

#[cfg(not(any(target_os = "linux", windows)))]
pub mod fallback;
