// Sampling and display settings
pub const DATA_COLLECTION_INTERVAL_MS: u64 = 900;
pub const DISPLAY_UPDATE_INTERVAL_MS: u64 = 200;
pub const AVERAGING_ITERATIONS: usize = 10;

// Longest interval a wrapped jiffy counter is allowed to span
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 3600;

// Percent scale used by the device-level utilization figures
pub const PERCENT_SCALE: f64 = 100.0;

// Default procfs mount used by the host-backed device
pub const DEFAULT_PROC_ROOT: &str = "/proc";
