pub const DRY_RUN_VAR: &str = "DRY_RUN";
pub const DEBUG_VAR: &str = "DEBUG";
pub const WEBHOOK_URL_VAR: &str = "WEBHOOK_URL";

pub const TRUTHY_VALUES: [&str; 4] = ["true", "1", "y", "yes"];

pub const PROC_STATUS_PATH: &str = "/proc/self/status";
pub const HOSTNAME_PATH: &str = "/proc/sys/kernel/hostname";

pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;
