use std::sync::LazyLock;

use regex::Regex;

/// `<YYMMDD>_<HHMMSS>`, fixed width so lexicographic order is chronological.
pub const TIMESTAMP_FORMAT: &str = "%y%m%d_%H%M%S";

pub static TIMESTAMP_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"_(\d{6}_\d{6})$").expect("Failed to compile snapshot timestamp regex")
});

pub const DEFAULT_SNAPSHOT_PREFIX: &str = "backup";
pub const DEFAULT_RETAINED_SNAPSHOTS: usize = 3;
pub const DEFAULT_LV_SNAPSHOT_SIZE: &str = "5G";
pub const DEFAULT_MOUNT_BASE: &str = "/mnt";
pub const DEFAULT_ARCHIVE_SUB_PATH: &str = "*";
pub const DEFAULT_LOCK_DIR: &str = "/run/lock";
