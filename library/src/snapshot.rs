use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::constant::{TIMESTAMP_FORMAT, TIMESTAMP_SUFFIX_REGEX};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Dataset,
    LogicalVolume,
}

impl BackendKind {
    /// Joins a volume name and a snapshot name into the backend's qualified identifier.
    pub fn separator(&self) -> char {
        match self {
            BackendKind::Dataset => '@',
            BackendKind::LogicalVolume => '-',
        }
    }
}

/// A storage unit to snapshot: a ZFS dataset (`pool/fs`) or a logical volume (`vg/lv`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Volume {
    pub name: String,
    pub remote_host: Option<String>,
    pub kind: BackendKind,
}

impl Volume {
    pub fn dataset(name: impl Into<String>) -> Self {
        Volume {
            name: name.into(),
            remote_host: None,
            kind: BackendKind::Dataset,
        }
    }

    pub fn logical_volume(volume_group: &str, logical_volume: &str) -> Self {
        Volume {
            name: format!("{}/{}", volume_group, logical_volume),
            remote_host: None,
            kind: BackendKind::LogicalVolume,
        }
    }

    pub fn on_host(mut self, host: Option<String>) -> Self {
        self.remote_host = host;
        self
    }

    /// The part before the first `/`; the pool for datasets, the volume group for LVs.
    pub fn parent(&self) -> &str {
        self.name.split_once('/').map_or(self.name.as_str(), |(parent, _)| parent)
    }

    /// The last path component; the logical volume name for LVs.
    pub fn leaf(&self) -> &str {
        self.name.rsplit_once('/').map_or(self.name.as_str(), |(_, leaf)| leaf)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.remote_host {
            Some(host) => write!(f, "{}:{}", host, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A point-in-time copy of a volume, named `<prefix>_<YYMMDD>_<HHMMSS>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Snapshot {
    volume: Volume,
    name: String,
}

impl Snapshot {
    pub fn new(volume: Volume, name: impl Into<String>) -> Self {
        Snapshot {
            volume,
            name: name.into(),
        }
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `tank/data@backup_240101_120000` or `vg0/root-backup_240101_120000`.
    pub fn qualified_name(&self) -> String {
        format!(
            "{}{}{}",
            self.volume.name,
            self.volume.kind.separator(),
            self.name
        )
    }

    /// The `<YYMMDD>_<HHMMSS>` suffix, empty if the name does not carry one.
    pub fn timestamp(&self) -> &str {
        TIMESTAMP_SUFFIX_REGEX
            .captures(&self.name)
            .and_then(|captures| captures.get(1))
            .map_or("", |m| m.as_str())
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(self.timestamp(), TIMESTAMP_FORMAT).ok()
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Generates a new snapshot name from the prefix and the local wall-clock time.
///
/// Resolution is one second; two runs within the same second produce the same name.
pub fn new_name(prefix: &str) -> String {
    name_at(prefix, &Local::now().naive_local())
}

pub fn name_at(prefix: &str, datetime: &NaiveDateTime) -> String {
    format!("{}_{}", prefix, datetime.format(TIMESTAMP_FORMAT))
}
