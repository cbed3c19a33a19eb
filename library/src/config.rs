use std::path::PathBuf;

use crate::{
    backend::{Backend, DatasetBackend, LogicalVolumeBackend},
    constant::{DEFAULT_LV_SNAPSHOT_SIZE, DEFAULT_MOUNT_BASE},
    error::{BackupError, Result},
    retention::RetentionPolicy,
    snapshot::{BackendKind, Volume},
};

/// Process-wide switches, read once at start-up and passed to the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub dry_run: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTarget {
    pub directory: PathBuf,
    /// Shell glob of the paths to archive, relative to the snapshot root.
    pub sub_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Dataset(Volume),
    Archive(ArchiveTarget),
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub source: Volume,
    pub destination: Option<Destination>,
    pub prefix: String,
    pub retention: RetentionPolicy,
}

impl BackupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(BackupError::configuration("Snapshot prefix must not be empty"));
        }

        if self.source.name.is_empty() {
            return Err(BackupError::configuration("Source volume must not be empty"));
        }

        if self.source.kind == BackendKind::LogicalVolume && !self.source.name.contains('/') {
            return Err(BackupError::configuration(format!(
                "Logical volume must be given as <vg>/<lv>: {}",
                self.source.name
            )));
        }

        if self.source.kind == BackendKind::LogicalVolume && self.source.remote_host.is_some() {
            return Err(BackupError::configuration(
                "Logical volumes can only be backed up on the local host",
            ));
        }

        if let Some(Destination::Dataset(destination)) = &self.destination {
            if self.source.kind == BackendKind::LogicalVolume {
                return Err(BackupError::configuration(
                    "Logical volumes can only be backed up to an archive directory",
                ));
            }

            if destination == &self.source {
                return Err(BackupError::configuration(
                    "Destination dataset must differ from the source dataset",
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Dataset,
    LogicalVolume {
        snapshot_size: String,
        mount_base: PathBuf,
        mount_options: Option<String>,
    },
}

impl BackendConfig {
    pub fn logical_volume() -> Self {
        BackendConfig::LogicalVolume {
            snapshot_size: DEFAULT_LV_SNAPSHOT_SIZE.to_string(),
            mount_base: PathBuf::from(DEFAULT_MOUNT_BASE),
            mount_options: None,
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Dataset => BackendKind::Dataset,
            BackendConfig::LogicalVolume { .. } => BackendKind::LogicalVolume,
        }
    }

    pub fn build(&self) -> Box<dyn Backend> {
        match self {
            BackendConfig::Dataset => Box::new(DatasetBackend),
            BackendConfig::LogicalVolume {
                snapshot_size,
                mount_base,
                mount_options,
            } => Box::new(LogicalVolumeBackend::new(
                snapshot_size.clone(),
                mount_base.clone(),
                mount_options.clone(),
            )),
        }
    }
}
