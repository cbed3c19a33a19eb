use std::env;

use snapback_library::{
    BackupError,
    config::{ArchiveTarget, BackendConfig, BackupConfig, Destination},
    retention::RetentionPolicy,
    snapshot::Volume,
};

use crate::library::{
    cli::{ListArgs, LvmArgs, VolumeKind, ZfsArgs},
    constant::{DEBUG_VAR, DRY_RUN_VAR, TRUTHY_VALUES, WEBHOOK_URL_VAR},
};

/// Switches taken from the process environment, read once at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub dry_run: bool,
    pub debug: bool,
    pub webhook_url: Option<String>,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Environment {
            dry_run: lookup(DRY_RUN_VAR).is_some_and(|value| is_truthy(&value)),
            debug: lookup(DEBUG_VAR).is_some_and(|value| is_truthy(&value)),
            webhook_url: lookup(WEBHOOK_URL_VAR)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
        }
    }
}

pub fn is_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY_VALUES.contains(&value.as_str())
}

impl ZfsArgs {
    pub fn backup_config(&self) -> BackupConfig {
        let destination = match (&self.dest_dataset, &self.dest_directory) {
            (Some(dataset), _) => Some(Destination::Dataset(
                Volume::dataset(dataset.as_str()).on_host(self.dest_host.clone()),
            )),
            (None, Some(directory)) => Some(Destination::Archive(ArchiveTarget {
                directory: directory.clone(),
                sub_path: String::new(),
            })),
            (None, None) => None,
        };

        BackupConfig {
            source: Volume::dataset(self.src_dataset.as_str()).on_host(self.src_host.clone()),
            destination,
            prefix: self.snap_prefix.clone(),
            retention: RetentionPolicy::new(self.num_snaps),
        }
    }
}

impl LvmArgs {
    pub fn backup_config(&self) -> BackupConfig {
        BackupConfig {
            source: Volume::logical_volume(&self.vg, &self.lv),
            destination: Some(Destination::Archive(ArchiveTarget {
                directory: self.target_dir.clone(),
                sub_path: self.src_path.clone(),
            })),
            prefix: self.snap_prefix.clone(),
            retention: RetentionPolicy::new(0),
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig::LogicalVolume {
            snapshot_size: self.size.clone(),
            mount_base: self.mount_base.clone(),
            mount_options: self.mount_options.clone(),
        }
    }
}

impl ListArgs {
    pub fn volume_and_backend(&self) -> Result<(Volume, BackendConfig), BackupError> {
        match self.kind {
            VolumeKind::Zfs => Ok((
                Volume::dataset(self.volume.as_str()).on_host(self.host.clone()),
                BackendConfig::Dataset,
            )),
            VolumeKind::Lvm => {
                if self.host.is_some() {
                    return Err(BackupError::configuration(
                        "Logical volumes can only be listed on the local host",
                    ));
                }

                let (volume_group, logical_volume) =
                    self.volume.split_once('/').ok_or_else(|| {
                        BackupError::configuration(format!(
                            "Logical volume must be given as <vg>/<lv>: {}",
                            self.volume
                        ))
                    })?;

                Ok((
                    Volume::logical_volume(volume_group, logical_volume),
                    BackendConfig::logical_volume(),
                ))
            }
        }
    }
}
