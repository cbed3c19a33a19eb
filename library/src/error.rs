use std::{io, path::PathBuf};

use itertools::Itertools;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BackupError>;

/// A snapshot the pruner failed to destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneFailure {
    pub snapshot: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Volume does not exist: {0}")]
    VolumeNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Raised before execution for any destroy command that is not scoped to a single snapshot.
    #[error("Destroy protection prevented running command: {command}")]
    DestructionGuard { command: String },

    #[error("Command `{command}` failed with exit code {exit_code}: {stderr}")]
    Execution {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "Failed to prune {} snapshot(s): {}",
        .failures.len(),
        .failures.iter().map(|f| format!("{} ({})", f.snapshot, f.reason)).join(", ")
    )]
    Prune { failures: Vec<PruneFailure> },

    #[error("Snapshot {0} already exists - manual cleanup needed")]
    StaleSnapshot(String),

    #[error("Something is already mounted at {}, possible previous failed cleanup", .0.display())]
    MountBusy(PathBuf),

    #[error("Another run holds the lock {}", .0.display())]
    Locked(PathBuf),

    #[error("Root permissions needed for snapshots")]
    InsufficientPrivileges,

    #[error("Interrupted by a signal")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid snapshot pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl BackupError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Process exit code for this error kind, so a scheduler can tell failures apart.
    pub fn exit_code(&self) -> i32 {
        match self {
            BackupError::Configuration(_) | BackupError::Pattern(_) => 2,
            BackupError::VolumeNotFound(_) => 3,
            BackupError::InsufficientPrivileges => 4,
            BackupError::DestructionGuard { .. } => 5,
            BackupError::Locked(_) => 6,
            BackupError::StaleSnapshot(_) | BackupError::MountBusy(_) => 7,
            BackupError::Execution { .. } | BackupError::Spawn { .. } => 10,
            BackupError::Prune { .. } => 11,
            BackupError::Io(_) => 12,
            BackupError::Interrupted => 130,
        }
    }
}
