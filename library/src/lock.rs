//! Cross-process lock keyed by volume, so two runs never touch the same volume at once.
//!
//! Advisory `fs2` lock on `<lock_dir>/snapback-<volume>.lock`, released on drop.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use log::debug;

use crate::{
    error::{BackupError, Result},
    snapshot::Volume,
};

#[derive(Debug)]
pub struct VolumeLock {
    file: File,
    path: PathBuf,
}

impl VolumeLock {
    /// Takes the lock without blocking; fails with [`BackupError::Locked`] if another run holds it.
    pub fn acquire(lock_dir: &Path, volume: &Volume) -> Result<Self> {
        fs::create_dir_all(lock_dir)?;

        let path = lock_dir.join(lock_file_name(volume));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("Acquired lock {}", path.display());
                Ok(VolumeLock { file, path })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(BackupError::Locked(path))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for VolumeLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Percent-encodes everything but `[A-Za-z0-9._-]`, so distinct volumes never share a file.
fn lock_file_name(volume: &Volume) -> String {
    let key = volume
        .to_string()
        .bytes()
        .map(|byte| match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'.' | b'_' => (byte as char).to_string(),
            _ => format!("%{:02X}", byte),
        })
        .collect::<String>();

    format!("snapback-{}.lock", key)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_lock_file_name_is_flat() {
        let volume = Volume::dataset("tank/vm/disk0").on_host(Some("nas".to_string()));

        assert_eq!(
            lock_file_name(&volume),
            "snapback-nas%3Atank%2Fvm%2Fdisk0.lock"
        );
    }

    #[test]
    fn test_slash_and_underscore_do_not_collide() -> Result<()> {
        let dir = tempdir()?;

        let _nested = VolumeLock::acquire(dir.path(), &Volume::dataset("tank/data"))?;
        let _flat = VolumeLock::acquire(dir.path(), &Volume::dataset("tank_data"))?;

        assert_ne!(
            lock_file_name(&Volume::dataset("tank/data")),
            lock_file_name(&Volume::dataset("tank_data"))
        );

        Ok(())
    }

    #[test]
    fn test_second_acquire_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let volume = Volume::dataset("tank/data");

        let held = VolumeLock::acquire(dir.path(), &volume)?;
        let second = VolumeLock::acquire(dir.path(), &volume);

        assert!(matches!(second, Err(BackupError::Locked(ref path)) if path == held.path()));

        Ok(())
    }

    #[test]
    fn test_lock_is_released_on_drop() -> Result<()> {
        let dir = tempdir()?;
        let volume = Volume::logical_volume("vg0", "root");

        drop(VolumeLock::acquire(dir.path(), &volume)?);

        assert!(VolumeLock::acquire(dir.path(), &volume).is_ok());

        Ok(())
    }

    #[test]
    fn test_different_volumes_do_not_contend() -> Result<()> {
        let dir = tempdir()?;

        let _data = VolumeLock::acquire(dir.path(), &Volume::dataset("tank/data"))?;
        let _home = VolumeLock::acquire(dir.path(), &Volume::dataset("tank/home"))?;

        Ok(())
    }
}
