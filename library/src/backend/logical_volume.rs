use std::path::{Path, PathBuf};

use log::{info, warn};

use super::{Backend, args};
use crate::{
    command::{Command, Target, Verb, quote},
    config::ArchiveTarget,
    error::{BackupError, Result},
    planner::ReplicationPlan,
    runner::Runner,
    snapshot::{BackendKind, Snapshot, Volume},
};

/// LVM logical volumes: fixed-size block-level snapshots that are mounted,
/// archived with tar and removed again within the same run.
#[derive(Debug, Clone)]
pub struct LogicalVolumeBackend {
    snapshot_size: String,
    mount_base: PathBuf,
    mount_options: Option<String>,
}

impl LogicalVolumeBackend {
    pub fn new(snapshot_size: String, mount_base: PathBuf, mount_options: Option<String>) -> Self {
        LogicalVolumeBackend {
            snapshot_size,
            mount_base,
            mount_options,
        }
    }

    /// Name of the snapshot LV inside the volume group: `<lv>-<snapshot>`.
    fn snapshot_lv(snapshot: &Snapshot) -> String {
        format!("{}-{}", snapshot.volume().leaf(), snapshot.name())
    }

    pub fn mount_point(&self, snapshot: &Snapshot) -> PathBuf {
        self.mount_base.join(Self::snapshot_lv(snapshot))
    }

    fn is_mounted(&self, runner: &Runner, mount_point: &Path) -> Result<bool> {
        let path = mount_point.to_string_lossy().into_owned();
        let command = Command::argv(
            Verb::Query,
            Target::Path(mount_point.to_path_buf()),
            ["findmnt", "-n", "-o", "TARGET", "--mountpoint", path.as_str()],
        )
        .unchecked();

        Ok(!runner.run(&command)?.stdout.trim().is_empty())
    }

    fn mount(&self, runner: &Runner, snapshot: &Snapshot, mount_point: &Path) -> Result<()> {
        let mount_point_str = mount_point.to_string_lossy().into_owned();

        runner.run(&Command::argv(
            Verb::Mount,
            Target::Path(mount_point.to_path_buf()),
            ["mkdir", "-p", mount_point_str.as_str()],
        ))?;

        if self.is_mounted(runner, mount_point)? {
            return Err(BackupError::MountBusy(mount_point.to_path_buf()));
        }

        let device = format!(
            "/dev/{}/{}",
            snapshot.volume().parent(),
            Self::snapshot_lv(snapshot)
        );

        let mut mount = args(["mount"]);
        if let Some(options) = &self.mount_options {
            mount.extend(args(["-o", options.as_str()]));
        }
        mount.extend([device, mount_point_str]);

        runner.run(&Command::argv(
            Verb::Mount,
            Target::Snapshot(snapshot.clone()),
            mount,
        ))?;

        Ok(())
    }
}

impl Backend for LogicalVolumeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LogicalVolume
    }

    fn exists(&self, runner: &Runner, volume: &Volume) -> Result<bool> {
        let command = Command::argv(
            Verb::Query,
            Target::Volume(volume.clone()),
            ["lvs", "--noheadings", volume.name.as_str()],
        )
        .unchecked();

        Ok(runner.run(&command)?.success())
    }

    fn create_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()> {
        info!("Creating LV snapshot: {}", snapshot);

        let command = Command::argv(
            Verb::Create,
            Target::Snapshot(snapshot.clone()),
            args([
                "lvcreate",
                "--snapshot",
                "--name",
                Self::snapshot_lv(snapshot).as_str(),
                "--size",
                self.snapshot_size.as_str(),
                snapshot.volume().name.as_str(),
            ]),
        );

        runner.run(&command)?;

        Ok(())
    }

    fn list_snapshots(&self, runner: &Runner, volume: &Volume) -> Result<Vec<String>> {
        let volume_group = volume.parent();
        let command = Command::argv(
            Verb::Query,
            Target::Volume(volume.clone()),
            [
                "lvs",
                "--noheadings",
                "--separator",
                ",",
                "-o",
                "lv_name,origin",
                volume_group,
            ],
        );

        let output = runner.run(&command)?;

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| {
                let (name, origin) = line.trim().split_once(',')?;
                (origin.trim() == volume.leaf()).then(|| format!("{}/{}", volume_group, name.trim()))
            })
            .collect())
    }

    fn send(&self, _runner: &Runner, _plan: &ReplicationPlan, destination: &Volume) -> Result<()> {
        Err(BackupError::configuration(format!(
            "Logical volumes cannot be replicated to {}, use an archive directory",
            destination
        )))
    }

    fn archive(
        &self,
        runner: &Runner,
        snapshot: &Snapshot,
        target: &ArchiveTarget,
    ) -> Result<PathBuf> {
        let mount_point = self.mount_point(snapshot);

        self.mount(runner, snapshot, &mount_point)?;

        let file = target.directory.join(format!(
            "{}_{}.tar.gz",
            snapshot.volume().leaf(),
            snapshot.name()
        ));

        info!("Archiving {} to {}", mount_point.display(), file.display());

        // The sub-path is a glob and must stay unquoted.
        let command = Command::shell(
            Verb::Transfer,
            Target::Path(file.clone()),
            format!(
                "cd {} && tar czf {} {}",
                quote(&mount_point.to_string_lossy()),
                quote(&file.to_string_lossy()),
                target.sub_path
            ),
        );

        runner.run(&command)?;

        Ok(file)
    }

    fn release(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()> {
        let mount_point = self.mount_point(snapshot);
        let mount_point_str = mount_point.to_string_lossy().into_owned();

        if self.is_mounted(runner, &mount_point)? {
            runner.run(&Command::argv(
                Verb::Unmount,
                Target::Path(mount_point.clone()),
                ["umount", mount_point_str.as_str()],
            ))?;
        } else {
            warn!(
                "Snapshot is not mounted at {}, skipping unmount",
                mount_point.display()
            );
        }

        runner.run(
            &Command::argv(
                Verb::Unmount,
                Target::Path(mount_point.clone()),
                ["rmdir", mount_point_str.as_str()],
            )
            .unchecked(),
        )?;

        Ok(())
    }

    fn destroy_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()> {
        info!("Removing LV snapshot: {}", snapshot);

        let command = Command::argv(
            Verb::Destroy,
            Target::Snapshot(snapshot.clone()),
            ["lvremove", "-y", snapshot.qualified_name().as_str()],
        );

        runner.run(&command)?;

        Ok(())
    }

    fn is_ephemeral(&self) -> bool {
        true
    }
}
