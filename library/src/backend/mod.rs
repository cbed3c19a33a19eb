use std::path::PathBuf;

use itertools::Itertools;

use crate::{
    command::quote,
    config::ArchiveTarget,
    error::Result,
    planner::ReplicationPlan,
    runner::Runner,
    snapshot::{BackendKind, Snapshot, Volume},
};

mod dataset;
mod logical_volume;

pub use dataset::DatasetBackend;
pub use logical_volume::LogicalVolumeBackend;

/// Snapshot mechanics of one kind of volume. Every call goes through the [`Runner`].
pub trait Backend {
    fn kind(&self) -> BackendKind;

    fn exists(&self, runner: &Runner, volume: &Volume) -> Result<bool>;

    fn create_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()>;

    /// Qualified identifiers of every snapshot on the volume, in no particular order.
    fn list_snapshots(&self, runner: &Runner, volume: &Volume) -> Result<Vec<String>>;

    /// Replicates the plan's snapshot onto another volume of the same kind.
    fn send(&self, runner: &Runner, plan: &ReplicationPlan, destination: &Volume) -> Result<()>;

    /// Writes the snapshot's data to a compressed archive and returns its path.
    fn archive(&self, runner: &Runner, snapshot: &Snapshot, target: &ArchiveTarget)
    -> Result<PathBuf>;

    /// Releases whatever `archive` acquired for the snapshot. Must be idempotent.
    fn release(&self, _runner: &Runner, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }

    fn destroy_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()>;

    /// Ephemeral snapshots are released and destroyed at the end of every run.
    fn is_ephemeral(&self) -> bool {
        false
    }
}

/// Arguments to run `args` on the volume's host, through ssh when it is remote.
fn on_host(volume: &Volume, args: Vec<String>) -> Vec<String> {
    match &volume.remote_host {
        Some(host) => vec![
            "ssh".to_string(),
            host.clone(),
            args.iter().map(|arg| quote(arg)).join(" "),
        ],
        None => args,
    }
}

/// Like [`on_host`], rendered as a fragment of a shell pipeline.
fn shell_on_host(volume: &Volume, args: &[String]) -> String {
    let local = args.iter().map(|arg| quote(arg)).join(" ");

    match &volume.remote_host {
        Some(host) => format!("ssh {} {}", quote(host), quote(&local)),
        None => local,
    }
}

fn args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_commands_are_unchanged() {
        let volume = Volume::dataset("tank/data");

        assert_eq!(
            on_host(&volume, args(["zfs", "list", "tank/data"])),
            vec!["zfs", "list", "tank/data"]
        );
        assert_eq!(
            shell_on_host(&volume, &args(["zfs", "recv", "-F", "tank/data"])),
            "zfs recv -F tank/data"
        );
    }

    #[test]
    fn test_remote_commands_go_through_ssh() {
        let volume = Volume::dataset("backup/data").on_host(Some("nas".to_string()));

        assert_eq!(
            on_host(&volume, args(["zfs", "list", "-H", "backup/data"])),
            vec!["ssh", "nas", "zfs list -H backup/data"]
        );
        assert_eq!(
            shell_on_host(&volume, &args(["zfs", "recv", "-F", "backup/data"])),
            "ssh nas 'zfs recv -F backup/data'"
        );
    }
}
