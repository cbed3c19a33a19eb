use std::path::PathBuf;

use log::info;

use super::{Backend, args, on_host, shell_on_host};
use crate::{
    command::{Command, Target, Verb, quote},
    config::ArchiveTarget,
    error::Result,
    planner::ReplicationPlan,
    runner::Runner,
    snapshot::{BackendKind, Snapshot, Volume},
};

/// ZFS datasets: recursive copy-on-write snapshots, replicated with `zfs send | zfs recv`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatasetBackend;

impl Backend for DatasetBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dataset
    }

    fn exists(&self, runner: &Runner, volume: &Volume) -> Result<bool> {
        let command = Command::argv(
            Verb::Query,
            Target::Volume(volume.clone()),
            on_host(volume, args(["zfs", "list", "-H", "-o", "name", volume.name.as_str()])),
        )
        .unchecked();

        Ok(runner.run(&command)?.success())
    }

    fn create_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()> {
        info!("Taking zfs snapshot: {}", snapshot);

        let command = Command::argv(
            Verb::Create,
            Target::Snapshot(snapshot.clone()),
            on_host(
                snapshot.volume(),
                args(["zfs", "snapshot", "-r", snapshot.qualified_name().as_str()]),
            ),
        );

        runner.run(&command)?;

        Ok(())
    }

    fn list_snapshots(&self, runner: &Runner, volume: &Volume) -> Result<Vec<String>> {
        let command = Command::argv(
            Verb::Query,
            Target::Volume(volume.clone()),
            on_host(
                volume,
                args(["zfs", "list", "-H", "-t", "snapshot", "-o", "name", volume.name.as_str()]),
            ),
        );

        let output = runner.run(&command)?;

        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(String::from)
            .collect())
    }

    fn send(&self, runner: &Runner, plan: &ReplicationPlan, destination: &Volume) -> Result<()> {
        let snapshot = plan.snapshot();

        match plan.base() {
            Some(base) => info!(
                "Found incremental source snapshot {} and matching replica on {} - using incremental send",
                base.name(),
                destination
            ),
            None => info!(
                "No common snapshot on {} for incremental replication - making full copy",
                destination
            ),
        }

        let mut send = args(["zfs", "send", "-R"]);
        if let Some(base) = plan.base() {
            send.extend(args(["-i", base.qualified_name().as_str()]));
        }
        send.push(snapshot.qualified_name());

        let receive = args(["zfs", "recv", "-F", destination.name.as_str()]);

        let command = Command::shell(
            Verb::Transfer,
            Target::Snapshot(snapshot.clone()),
            format!(
                "{} | {}",
                shell_on_host(snapshot.volume(), &send),
                shell_on_host(destination, &receive)
            ),
        );

        runner.run(&command)?;

        Ok(())
    }

    fn archive(
        &self,
        runner: &Runner,
        snapshot: &Snapshot,
        target: &ArchiveTarget,
    ) -> Result<PathBuf> {
        let file = target.directory.join(format!(
            "{}_{}.gz",
            snapshot.volume().name.replace('/', "_"),
            snapshot.name()
        ));

        info!("Backing up {} to {}", snapshot, file.display());

        let send = args(["zfs", "send", "-R", snapshot.qualified_name().as_str()]);

        let command = Command::shell(
            Verb::Transfer,
            Target::Path(file.clone()),
            format!(
                "{} | gzip > {}",
                shell_on_host(snapshot.volume(), &send),
                quote(&file.to_string_lossy())
            ),
        );

        runner.run(&command)?;

        Ok(file)
    }

    fn destroy_snapshot(&self, runner: &Runner, snapshot: &Snapshot) -> Result<()> {
        let command = Command::argv(
            Verb::Destroy,
            Target::Snapshot(snapshot.clone()),
            on_host(
                snapshot.volume(),
                args(["zfs", "destroy", "-r", snapshot.qualified_name().as_str()]),
            ),
        );

        runner.run(&command)?;

        Ok(())
    }
}
