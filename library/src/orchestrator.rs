use std::path::PathBuf;

use log::{debug, info, warn};

use crate::{
    backend::Backend,
    config::{BackupConfig, Destination},
    error::{BackupError, Result},
    inventory::Inventory,
    planner::{self, ReplicationPlan},
    retention,
    runner::Runner,
    snapshot::{self, Snapshot, Volume},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    SnapshotCreated,
    Replicated,
    Pruned,
    Done,
    Aborting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Replicated(ReplicationPlan),
    Archived(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub snapshot: Snapshot,
    pub transfer: Transfer,
    pub pruned: usize,
}

/// Runs one backup: create, transfer, prune.
///
/// Once a snapshot exists, any failure moves the run to [`Stage::Aborting`].
/// Ephemeral (block-level) snapshots are then released and destroyed on a
/// best-effort basis, and the original error is returned. An interrupt raised
/// on the runner is honoured at each stage boundary the same way.
pub struct Orchestrator<'a> {
    runner: &'a Runner,
    backend: Box<dyn Backend>,
    config: BackupConfig,
    inventory: Inventory,
    stage: Stage,
}

impl<'a> Orchestrator<'a> {
    pub fn new(runner: &'a Runner, backend: Box<dyn Backend>, config: BackupConfig) -> Self {
        Orchestrator {
            runner,
            backend,
            config,
            inventory: Inventory::new(),
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn run(&mut self) -> Result<BackupReport> {
        self.enter(Stage::Idle);

        if self.backend.kind() != self.config.source.kind {
            return Err(BackupError::configuration(format!(
                "{:?} backend cannot snapshot {:?} volume {}",
                self.backend.kind(),
                self.config.source.kind,
                self.config.source
            )));
        }

        self.runner.check_interrupted()?;

        let snapshot = self.create()?;
        let outcome = self.transfer_and_prune(&snapshot);

        let outcome = match outcome {
            Ok(report) if self.backend.is_ephemeral() => self.dispose(&snapshot).map(|()| report),
            Ok(report) => Ok(report),
            Err(err) => {
                self.abort(&snapshot, &err);
                return Err(err);
            }
        };

        match &outcome {
            Ok(_) => self.enter(Stage::Done),
            Err(_) => self.enter(Stage::Aborting),
        }

        outcome
    }

    /// Applies the retention policy to the source, and to the destination dataset if any.
    pub fn prune(&mut self) -> Result<usize> {
        let mut stores = vec![self.config.source.clone()];
        if let Some(Destination::Dataset(destination)) = &self.config.destination {
            stores.push(destination.clone());
        }

        let mut failures = Vec::new();
        let mut pruned = 0;

        for volume in &stores {
            match retention::prune(
                self.runner,
                self.backend.as_ref(),
                &mut self.inventory,
                volume,
                &self.config.prefix,
                self.config.retention,
            ) {
                Ok(count) => pruned += count,
                Err(BackupError::Prune { failures: failed }) => failures.extend(failed),
                Err(err) => return Err(err),
            }
        }

        if failures.is_empty() {
            Ok(pruned)
        } else {
            Err(BackupError::Prune { failures })
        }
    }

    fn create(&mut self) -> Result<Snapshot> {
        let source = &self.config.source;

        if !self.backend.exists(self.runner, source)? {
            return Err(BackupError::VolumeNotFound(source.to_string()));
        }

        if self.backend.is_ephemeral() {
            let leftovers = self.inventory.list(
                self.runner,
                self.backend.as_ref(),
                source,
                &self.config.prefix,
            )?;

            if let Some(stale) = leftovers.last() {
                return Err(BackupError::StaleSnapshot(stale.qualified_name()));
            }
        }

        let snapshot = Snapshot::new(source.clone(), snapshot::new_name(&self.config.prefix));

        self.backend.create_snapshot(self.runner, &snapshot)?;
        self.inventory.invalidate(source);
        self.enter(Stage::SnapshotCreated);

        Ok(snapshot)
    }

    fn transfer_and_prune(&mut self, snapshot: &Snapshot) -> Result<BackupReport> {
        self.runner.check_interrupted()?;

        let destination = self
            .config
            .destination
            .clone()
            .ok_or_else(|| BackupError::configuration("Destination for backups not provided"))?;

        let transfer = match &destination {
            Destination::Dataset(target) => Transfer::Replicated(self.replicate(snapshot, target)?),
            Destination::Archive(archive) => {
                Transfer::Archived(self.backend.archive(self.runner, snapshot, archive)?)
            }
        };

        self.enter(Stage::Replicated);
        self.runner.check_interrupted()?;

        let pruned = if self.backend.is_ephemeral() {
            0
        } else {
            self.prune()?
        };

        self.enter(Stage::Pruned);

        Ok(BackupReport {
            snapshot: snapshot.clone(),
            transfer,
            pruned,
        })
    }

    fn replicate(&mut self, snapshot: &Snapshot, target: &Volume) -> Result<ReplicationPlan> {
        let source = self.inventory.list(
            self.runner,
            self.backend.as_ref(),
            &self.config.source,
            &self.config.prefix,
        )?;
        let replicas = if self.backend.exists(self.runner, target)? {
            self.inventory.list(
                self.runner,
                self.backend.as_ref(),
                target,
                &self.config.prefix,
            )?
        } else {
            info!("Destination {} does not exist yet, sending in full", target);
            Vec::new()
        };

        let plan = planner::plan(snapshot, &source, &replicas);

        info!("Replicating to {}: {}", target, plan);

        self.backend.send(self.runner, &plan, target)?;
        self.inventory.invalidate(target);

        Ok(plan)
    }

    /// Releases and destroys an ephemeral snapshot after a successful run.
    fn dispose(&mut self, snapshot: &Snapshot) -> Result<()> {
        info!("Cleaning up mount point and snapshot");

        let released = self.backend.release(self.runner, snapshot);
        let destroyed = released.and_then(|()| self.backend.destroy_snapshot(self.runner, snapshot));

        self.inventory.invalidate(snapshot.volume());

        destroyed
    }

    fn abort(&mut self, snapshot: &Snapshot, err: &BackupError) {
        self.enter(Stage::Aborting);

        if !self.backend.is_ephemeral() {
            warn!("Backup failed after creating {}: {}", snapshot, err);
            return;
        }

        warn!("Backup failed after creating {}, cleaning up: {}", snapshot, err);

        if let Err(cleanup) = self.backend.release(self.runner, snapshot) {
            warn!("Cleanup could not release {}: {}", snapshot, cleanup);
        }

        if let Err(cleanup) = self.backend.destroy_snapshot(self.runner, snapshot) {
            warn!("Cleanup could not destroy {}: {}", snapshot, cleanup);
        }

        self.inventory.invalidate(snapshot.volume());
    }

    fn enter(&mut self, stage: Stage) {
        debug!("Backup stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }
}
