use log::{info, warn};

use crate::{
    backend::Backend,
    error::{BackupError, PruneFailure, Result},
    inventory::Inventory,
    runner::Runner,
    snapshot::{Snapshot, Volume},
};

/// Keep the `keep` most recent snapshots of each store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    keep: usize,
}

impl RetentionPolicy {
    pub fn new(keep: usize) -> Self {
        RetentionPolicy { keep }
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// The snapshots to delete from an oldest-first listing.
    pub fn expired<'a>(&self, snapshots: &'a [Snapshot]) -> &'a [Snapshot] {
        &snapshots[..snapshots.len().saturating_sub(self.keep)]
    }
}

/// Destroys the snapshots of `volume` that fall outside the policy.
///
/// Every expired snapshot is attempted; failures are collected and returned
/// together. Returns the number of snapshots destroyed.
pub fn prune(
    runner: &Runner,
    backend: &dyn Backend,
    inventory: &mut Inventory,
    volume: &Volume,
    prefix: &str,
    policy: RetentionPolicy,
) -> Result<usize> {
    let snapshots = inventory.list(runner, backend, volume, prefix)?;
    let expired = policy.expired(&snapshots);

    if expired.is_empty() {
        info!("No snapshots to prune on {}", volume);
        return Ok(0);
    }

    let mut failures = Vec::new();
    let mut destroyed = 0;

    for snapshot in expired {
        info!("Deleting snapshot: {}", snapshot);

        match backend.destroy_snapshot(runner, snapshot) {
            Ok(()) => destroyed += 1,
            Err(err @ BackupError::DestructionGuard { .. }) => {
                inventory.invalidate(volume);
                return Err(err);
            }
            Err(err) => {
                warn!("Failed to delete snapshot {}: {}", snapshot, err);
                failures.push(PruneFailure {
                    snapshot: snapshot.qualified_name(),
                    reason: err.to_string(),
                });
            }
        }
    }

    inventory.invalidate(volume);

    if failures.is_empty() {
        Ok(destroyed)
    } else {
        Err(BackupError::Prune { failures })
    }
}
