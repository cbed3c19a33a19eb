use std::fmt;

use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationPlan {
    Full(Snapshot),
    Incremental { base: Snapshot, snapshot: Snapshot },
}

impl ReplicationPlan {
    pub fn snapshot(&self) -> &Snapshot {
        match self {
            ReplicationPlan::Full(snapshot) => snapshot,
            ReplicationPlan::Incremental { snapshot, .. } => snapshot,
        }
    }

    pub fn base(&self) -> Option<&Snapshot> {
        match self {
            ReplicationPlan::Full(_) => None,
            ReplicationPlan::Incremental { base, .. } => Some(base),
        }
    }
}

impl fmt::Display for ReplicationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationPlan::Full(snapshot) => write!(f, "full send of {}", snapshot),
            ReplicationPlan::Incremental { base, snapshot } => {
                write!(f, "incremental send of {} from {}", snapshot, base.name())
            }
        }
    }
}

/// Chooses between an incremental and a full send of `snapshot`.
///
/// The base is the newest source snapshot taken before `snapshot`. It is only
/// used when a snapshot of the same name already exists on the destination.
pub fn plan(snapshot: &Snapshot, source: &[Snapshot], destination: &[Snapshot]) -> ReplicationPlan {
    let base = source
        .iter()
        .rev()
        .find(|candidate| {
            candidate.name() != snapshot.name() && candidate.timestamp() < snapshot.timestamp()
        });

    match base {
        Some(base) if destination.iter().any(|replica| replica.name() == base.name()) => {
            ReplicationPlan::Incremental {
                base: base.clone(),
                snapshot: snapshot.clone(),
            }
        }
        _ => ReplicationPlan::Full(snapshot.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Volume;

    fn snapshots(volume: &Volume, names: &[&str]) -> Vec<Snapshot> {
        names
            .iter()
            .map(|name| Snapshot::new(volume.clone(), *name))
            .collect()
    }

    const S1: &str = "backup_240101_000000";
    const S2: &str = "backup_240102_000000";
    const S3: &str = "backup_240103_000000";

    #[test]
    fn test_full_when_destination_is_empty() {
        let source = snapshots(&Volume::dataset("tank/data"), &[S1, S2, S3]);

        let plan = plan(&source[2], &source, &[]);

        assert_eq!(plan, ReplicationPlan::Full(source[2].clone()));
    }

    #[test]
    fn test_incremental_from_previous_snapshot_on_destination() {
        let source = snapshots(&Volume::dataset("tank/data"), &[S1, S2, S3]);
        let destination = snapshots(&Volume::dataset("backup/data"), &[S2]);

        let plan = plan(&source[2], &source, &destination);

        assert_eq!(
            plan,
            ReplicationPlan::Incremental {
                base: source[1].clone(),
                snapshot: source[2].clone(),
            }
        );
    }

    #[test]
    fn test_full_for_first_snapshot() {
        let source = snapshots(&Volume::dataset("tank/data"), &[S1]);

        let plan = plan(&source[0], &source, &[]);

        assert_eq!(plan, ReplicationPlan::Full(source[0].clone()));
    }

    #[test]
    fn test_full_when_only_older_ancestor_is_replicated() {
        let source = snapshots(&Volume::dataset("tank/data"), &[S1, S2, S3]);
        let destination = snapshots(&Volume::dataset("backup/data"), &[S1]);

        let plan = plan(&source[2], &source, &destination);

        assert_eq!(plan, ReplicationPlan::Full(source[2].clone()));
    }

    #[test]
    fn test_new_snapshot_missing_from_listing() {
        let volume = Volume::dataset("tank/data");
        let source = snapshots(&volume, &[S1, S2]);
        let destination = snapshots(&Volume::dataset("backup/data"), &[S1, S2]);
        let new = Snapshot::new(volume, S3);

        let plan = plan(&new, &source, &destination);

        assert_eq!(plan.base(), Some(&source[1]));
        assert_eq!(plan.snapshot(), &new);
    }

    #[test]
    fn test_never_uses_a_newer_snapshot_as_base() {
        let volume = Volume::dataset("tank/data");
        let source = snapshots(&volume, &[S1, S3]);
        let destination = snapshots(&Volume::dataset("backup/data"), &[S1, S3]);
        let new = Snapshot::new(volume, S2);

        let plan = plan(&new, &source, &destination);

        assert_eq!(plan.base(), Some(&source[0]));
    }
}
