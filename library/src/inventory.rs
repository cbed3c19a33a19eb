use std::collections::HashMap;

use itertools::Itertools;
use log::debug;
use regex::Regex;

use crate::{
    backend::Backend,
    error::Result,
    runner::Runner,
    snapshot::{Snapshot, Volume},
};

/// Per-run cache of the engine's snapshots, keyed by volume and prefix.
///
/// Any snapshot created or destroyed on a volume must be followed by
/// [`Inventory::invalidate`] for that volume.
#[derive(Debug, Default)]
pub struct Inventory {
    cache: HashMap<(Volume, String), Vec<Snapshot>>,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory::default()
    }

    /// Snapshots of `volume` named `<prefix>_<YYMMDD>_<HHMMSS>`, oldest first.
    pub fn list(
        &mut self,
        runner: &Runner,
        backend: &dyn Backend,
        volume: &Volume,
        prefix: &str,
    ) -> Result<Vec<Snapshot>> {
        let key = (volume.clone(), prefix.to_string());

        if let Some(snapshots) = self.cache.get(&key) {
            return Ok(snapshots.clone());
        }

        debug!("Getting snapshots for {}", volume);

        let entries = backend.list_snapshots(runner, volume)?;
        let snapshots = filter_snapshots(volume, prefix, entries)?;

        self.cache.insert(key, snapshots.clone());

        Ok(snapshots)
    }

    pub fn invalidate(&mut self, volume: &Volume) {
        self.cache.retain(|(cached, _), _| cached != volume);
    }
}

/// Matches `<volume><separator><prefix>_<6 digits>_<6 digits>` exactly, capturing the snapshot name.
pub fn snapshot_pattern(volume: &Volume, prefix: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"^{}{}({}_\d{{6}}_\d{{6}})$",
        regex::escape(&volume.name),
        regex::escape(&volume.kind.separator().to_string()),
        regex::escape(prefix)
    ))?)
}

/// Keeps the entries that follow the naming convention, sorted by timestamp.
///
/// Anything else on the volume belongs to someone else and is skipped.
pub fn filter_snapshots<I, S>(volume: &Volume, prefix: &str, entries: I) -> Result<Vec<Snapshot>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let pattern = snapshot_pattern(volume, prefix)?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.as_ref().trim();

            match pattern.captures(entry).and_then(|captures| captures.get(1)) {
                Some(name) => Some(Snapshot::new(volume.clone(), name.as_str())),
                None => {
                    debug!("No match for snapshot: {} with pattern {}", entry, pattern);
                    None
                }
            }
        })
        .sorted_by(|a, b| {
            a.timestamp()
                .cmp(b.timestamp())
                .then_with(|| a.name().cmp(b.name()))
        })
        .dedup()
        .collect())
}
