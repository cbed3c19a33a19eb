use console::style;
use serde_json::json;
use snapback_library::snapshot::Snapshot;
use tabled::{
    builder::Builder,
    settings::{Style, Theme},
};

fn local_datetime(snapshot: &Snapshot) -> String {
    snapshot
        .datetime()
        .map(|datetime| datetime.to_string())
        .unwrap_or_else(|| "Unavailable".to_string())
}

pub fn print_snapshot_table(snapshots: &[Snapshot]) -> anyhow::Result<()> {
    if snapshots.is_empty() {
        println!("No snapshots found.");
        return Ok(());
    }

    println!("{}", render_snapshot_table(snapshots));

    Ok(())
}

fn render_snapshot_table(snapshots: &[Snapshot]) -> String {
    let header = ["Snapshot Name", "Local Datetime", "Qualified Name"]
        .iter()
        .map(|s| style(s).green().bold().to_string())
        .collect::<Vec<String>>();

    let mut builder = Builder::default();
    builder.push_record(header);

    for snapshot in snapshots {
        builder.push_record([
            snapshot.name().to_string(),
            local_datetime(snapshot),
            snapshot.qualified_name(),
        ]);
    }

    let mut table = builder.build();

    let mut style = Theme::from_style(Style::markdown());
    style.remove_borders_horizontal();

    table.with(style);

    table.to_string()
}

pub fn print_snapshot_json(snapshots: &[Snapshot]) -> anyhow::Result<()> {
    let rows = snapshots
        .iter()
        .map(|snapshot| {
            json!({
                "name": snapshot.name(),
                "datetime": snapshot.datetime().map(|datetime| datetime.to_string()),
                "qualified_name": snapshot.qualified_name(),
                "volume": snapshot.volume(),
            })
        })
        .collect::<Vec<_>>();

    println!("{}", serde_json::to_string_pretty(&rows)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use snapback_library::snapshot::Volume;

    use super::*;

    #[test]
    fn test_table_lists_every_snapshot() {
        let volume = Volume::dataset("tank/data");
        let snapshots = [
            Snapshot::new(volume.clone(), "backup_240101_000000"),
            Snapshot::new(volume, "backup_240102_120000"),
        ];

        let table = render_snapshot_table(&snapshots);

        assert!(table.contains("tank/data@backup_240101_000000"));
        assert!(table.contains("2024-01-02 12:00:00"));
    }
}
