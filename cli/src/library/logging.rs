use std::{fs::OpenOptions, path::Path};

use anyhow::Context;
use env_logger::{Builder, Env, Target, WriteStyle};

/// Installs the global logger. `RUST_LOG` wins over the verbose switch.
pub fn init(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let mut builder = Builder::from_env(Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        builder
            .target(Target::Pipe(Box::new(file)))
            .write_style(WriteStyle::Never);
    }

    builder.try_init().context("Failed to initialise logging")?;

    Ok(())
}
