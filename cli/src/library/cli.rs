use std::{
    path::{Path, PathBuf},
    sync::{Arc, atomic::AtomicBool},
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use indoc::indoc;
use log::{error, info};
use snapback_library::{
    BackupError,
    config::{BackendConfig, BackupConfig, EngineConfig},
    constant::{
        DEFAULT_ARCHIVE_SUB_PATH, DEFAULT_LOCK_DIR, DEFAULT_LV_SNAPSHOT_SIZE, DEFAULT_MOUNT_BASE,
        DEFAULT_RETAINED_SNAPSHOTS, DEFAULT_SNAPSHOT_PREFIX,
    },
    inventory::Inventory,
    lock::VolumeLock,
    orchestrator::{Orchestrator, Transfer},
    runner::Runner,
};

use crate::library::{
    config::Environment,
    logging, notify, system,
    table::{print_snapshot_json, print_snapshot_table},
};

/// Snapshot, replicate and prune ZFS datasets and LVM logical volumes.
#[derive(Parser, Debug)]
#[command(name = "snapback", version, long_about = None)]
#[command(after_help = indoc! {"
    Environment:
      DRY_RUN=1      Log every command instead of running it
      DEBUG=1        Log at debug level
      WEBHOOK_URL    Post a message to this webhook when a backup fails
"})]
pub struct Cli {
    /// Append the log to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Directory holding the per-volume lock files.
    #[arg(long, global = true, default_value = DEFAULT_LOCK_DIR)]
    pub lock_dir: PathBuf,

    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    #[arg(long, short = 'n', global = true, default_value_t = false)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Snapshot a ZFS dataset, send it to another dataset or a directory and prune old snapshots.
    Zfs(ZfsArgs),
    /// Snapshot an LVM logical volume, archive its files and remove the snapshot again.
    Lvm(LvmArgs),
    /// List the backup snapshots of a volume.
    List(ListArgs),
}

#[derive(Args, Debug)]
pub struct ZfsArgs {
    #[arg(long)]
    pub src_dataset: String,

    /// Run the source side over ssh on this host.
    #[arg(long)]
    pub src_host: Option<String>,

    #[arg(long, conflicts_with = "dest_directory")]
    pub dest_dataset: Option<String>,

    #[arg(long, requires = "dest_dataset")]
    pub dest_host: Option<String>,

    /// Write a gzipped stream file here instead of receiving into a dataset.
    #[arg(long)]
    pub dest_directory: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_SNAPSHOT_PREFIX)]
    pub snap_prefix: String,

    /// Snapshots to keep on each side.
    #[arg(long, default_value_t = DEFAULT_RETAINED_SNAPSHOTS)]
    pub num_snaps: usize,
}

#[derive(Args, Debug)]
pub struct LvmArgs {
    #[arg(long)]
    pub vg: String,

    #[arg(long)]
    pub lv: String,

    #[arg(long)]
    pub target_dir: PathBuf,

    /// Glob of the paths to archive, relative to the volume root.
    #[arg(long, default_value = DEFAULT_ARCHIVE_SUB_PATH)]
    pub src_path: String,

    /// Copy-on-write space reserved for the snapshot.
    #[arg(long, default_value = DEFAULT_LV_SNAPSHOT_SIZE)]
    pub size: String,

    #[arg(long, default_value = DEFAULT_MOUNT_BASE)]
    pub mount_base: PathBuf,

    #[arg(long)]
    pub mount_options: Option<String>,

    #[arg(long, default_value = DEFAULT_SNAPSHOT_PREFIX)]
    pub snap_prefix: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(value_enum)]
    pub kind: VolumeKind,

    /// Dataset name, or `<vg>/<lv>` for a logical volume.
    pub volume: String,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long, default_value = DEFAULT_SNAPSHOT_PREFIX)]
    pub snap_prefix: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Zfs,
    Lvm,
}

impl Commands {
    fn is_backup(&self) -> bool {
        !matches!(self, Commands::List(_))
    }
}

/// Parses the command line, runs it and returns the process exit code.
pub fn run() -> i32 {
    let args = Cli::parse();
    let environment = Environment::from_env();

    let engine = EngineConfig {
        dry_run: args.dry_run || environment.dry_run,
        verbose: args.verbose || environment.debug,
    };

    if let Err(err) = logging::init(engine.verbose, args.log_file.as_deref()) {
        eprintln!("{:#}", err);
        return 1;
    }

    let interrupt = match system::install_signal_handlers() {
        Ok(interrupt) => interrupt,
        Err(err) => {
            error!("Failed to install signal handlers: {:#}", err);
            return 1;
        }
    };

    match execute(&args, engine, interrupt) {
        Ok(()) => 0,
        Err(err) => {
            error!("{:#}", err);

            if args.command.is_backup() {
                notify::send_failure(environment.webhook_url.as_deref(), &format!("{:#}", err));
            }

            exit_code(&err)
        }
    }
}

fn execute(args: &Cli, engine: EngineConfig, interrupt: Arc<AtomicBool>) -> anyhow::Result<()> {
    let runner = Runner::system(engine).with_interrupt(interrupt);

    match &args.command {
        Commands::Zfs(zfs) => backup(
            &runner,
            &args.lock_dir,
            zfs.backup_config(),
            BackendConfig::Dataset,
        ),
        Commands::Lvm(lvm) => backup(
            &runner,
            &args.lock_dir,
            lvm.backup_config(),
            lvm.backend_config(),
        ),
        Commands::List(list) => list_snapshots(&runner, list),
    }
}

fn backup(
    runner: &Runner,
    lock_dir: &Path,
    config: BackupConfig,
    backend: BackendConfig,
) -> anyhow::Result<()> {
    config.validate()?;

    let dry_run = runner.config().dry_run;

    if dry_run {
        info!("Dry run enabled, no changes will be made");
    } else {
        system::require_root()?;
    }

    let _lock = if dry_run {
        None
    } else {
        Some(VolumeLock::acquire(lock_dir, &config.source)?)
    };

    info!("Starting backup of {}", config.source);

    let source = config.source.clone();
    let mut orchestrator = Orchestrator::new(runner, backend.build(), config);
    let report = orchestrator.run()?;

    match &report.transfer {
        Transfer::Replicated(plan) => info!("Replicated {}", plan),
        Transfer::Archived(path) => info!("Archived {} to {}", report.snapshot, path.display()),
    }

    info!(
        "Backup of {} finished, pruned {} snapshot(s)",
        source, report.pruned
    );

    Ok(())
}

fn list_snapshots(runner: &Runner, args: &ListArgs) -> anyhow::Result<()> {
    let (volume, backend) = args.volume_and_backend()?;

    let snapshots = Inventory::new()
        .list(runner, backend.build().as_ref(), &volume, &args.snap_prefix)
        .with_context(|| format!("Failed to list snapshots of {}", volume))?;

    if args.json {
        print_snapshot_json(&snapshots)
    } else {
        print_snapshot_table(&snapshots)
    }
}

/// Engine failures keep their own exit codes; anything else exits with 1.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<BackupError>()
        .map(BackupError::exit_code)
        .unwrap_or(1)
}
