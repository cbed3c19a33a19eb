use std::{
    io, process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info};

use crate::{
    command::{Command, CommandOutput, Invocation, Target, Verb},
    config::EngineConfig,
    error::{BackupError, Result},
};

/// Starts external processes. The runner owns every policy decision; an executor only executes.
pub trait Executor {
    fn execute(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs commands on the local machine, blocking until the process exits.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let output = match invocation {
            Invocation::Argv(args) => {
                let (program, args) = args
                    .split_first()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
                process::Command::new(program).args(args).output()?
            }
            Invocation::Shell(script) => process::Command::new("bash")
                .args(["-o", "pipefail", "-c", script.as_str()])
                .output()?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// The single I/O boundary of the engine.
pub struct Runner {
    config: EngineConfig,
    executor: Box<dyn Executor>,
    interrupt: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(config: EngineConfig, executor: impl Executor + 'static) -> Self {
        Runner {
            config,
            executor: Box::new(executor),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag raised by a signal handler. Commands still run once it is set,
    /// so cleanup can go through, but callers stop at their next [`check_interrupted`].
    ///
    /// [`check_interrupted`]: Runner::check_interrupted
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    pub fn check_interrupted(&self) -> Result<()> {
        if self.is_interrupted() {
            return Err(BackupError::Interrupted);
        }

        Ok(())
    }

    pub fn system(config: EngineConfig) -> Self {
        Runner::new(config, SystemExecutor)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run(&self, command: &Command) -> Result<CommandOutput> {
        guard(command)?;

        if self.config.dry_run {
            info!("Dry run - would have run: {}", command);
            return Ok(CommandOutput::default());
        }

        debug!("Running command: {}", command);

        let output = self
            .executor
            .execute(command.invocation())
            .map_err(|source| BackupError::Spawn {
                command: command.to_string(),
                source,
            })?;

        if command.checks_success() && !output.success() {
            if self.is_interrupted() {
                return Err(BackupError::Interrupted);
            }

            return Err(BackupError::Execution {
                command: command.to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(output)
    }
}

/// Destroy commands must name exactly one snapshot, and must actually reference it.
fn guard(command: &Command) -> Result<()> {
    if command.verb() != Verb::Destroy {
        return Ok(());
    }

    match command.target() {
        Target::Snapshot(snapshot)
            if !snapshot.name().is_empty() && command.mentions(&snapshot.qualified_name()) =>
        {
            Ok(())
        }
        _ => Err(BackupError::DestructionGuard {
            command: command.to_string(),
        }),
    }
}
