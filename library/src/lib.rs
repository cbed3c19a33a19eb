pub mod backend;
pub mod command;
pub mod config;
pub mod constant;
pub mod error;
pub mod inventory;
pub mod lock;
pub mod orchestrator;
pub mod planner;
pub mod retention;
pub mod runner;
pub mod snapshot;

pub use error::{BackupError, Result};
