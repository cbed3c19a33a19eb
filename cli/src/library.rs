pub mod cli;
pub mod config;
pub mod constant;
pub mod logging;
pub mod notify;
pub mod system;
pub mod table;
