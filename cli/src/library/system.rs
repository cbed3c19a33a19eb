use std::{
    fs,
    sync::{Arc, atomic::AtomicBool},
};

use signal_hook::{
    consts::{SIGHUP, SIGINT, SIGTERM},
    flag,
};
use snapback_library::BackupError;

use crate::library::constant::{HOSTNAME_PATH, PROC_STATUS_PATH};

/// Fails unless the effective user is root.
pub fn require_root() -> Result<(), BackupError> {
    let status = fs::read_to_string(PROC_STATUS_PATH)?;

    match effective_uid(&status) {
        Some(0) => Ok(()),
        _ => Err(BackupError::InsufficientPrivileges),
    }
}

/// The effective uid is the second field of the `Uid:` line.
fn effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().nth(1))
        .and_then(|uid| uid.parse().ok())
}

/// Turns SIGINT, SIGTERM and SIGHUP into a flag so a running backup can clean up
/// before exiting. A second signal exits immediately.
pub fn install_signal_handlers() -> anyhow::Result<Arc<AtomicBool>> {
    let interrupt = Arc::new(AtomicBool::new(false));

    for signal in [SIGINT, SIGTERM, SIGHUP] {
        flag::register_conditional_shutdown(signal, 130, Arc::clone(&interrupt))?;
        flag::register(signal, Arc::clone(&interrupt))?;
    }

    Ok(interrupt)
}

pub fn hostname() -> String {
    fs::read_to_string(HOSTNAME_PATH)
        .map(|name| name.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use indoc::indoc;
    use signal_hook::low_level::raise;

    use super::*;

    #[test]
    fn test_effective_uid() {
        let status = indoc! {"
            Name:\tsnapback
            Umask:\t0022
            State:\tR (running)
            Uid:\t1000\t0\t0\t0
            Gid:\t1000\t1000\t1000\t1000
        "};

        assert_eq!(effective_uid(status), Some(0));
    }

    #[test]
    fn test_unprivileged_and_malformed_status() {
        assert_eq!(effective_uid("Uid:\t1000\t1000\t1000\t1000\n"), Some(1000));
        assert_eq!(effective_uid("Uid:\t1000\n"), None);
        assert_eq!(effective_uid("Name:\tsnapback\n"), None);
    }

    #[test]
    fn test_signal_raises_the_interrupt_flag() -> anyhow::Result<()> {
        let interrupt = install_signal_handlers()?;
        assert!(!interrupt.load(Ordering::SeqCst));

        raise(SIGHUP)?;

        assert!(interrupt.load(Ordering::SeqCst));

        Ok(())
    }
}
