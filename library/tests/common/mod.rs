#![allow(dead_code)]

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    io,
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use snapback_library::{
    command::{CommandOutput, Invocation},
    runner::Executor,
};

#[derive(Default)]
struct State {
    calls: Vec<String>,
    /// dataset -> snapshot names
    datasets: BTreeMap<String, Vec<String>>,
    /// `vg/lv` -> origin LV for snapshots, `None` for regular volumes
    logical_volumes: BTreeMap<String, Option<String>>,
    mounts: BTreeSet<String>,
    failures: Vec<(String, i32, String)>,
    interrupts: Vec<(String, Arc<AtomicBool>)>,
}

/// A pretend machine with ZFS and LVM, driven by the commands the engine issues.
#[derive(Clone, Default)]
pub struct Host {
    state: Rc<RefCell<State>>,
}

impl Host {
    pub fn new() -> Self {
        Host::default()
    }

    pub fn with_dataset(self, name: &str, snapshots: &[&str]) -> Self {
        self.state.borrow_mut().datasets.insert(
            name.to_string(),
            snapshots.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_logical_volume(self, name: &str) -> Self {
        self.state
            .borrow_mut()
            .logical_volumes
            .insert(name.to_string(), None);
        self
    }

    pub fn with_lv_snapshot(self, name: &str, origin: &str) -> Self {
        self.state
            .borrow_mut()
            .logical_volumes
            .insert(name.to_string(), Some(origin.to_string()));
        self
    }

    /// Every command containing `needle` exits with `code` and leaves state untouched.
    pub fn fail_when(self, needle: &str, code: i32, stderr: &str) -> Self {
        self.state
            .borrow_mut()
            .failures
            .push((needle.to_string(), code, stderr.to_string()));
        self
    }

    /// Raises `flag` while a command containing `needle` runs, as a signal would.
    pub fn interrupt_when(self, needle: &str, flag: Arc<AtomicBool>) -> Self {
        self.state
            .borrow_mut()
            .interrupts
            .push((needle.to_string(), flag));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.contains(needle))
            .collect()
    }

    pub fn position(&self, needle: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.contains(needle))
    }

    pub fn snapshots(&self, dataset: &str) -> Vec<String> {
        self.state
            .borrow()
            .datasets
            .get(dataset)
            .cloned()
            .unwrap_or_default()
    }

    pub fn logical_volumes(&self) -> Vec<String> {
        self.state
            .borrow()
            .logical_volumes
            .keys()
            .cloned()
            .collect()
    }

    pub fn mounts(&self) -> Vec<String> {
        self.state.borrow().mounts.iter().cloned().collect()
    }

    fn interpret(&self, words: &[&str], line: &str) -> CommandOutput {
        let mut state = self.state.borrow_mut();

        match words {
            ["ssh", _host, rest @ ..] => {
                drop(state);
                let remote = rest.join(" ");
                let remote_words = remote.split_whitespace().collect::<Vec<_>>();
                self.interpret(&remote_words, line)
            }
            ["zfs", "list", "-H", "-o", "name", dataset] => {
                if state.datasets.contains_key(*dataset) {
                    ok(format!("{}\n", dataset))
                } else {
                    fail(1, &format!("cannot open '{}': dataset does not exist", dataset))
                }
            }
            ["zfs", "list", "-H", "-t", "snapshot", "-o", "name", dataset] => {
                match state.datasets.get(*dataset) {
                    Some(snapshots) => ok(snapshots
                        .iter()
                        .map(|name| format!("{}@{}\n", dataset, name))
                        .collect()),
                    None => fail(1, "dataset does not exist"),
                }
            }
            ["zfs", "snapshot", "-r", qualified] => {
                let (dataset, name) = qualified.split_once('@').expect("qualified snapshot");
                match state.datasets.get_mut(dataset) {
                    Some(snapshots) => {
                        snapshots.push(name.to_string());
                        ok(String::new())
                    }
                    None => fail(1, "dataset does not exist"),
                }
            }
            ["zfs", "destroy", "-r", qualified] => {
                let (dataset, name) = qualified.split_once('@').expect("qualified snapshot");
                let snapshots = state.datasets.entry(dataset.to_string()).or_default();
                match snapshots.iter().position(|s| s == name) {
                    Some(index) => {
                        snapshots.remove(index);
                        ok(String::new())
                    }
                    None => fail(1, "could not find any snapshots to destroy"),
                }
            }
            ["lvs", "--noheadings", "--separator", ",", "-o", "lv_name,origin", vg] => ok(state
                .logical_volumes
                .iter()
                .filter_map(|(name, origin)| {
                    let (group, lv) = name.split_once('/')?;
                    (group == *vg).then(|| {
                        format!("  {},{}\n", lv, origin.clone().unwrap_or_default())
                    })
                })
                .collect()),
            ["lvs", "--noheadings", name] => {
                if state.logical_volumes.contains_key(*name) {
                    ok(format!("  {}\n", name))
                } else {
                    fail(5, "Failed to find logical volume")
                }
            }
            ["lvcreate", "--snapshot", "--name", snapshot, "--size", _size, origin] => {
                let (vg, lv) = origin.split_once('/').expect("vg/lv");
                state
                    .logical_volumes
                    .insert(format!("{}/{}", vg, snapshot), Some(lv.to_string()));
                ok(String::new())
            }
            ["lvremove", "-y", name] => match state.logical_volumes.remove(*name) {
                Some(_) => ok(String::new()),
                None => fail(5, "Failed to find logical volume"),
            },
            ["findmnt", "-n", "-o", "TARGET", "--mountpoint", path] => {
                if state.mounts.contains(*path) {
                    ok(format!("{}\n", path))
                } else {
                    fail(1, "")
                }
            }
            ["mount", .., path] => {
                state.mounts.insert(path.to_string());
                ok(String::new())
            }
            ["umount", path] => {
                if state.mounts.remove(*path) {
                    ok(String::new())
                } else {
                    fail(32, "not mounted")
                }
            }
            ["mkdir", "-p", _] | ["rmdir", _] => ok(String::new()),
            _ if line.contains("zfs recv") => {
                let line = line.replace('\'', "");
                let (send, receive) = line.split_once('|').expect("send pipeline");
                let snapshot = send.split_whitespace().last().expect("snapshot");
                let destination = receive.split_whitespace().last().expect("destination");
                let (_, name) = snapshot.split_once('@').expect("qualified snapshot");
                let base = send
                    .split_whitespace()
                    .skip_while(|word| *word != "-i")
                    .nth(1)
                    .and_then(|base| base.split_once('@'))
                    .map(|(_, base)| base.to_string());

                let replicas = state.datasets.entry(destination.to_string()).or_default();
                if let Some(base) = base {
                    if !replicas.contains(&base) {
                        return fail(1, "cannot receive incremental stream: destination has no base");
                    }
                }
                replicas.push(name.to_string());
                ok(String::new())
            }
            _ if line.contains("gzip >") || line.contains("tar czf") => ok(String::new()),
            _ => fail(127, &format!("unknown command: {}", line)),
        }
    }
}

impl Executor for Host {
    fn execute(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        let line = match invocation {
            Invocation::Argv(args) => args.join(" "),
            Invocation::Shell(script) => script.clone(),
        };

        self.state.borrow_mut().calls.push(line.clone());

        for (needle, flag) in &self.state.borrow().interrupts {
            if line.contains(needle.as_str()) {
                flag.store(true, Ordering::SeqCst);
            }
        }

        let failure = self
            .state
            .borrow()
            .failures
            .iter()
            .find(|(needle, _, _)| line.contains(needle.as_str()))
            .cloned();

        if let Some((_, code, stderr)) = failure {
            return Ok(fail(code, &stderr));
        }

        let words = match invocation {
            Invocation::Argv(args) => args.iter().map(String::as_str).collect::<Vec<_>>(),
            Invocation::Shell(_) => Vec::new(),
        };

        Ok(self.interpret(&words, &line))
    }
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        exit_code: 0,
        stdout,
        stderr: String::new(),
    }
}

fn fail(exit_code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_code,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
