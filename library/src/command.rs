use std::{fmt, path::PathBuf};

use itertools::Itertools;

use crate::snapshot::{Snapshot, Volume};

/// What a command does to external state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Query,
    Create,
    Transfer,
    Mount,
    Unmount,
    Destroy,
}

/// What a command acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Volume(Volume),
    Snapshot(Snapshot),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Argv(Vec<String>),
    /// Interpreted by a shell with `pipefail`; used for pipelines and redirection.
    Shell(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: Verb,
    target: Target,
    invocation: Invocation,
    check: bool,
}

impl Command {
    pub fn argv<I, S>(verb: Verb, target: Target, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Command {
            verb,
            target,
            invocation: Invocation::Argv(args.into_iter().map(Into::into).collect()),
            check: true,
        }
    }

    pub fn shell(verb: Verb, target: Target, script: impl Into<String>) -> Self {
        Command {
            verb,
            target,
            invocation: Invocation::Shell(script.into()),
            check: true,
        }
    }

    /// A non-zero exit is returned to the caller instead of failing.
    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn checks_success(&self) -> bool {
        self.check
    }

    /// Whether `word` appears as a whole argument (or whole shell word).
    pub fn mentions(&self, word: &str) -> bool {
        match &self.invocation {
            Invocation::Argv(args) => args
                .iter()
                .any(|arg| arg == word || arg.split_whitespace().any(|w| unquote(w) == word)),
            Invocation::Shell(script) => script.split_whitespace().any(|w| unquote(w) == word),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.invocation {
            Invocation::Argv(args) => write!(f, "{}", args.iter().map(|a| quote(a)).join(" ")),
            Invocation::Shell(script) => f.write_str(script),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Quotes a word for a POSIX shell, leaving plain identifiers untouched.
pub fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/@_-.:,+=%".contains(c));

    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn unquote(word: &str) -> &str {
    word.trim_matches('\'')
}
