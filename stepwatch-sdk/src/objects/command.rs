//! Controller-to-target command vocabulary.
//!
//! # Wire form
//!
//! Commands travel as a single line of whitespace separated tokens, the
//! command name first:
//!
//! ```text
//! start_worker thread1
//! stop_worker thread1
//! quit
//! ```
//!
//! A line is first split into a [`RawCommand`]; the closed [`Command`]
//! enumeration is then resolved from it. Unknown names are not an error at
//! this layer, the target reports them as unrecognized.

use crate::ids::ThreadId;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tokenized command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommand {
    pub name: CompactString,
    pub args: Vec<CompactString>,
}

impl RawCommand {
    /// Split a line into name and arguments. Returns `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(CompactString::from);
        let name = tokens.next()?;
        Some(Self {
            name,
            args: tokens.collect(),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("command `{command}` expects {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: usize,
        got: usize,
    },
}

/// The closed set of commands the target understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Spawn the named worker and acknowledge once it is running.
    StartWorker { name: CompactString },
    /// Join the named worker; acknowledged only after it has finished.
    StopWorker { name: CompactString },
    /// Leave the command loop.
    Quit,
}

impl Command {
    pub const START_WORKER: &'static str = "start_worker";
    pub const STOP_WORKER: &'static str = "stop_worker";
    pub const QUIT: &'static str = "quit";

    pub fn start_worker(name: impl Into<CompactString>) -> Self {
        Command::StartWorker { name: name.into() }
    }

    pub fn stop_worker(name: impl Into<CompactString>) -> Self {
        Command::StopWorker { name: name.into() }
    }

    /// Resolve a raw command. `Ok(None)` means the name is not part of the
    /// vocabulary.
    pub fn from_raw(raw: &RawCommand) -> Result<Option<Self>, CommandParseError> {
        let command = match raw.name.as_str() {
            Self::START_WORKER => Command::StartWorker {
                name: single_arg(Self::START_WORKER, &raw.args)?,
            },
            Self::STOP_WORKER => Command::StopWorker {
                name: single_arg(Self::STOP_WORKER, &raw.args)?,
            },
            Self::QUIT => {
                if !raw.args.is_empty() {
                    return Err(CommandParseError::Arity {
                        command: Self::QUIT,
                        expected: 0,
                        got: raw.args.len(),
                    });
                }
                Command::Quit
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::StartWorker { .. } => Self::START_WORKER,
            Command::StopWorker { .. } => Self::STOP_WORKER,
            Command::Quit => Self::QUIT,
        }
    }
}

fn single_arg(command: &'static str, args: &[CompactString]) -> Result<CompactString, CommandParseError> {
    match args {
        [one] => Ok(one.clone()),
        _ => Err(CommandParseError::Arity {
            command,
            expected: 1,
            got: args.len(),
        }),
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::StartWorker { name } | Command::StopWorker { name } => {
                write!(f, "{} {}", self.name(), name)
            }
            Command::Quit => f.write_str(self.name()),
        }
    }
}

/// Target acknowledgement of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    /// Worker spawned and assigned a thread id.
    Started { thread: ThreadId },
    /// Worker joined. `clean` is false when the join itself failed; the
    /// failure is recorded by the target rather than propagated.
    Joined { name: CompactString, clean: bool },
    /// The target is leaving its command loop.
    Quitting,
}
