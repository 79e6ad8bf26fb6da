//! Channel factories and handles.
//!
//! Provides factory functions for the two channels between controller and
//! target: the command channel (controller -> target, with a oneshot reply
//! per command) and the candidate event channel (target workers ->
//! controller, with a oneshot release per candidate).

use super::types::Event;
use crate::processors::debuggee::DispatchError;
use stepwatch_sdk::objects::{Command, Reply};
use tokio::sync::{mpsc, oneshot};

/// A candidate event in flight from a worker.
///
/// The emitting worker stays blocked until the candidate is released, so
/// the controller can apply a suspend policy before the worker moves on.
/// Dropping an unreleased candidate releases it as well.
#[derive(Debug)]
pub struct Candidate {
    pub event: Event,
    release: Option<oneshot::Sender<()>>,
}

impl Candidate {
    /// Wrap an event, returning the half the worker waits on.
    pub fn new(event: Event) -> (Self, oneshot::Receiver<()>) {
        let (release_tx, release_rx) = oneshot::channel();
        (
            Self {
                event,
                release: Some(release_tx),
            },
            release_rx,
        )
    }

    /// Let the emitting worker continue. Idempotent.
    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            // The worker may have been aborted in the meantime.
            let _ = release.send(());
        }
    }

    pub fn is_released(&self) -> bool {
        self.release.is_none()
    }
}

/// Sender handle for candidate events. Cloned into every worker.
pub type EventSender = mpsc::Sender<Candidate>;
/// Receiver handle for candidate events. Owned by the single event waiter.
pub type EventReceiver = mpsc::Receiver<Candidate>;

/// Reply half carried with each command.
pub type ReplySender = oneshot::Sender<Result<Reply, DispatchError>>;

/// A command together with the channel its acknowledgement is sent on.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: Command,
    pub reply: ReplySender,
}

/// Sender handle for commands.
pub type CommandSender = mpsc::Sender<CommandEnvelope>;
/// Receiver handle for commands.
pub type CommandReceiver = mpsc::Receiver<CommandEnvelope>;

/// Create a new candidate event channel.
///
/// Multiple senders can be cloned from the returned sender, one per worker.
pub fn candidate_event_channel(buffer: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer)
}

/// Create a new command channel.
pub fn command_channel(buffer: usize) -> (CommandSender, CommandReceiver) {
    mpsc::channel(buffer)
}
