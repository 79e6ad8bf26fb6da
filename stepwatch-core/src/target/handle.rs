//! Controller-side handle to a running target.

use super::gate::TargetControl;
use crate::events::{CommandEnvelope, CommandSender};
use crate::processors::debuggee::DispatchError;
use compact_str::CompactString;
use std::sync::Arc;
use stepwatch_sdk::ids::ThreadId;
use stepwatch_sdk::objects::{Command, Reply};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Errors from a command round trip.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The target's command loop is gone.
    #[error("target command channel closed")]
    Closed,

    /// The target accepted the command but never replied.
    #[error("target dropped the reply")]
    NoReply,

    /// The target rejected the command.
    #[error("command rejected: {0}")]
    Dispatch(#[from] DispatchError),

    /// The reply does not belong to the command sent.
    #[error("unexpected reply {0:?}")]
    UnexpectedReply(Reply),
}

/// Sends commands to the target and drives its suspension.
///
/// Cheap to clone; every clone talks to the same target.
#[derive(Clone)]
pub struct TargetHandle {
    command_tx: CommandSender,
    control: Arc<dyn TargetControl>,
}

impl TargetHandle {
    pub fn new(command_tx: CommandSender, control: Arc<dyn TargetControl>) -> Self {
        Self {
            command_tx,
            control,
        }
    }

    /// Send a command and wait for its acknowledgement.
    ///
    /// When this returns the target has fully applied the command.
    pub async fn send(&self, command: Command) -> Result<Reply, ChannelError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        debug!(%command, "Sending command");
        self.command_tx
            .send(CommandEnvelope {
                command,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ChannelError::Closed)?;
        let reply = reply_rx.await.map_err(|_| ChannelError::NoReply)??;
        Ok(reply)
    }

    /// Start a worker and return its thread id.
    pub async fn start_worker(&self, name: impl Into<CompactString>) -> Result<ThreadId, ChannelError> {
        match self.send(Command::start_worker(name)).await? {
            Reply::Started { thread } => Ok(thread),
            other => Err(ChannelError::UnexpectedReply(other)),
        }
    }

    /// Join a worker. Returns whether the join was clean.
    pub async fn stop_worker(&self, name: impl Into<CompactString>) -> Result<bool, ChannelError> {
        match self.send(Command::stop_worker(name)).await? {
            Reply::Joined { clean, .. } => Ok(clean),
            other => Err(ChannelError::UnexpectedReply(other)),
        }
    }

    pub async fn quit(&self) -> Result<(), ChannelError> {
        match self.send(Command::Quit).await? {
            Reply::Quitting => Ok(()),
            other => Err(ChannelError::UnexpectedReply(other)),
        }
    }

    /// The suspension control shared with the target.
    pub fn control(&self) -> Arc<dyn TargetControl> {
        Arc::clone(&self.control)
    }

    pub async fn suspend_all(&self) {
        self.control.suspend_all().await;
    }

    pub async fn resume(&self) {
        self.control.resume().await;
    }

    pub async fn hold_thread(&self, thread: ThreadId) {
        self.control.hold_thread(thread).await;
    }

    pub async fn release_thread(&self, thread: ThreadId) {
        self.control.release_thread(thread).await;
    }
}
