//! Debuggee processor.
//!
//! The Debuggee is responsible for:
//! - Receiving `Command`s from the controller, one at a time
//! - Starting named workers and acknowledging once they are spawned
//! - Joining named workers and acknowledging only after they finished
//! - Recording worker join failures as a non-fatal success flag
//! - Giving up on a join when the shutdown signal arrives
//!
//! Commands are handled strictly in arrival order, so the worker table is
//! only ever touched by one command at a time.

use crate::events::{CommandReceiver, EventSender};
use crate::target::gate::SuspensionGate;
use crate::target::hierarchy::ClassHierarchy;
use crate::target::workload::{WorkerContext, Workload};
use compact_str::CompactString;
use kanau::processor::Processor;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use stepwatch_sdk::ids::ThreadId;
use stepwatch_sdk::objects::{Command, CommandParseError, RawCommand, Reply};
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors that can occur while dispatching a command.
///
/// All of them are protocol misuse by the controller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The worker is already running.
    #[error("worker `{0}` is already started")]
    DuplicateStart(CompactString),

    /// The worker is not running.
    #[error("worker `{0}` is not started")]
    NotStarted(CompactString),

    /// No workload is registered under this name.
    #[error("no workload named `{0}`")]
    UnknownWorkload(CompactString),

    /// A recognized command with malformed arguments.
    #[error("malformed command: {0}")]
    Parse(#[from] CommandParseError),
}

/// Final state of the target once its command loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    /// False when any worker join failed.
    pub success: bool,
    pub workers_joined: u32,
}

/// Lifecycle of a named worker: absent (no entry), running, joined.
enum WorkerSlot {
    Running {
        thread: ThreadId,
        handle: JoinHandle<()>,
    },
    Joined {
        thread: ThreadId,
    },
}

/// Target-side command handler owning the worker table.
pub struct Debuggee {
    workloads: HashMap<CompactString, Arc<dyn Workload>>,
    workers: Mutex<HashMap<CompactString, WorkerSlot>>,
    next_thread: AtomicU64,
    success: AtomicBool,
    workers_joined: AtomicU32,
    events_tx: EventSender,
    gate: SuspensionGate,
    hierarchy: Arc<ClassHierarchy>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Debuggee {
    /// Create a new Debuggee.
    ///
    /// # Arguments
    ///
    /// * `workloads` - Worker bodies by name
    /// * `events_tx` - Sender every worker reports candidate events on
    /// * `gate` - Suspension state shared with the controller
    /// * `hierarchy` - Type hierarchy used to stamp event lineages
    /// * `shutdown_rx` - Ends the command loop and any join in progress
    pub fn new(
        workloads: HashMap<CompactString, Arc<dyn Workload>>,
        events_tx: EventSender,
        gate: SuspensionGate,
        hierarchy: Arc<ClassHierarchy>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            workloads,
            workers: Mutex::new(HashMap::new()),
            next_thread: AtomicU64::new(1),
            success: AtomicBool::new(true),
            workers_joined: AtomicU32::new(0),
            events_tx,
            gate,
            hierarchy,
            shutdown_rx,
        }
    }

    /// Run the command loop until `Quit`, shutdown, or the controller
    /// dropping its command sender.
    pub async fn run(self, mut command_rx: CommandReceiver) -> TargetReport {
        info!(workloads = self.workloads.len(), "Debuggee started");
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                biased;

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Debuggee received shutdown signal");
                        break;
                    }
                }

                Some(envelope) = command_rx.recv() => {
                    let quit = matches!(envelope.command, Command::Quit);
                    debug!(command = %envelope.command, "Received command");

                    let result = self.process(envelope.command).await;
                    if let Err(e) = &result {
                        error!(error = %e, "Command rejected");
                    }
                    if envelope.reply.send(result).is_err() {
                        warn!("Controller dropped the reply channel");
                    }
                    if quit {
                        info!("Debuggee received quit");
                        break;
                    }
                }

                else => {
                    info!("Command channel closed");
                    break;
                }
            }
        }

        self.abort_running().await;
        let report = self.report();
        info!(
            success = report.success,
            workers_joined = report.workers_joined,
            "Debuggee shutdown complete"
        );
        report
    }

    /// Dispatch a command in its text form.
    ///
    /// Returns `Ok(false)` when the command name is not recognized.
    pub async fn dispatch_line(&self, line: &str) -> Result<bool, DispatchError> {
        let Some(raw) = RawCommand::parse(line) else {
            return Ok(false);
        };
        match Command::from_raw(&raw)? {
            Some(command) => {
                self.process(command).await?;
                Ok(true)
            }
            None => {
                debug!(command = %raw.name, "Unrecognized command");
                Ok(false)
            }
        }
    }

    pub fn report(&self) -> TargetReport {
        TargetReport {
            success: self.success.load(Ordering::SeqCst),
            workers_joined: self.workers_joined.load(Ordering::SeqCst),
        }
    }

    async fn start_worker(&self, name: CompactString) -> Result<Reply, DispatchError> {
        let workload = self
            .workloads
            .get(&name)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownWorkload(name.clone()))?;

        let mut workers = self.workers.lock().await;
        if let Some(WorkerSlot::Running { .. }) = workers.get(&name) {
            return Err(DispatchError::DuplicateStart(name));
        }

        let thread = ThreadId(self.next_thread.fetch_add(1, Ordering::SeqCst));
        let ctx = WorkerContext::new(
            name.clone(),
            thread,
            self.events_tx.clone(),
            self.gate.clone(),
            Arc::clone(&self.hierarchy),
        );
        let handle = tokio::spawn(async move { workload.run(ctx).await });

        info!(worker = %name, %thread, "Worker started");
        workers.insert(name, WorkerSlot::Running { thread, handle });
        Ok(Reply::Started { thread })
    }

    async fn stop_worker(&self, name: CompactString) -> Result<Reply, DispatchError> {
        let mut workers = self.workers.lock().await;
        let (thread, mut handle) = match workers.remove(&name) {
            Some(WorkerSlot::Running { thread, handle }) => (thread, handle),
            Some(WorkerSlot::Joined { thread }) => {
                debug!(worker = %name, %thread, "Worker was already joined");
                workers.insert(name.clone(), WorkerSlot::Joined { thread });
                return Err(DispatchError::NotStarted(name));
            }
            None => return Err(DispatchError::NotStarted(name)),
        };

        let mut shutdown_rx = self.shutdown_rx.clone();
        let joined = tokio::select! {
            biased;

            result = &mut handle => Some(result),

            true = async { shutdown_rx.wait_for(|stop| *stop).await.is_ok() } => None,
        };

        // Failures are recorded, not propagated: the command itself still succeeds.
        let clean = match joined {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!(worker = %name, %thread, error = %e, "Worker join failed");
                self.success.store(false, Ordering::SeqCst);
                false
            }
            None => {
                handle.abort();
                warn!(worker = %name, %thread, "Join interrupted by shutdown, worker aborted");
                self.success.store(false, Ordering::SeqCst);
                false
            }
        };

        self.workers_joined.fetch_add(1, Ordering::SeqCst);
        info!(worker = %name, %thread, clean, "Worker joined");
        workers.insert(name.clone(), WorkerSlot::Joined { thread });
        Ok(Reply::Joined { name, clean })
    }

    async fn abort_running(&self) {
        let mut workers = self.workers.lock().await;
        for (name, slot) in workers.iter_mut() {
            if let WorkerSlot::Running { thread, handle } = slot {
                let thread = *thread;
                warn!(worker = %name, %thread, "Aborting worker that was never joined");
                handle.abort();
                *slot = WorkerSlot::Joined { thread };
            }
        }
    }
}

impl Processor<Command> for Debuggee {
    type Output = Reply;
    type Error = DispatchError;

    async fn process(&self, command: Command) -> Result<Reply, DispatchError> {
        match command {
            Command::StartWorker { name } => self.start_worker(name).await,
            Command::StopWorker { name } => self.stop_worker(name).await,
            Command::Quit => Ok(Reply::Quitting),
        }
    }
}
