//! In-process target: the debuggee actor, its workers and the suspension
//! state they share with the controller.

pub mod gate;
pub mod handle;
pub mod hierarchy;
pub mod workload;

pub use gate::{SuspensionGate, TargetControl};
pub use handle::{ChannelError, TargetHandle};
pub use hierarchy::ClassHierarchy;
pub use workload::{Invocation, ScriptedWorkload, WorkerContext, Workload};

use crate::events::{EventReceiver, candidate_event_channel, command_channel};
use crate::processors::debuggee::{Debuggee, TargetReport};
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::Arc;
use stepwatch_sdk::config::TargetConfig;
use stepwatch_sdk::ids::TypeName;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Assembles a target: its types, its named workloads and its channels.
pub struct TargetBuilder {
    config: TargetConfig,
    hierarchy: ClassHierarchy,
    workloads: HashMap<CompactString, Arc<dyn Workload>>,
    start_suspended: bool,
}

/// A running target and the controller's ends of its channels.
pub struct SpawnedTarget {
    pub handle: TargetHandle,
    pub events_rx: EventReceiver,
    pub task: JoinHandle<TargetReport>,
}

impl TargetBuilder {
    pub fn new(config: TargetConfig) -> Self {
        Self {
            config,
            hierarchy: ClassHierarchy::new(),
            workloads: HashMap::new(),
            start_suspended: true,
        }
    }

    /// Declare a type and its direct supertype.
    pub fn class(mut self, name: &str, supertype: Option<&str>) -> Self {
        self.hierarchy.define(name, supertype.map(TypeName::from));
        self
    }

    /// Register a worker body under `name`.
    pub fn workload(mut self, name: impl Into<CompactString>, workload: impl Workload + 'static) -> Self {
        self.workloads.insert(name.into(), Arc::new(workload));
        self
    }

    /// Whether workers are held until the first `resume`. Defaults to true.
    pub fn start_suspended(mut self, suspended: bool) -> Self {
        self.start_suspended = suspended;
        self
    }

    /// Spawn the debuggee command loop.
    pub fn spawn(self, shutdown_rx: watch::Receiver<bool>) -> SpawnedTarget {
        let (events_tx, events_rx) = candidate_event_channel(self.config.channel_buffer);
        let (command_tx, command_rx) = command_channel(self.config.channel_buffer);
        let gate = SuspensionGate::new(self.start_suspended);

        let debuggee = Debuggee::new(
            self.workloads,
            events_tx,
            gate.clone(),
            Arc::new(self.hierarchy),
            shutdown_rx,
        );
        let task = tokio::spawn(debuggee.run(command_rx));

        SpawnedTarget {
            handle: TargetHandle::new(command_tx, Arc::new(gate)),
            events_rx,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_start_stop_round_trip_completes_before_reply() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let target = TargetBuilder::new(TargetConfig::default())
            .start_suspended(false)
            .workload(
                "thread1",
                ScriptedWorkload::new([Invocation::new("T", "m", 1..=3)]),
            )
            .spawn(shutdown_rx);
        let mut events_rx = target.events_rx;
        let releaser = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(mut candidate) = events_rx.recv().await {
                candidate.release();
                seen.push(candidate.event.thread);
            }
            seen
        });

        let thread = target.handle.start_worker("thread1").await.unwrap();
        assert!(target.handle.stop_worker("thread1").await.unwrap());

        target.handle.quit().await.unwrap();
        let report = target.task.await.unwrap();
        assert!(report.success);
        assert_eq!(report.workers_joined, 1);

        // Entry, three steps, exit: all reported before the join returned.
        let seen = releaser.await.unwrap();
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|t| *t == thread));
    }

    #[tokio::test]
    async fn test_suspended_target_emits_nothing_until_resumed() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let target = TargetBuilder::new(TargetConfig::default())
            .workload("w", ScriptedWorkload::new([Invocation::new("T", "m", [1])]))
            .spawn(shutdown_rx);
        let mut events_rx = target.events_rx;

        target.handle.start_worker("w").await.unwrap();
        let nothing = tokio::time::timeout(Duration::from_millis(50), events_rx.recv()).await;
        assert!(nothing.is_err());

        target.handle.resume().await;
        let first = tokio::time::timeout(Duration::from_secs(1), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.event.declaring_type, TypeName::new("T"));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_stop_of_suspended_worker() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let target = TargetBuilder::new(TargetConfig::default())
            .workload("w", ScriptedWorkload::new([Invocation::new("T", "m", [1])]))
            .spawn(shutdown_rx);

        target.handle.start_worker("w").await.unwrap();
        let stop = {
            let handle = target.handle.clone();
            tokio::spawn(async move { handle.stop_worker("w").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!stop.is_finished());

        shutdown_tx.send(true).unwrap();
        let clean = tokio::time::timeout(Duration::from_secs(1), stop)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(!clean);

        let report = tokio::time::timeout(Duration::from_secs(1), target.task)
            .await
            .unwrap()
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.workers_joined, 1);
    }

    #[tokio::test]
    async fn test_shutdown_signal_ends_command_loop() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let target = TargetBuilder::new(TargetConfig::default()).spawn(shutdown_rx);
        shutdown_tx.send(true).unwrap();
        let report = tokio::time::timeout(Duration::from_secs(1), target.task)
            .await
            .unwrap()
            .unwrap();
        assert!(report.success);
        assert!(matches!(
            target.handle.start_worker("w").await,
            Err(ChannelError::Closed)
        ));
    }
}
