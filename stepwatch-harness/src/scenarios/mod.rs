//! End-to-end scenarios driving an in-process target through the controller.

mod class_refinement;
mod count_filter;
mod method_exit;

use crate::config::Settings;
use clap::ValueEnum;
use stepwatch_core::controller::Controller;
use stepwatch_core::processors::TargetReport;
use stepwatch_core::requests::RequestError;
use stepwatch_core::target::{ChannelError, SpawnedTarget, TargetBuilder, TargetHandle};
use stepwatch_core::verifier::TestLog;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};

/// Errors that abort a scenario. Verification failures are not errors; they
/// are recorded in the [`TestLog`].
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("request rejected: {0}")]
    Request(#[from] RequestError),

    #[error("target command failed: {0}")]
    Channel(#[from] ChannelError),

    #[error("target task failed: {0}")]
    TargetTask(#[from] JoinError),
}

/// Scenario selection on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScenarioSelection {
    All,
    ClassRefinement,
    CountFilter,
    MethodExit,
}

impl ScenarioSelection {
    pub fn scenarios(self) -> &'static [Scenario] {
        match self {
            ScenarioSelection::All => &Scenario::ALL,
            ScenarioSelection::ClassRefinement => &[Scenario::ClassRefinement],
            ScenarioSelection::CountFilter => &[Scenario::CountFilter],
            ScenarioSelection::MethodExit => &[Scenario::MethodExit],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    ClassRefinement,
    CountFilter,
    MethodExit,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::ClassRefinement,
        Scenario::CountFilter,
        Scenario::MethodExit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::ClassRefinement => "class-refinement",
            Scenario::CountFilter => "count-filter",
            Scenario::MethodExit => "method-exit",
        }
    }

    /// Run the scenario against a fresh target, recording every verified
    /// step in `log`.
    pub async fn run(
        self,
        settings: &Settings,
        cancel_rx: watch::Receiver<bool>,
        log: &mut TestLog,
    ) -> Result<TargetReport, ScenarioError> {
        match self {
            Scenario::ClassRefinement => class_refinement::run(settings, cancel_rx, log).await,
            Scenario::CountFilter => count_filter::run(settings, cancel_rx, log).await,
            Scenario::MethodExit => method_exit::run(settings, cancel_rx, log).await,
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A spawned target paired with the controller driving it.
struct Session {
    controller: Controller,
    target: TargetHandle,
    task: JoinHandle<TargetReport>,
    shutdown_tx: watch::Sender<bool>,
}

impl Session {
    fn start(builder: TargetBuilder, settings: &Settings, cancel_rx: watch::Receiver<bool>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let SpawnedTarget {
            handle,
            events_rx,
            task,
        } = builder.spawn(shutdown_rx);
        let controller = Controller::new(handle.clone(), events_rx, cancel_rx, settings.wait);

        Self {
            controller,
            target: handle,
            task,
            shutdown_tx,
        }
    }

    /// Quit the target and collect its report.
    async fn finish(self) -> Result<TargetReport, ScenarioError> {
        if let Err(e) = self.controller.shutdown().await {
            tracing::warn!(error = %e, "Target did not acknowledge quit, signalling shutdown");
            self.shutdown_tx.send_replace(true);
        }
        let report = self.task.await?;
        tracing::info!(
            success = report.success,
            workers_joined = report.workers_joined,
            "Target finished"
        );
        Ok(report)
    }
}
