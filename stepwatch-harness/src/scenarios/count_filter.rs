//! A count filter lets the n-th occurrence through, then retires the
//! request: later waits on it must time out within the configured bounds.

use super::{ScenarioError, Session};
use crate::config::Settings;
use stepwatch_core::events::{EventPayload, WaitOutcome};
use stepwatch_core::processors::TargetReport;
use stepwatch_core::target::{Invocation, ScriptedWorkload, TargetBuilder};
use stepwatch_core::verifier::{TestLog, Verification, verify};
use stepwatch_sdk::ids::TypeName;
use stepwatch_sdk::objects::{ClassPattern, FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::info;

const COUNTED_CLASS: &str = "count_filter001aCountedClass";
const HELPER_CLASS: &str = "count_filter001aHelper";
const WORKER: &str = "counter";
const TOKEN: &str = "CountedStep";
const COUNT: u32 = 3;
const EXPECTED_LINE: u32 = 22;

fn target(settings: &Settings) -> TargetBuilder {
    TargetBuilder::new(settings.target)
        .class(HELPER_CLASS, None)
        .class(COUNTED_CLASS, None)
        .workload(
            WORKER,
            ScriptedWorkload::new([
                Invocation::new(HELPER_CLASS, "prepare", [10, 11]),
                Invocation::new(COUNTED_CLASS, "tick", [20, 21, 22, 23, 24]),
            ]),
        )
}

pub(super) async fn run(
    settings: &Settings,
    cancel_rx: watch::Receiver<bool>,
    log: &mut TestLog,
) -> Result<TargetReport, ScenarioError> {
    let mut session = Session::start(target(settings), settings, cancel_rx);

    let thread = session.target.start_worker(WORKER).await?;
    let request = session
        .controller
        .arm(
            RequestKind::step_into(thread),
            [
                FilterSpec::Class(ClassPattern::Glob("*CountedClass".into())),
                FilterSpec::Count(COUNT),
            ],
            TOKEN,
            SuspendPolicy::All,
        )
        .await?;
    info!(%request, count = COUNT, "Counted step request armed");

    session.controller.resume().await;
    let outcome = session.controller.wait_for_any(&[request]).await;
    log.record(
        "count-filter: occurrence fires in CountedClass",
        verify(&outcome, request, &TypeName::new(COUNTED_CLASS)),
    );
    if let Some(matched) = outcome.matched() {
        match &matched.event.payload {
            EventPayload::Step { location } if location.line == EXPECTED_LINE => {
                log.record("count-filter: third step is the one delivered", Verification::Pass);
            }
            other => log.fail(
                "count-filter: third step is the one delivered",
                format!("delivered {} at {}", other.kind(), other.location()),
            ),
        }
    }

    if session.controller.requests().is_enabled(request).await? {
        log.fail("count-filter: request disabled after firing", "still enabled");
    } else {
        log.record("count-filter: request disabled after firing", Verification::Pass);
    }

    session.controller.resume().await;
    let wait = *session.controller.config();
    let started = Instant::now();
    let outcome = session.controller.wait_for_any(&[request]).await;
    let elapsed = started.elapsed();
    match outcome {
        WaitOutcome::Timeout
            if elapsed >= wait.wait_time && elapsed <= wait.wait_time + wait.scheduling_slack =>
        {
            log.record("count-filter: retired request times out", Verification::Pass);
        }
        WaitOutcome::Timeout => log.fail(
            "count-filter: retired request times out",
            format!("timed out after {elapsed:?}, bound {:?}", wait.wait_time),
        ),
        other => log.fail(
            "count-filter: retired request times out",
            format!("wait ended with {}", other.label()),
        ),
    }

    session.controller.stop_worker(WORKER).await?;
    session.finish().await
}
