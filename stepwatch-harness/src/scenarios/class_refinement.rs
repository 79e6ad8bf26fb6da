//! Two step requests on two threads, one of them narrowed by a second class
//! filter. Only the unnarrowed request may fire, and its token must come
//! back with the event.

use super::{ScenarioError, Session};
use crate::config::Settings;
use stepwatch_core::processors::TargetReport;
use stepwatch_core::target::{Invocation, ScriptedWorkload, TargetBuilder};
use stepwatch_core::verifier::{TestLog, verify};
use stepwatch_sdk::ids::TypeName;
use stepwatch_sdk::objects::{FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::watch;
use tracing::info;

const TEST_CLASS_10: &str = "filter_rt003aTestClass10";
const TEST_CLASS_11: &str = "filter_rt003aTestClass11";
const TEST_CLASS_20: &str = "filter_rt003aTestClass20";
const TEST_CLASS_21: &str = "filter_rt003aTestClass21";

const THREAD_1: &str = "thread1";
const THREAD_2: &str = "thread2";

const TOKEN_1: &str = "StepRequest1";
const TOKEN_2: &str = "StepRequest2";

fn target(settings: &Settings) -> TargetBuilder {
    TargetBuilder::new(settings.target)
        .class(TEST_CLASS_10, None)
        .class(TEST_CLASS_11, Some(TEST_CLASS_10))
        .class(TEST_CLASS_20, None)
        .class(TEST_CLASS_21, Some(TEST_CLASS_20))
        .workload(
            THREAD_1,
            ScriptedWorkload::new([
                Invocation::new(TEST_CLASS_10, "m10", [62, 63]),
                Invocation::new(TEST_CLASS_11, "m11", [71, 72]),
            ]),
        )
        .workload(
            THREAD_2,
            ScriptedWorkload::new([
                Invocation::new(TEST_CLASS_20, "m20", [84, 85]),
                Invocation::new(TEST_CLASS_21, "m21", [93, 94]),
            ]),
        )
}

pub(super) async fn run(
    settings: &Settings,
    cancel_rx: watch::Receiver<bool>,
    log: &mut TestLog,
) -> Result<TargetReport, ScenarioError> {
    let mut session = Session::start(target(settings), settings, cancel_rx);

    let thread1 = session.target.start_worker(THREAD_1).await?;
    let thread2 = session.target.start_worker(THREAD_2).await?;
    // Held so the narrowed request is still armed when the first match
    // resolves, whichever thread the scheduler favours.
    session.target.hold_thread(thread2).await;

    let r1 = session
        .controller
        .arm(
            RequestKind::step_into(thread1),
            [FilterSpec::class(TEST_CLASS_11), FilterSpec::Count(1)],
            TOKEN_1,
            SuspendPolicy::All,
        )
        .await?;
    let r2 = session
        .controller
        .arm(
            RequestKind::step_into(thread2),
            [FilterSpec::class(TEST_CLASS_11), FilterSpec::Count(1)],
            TOKEN_2,
            SuspendPolicy::All,
        )
        .await?;
    session
        .controller
        .add_filter(r2, FilterSpec::class(TEST_CLASS_21))
        .await?;
    info!(%r1, %r2, "Step requests armed");

    session.controller.resume().await;
    let outcome = session.controller.wait_for_any(&[r1, r2]).await;
    if let Some(matched) = outcome.matched() {
        info!(
            token = %matched.token,
            location = %matched.event.payload.location(),
            "Step event received"
        );
    }
    log.record(
        "class-refinement: step lands in TestClass11 on thread1",
        verify(&outcome, r1, &TypeName::new(TEST_CLASS_11)),
    );

    session.target.release_thread(thread2).await;
    session.controller.resume().await;
    session.controller.stop_worker(THREAD_1).await?;
    session.controller.stop_worker(THREAD_2).await?;

    session.finish().await
}
