//! Method exits of a class that runs its static initializer, a constructor
//! and a static method. An exact class filter selects the exits; a second
//! request on an unrelated package must stay silent.

use super::{ScenarioError, Session};
use crate::config::Settings;
use stepwatch_core::events::EventPayload;
use stepwatch_core::processors::TargetReport;
use stepwatch_core::target::{Invocation, ScriptedWorkload, TargetBuilder};
use stepwatch_core::verifier::{TestLog, Verification, verify};
use stepwatch_sdk::ids::TypeName;
use stepwatch_sdk::objects::{ClassPattern, FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::watch;
use tracing::info;

const TEST_CLASS: &str = "returnValue002aTestClass";
const WORKER: &str = "main";
const EXIT_TOKEN: &str = "TestClassExit";
const LIBRARY_TOKEN: &str = "LibraryExit";
const STATIC_RETURN: &str = "42";

/// Methods in the order the worker leaves them.
const EXITS: [&str; 3] = ["<clinit>", "<init>", "staticMethod"];

fn target(settings: &Settings) -> TargetBuilder {
    TargetBuilder::new(settings.target)
        .class("java.lang.Object", None)
        .class(TEST_CLASS, Some("java.lang.Object"))
        .workload(
            WORKER,
            ScriptedWorkload::new([
                Invocation::new(TEST_CLASS, "<clinit>", [30, 31]),
                Invocation::new(TEST_CLASS, "<init>", [35]),
                Invocation::new(TEST_CLASS, "staticMethod", [40, 41]).returning(STATIC_RETURN),
            ]),
        )
}

pub(super) async fn run(
    settings: &Settings,
    cancel_rx: watch::Receiver<bool>,
    log: &mut TestLog,
) -> Result<TargetReport, ScenarioError> {
    let mut session = Session::start(target(settings), settings, cancel_rx);

    session.target.start_worker(WORKER).await?;
    let exits = session
        .controller
        .arm(
            RequestKind::MethodExit,
            [FilterSpec::Class(ClassPattern::Exact(TypeName::new(TEST_CLASS)))],
            EXIT_TOKEN,
            SuspendPolicy::All,
        )
        .await?;
    let library = session
        .controller
        .arm(
            RequestKind::MethodExit,
            [FilterSpec::Class(ClassPattern::Glob("java.*".into()))],
            LIBRARY_TOKEN,
            SuspendPolicy::All,
        )
        .await?;
    info!(%exits, %library, "Method exit requests armed");

    let expected_type = TypeName::new(TEST_CLASS);
    for method in EXITS {
        session.controller.resume().await;
        let outcome = session.controller.wait_for_any(&[exits, library]).await;
        let step = format!("method-exit: {method} exit in TestClass");
        if !log.record(step.as_str(), verify(&outcome, exits, &expected_type)) {
            break;
        }

        let Some(matched) = outcome.matched() else {
            break;
        };
        let EventPayload::MethodExit {
            location,
            return_value,
        } = &matched.event.payload
        else {
            log.fail(step, format!("unexpected {} event", matched.event.kind()));
            break;
        };

        let expected_return = (method == "staticMethod").then_some(STATIC_RETURN);
        if location.method.as_str() != method {
            log.fail(
                format!("method-exit: {method} exits in order"),
                format!("left {} instead", location.method),
            );
        } else if return_value.as_deref() != expected_return {
            log.fail(
                format!("method-exit: {method} return value"),
                format!("returned {return_value:?}, expected {expected_return:?}"),
            );
        } else {
            log.record(format!("method-exit: {method} exits in order"), Verification::Pass);
        }
    }

    session.controller.resume().await;
    session.controller.stop_worker(WORKER).await?;
    session.finish().await
}
