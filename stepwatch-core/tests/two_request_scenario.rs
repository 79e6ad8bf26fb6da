//! Two step requests armed together on two threads, correlated by token.

use std::time::Duration;
use stepwatch_core::controller::Controller;
use stepwatch_core::events::WaitOutcome;
use stepwatch_core::target::{Invocation, ScriptedWorkload, SpawnedTarget, TargetBuilder};
use stepwatch_core::verifier::{Verification, verify};
use stepwatch_sdk::config::{TargetConfig, WaitConfig};
use stepwatch_sdk::ids::TypeName;
use stepwatch_sdk::objects::{FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::watch;

const CLASS_10: &str = "filter_rt003aTestClass10";
const CLASS_11: &str = "filter_rt003aTestClass11";
const CLASS_20: &str = "filter_rt003aTestClass20";
const CLASS_21: &str = "filter_rt003aTestClass21";

fn spawn_target(thread2_class: &str, shutdown_rx: watch::Receiver<bool>) -> SpawnedTarget {
    TargetBuilder::new(TargetConfig::default())
        .class(CLASS_10, None)
        .class(CLASS_11, Some(CLASS_10))
        .class(CLASS_20, None)
        .class(CLASS_21, Some(CLASS_20))
        .workload(
            "thread1",
            ScriptedWorkload::new([
                Invocation::new(CLASS_10, "method", [30, 31]),
                Invocation::new(CLASS_11, "method", [40, 41]),
            ]),
        )
        .workload(
            "thread2",
            ScriptedWorkload::new([
                Invocation::new(CLASS_20, "method", [50, 51]),
                Invocation::new(thread2_class, "method", [60, 61]),
            ]),
        )
        .spawn(shutdown_rx)
}

#[tokio::test]
async fn refined_class_filter_lets_only_first_request_fire() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let target = spawn_target(CLASS_21, shutdown_rx);
    let mut controller = Controller::new(
        target.handle.clone(),
        target.events_rx,
        cancel_rx,
        WaitConfig::new(Duration::from_secs(5)),
    );

    let thread1 = target.handle.start_worker("thread1").await.unwrap();
    let thread2 = target.handle.start_worker("thread2").await.unwrap();
    target.handle.hold_thread(thread2).await;

    let r1 = controller
        .arm(
            RequestKind::step_into(thread1),
            [FilterSpec::class(CLASS_11), FilterSpec::Count(1)],
            "StepRequest1",
            SuspendPolicy::All,
        )
        .await
        .unwrap();
    let r2 = controller
        .arm(
            RequestKind::step_into(thread2),
            [FilterSpec::class(CLASS_11), FilterSpec::Count(1)],
            "StepRequest2",
            SuspendPolicy::All,
        )
        .await
        .unwrap();
    controller.add_filter(r1, FilterSpec::class(CLASS_11)).await.unwrap();
    controller.add_filter(r2, FilterSpec::class(CLASS_21)).await.unwrap();

    controller.resume().await;
    let outcome = controller.wait_for_any(&[r1, r2]).await;

    let matched = outcome.matched().expect("a step event");
    assert_eq!(matched.request_id, r1);
    assert_eq!(matched.token.as_str(), "StepRequest1");
    assert_eq!(matched.event.thread, thread1);
    assert_eq!(
        verify(&outcome, r1, &TypeName::new(CLASS_11)),
        Verification::Pass
    );

    assert!(!controller.requests().is_enabled(r1).await.unwrap());
    assert!(controller.requests().is_enabled(r2).await.unwrap());

    target.handle.release_thread(thread2).await;
    controller.resume().await;
    assert!(controller.stop_worker("thread1").await.unwrap());
    assert!(controller.stop_worker("thread2").await.unwrap());

    controller.shutdown().await.unwrap();
    let report = target.task.await.unwrap();
    assert!(report.success);
    assert_eq!(report.workers_joined, 2);
}

#[tokio::test]
async fn narrowed_request_times_out_when_its_class_never_occurs() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    // thread2 runs in CLASS_11, which the refined request no longer accepts.
    let target = spawn_target(CLASS_11, shutdown_rx);
    let mut controller = Controller::new(
        target.handle.clone(),
        target.events_rx,
        cancel_rx,
        WaitConfig::new(Duration::from_millis(300)),
    );

    let thread1 = target.handle.start_worker("thread1").await.unwrap();
    let thread2 = target.handle.start_worker("thread2").await.unwrap();

    let r1 = controller
        .arm(
            RequestKind::step_into(thread1),
            [FilterSpec::class(CLASS_11), FilterSpec::Count(1)],
            "StepRequest1",
            SuspendPolicy::None,
        )
        .await
        .unwrap();
    let r2 = controller
        .arm(
            RequestKind::step_into(thread2),
            [
                FilterSpec::class(CLASS_11),
                FilterSpec::class(CLASS_21),
                FilterSpec::Count(1),
            ],
            "StepRequest2",
            SuspendPolicy::None,
        )
        .await
        .unwrap();

    controller.resume().await;
    let outcome = controller.wait_for_any(&[r1, r2]).await;
    assert_eq!(outcome.matched().map(|m| m.request_id), Some(r1));

    let outcome = controller.wait_for_any(&[r2]).await;
    assert_eq!(outcome, WaitOutcome::Timeout);

    controller.stop_worker("thread1").await.unwrap();
    controller.stop_worker("thread2").await.unwrap();
    controller.shutdown().await.unwrap();
    assert!(target.task.await.unwrap().success);
}

#[tokio::test]
async fn cancel_signal_unblocks_wait_on_silent_target() {
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let target = spawn_target(CLASS_21, shutdown_rx);
    let mut controller = Controller::new(
        target.handle.clone(),
        target.events_rx,
        cancel_rx,
        WaitConfig::new(Duration::from_secs(30)),
    );

    // Never resumed, so nothing is emitted.
    let thread1 = target.handle.start_worker("thread1").await.unwrap();
    let r1 = controller
        .arm(RequestKind::step_into(thread1), [], "StepRequest1", SuspendPolicy::All)
        .await
        .unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(true);
        // Keep the sender alive until the wait observed it.
        tokio::time::sleep(Duration::from_millis(200)).await;
    });

    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.wait_for_any(&[r1]))
        .await
        .expect("wait must not block past cancellation");
    assert_eq!(outcome, WaitOutcome::Cancelled);

    controller.shutdown().await.unwrap();
    target.task.await.unwrap();
}
