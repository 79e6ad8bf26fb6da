//! The controller: arms requests, drives the target, waits and verifies.

use crate::events::{EventReceiver, WaitOutcome};
use crate::processors::event_waiter::EventWaiter;
use crate::requests::{EventRequestManager, RequestError};
use crate::target::handle::{ChannelError, TargetHandle};
use compact_str::CompactString;
use stepwatch_sdk::config::WaitConfig;
use stepwatch_sdk::ids::{CorrelationToken, RequestId};
use stepwatch_sdk::objects::{FilterSpec, RequestKind, SuspendPolicy};
use tokio::sync::watch;
use tracing::debug;

/// Controller side of one debugging session.
pub struct Controller {
    requests: EventRequestManager,
    waiter: EventWaiter,
    target: TargetHandle,
    config: WaitConfig,
}

impl Controller {
    /// Create a new Controller.
    ///
    /// # Arguments
    ///
    /// * `target` - Handle to the target's command loop and suspension
    /// * `events_rx` - Receiver for the target's candidate events
    /// * `cancel_rx` - Cancels pending waits when set to `true`
    /// * `config` - Wait bounds
    pub fn new(
        target: TargetHandle,
        events_rx: EventReceiver,
        cancel_rx: watch::Receiver<bool>,
        config: WaitConfig,
    ) -> Self {
        let requests = EventRequestManager::new();
        let waiter = EventWaiter::new(requests.clone(), events_rx, cancel_rx, target.control());
        Self {
            requests,
            waiter,
            target,
            config,
        }
    }

    pub fn requests(&self) -> &EventRequestManager {
        &self.requests
    }

    pub fn target(&self) -> &TargetHandle {
        &self.target
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Arm and install a request.
    pub async fn arm(
        &self,
        kind: RequestKind,
        filters: impl IntoIterator<Item = FilterSpec>,
        token: impl Into<CorrelationToken>,
        suspend_policy: SuspendPolicy,
    ) -> Result<RequestId, RequestError> {
        self.requests
            .create(kind, filters, token.into(), suspend_policy)
            .await
    }

    /// Refine an installed request.
    pub async fn add_filter(&self, id: RequestId, spec: FilterSpec) -> Result<(), RequestError> {
        self.requests.add_filter(id, spec).await
    }

    /// Wait for any request of `set` with the configured bounds.
    ///
    /// A match from a request whose suspend policy is `All` suspends the
    /// target before the reporting worker moves on; call
    /// [`resume`](Self::resume) to continue.
    pub async fn wait_for_any(&mut self, set: &[RequestId]) -> WaitOutcome {
        self.waiter
            .wait_for_any(set, self.config.wait_time, self.config.require_exactly_one)
            .await
    }

    /// Join a worker. Returns whether the join was clean.
    ///
    /// Candidates reported while the worker winds down are released and
    /// kept for the next wait, so the join never stalls on them.
    pub async fn stop_worker(&mut self, name: impl Into<CompactString>) -> Result<bool, ChannelError> {
        let target = self.target.clone();
        let join = target.stop_worker(name);
        tokio::pin!(join);

        loop {
            tokio::select! {
                biased;

                result = &mut join => return result,

                true = self.waiter.defer_next() => {
                    debug!("Deferred candidate reported during join");
                }
            }
        }
    }

    pub async fn resume(&self) {
        self.target.resume().await;
    }

    /// Release and drop candidate events left over from the previous step.
    pub fn discard_pending_events(&mut self) -> usize {
        self.waiter.drain()
    }

    /// Remove every request and ask the target to quit.
    pub async fn shutdown(self) -> Result<(), ChannelError> {
        self.requests.clear().await;
        self.target.resume().await;
        self.target.quit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::TargetReport;
    use crate::target::{Invocation, ScriptedWorkload, SpawnedTarget, TargetBuilder};
    use std::time::Duration;
    use stepwatch_sdk::config::TargetConfig;
    use tokio::task::JoinHandle;

    struct Session {
        controller: Controller,
        target: TargetHandle,
        task: JoinHandle<TargetReport>,
    }

    fn session(wait_time: Duration) -> Session {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let SpawnedTarget {
            handle,
            events_rx,
            task,
        } = TargetBuilder::new(TargetConfig::default())
            .workload(
                "stepper",
                ScriptedWorkload::new([Invocation::new("T", "run", 10..=19)]),
            )
            .spawn(shutdown_rx);
        let controller = Controller::new(
            handle.clone(),
            events_rx,
            cancel_rx,
            WaitConfig::new(wait_time),
        );
        Session {
            controller,
            target: handle,
            task,
        }
    }

    fn step_line(outcome: &WaitOutcome) -> u32 {
        outcome
            .matched()
            .expect("a step event")
            .event
            .payload
            .location()
            .line
    }

    #[tokio::test]
    async fn test_all_match_stops_target_at_matched_step() {
        let Session {
            mut controller,
            target,
            task,
        } = session(Duration::from_millis(200));
        let thread = target.start_worker("stepper").await.unwrap();
        let first = controller
            .arm(
                RequestKind::step_into(thread),
                [FilterSpec::Count(1)],
                "first",
                SuspendPolicy::All,
            )
            .await
            .unwrap();
        let next = controller
            .arm(RequestKind::step_into(thread), [], "next", SuspendPolicy::All)
            .await
            .unwrap();

        controller.resume().await;
        let outcome = controller.wait_for_any(&[first]).await;
        assert_eq!(step_line(&outcome), 10);

        // Suspended on the match: no further step is reported.
        assert_eq!(controller.wait_for_any(&[next]).await, WaitOutcome::Timeout);

        controller.resume().await;
        let outcome = controller.wait_for_any(&[next]).await;
        assert_eq!(step_line(&outcome), 11);

        controller.requests().disable(next).await.unwrap();
        controller.resume().await;
        assert!(controller.stop_worker("stepper").await.unwrap());
        controller.shutdown().await.unwrap();
        assert!(task.await.unwrap().success);
    }

    #[tokio::test]
    async fn test_stop_worker_keeps_candidates_for_next_wait() {
        let Session {
            mut controller,
            target,
            task,
        } = session(Duration::from_millis(200));
        let thread = target.start_worker("stepper").await.unwrap();
        let exit = controller
            .arm(RequestKind::MethodExit, [], "exit", SuspendPolicy::None)
            .await
            .unwrap();

        controller.resume().await;
        assert!(controller.stop_worker("stepper").await.unwrap());

        let outcome = controller.wait_for_any(&[exit]).await;
        let matched = outcome.matched().expect("the exit event");
        assert_eq!(matched.event.thread, thread);
        assert_eq!(controller.discard_pending_events(), 0);

        controller.shutdown().await.unwrap();
        assert!(task.await.unwrap().success);
    }
}
