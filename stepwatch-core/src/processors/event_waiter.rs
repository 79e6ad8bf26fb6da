//! EventWaiter processor.
//!
//! The EventWaiter is responsible for:
//! - Receiving candidate `Event`s from every target worker
//! - Running each candidate through the matcher for the requests of the
//!   current wait set, in set order
//! - Suspending the target for an `All` match before the reporting worker
//!   is released
//! - Resolving the wait with the first request that fired, a timeout,
//!   a cancellation, or an ambiguity when exactly one match is required
//!
//! There is a single consumer loop per wait built on `tokio::select!` over
//! the cancel signal, the deadline and the candidate channel. Candidates
//! that fire nothing are released and dropped. Candidates taken off the
//! channel but not evaluated yet wait in a backlog that the next wait
//! consumes first.

use crate::events::{Candidate, EventReceiver, MatchedEvent, WaitOutcome};
use crate::requests::{EventRequestManager, FiredRequest};
use crate::target::TargetControl;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use stepwatch_sdk::ids::RequestId;
use stepwatch_sdk::objects::SuspendPolicy;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Controller-side waiter over the candidate event stream.
///
/// Takes `&mut self` for every wait, so there is at most one waiter per
/// candidate stream at any time.
pub struct EventWaiter {
    requests: EventRequestManager,
    events_rx: EventReceiver,
    cancel_rx: watch::Receiver<bool>,
    control: Arc<dyn TargetControl>,
    /// Received but not yet evaluated, oldest first.
    backlog: VecDeque<Candidate>,
}

impl EventWaiter {
    /// Create a new EventWaiter.
    ///
    /// # Arguments
    ///
    /// * `requests` - Request table shared with the controller
    /// * `events_rx` - Receiver for candidate events
    /// * `cancel_rx` - Set to `true` to cancel any pending and future wait
    /// * `control` - Suspension control of the target producing the events
    pub fn new(
        requests: EventRequestManager,
        events_rx: EventReceiver,
        cancel_rx: watch::Receiver<bool>,
        control: Arc<dyn TargetControl>,
    ) -> Self {
        Self {
            requests,
            events_rx,
            cancel_rx,
            control,
            backlog: VecDeque::new(),
        }
    }

    /// Wait until a request of `set` fires or `timeout` elapses.
    pub async fn wait_for_any(
        &mut self,
        set: &[RequestId],
        timeout: Duration,
        require_exactly_one: bool,
    ) -> WaitOutcome {
        if *self.cancel_rx.borrow_and_update() {
            debug!("Wait cancelled before it started");
            return WaitOutcome::Cancelled;
        }

        let deadline = Instant::now() + timeout;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);

        debug!(
            requests = set.len(),
            backlog = self.backlog.len(),
            ?timeout,
            "Waiting for requested event"
        );

        let outcome = loop {
            let candidate = match self.backlog.pop_front() {
                Some(candidate) => candidate,
                None => tokio::select! {
                    biased;

                    Ok(()) = self.cancel_rx.changed() => {
                        if *self.cancel_rx.borrow() {
                            info!("Wait cancelled");
                            break WaitOutcome::Cancelled;
                        }
                        continue;
                    }

                    // Hard upper bound regardless of target progress.
                    _ = &mut sleep => {
                        break WaitOutcome::Timeout;
                    }

                    candidate = self.events_rx.recv() => match candidate {
                        Some(candidate) => candidate,
                        None => {
                            warn!("Candidate event channel closed while waiting");
                            break WaitOutcome::Cancelled;
                        }
                    },
                },
            };

            if let Some(outcome) = self.resolve(set, candidate, require_exactly_one).await {
                break outcome;
            }
        };

        match &outcome {
            WaitOutcome::Matched(matched) => info!(
                request = %matched.request_id,
                token = %matched.token,
                declaring_type = %matched.event.declaring_type,
                thread = %matched.event.thread,
                "Requested event received"
            ),
            other => info!(outcome = other.label(), "Wait resolved without a match"),
        }
        outcome
    }

    /// Evaluate one candidate against `set`.
    ///
    /// Returns `None` when nothing fired. The reporting worker is released
    /// in every case, after the target is suspended when the winner asks
    /// for it.
    async fn resolve(
        &mut self,
        set: &[RequestId],
        mut candidate: Candidate,
        require_exactly_one: bool,
    ) -> Option<WaitOutcome> {
        let fired = self.requests.evaluate(set, &candidate.event).await;
        let Some(first) = fired.first().cloned() else {
            debug!(
                kind = %candidate.event.kind(),
                declaring_type = %candidate.event.declaring_type,
                thread = %candidate.event.thread,
                "Dropped candidate event"
            );
            candidate.release();
            return None;
        };

        let ambiguous = if require_exactly_one {
            self.ambiguity(set, &first, &fired).await
        } else {
            None
        };

        if first.suspend_policy == SuspendPolicy::All {
            self.control.suspend_all().await;
            debug!(request = %first.id, "Target suspended on match");
        }
        candidate.release();

        Some(match ambiguous {
            Some(requests) => WaitOutcome::Ambiguous { requests },
            None => WaitOutcome::Matched(MatchedEvent {
                request_id: first.id,
                token: first.token,
                suspend_policy: first.suspend_policy,
                event: candidate.event.attributed_to(first.id),
            }),
        })
    }

    /// Check whether a second request of the set fired, either for the same
    /// candidate or would fire for one already buffered behind it.
    ///
    /// Buffered candidates move to the backlog untouched, so the next wait
    /// still evaluates them.
    async fn ambiguity(
        &mut self,
        set: &[RequestId],
        first: &FiredRequest,
        fired: &[FiredRequest],
    ) -> Option<SmallVec<[RequestId; 4]>> {
        let mut requests: SmallVec<[RequestId; 4]> = fired.iter().map(|f| f.id).collect();

        while let Ok(next) = self.events_rx.try_recv() {
            self.backlog.push_back(next);
        }
        for queued in &self.backlog {
            for other in self.requests.would_fire(set, &queued.event).await {
                if !requests.contains(&other) {
                    requests.push(other);
                }
            }
        }

        if requests.len() > 1 {
            warn!(winner = %first.id, fired = requests.len(), "Ambiguous match");
            Some(requests)
        } else {
            None
        }
    }

    /// Take the next candidate off the channel and release its worker
    /// without evaluating it. The candidate joins the backlog for the next
    /// wait.
    ///
    /// Returns false once the channel is closed.
    pub async fn defer_next(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(mut candidate) => {
                candidate.release();
                self.backlog.push_back(candidate);
                true
            }
            None => false,
        }
    }

    /// Release and drop every candidate not evaluated yet, returning how
    /// many there were.
    pub fn drain(&mut self) -> usize {
        while let Ok(candidate) = self.events_rx.try_recv() {
            self.backlog.push_back(candidate);
        }
        let drained = self.backlog.len();
        for mut candidate in self.backlog.drain(..) {
            candidate.release();
        }
        drained
    }
}
