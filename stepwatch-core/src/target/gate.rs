//! Global and per-thread suspension of the target.
//!
//! Workers call [`SuspensionGate::until_runnable`] before every occurrence
//! they report, so nothing is emitted while the target is suspended. The
//! state lives in a `watch` channel so waiting workers wake as soon as the
//! controller resumes them, without polling.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use stepwatch_sdk::ids::ThreadId;
use tokio::sync::watch;
use tracing::debug;

/// Suspend/resume control the controller drives around arm/wait cycles.
#[async_trait]
pub trait TargetControl: Send + Sync {
    /// Suspend every thread of the target.
    async fn suspend_all(&self);

    /// Release the global suspension. Per-thread holds stay in place.
    async fn resume(&self);

    /// Keep a single thread suspended regardless of the global state.
    async fn hold_thread(&self, thread: ThreadId);

    /// Drop a per-thread hold.
    async fn release_thread(&self, thread: ThreadId);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct GateState {
    suspended_all: bool,
    held: BTreeSet<ThreadId>,
}

impl GateState {
    fn is_runnable(&self, thread: ThreadId) -> bool {
        !self.suspended_all && !self.held.contains(&thread)
    }
}

/// Watch-backed implementation of [`TargetControl`] for in-process targets.
#[derive(Clone)]
pub struct SuspensionGate {
    state_tx: Arc<watch::Sender<GateState>>,
}

impl SuspensionGate {
    /// Create a gate. A target usually starts suspended so requests can be
    /// armed before any worker makes progress.
    pub fn new(start_suspended: bool) -> Self {
        let (state_tx, _) = watch::channel(GateState {
            suspended_all: start_suspended,
            held: BTreeSet::new(),
        });
        Self {
            state_tx: Arc::new(state_tx),
        }
    }

    /// Wait until `thread` is allowed to run.
    pub async fn until_runnable(&self, thread: ThreadId) {
        let mut state_rx = self.state_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = state_rx.wait_for(|state| state.is_runnable(thread)).await;
    }
}

#[async_trait]
impl TargetControl for SuspensionGate {
    async fn suspend_all(&self) {
        self.state_tx.send_modify(|state| state.suspended_all = true);
        debug!("Target suspended");
    }

    async fn resume(&self) {
        self.state_tx.send_modify(|state| state.suspended_all = false);
        debug!("Target resumed");
    }

    async fn hold_thread(&self, thread: ThreadId) {
        self.state_tx.send_modify(|state| {
            state.held.insert(thread);
        });
        debug!(%thread, "Thread held");
    }

    async fn release_thread(&self, thread: ThreadId) {
        self.state_tx.send_modify(|state| {
            state.held.remove(&thread);
        });
        debug!(%thread, "Thread released");
    }
}
