//! Worker bodies run by the target.
//!
//! A worker reports occurrences through its [`WorkerContext`]; each report
//! waits on the suspension gate first, then becomes a candidate event on
//! the shared channel, and the worker waits again until the controller
//! has released that candidate.

use super::gate::SuspensionGate;
use super::hierarchy::ClassHierarchy;
use crate::events::{Candidate, Event, EventPayload, EventSender};
use async_trait::async_trait;
use compact_str::CompactString;
use std::sync::Arc;
use stepwatch_sdk::ids::{ThreadId, TypeName};
use stepwatch_sdk::objects::Location;
use tracing::debug;

/// The body of a named worker.
#[async_trait]
pub trait Workload: Send + Sync {
    async fn run(&self, ctx: WorkerContext);
}

/// Everything a running worker needs to report occurrences.
#[derive(Clone)]
pub struct WorkerContext {
    name: CompactString,
    thread: ThreadId,
    events_tx: EventSender,
    gate: SuspensionGate,
    hierarchy: Arc<ClassHierarchy>,
}

impl WorkerContext {
    pub(crate) fn new(
        name: CompactString,
        thread: ThreadId,
        events_tx: EventSender,
        gate: SuspensionGate,
        hierarchy: Arc<ClassHierarchy>,
    ) -> Self {
        Self {
            name,
            thread,
            events_tx,
            gate,
            hierarchy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Report an occurrence and wait until the controller released it.
    ///
    /// Returns false once nobody listens any more, at which point the
    /// worker should stop.
    pub async fn emit(&self, payload: EventPayload) -> bool {
        self.gate.until_runnable(self.thread).await;
        let supertypes = self.hierarchy.lineage(&payload.location().declaring_type);
        let (candidate, released) = Candidate::new(Event::candidate(self.thread, payload, supertypes));
        if self.events_tx.send(candidate).await.is_err() {
            debug!(worker = %self.name, thread = %self.thread, "Event channel closed, worker stopping");
            return false;
        }
        // A dropped candidate counts as released.
        let _ = released.await;
        true
    }

    pub async fn step(&self, location: Location) -> bool {
        self.emit(EventPayload::Step { location }).await
    }

    pub async fn breakpoint(&self, location: Location) -> bool {
        self.emit(EventPayload::Breakpoint { location }).await
    }

    pub async fn enter(&self, location: Location) -> bool {
        self.emit(EventPayload::MethodEntry { location }).await
    }

    pub async fn exit(&self, location: Location, return_value: Option<CompactString>) -> bool {
        self.emit(EventPayload::MethodExit {
            location,
            return_value,
        })
        .await
    }
}

/// One method invocation of a scripted worker.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub declaring_type: TypeName,
    pub method: CompactString,
    /// Lines stepped through, in order. The first is the entry line and the
    /// last is the exit line.
    pub lines: Vec<u32>,
    pub return_value: Option<CompactString>,
}

impl Invocation {
    pub fn new(
        declaring_type: impl Into<TypeName>,
        method: impl Into<CompactString>,
        lines: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            method: method.into(),
            lines: lines.into_iter().collect(),
            return_value: None,
        }
    }

    pub fn returning(mut self, value: impl Into<CompactString>) -> Self {
        self.return_value = Some(value.into());
        self
    }

    fn location(&self, line: u32) -> Location {
        Location {
            declaring_type: self.declaring_type.clone(),
            method: self.method.clone(),
            line,
        }
    }
}

/// A worker that runs a fixed sequence of invocations.
///
/// Each invocation reports a method entry, one step per line, then a
/// method exit.
#[derive(Debug, Clone, Default)]
pub struct ScriptedWorkload {
    invocations: Vec<Invocation>,
}

impl ScriptedWorkload {
    pub fn new(invocations: impl IntoIterator<Item = Invocation>) -> Self {
        Self {
            invocations: invocations.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Workload for ScriptedWorkload {
    async fn run(&self, ctx: WorkerContext) {
        for invocation in &self.invocations {
            let first = invocation.lines.first().copied().unwrap_or_default();
            let last = invocation.lines.last().copied().unwrap_or(first);

            if !ctx.enter(invocation.location(first)).await {
                return;
            }
            for line in &invocation.lines {
                if !ctx.step(invocation.location(*line)).await {
                    return;
                }
            }
            if !ctx
                .exit(invocation.location(last), invocation.return_value.clone())
                .await
            {
                return;
            }
        }
        debug!(worker = %ctx.name(), thread = %ctx.thread(), "Scripted workload finished");
    }
}
