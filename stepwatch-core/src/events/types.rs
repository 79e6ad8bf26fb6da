//! Event type definitions.

use compact_str::CompactString;
use serde::Serialize;
use smallvec::SmallVec;
use stepwatch_sdk::ids::{CorrelationToken, RequestId, ThreadId, TypeName};
use stepwatch_sdk::objects::{EventKind, Location, SuspendPolicy};

/// Kind-specific data of an occurrence in the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Step {
        location: Location,
    },
    Breakpoint {
        location: Location,
    },
    MethodEntry {
        location: Location,
    },
    MethodExit {
        location: Location,
        return_value: Option<CompactString>,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Step { .. } => EventKind::Step,
            EventPayload::Breakpoint { .. } => EventKind::Breakpoint,
            EventPayload::MethodEntry { .. } => EventKind::MethodEntry,
            EventPayload::MethodExit { .. } => EventKind::MethodExit,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            EventPayload::Step { location }
            | EventPayload::Breakpoint { location }
            | EventPayload::MethodEntry { location }
            | EventPayload::MethodExit { location, .. } => location,
        }
    }
}

/// An occurrence in the target.
///
/// Workers produce events with `source_request` unset; these are the
/// candidates the matcher evaluates. The waiter fills in the request that
/// fired before handing the event to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub source_request: Option<RequestId>,
    pub declaring_type: TypeName,
    /// Supertypes of `declaring_type`, nearest first.
    pub supertypes: SmallVec<[TypeName; 4]>,
    pub thread: ThreadId,
    pub payload: EventPayload,
    #[serde(with = "time::serde::timestamp")]
    pub occurred_at: time::OffsetDateTime,
}

impl Event {
    /// Build a candidate event. The declaring type is taken from the
    /// payload location.
    pub fn candidate(
        thread: ThreadId,
        payload: EventPayload,
        supertypes: SmallVec<[TypeName; 4]>,
    ) -> Self {
        Self {
            source_request: None,
            declaring_type: payload.location().declaring_type.clone(),
            supertypes,
            thread,
            payload,
            occurred_at: time::OffsetDateTime::now_utc(),
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn attributed_to(mut self, request: RequestId) -> Self {
        self.source_request = Some(request);
        self
    }
}

/// A delivered match: the event plus the request it was correlated to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedEvent {
    pub request_id: RequestId,
    pub token: CorrelationToken,
    pub suspend_policy: SuspendPolicy,
    pub event: Event,
}

/// How a wait over a set of requests resolved.
///
/// None of these are errors; the controller branches on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitOutcome {
    Matched(MatchedEvent),
    Timeout,
    Cancelled,
    /// More than one request of the set fired while exactly one was required.
    Ambiguous { requests: SmallVec<[RequestId; 4]> },
}

impl WaitOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            WaitOutcome::Matched(_) => "matched",
            WaitOutcome::Timeout => "timeout",
            WaitOutcome::Cancelled => "cancelled",
            WaitOutcome::Ambiguous { .. } => "ambiguous",
        }
    }

    pub fn matched(&self) -> Option<&MatchedEvent> {
        match self {
            WaitOutcome::Matched(matched) => Some(matched),
            _ => None,
        }
    }
}
