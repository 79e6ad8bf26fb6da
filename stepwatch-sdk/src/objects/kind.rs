use super::location::Location;
use crate::ids::ThreadId;
use serde::{Deserialize, Serialize};

/// Granularity of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSize {
    Min,
    Line,
}

/// Whether a step enters, skips over, or leaves the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepDepth {
    Into,
    Over,
    Out,
}

/// Which target threads are suspended when a request fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendPolicy {
    None,
    EventThread,
    #[default]
    All,
}

/// Discriminant shared by request kinds and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Step,
    Breakpoint,
    MethodEntry,
    MethodExit,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Step => "step",
            EventKind::Breakpoint => "breakpoint",
            EventKind::MethodEntry => "method_entry",
            EventKind::MethodExit => "method_exit",
        };
        f.write_str(name)
    }
}

/// What an event request waits for.
///
/// A step request is always bound to the thread it was created for; the
/// matcher treats that binding as an implicit thread restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestKind {
    Step {
        thread: ThreadId,
        size: StepSize,
        depth: StepDepth,
    },
    Breakpoint {
        location: Location,
    },
    MethodEntry,
    MethodExit,
}

impl RequestKind {
    /// A line-granular step into calls on `thread`.
    pub fn step_into(thread: ThreadId) -> Self {
        RequestKind::Step {
            thread,
            size: StepSize::Line,
            depth: StepDepth::Into,
        }
    }

    pub fn event_kind(&self) -> EventKind {
        match self {
            RequestKind::Step { .. } => EventKind::Step,
            RequestKind::Breakpoint { .. } => EventKind::Breakpoint,
            RequestKind::MethodEntry => EventKind::MethodEntry,
            RequestKind::MethodExit => EventKind::MethodExit,
        }
    }

    /// The thread this kind is intrinsically bound to, if any.
    pub fn bound_thread(&self) -> Option<ThreadId> {
        match self {
            RequestKind::Step { thread, .. } => Some(*thread),
            _ => None,
        }
    }
}
