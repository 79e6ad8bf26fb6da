//! Event types and channel infrastructure.
//!
//! # Event Flow
//!
//! 1. Controller sends a `Command` over the command channel -> `Debuggee`
//! 2. `Debuggee` workers emit `Candidate`s -> `EventWaiter`, and block
//!    until the candidate is released
//! 3. `EventWaiter` runs each candidate through the request matcher,
//!    applies the suspend policy of a match, releases the worker and
//!    resolves the pending wait with a `WaitOutcome`
//!
//! Candidate events are ephemeral: each one is evaluated exactly once and
//! then either delivered as a match or dropped.

pub mod channels;
pub mod types;

pub use channels::{
    Candidate, CommandEnvelope, CommandReceiver, CommandSender, EventReceiver, EventSender,
    ReplySender, candidate_event_channel, command_channel,
};

pub use types::{Event, EventPayload, MatchedEvent, WaitOutcome};
