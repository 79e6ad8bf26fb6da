//! Long-running actors.
//!
//! - `Debuggee`: target side, receives `Command`s, starts and joins workers
//! - `EventWaiter`: controller side, receives candidate `Event`s and
//!   resolves waits over sets of requests

pub mod debuggee;
pub mod event_waiter;

pub use debuggee::{Debuggee, DispatchError, TargetReport};
pub use event_waiter::EventWaiter;
