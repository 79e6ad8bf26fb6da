pub mod command;
pub mod filter;
pub mod kind;
pub mod location;

pub use command::{Command, CommandParseError, RawCommand, Reply};
pub use filter::{ClassPattern, FilterSpec};
pub use kind::{EventKind, RequestKind, StepDepth, StepSize, SuspendPolicy};
pub use location::Location;
