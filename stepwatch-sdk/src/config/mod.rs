//! Runtime configuration types.
//!
//! These are the validated values the core runs with. Reading them from a
//! file and applying command-line overrides is handled by the harness.

mod target;
mod wait;

pub use target::TargetConfig;
pub use wait::WaitConfig;
