//! Shared vocabulary for the stepwatch controller and target.
//!
//! Everything in this crate is plain data: identifiers, request kinds,
//! filter specifications, the command wire form and the runtime wait
//! configuration. The async machinery lives in `stepwatch-core`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod ids;
pub mod objects;
