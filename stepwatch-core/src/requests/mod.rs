//! Event requests and their filters.
//!
//! - `EventRequest`: kind, filters, correlation token and enablement
//! - `matcher`: evaluation of a candidate event against one request
//! - `EventRequestManager`: the shared table of installed requests; every
//!   filter mutation happens under its single lock

pub mod manager;
pub mod matcher;
pub mod request;

pub use manager::{EventRequestManager, FiredRequest};
pub use matcher::{matches, would_match};
pub use request::{EventRequest, RequestError};
