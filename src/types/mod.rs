//! Core type definitions using newtype patterns for type safety.
//!
//! These types keep validation at the edge: once a `Domain` or `Port`
//! exists, every probe can trust it.

mod confidence;
mod domain;
mod port;

pub use confidence::Confidence;
pub use domain::Domain;
pub use port::{Port, PortError};
