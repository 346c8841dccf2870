//! Game session storage
//!
//! The registry is the only place session records are mutated.

pub mod registry;

pub use registry::{MoveResult, Session, SessionKey, SessionRegistry};
