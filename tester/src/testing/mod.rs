//! In-memory harness doubles
//!
//! [`MemoryConnector`] hands out sessions backed by scriptable in-memory
//! databases so adapters and the engine can be driven without a server.
//! Row counts can be scheduled against tokio time, which makes convergence
//! timing testable with a paused clock.

pub mod fixtures;
pub mod memory;

pub use memory::{MemoryConnector, MemoryDatabase, MemorySession};
