//! Runtime Management
//!
//! Polling, background process handles and the broker stack used while a
//! scenario is running.

pub mod broker;
pub mod poll;
pub mod process;

// Re-export main types
pub use broker::BrokerStack;
pub use poll::Poller;
pub use process::ManagedProcess;
