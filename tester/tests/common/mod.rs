//! Shared fixtures and helpers for the harness integration tests

#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

pub use fixtures::TestFixtures;
pub use helpers::{ConfigDir, TestHelpers};
