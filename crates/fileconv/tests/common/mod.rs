//! Shared test utilities for fileconv integration tests.
//!
//! - `TestHarness` for isolated input/output directories and orchestrators
//! - process runner doubles that never launch real converters

pub mod harness;
pub mod stubs;

pub use harness::{test_config, TestHarness};
pub use stubs::*;
