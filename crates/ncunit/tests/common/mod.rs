//! Shared test utilities for ncunit integration tests.
//!
//! This module provides:
//! - `TestNode` for running one unit against a temp-directory layout with
//!   in-memory collaborators
//! - `TestCluster` for several units sharing a peer relation
//! - Builders for configurations and relation data

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{TestCluster, TestNode};
