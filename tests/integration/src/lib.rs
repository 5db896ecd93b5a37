//! Integration tests for cross-node ban replication
//!
//! This test suite validates:
//! - Fan-out scenarios from a single origin, with unreachable nodes
//! - Loop freedom when every applied ban is echoed back as an event
//! - Reconciliation over mixed tagged and untagged ban lists
//! - Retraction across nodes with and without the ban
//! - Universal properties (origin exclusion, exhaustive classification)

pub mod test_utils;

#[cfg(test)]
mod scenario_tests;

#[cfg(test)]
mod loop_freedom_tests;

#[cfg(test)]
mod property_tests;
