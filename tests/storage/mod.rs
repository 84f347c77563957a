//! Shared storage integration tests.
//!
//! Tests the CoordinationStore interface against all implementations.
//! Each implementation module imports these test functions and runs them.

pub mod coordination_store_tests;
