//! Integration tests for txops-engine.
//!
//! These tests drive the full application:
//! - Ingest through the state machine and sharded workers
//! - Fan-out to aggregators and the fraud stage
//! - Fact log replay across restarts

pub mod common;
