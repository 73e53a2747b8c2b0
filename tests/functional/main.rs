// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Functional tests for full HdfsCluster reconciliation passes.
//!
//! These tests run complete passes against an in-memory object store
//! WITHOUT requiring a live Kubernetes cluster. Readiness of workloads is
//! driven by the test, so multi-pass scenarios are deterministic.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_second_pass_is_a_no_op
//! ```
//!
//! ## Test Categories
//!
//! - **Pass tests**: object ordering, idempotence, readiness and requeue
//! - **Failure tests**: skipped role groups, conflicts, missing dependencies
//! - **Topology tests**: generated configuration as seen in stored objects

#[path = "../common/mod.rs"]
mod common;

mod pass_tests;
mod topology_tests;

pub use mock_store::*;

use hdfs_operator::controller::cluster_reconciler::{PassReport, PassSettings, reconcile_cluster};
use hdfs_operator::controller::error::Result;
use hdfs_operator::crd::HdfsCluster;

pub const NAMESPACE: &str = "hdfs-test";

pub fn settings() -> PassSettings {
    PassSettings {
        cluster_domain: "cluster.local".to_string(),
    }
}

/// Run one pass of `hdfs` against `store`.
pub async fn run_pass(hdfs: &HdfsCluster, store: &MockStore) -> Result<PassReport> {
    reconcile_cluster(hdfs, store, &settings()).await
}
