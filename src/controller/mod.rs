//! Controller module for hdfs-operator.
//!
//! Contains the reconciliation loop, configuration merging, the per-pass
//! component index, error handling and status aggregation.

pub mod cluster_reconciler;
pub mod components;
pub mod context;
pub mod error;
pub mod merge;
pub mod status;
