//! Custom Resource Definitions (CRDs) for hdfs-operator.
//!
//! - `HdfsCluster`: declares name, journal and data node roles and their groups

mod config;
mod hdfs_cluster;
mod role;

pub use config::*;
pub use hdfs_cluster::*;
pub use role::*;
