//! Roles of an HDFS cluster.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// The three node kinds of a highly-available HDFS cluster.
///
/// Variant order is the order roles are reconciled in.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HdfsRole {
    /// Metadata service. Two or more replicas, one active at a time.
    NameNode,
    /// Shared edit log quorum for the name nodes.
    JournalNode,
    /// Block storage.
    DataNode,
}

impl HdfsRole {
    /// All roles in reconciliation order.
    pub fn all() -> impl Iterator<Item = HdfsRole> {
        HdfsRole::iter()
    }

    /// Name used in object names, labels and container names.
    pub fn name(&self) -> &'static str {
        match self {
            HdfsRole::NameNode => "namenode",
            HdfsRole::JournalNode => "journalnode",
            HdfsRole::DataNode => "datanode",
        }
    }

    /// Short Kerberos service name of the role's principal.
    pub fn kerberos_service_name(&self) -> &'static str {
        match self {
            HdfsRole::NameNode => "nn",
            HdfsRole::JournalNode => "jn",
            HdfsRole::DataNode => "dn",
        }
    }
}
