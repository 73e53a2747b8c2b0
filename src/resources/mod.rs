//! Resource builders.
//!
//! One builder per object kind. Each produces exactly one desired object
//! from the merged configuration of a role group and the cluster topology.
//!
//! ## Resources Generated
//!
//! | Resource | Scope | Purpose |
//! |----------|-------|---------|
//! | ServiceAccount | cluster | Identity of every HDFS pod |
//! | Service (headless) | role group | Stable DNS names, published before pods are ready |
//! | Service (listener) | role group | NodePort/LoadBalancer exposure for external listener classes |
//! | StatefulSet | role group | Role process with init containers and sidecars |
//! | ConfigMap | role group | Hadoop configuration files and log configuration |
//! | PodDisruptionBudget | role group | Optional, when requested by the group |
//! | ConfigMap (discovery) | cluster | Client-facing `core-site.xml` and `hdfs-site.xml` |

pub mod augmentations;
pub mod common;
pub mod config_bundle;
pub mod discovery;
pub mod pdb;
pub mod roles;
pub mod service_account;
pub mod services;
pub mod statefulset;

#[cfg(test)]
mod test_support;

use crate::controller::components::ComponentInfo;
use crate::controller::error::Result;
use crate::crd::HdfsCluster;
use crate::topology::Topology;

pub use augmentations::{AuthProxySettings, ResolvedDependencies};
pub use common::{owner_reference, role_group_labels};

/// Produces one desired object.
pub trait ResourceBuilder {
    type Object;

    fn build(&self) -> Result<Self::Object>;
}

/// A cross-cutting addition applied to an already built object.
pub trait Augmentation<K>: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, object: &mut K) -> Result<()>;
}

/// Inputs shared by every builder of one role group.
pub struct RoleGroupContext<'a> {
    pub hdfs: &'a HdfsCluster,
    pub component: &'a ComponentInfo,
    pub topology: &'a Topology<'a>,
    pub dependencies: &'a ResolvedDependencies,
}
