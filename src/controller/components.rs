//! Pass-scoped index of every role group of a cluster.
//!
//! Built once at the start of a reconciliation pass, before any topology or
//! builder runs, so that cross-role lookups (total journal replicas, name
//! node ordinals) always see the complete cluster.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::controller::error::{Error, Result};
use crate::controller::merge::{MergedRoleGroupConfig, merge_role_group};
use crate::crd::{HdfsCluster, HdfsRole};
use crate::topology::naming::RoleGroupNaming;

/// Key of one role group within one cluster.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoleGroupRef {
    pub cluster: String,
    pub role: HdfsRole,
    pub group: String,
}

/// Everything builders need to know about one role group.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub instance: String,
    pub namespace: String,
    pub role: HdfsRole,
    pub group: String,
    pub replicas: i32,
    pub config: MergedRoleGroupConfig,
    pub naming: RoleGroupNaming,
}

/// Identity of a role group, known from the raw spec without merging.
///
/// Every group of the spec has a member, skipped or not, so derived
/// cluster-wide values stay stable while a group's configuration is broken.
#[derive(Clone, Debug)]
pub struct RoleGroupMember {
    pub role: HdfsRole,
    pub group: String,
    pub replicas: i32,
    pub naming: RoleGroupNaming,
}

/// A role group whose configuration could not be merged this pass.
#[derive(Debug)]
pub struct SkippedGroup {
    pub role: HdfsRole,
    pub group: String,
    pub error: Error,
}

/// Read-only index of the cluster's role groups.
#[derive(Debug, Default)]
pub struct ClusterComponentsInfo {
    instance: String,
    namespace: String,
    components: BTreeMap<RoleGroupRef, ComponentInfo>,
    members: BTreeMap<RoleGroupRef, RoleGroupMember>,
    skipped: Vec<SkippedGroup>,
}

impl ClusterComponentsInfo {
    /// Merge every role group of the cluster, in role order.
    pub fn build(hdfs: &HdfsCluster) -> Result<Self> {
        let instance = hdfs.name_any();
        let namespace = hdfs
            .namespace()
            .ok_or_else(|| Error::Internal(format!("HdfsCluster {} has no namespace", instance)))?;

        let mut info = Self {
            instance: instance.clone(),
            namespace: namespace.clone(),
            ..Default::default()
        };

        for role in HdfsRole::all() {
            let Some(role_spec) = hdfs.role_spec(role) else {
                continue;
            };
            for (group_name, group_spec) in &role_spec.role_groups {
                let key = RoleGroupRef {
                    cluster: instance.clone(),
                    role,
                    group: group_name.clone(),
                };
                info.members.insert(
                    key.clone(),
                    RoleGroupMember {
                        role,
                        group: group_name.clone(),
                        replicas: group_spec.replicas.max(0),
                        naming: RoleGroupNaming::new(&instance, role, group_name),
                    },
                );
                match merge_role_group(role, role_spec, group_name, group_spec) {
                    Ok(config) => {
                        let component = ComponentInfo {
                            instance: instance.clone(),
                            namespace: namespace.clone(),
                            role,
                            group: group_name.clone(),
                            replicas: config.replicas,
                            naming: RoleGroupNaming::new(&instance, role, group_name),
                            config,
                        };
                        info.components.insert(key, component);
                    }
                    Err(error) => info.skipped.push(SkippedGroup {
                        role,
                        group: group_name.clone(),
                        error,
                    }),
                }
            }
        }

        Ok(info)
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, role: HdfsRole, group: &str) -> Option<&ComponentInfo> {
        self.components.get(&RoleGroupRef {
            cluster: self.instance.clone(),
            role,
            group: group.to_string(),
        })
    }

    /// Merged groups of a role in group name order.
    pub fn role(&self, role: HdfsRole) -> impl Iterator<Item = &ComponentInfo> {
        self.components.values().filter(move |c| c.role == role)
    }

    /// Every group of a role in group name order, including skipped ones.
    pub fn members(&self, role: HdfsRole) -> impl Iterator<Item = &RoleGroupMember> {
        self.members.values().filter(move |m| m.role == role)
    }

    /// Replicas of a role summed across all of its groups, skipped included.
    pub fn total_replicas(&self, role: HdfsRole) -> i32 {
        self.members(role).map(|m| m.replicas).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> {
        self.components.values()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Groups whose merge failed. They keep a member but no component.
    pub fn skipped(&self) -> &[SkippedGroup] {
        &self.skipped
    }

    /// Take ownership of the skipped groups for reporting.
    pub fn take_skipped(&mut self) -> Vec<SkippedGroup> {
        std::mem::take(&mut self.skipped)
    }
}
