//! Deterministic object and pod names.
//!
//! These names appear inside generated configuration (addresses, quorum
//! URLs) and must be byte-identical to the names of the objects created.

use crate::crd::HdfsRole;

/// Join name components with `-`, omitting empty ones.
pub fn join_name(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("-")
}

/// Name of the cluster-wide service account.
pub fn service_account_name(instance: &str) -> String {
    join_name(&[instance, "serviceaccount"])
}

/// Name of the client discovery ConfigMap.
pub fn discovery_config_map_name(instance: &str) -> String {
    instance.to_string()
}

/// Naming handle of one role group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleGroupNaming {
    instance: String,
    role: HdfsRole,
    group: String,
}

impl RoleGroupNaming {
    pub fn new(instance: &str, role: HdfsRole, group: &str) -> Self {
        Self {
            instance: instance.to_string(),
            role,
            group: group.to_string(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn role(&self) -> HdfsRole {
        self.role
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// `{instance}-{role}-{group}`: StatefulSet, headless Service, ConfigMap and PDB.
    pub fn name(&self) -> String {
        join_name(&[&self.instance, self.role.name(), &self.group])
    }

    pub fn with_suffix(&self, suffix: &str) -> String {
        join_name(&[&self.instance, self.role.name(), &self.group, suffix])
    }

    /// Headless service governing the StatefulSet.
    pub fn service_name(&self) -> String {
        self.name()
    }

    /// NodePort or LoadBalancer service for external listener classes.
    pub fn listener_service_name(&self) -> String {
        self.with_suffix("listener")
    }

    /// Pod name of a StatefulSet ordinal.
    pub fn pod_name(&self, ordinal: i32) -> String {
        format!("{}-{}", self.name(), ordinal)
    }

    /// Every pod name for the given replica count.
    pub fn pod_names(&self, replicas: i32) -> Vec<String> {
        (0..replicas.max(0)).map(|i| self.pod_name(i)).collect()
    }
}
