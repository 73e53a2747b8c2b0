//! Role and role-group configuration fragments.
//!
//! Every field is optional so that a role group can set only what it wants
//! to change and inherit the rest from the role and the compiled defaults.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configuration object of a role or a role group.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleGroupConfigFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesFragment>,

    /// How the role group is exposed: `cluster-internal`,
    /// `external-unstable` (NodePort) or `external-stable` (LoadBalancer).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<AffinityFragment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingFragment>,

    /// Seconds the pods get to shut down gracefully.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graceful_shutdown_timeout_seconds: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_disruption_budget: Option<PdbFragment>,
}

/// Compute and storage resources.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuFragment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryFragment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageFragment>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CpuFragment {
    /// CPU request (e.g. `250m`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,

    /// CPU limit (e.g. `1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFragment {
    /// Memory request and limit (e.g. `1Gi`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageFragment {
    /// Size of the data volume (e.g. `10Gi`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,

    /// Storage class of the data volume. Cluster default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Node placement constraints.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AffinityFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Topology key used to spread pods of the same role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anti_affinity_topology_key: Option<String>,
}

/// Toleration for pod scheduling.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Equal or Exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// NoSchedule, PreferNoSchedule or NoExecute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoggingFragment {
    /// Run the log agent sidecar next to the role process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_vector_agent: Option<bool>,

    /// Root logger level of every sub-container (e.g. `INFO`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_log_level: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PdbFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<i32>,
}
