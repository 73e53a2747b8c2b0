//! Config merge layer.
//!
//! Overlays a role group's configuration on the role's and then on compiled
//! role defaults, field by field. A field counts as unset when it is `None`
//! or holds the zero value of its type, so a group cannot explicitly ask for
//! `0`, `false` or an empty string where the role or the defaults say
//! otherwise.

use std::collections::BTreeMap;
use std::time::Duration;

use strum::{AsRefStr, Display, EnumString};

use crate::controller::error::{Error, Result};
use crate::crd::{
    AffinityFragment, ConfigOverrides, CpuFragment, HdfsRole, LoggingFragment, MemoryFragment,
    PdbFragment, ResourcesFragment, RoleGroupConfigFragment, RoleGroupSpec, RoleSpec,
    StorageFragment, Toleration,
};

/// Fill every unset field of `self` from `fallback`.
pub trait Merge {
    fn merge(&mut self, fallback: &Self);
}

/// Zero-value test used to decide whether a leaf field is set.
pub trait Unset {
    fn is_unset(&self) -> bool;
}

impl Unset for String {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl Unset for bool {
    fn is_unset(&self) -> bool {
        !*self
    }
}

impl Unset for i32 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl Unset for i64 {
    fn is_unset(&self) -> bool {
        *self == 0
    }
}

impl<K, V> Unset for BTreeMap<K, V> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

impl<T> Unset for Vec<T> {
    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

fn merge_leaf<T: Unset + Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
    let unset = slot.as_ref().is_none_or(Unset::is_unset);
    if unset {
        *slot = fallback.clone();
    }
}

fn merge_nested<T: Merge + Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
    match (slot.as_mut(), fallback) {
        (Some(current), Some(fallback)) => current.merge(fallback),
        (None, Some(fallback)) => *slot = Some(fallback.clone()),
        _ => {}
    }
}

impl Merge for RoleGroupConfigFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_nested(&mut self.resources, &fallback.resources);
        merge_leaf(&mut self.listener_class, &fallback.listener_class);
        merge_nested(&mut self.affinity, &fallback.affinity);
        merge_nested(&mut self.logging, &fallback.logging);
        merge_leaf(
            &mut self.graceful_shutdown_timeout_seconds,
            &fallback.graceful_shutdown_timeout_seconds,
        );
        merge_nested(&mut self.pod_disruption_budget, &fallback.pod_disruption_budget);
    }
}

impl Merge for ResourcesFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_nested(&mut self.cpu, &fallback.cpu);
        merge_nested(&mut self.memory, &fallback.memory);
        merge_nested(&mut self.storage, &fallback.storage);
    }
}

impl Merge for CpuFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.min, &fallback.min);
        merge_leaf(&mut self.max, &fallback.max);
    }
}

impl Merge for MemoryFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.limit, &fallback.limit);
    }
}

impl Merge for StorageFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.capacity, &fallback.capacity);
        merge_leaf(&mut self.storage_class, &fallback.storage_class);
    }
}

impl Merge for AffinityFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.node_selector, &fallback.node_selector);
        merge_leaf(&mut self.tolerations, &fallback.tolerations);
        merge_leaf(
            &mut self.anti_affinity_topology_key,
            &fallback.anti_affinity_topology_key,
        );
    }
}

impl Merge for LoggingFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.enable_vector_agent, &fallback.enable_vector_agent);
        merge_leaf(&mut self.root_log_level, &fallback.root_log_level);
    }
}

impl Merge for PdbFragment {
    fn merge(&mut self, fallback: &Self) {
        merge_leaf(&mut self.enabled, &fallback.enabled);
        merge_leaf(&mut self.max_unavailable, &fallback.max_unavailable);
    }
}

/// How a role group is reachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ListenerClass {
    /// Headless service only.
    ClusterInternal,
    /// Additional NodePort service; addresses change with the node.
    ExternalUnstable,
    /// Additional LoadBalancer service.
    ExternalStable,
}

impl ListenerClass {
    pub fn is_external(&self) -> bool {
        !matches!(self, ListenerClass::ClusterInternal)
    }
}

/// Finalized resource shape.
#[derive(Clone, Debug, PartialEq)]
pub struct Resources {
    pub cpu_min: String,
    pub cpu_max: String,
    pub memory_limit: String,
    pub storage_capacity: String,
    pub storage_class: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Affinity {
    pub node_selector: BTreeMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub anti_affinity_topology_key: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Logging {
    pub enable_vector_agent: bool,
    pub root_log_level: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisruptionBudget {
    pub enabled: bool,
    pub max_unavailable: i32,
}

/// User overrides after composing role and group levels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Overrides {
    /// File name to properties, group wins per key.
    pub config: ConfigOverrides,
    /// Group wins per variable.
    pub env: BTreeMap<String, String>,
    /// Group command when non-empty, otherwise the role's.
    pub cli: Vec<String>,
}

/// Effective configuration of one role group, every field populated.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedRoleGroupConfig {
    pub replicas: i32,
    pub resources: Resources,
    pub listener_class: ListenerClass,
    pub affinity: Affinity,
    pub logging: Logging,
    pub graceful_shutdown_timeout: Duration,
    pub pod_disruption_budget: DisruptionBudget,
    pub overrides: Overrides,
}

/// Compiled-in defaults of a role.
pub fn role_defaults(role: HdfsRole) -> RoleGroupConfigFragment {
    let (cpu_min, cpu_max, memory, storage, shutdown) = match role {
        HdfsRole::NameNode => ("250m", "1", "1Gi", "2Gi", 900),
        HdfsRole::JournalNode => ("100m", "400m", "512Mi", "1Gi", 900),
        HdfsRole::DataNode => ("100m", "400m", "512Mi", "10Gi", 1800),
    };

    RoleGroupConfigFragment {
        resources: Some(ResourcesFragment {
            cpu: Some(CpuFragment {
                min: Some(cpu_min.to_string()),
                max: Some(cpu_max.to_string()),
            }),
            memory: Some(MemoryFragment {
                limit: Some(memory.to_string()),
            }),
            storage: Some(StorageFragment {
                capacity: Some(storage.to_string()),
                storage_class: None,
            }),
        }),
        listener_class: Some(ListenerClass::ClusterInternal.to_string()),
        affinity: Some(AffinityFragment {
            node_selector: None,
            tolerations: None,
            anti_affinity_topology_key: Some("kubernetes.io/hostname".to_string()),
        }),
        logging: Some(LoggingFragment {
            enable_vector_agent: Some(false),
            root_log_level: Some("INFO".to_string()),
        }),
        graceful_shutdown_timeout_seconds: Some(shutdown),
        pod_disruption_budget: Some(PdbFragment {
            enabled: Some(false),
            max_unavailable: Some(1),
        }),
    }
}

/// Merge group over role over compiled defaults and finalize.
///
/// Fails with [`Error::Configuration`] when the group has no configuration
/// object, a negative replica count or an unknown listener class.
pub fn merge_role_group(
    role: HdfsRole,
    role_spec: &RoleSpec,
    group_name: &str,
    group: &RoleGroupSpec,
) -> Result<MergedRoleGroupConfig> {
    let Some(group_config) = group.config.as_ref() else {
        return Err(Error::Configuration(format!(
            "role group {}/{} has no config object",
            role, group_name
        )));
    };

    if group.replicas < 0 {
        return Err(Error::Configuration(format!(
            "role group {}/{} has negative replicas ({})",
            role, group_name, group.replicas
        )));
    }

    let mut merged = group_config.clone();
    if let Some(role_config) = role_spec.config.as_ref() {
        merged.merge(role_config);
    }
    merged.merge(&role_defaults(role));

    let overrides = merge_overrides(role_spec, group);
    finalize(role, group_name, group.replicas, merged, overrides)
}

/// Compose role and group overrides.
pub fn merge_overrides(role_spec: &RoleSpec, group: &RoleGroupSpec) -> Overrides {
    let mut config = role_spec.config_overrides.clone();
    for (file, properties) in &group.config_overrides {
        let entry = config.entry(file.clone()).or_default();
        for (key, value) in properties {
            entry.insert(key.clone(), value.clone());
        }
    }

    let mut env = role_spec.env_overrides.clone();
    env.extend(
        group
            .env_overrides
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    let cli = if group.cli_overrides.is_empty() {
        role_spec.cli_overrides.clone()
    } else {
        group.cli_overrides.clone()
    };

    Overrides { config, env, cli }
}

fn finalize(
    role: HdfsRole,
    group_name: &str,
    replicas: i32,
    fragment: RoleGroupConfigFragment,
    overrides: Overrides,
) -> Result<MergedRoleGroupConfig> {
    let missing = |field: &str| {
        Error::Internal(format!(
            "default for {} missing after merging {}/{}",
            field, role, group_name
        ))
    };

    let resources = fragment.resources.unwrap_or_default();
    let cpu = resources.cpu.unwrap_or_default();
    let memory = resources.memory.unwrap_or_default();
    let storage = resources.storage.unwrap_or_default();
    let affinity = fragment.affinity.unwrap_or_default();
    let logging = fragment.logging.unwrap_or_default();
    let pdb = fragment.pod_disruption_budget.unwrap_or_default();

    let listener_class = fragment
        .listener_class
        .ok_or_else(|| missing("listenerClass"))?;
    let listener_class = listener_class.parse::<ListenerClass>().map_err(|_| {
        Error::Configuration(format!(
            "role group {}/{} has unknown listener class {:?}",
            role, group_name, listener_class
        ))
    })?;

    let graceful_shutdown_seconds = fragment
        .graceful_shutdown_timeout_seconds
        .ok_or_else(|| missing("gracefulShutdownTimeoutSeconds"))?;

    Ok(MergedRoleGroupConfig {
        replicas,
        resources: Resources {
            cpu_min: cpu.min.ok_or_else(|| missing("resources.cpu.min"))?,
            cpu_max: cpu.max.ok_or_else(|| missing("resources.cpu.max"))?,
            memory_limit: memory
                .limit
                .ok_or_else(|| missing("resources.memory.limit"))?,
            storage_capacity: storage
                .capacity
                .ok_or_else(|| missing("resources.storage.capacity"))?,
            storage_class: storage.storage_class.filter(|class| !class.is_empty()),
        },
        listener_class,
        affinity: Affinity {
            node_selector: affinity.node_selector.unwrap_or_default(),
            tolerations: affinity.tolerations.unwrap_or_default(),
            anti_affinity_topology_key: affinity
                .anti_affinity_topology_key
                .ok_or_else(|| missing("affinity.antiAffinityTopologyKey"))?,
        },
        logging: Logging {
            enable_vector_agent: logging.enable_vector_agent.unwrap_or(false),
            root_log_level: logging
                .root_log_level
                .ok_or_else(|| missing("logging.rootLogLevel"))?,
        },
        graceful_shutdown_timeout: Duration::from_secs(graceful_shutdown_seconds.unsigned_abs()),
        pod_disruption_budget: DisruptionBudget {
            enabled: pdb.enabled.unwrap_or(false),
            max_unavailable: pdb
                .max_unavailable
                .ok_or_else(|| missing("podDisruptionBudget.maxUnavailable"))?,
        },
        overrides,
    })
}
