//! Operator settings read from the environment.

use std::time::Duration;

use tracing::warn;

pub const DEFAULT_CLUSTER_DOMAIN: &str = "cluster.local";
pub const DEFAULT_REQUEUE_SECONDS: u64 = 10;
pub const DEFAULT_RESYNC_SECONDS: u64 = 300;
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Process-wide operator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// DNS suffix of in-cluster service names.
    pub cluster_domain: String,
    /// Restrict the controller to one namespace; `None` watches all.
    pub watch_namespace: Option<String>,
    /// Fixed delay before re-checking an unsatisfied cluster.
    pub requeue_interval: Duration,
    /// Delay before re-checking a cluster with every role available.
    pub resync_interval: Duration,
    pub health_port: u16,
    /// Holder identity for leader election.
    pub pod_name: String,
    /// Namespace of the leader election lease.
    pub pod_namespace: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            cluster_domain: DEFAULT_CLUSTER_DOMAIN.to_string(),
            watch_namespace: None,
            requeue_interval: Duration::from_secs(DEFAULT_REQUEUE_SECONDS),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECONDS),
            health_port: DEFAULT_HEALTH_PORT,
            pod_name: "unknown".to_string(),
            pod_namespace: "default".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let seconds = |key: &str, default: Duration| match non_empty(key) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(key = key, value = %raw, "Invalid duration, using default");
                    default
                }
            },
            None => default,
        };

        let health_port = match non_empty("HEALTH_PORT") {
            Some(raw) => raw.trim().parse::<u16>().unwrap_or_else(|_| {
                warn!(value = %raw, "Invalid HEALTH_PORT, using default");
                defaults.health_port
            }),
            None => defaults.health_port,
        };

        let pod_name = non_empty("POD_NAME").unwrap_or_else(|| {
            warn!("POD_NAME not set, using hostname");
            hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| defaults.pod_name.clone())
        });
        let pod_namespace = non_empty("POD_NAMESPACE").unwrap_or_else(|| {
            warn!("POD_NAMESPACE not set, using 'default'");
            defaults.pod_namespace.clone()
        });

        Self {
            cluster_domain: non_empty("KUBERNETES_CLUSTER_DOMAIN")
                .unwrap_or(defaults.cluster_domain),
            watch_namespace: non_empty("WATCH_NAMESPACE"),
            requeue_interval: seconds("HDFS_OPERATOR_REQUEUE_SECONDS", defaults.requeue_interval),
            resync_interval: seconds("HDFS_OPERATOR_RESYNC_SECONDS", defaults.resync_interval),
            health_port,
            pod_name,
            pod_namespace,
        }
    }
}
