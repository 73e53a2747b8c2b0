//! HdfsCluster Custom Resource Definition.
//!
//! Declares one highly-available HDFS cluster: a pair of name nodes, a quorum
//! of journal nodes and a pool of data nodes, each split into independently
//! scaled role groups.

use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::config::RoleGroupConfigFragment;
use crate::crd::role::HdfsRole;

/// HdfsCluster is a custom resource for deploying HDFS.
///
/// Example:
/// ```yaml
/// apiVersion: hdfs.kubedoop.dev/v1alpha1
/// kind: HdfsCluster
/// metadata:
///   name: demo
/// spec:
///   clusterConfig:
///     zookeeperConfigMapName: demo-znode
///   nameNodes:
///     roleGroups:
///       default:
///         replicas: 2
///         config: {}
///   journalNodes:
///     roleGroups:
///       default:
///         replicas: 3
///         config: {}
///   dataNodes:
///     roleGroups:
///       default:
///         replicas: 1
///         config: {}
/// ```
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "hdfs.kubedoop.dev",
    version = "v1alpha1",
    kind = "HdfsCluster",
    plural = "hdfsclusters",
    shortname = "hdfs",
    status = "HdfsClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Available", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HdfsClusterSpec {
    /// Product image selection.
    #[serde(default)]
    pub image: ImageSpec,

    /// Settings shared by every role.
    pub cluster_config: ClusterConfig,

    /// Name node role (metadata service, exactly one active at a time).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_nodes: Option<RoleSpec>,

    /// Journal node role (shared edit log quorum).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_nodes: Option<RoleSpec>,

    /// Data node role (block storage).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_nodes: Option<RoleSpec>,
}

impl HdfsCluster {
    /// Role spec for the given role, if the user declared it.
    pub fn role_spec(&self, role: HdfsRole) -> Option<&RoleSpec> {
        match role {
            HdfsRole::NameNode => self.spec.name_nodes.as_ref(),
            HdfsRole::JournalNode => self.spec.journal_nodes.as_ref(),
            HdfsRole::DataNode => self.spec.data_nodes.as_ref(),
        }
    }
}

/// Container image specification.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// Image repository (default: apache/hadoop).
    #[serde(default = "default_image_repository")]
    pub repository: String,

    /// Image tag, which is also the product version (default: 3.4.1).
    #[serde(default = "default_image_tag")]
    pub tag: String,

    /// Image pull policy (default: IfNotPresent).
    #[serde(default = "default_image_pull_policy")]
    pub pull_policy: String,

    /// Image pull secrets.
    #[serde(default)]
    pub pull_secrets: Vec<String>,
}

impl Default for ImageSpec {
    fn default() -> Self {
        Self {
            repository: default_image_repository(),
            tag: default_image_tag(),
            pull_policy: default_image_pull_policy(),
            pull_secrets: Vec::new(),
        }
    }
}

impl ImageSpec {
    /// Fully qualified image reference.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

fn default_image_repository() -> String {
    "apache/hadoop".to_string()
}

fn default_image_tag() -> String {
    "3.4.1".to_string()
}

fn default_image_pull_policy() -> String {
    "IfNotPresent".to_string()
}

/// Cluster-wide settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    /// Default block replication factor (default: 3).
    #[serde(default = "default_dfs_replication")]
    pub dfs_replication: i32,

    /// Name of the ConfigMap that exposes the ZooKeeper connection string
    /// under the `ZOOKEEPER` key. Used by the failover controllers.
    pub zookeeper_config_map_name: String,

    /// Kerberos authentication. Enabled when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kerberos: Option<KerberosSpec>,

    /// TLS for the web endpoints and data transfer. Enabled when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,

    /// External authentication for the web UIs, enforced by a reverse proxy sidecar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,

    /// Name of the ConfigMap holding the log aggregator address
    /// (`ADDRESS` key), required by the log agent sidecar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_aggregator_config_map_name: Option<String>,
}

fn default_dfs_replication() -> i32 {
    3
}

/// Kerberos settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KerberosSpec {
    /// Secret class used to provision keytabs and `krb5.conf`.
    pub secret_class: String,

    /// Kerberos realm the service principals belong to.
    pub realm: String,
}

/// TLS settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Secret class used to provision the keystore and truststore.
    pub secret_class: String,
}

/// External authentication provider for the web UIs.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    /// OIDC issuer URL of the provider.
    pub provider_url: String,

    /// Secret holding `CLIENT_ID`, `CLIENT_SECRET` and optionally
    /// `COOKIE_SECRET` for the proxy.
    pub client_credentials_secret: String,
}

/// Per-file configuration overrides, keyed by file name (e.g. `hdfs-site.xml`).
pub type ConfigOverrides = BTreeMap<String, BTreeMap<String, String>>;

/// Role-wide specification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    /// Configuration shared by all groups of the role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RoleGroupConfigFragment>,

    #[serde(default)]
    pub config_overrides: ConfigOverrides,

    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,

    #[serde(default)]
    pub cli_overrides: Vec<String>,

    /// Named role groups.
    #[serde(default)]
    pub role_groups: BTreeMap<String, RoleGroupSpec>,
}

/// Role group specification.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleGroupSpec {
    /// Number of pods in this group.
    #[serde(default)]
    pub replicas: i32,

    /// Group configuration. Required: a missing object fails the merge for
    /// this group instead of silently defaulting every field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RoleGroupConfigFragment>,

    /// Properties appended to the named configuration files.
    #[serde(default)]
    pub config_overrides: ConfigOverrides,

    /// Environment variables replacing the main container's values.
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,

    /// Command replacing the main container's command.
    #[serde(default)]
    pub cli_overrides: Vec<String>,
}

/// Status of an HdfsCluster.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HdfsClusterStatus {
    /// The generation most recently observed by the controller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Cluster-level conditions (`Available`).
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Per-role availability.
    #[serde(default)]
    pub roles: Vec<RoleStatus>,
}

/// Availability of one role.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleStatus {
    pub role: String,

    /// Ready groups in "ready/total" format.
    pub ready_groups: String,

    /// Holds the single `Available` condition of the role.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition describes the state of a cluster at a certain point.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition.
    pub r#type: String,
    /// Status of the condition ("True", "False", "Unknown").
    pub status: String,
    /// Machine-readable reason for the condition's last transition.
    pub reason: String,
    /// Human-readable message indicating details about last transition.
    pub message: String,
    /// Last time the condition transitioned from one status to another.
    pub last_transition_time: String,
    /// The generation of the resource this condition was observed for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl Condition {
    /// Create a new condition.
    pub fn new(
        condition_type: &str,
        status: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status {
                "True".to_string()
            } else {
                "False".to_string()
            },
            reason: reason.to_string(),
            message: message.to_string(),
            last_transition_time: jiff::Timestamp::now().to_string(),
            observed_generation: generation,
        }
    }

    /// Create an "Available" condition.
    pub fn available(available: bool, reason: &str, message: &str, generation: Option<i64>) -> Self {
        Self::new(AVAILABLE_CONDITION, available, reason, message, generation)
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// The only externally observable success signal.
pub const AVAILABLE_CONDITION: &str = "Available";
