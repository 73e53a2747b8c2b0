//! Test fixtures and builder patterns for HdfsCluster.

use std::collections::BTreeMap;

use hdfs_operator::crd::{
    AuthenticationSpec, ClusterConfig, HdfsCluster, HdfsClusterSpec, HdfsRole, KerberosSpec,
    RoleGroupConfigFragment, RoleGroupSpec, RoleSpec, TlsSpec,
};

/// Builder for creating HdfsCluster test fixtures.
///
/// # Example
/// ```
/// let hdfs = HdfsClusterBuilder::new("demo")
///     .namespace("test-ns")
///     .group(HdfsRole::NameNode, "default", 2)
///     .group(HdfsRole::JournalNode, "default", 3)
///     .group(HdfsRole::DataNode, "default", 1)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct HdfsClusterBuilder {
    name: String,
    namespace: Option<String>,
    zookeeper_config_map: String,
    roles: BTreeMap<HdfsRole, RoleSpec>,
    kerberos: Option<KerberosSpec>,
    tls: Option<TlsSpec>,
    authentication: Option<AuthenticationSpec>,
    vector_aggregator: Option<String>,
    generation: Option<i64>,
    uid: Option<String>,
}

impl HdfsClusterBuilder {
    /// Create a new builder with the given cluster name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            zookeeper_config_map: "zk-discovery".to_string(),
            roles: BTreeMap::new(),
            kerberos: None,
            tls: None,
            authentication: None,
            vector_aggregator: None,
            generation: None,
            uid: None,
        }
    }

    /// The smallest highly-available layout: 2 name nodes, 3 journal
    /// nodes and `data_nodes` data nodes, one `default` group each.
    pub fn ha(name: impl Into<String>, data_nodes: i32) -> Self {
        Self::new(name)
            .group(HdfsRole::NameNode, "default", 2)
            .group(HdfsRole::JournalNode, "default", 3)
            .group(HdfsRole::DataNode, "default", data_nodes)
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn zookeeper_config_map(mut self, name: impl Into<String>) -> Self {
        self.zookeeper_config_map = name.into();
        self
    }

    /// Add a group with an empty (all defaults) config.
    pub fn group(self, role: HdfsRole, group: &str, replicas: i32) -> Self {
        self.group_spec(
            role,
            group,
            RoleGroupSpec {
                replicas,
                config: Some(RoleGroupConfigFragment::default()),
                ..Default::default()
            },
        )
    }

    /// Add a group without a config object; its merge fails.
    pub fn group_without_config(self, role: HdfsRole, group: &str, replicas: i32) -> Self {
        self.group_spec(
            role,
            group,
            RoleGroupSpec {
                replicas,
                config: None,
                ..Default::default()
            },
        )
    }

    pub fn group_spec(mut self, role: HdfsRole, group: &str, spec: RoleGroupSpec) -> Self {
        self.roles
            .entry(role)
            .or_default()
            .role_groups
            .insert(group.to_string(), spec);
        self
    }

    /// Mutate the role-wide spec, creating it if needed.
    pub fn role_spec(mut self, role: HdfsRole, f: impl FnOnce(&mut RoleSpec)) -> Self {
        f(self.roles.entry(role).or_default());
        self
    }

    pub fn kerberos(mut self, secret_class: &str, realm: &str) -> Self {
        self.kerberos = Some(KerberosSpec {
            secret_class: secret_class.to_string(),
            realm: realm.to_string(),
        });
        self
    }

    pub fn tls(mut self, secret_class: &str) -> Self {
        self.tls = Some(TlsSpec {
            secret_class: secret_class.to_string(),
        });
        self
    }

    pub fn authentication(mut self, provider_url: &str, secret: &str) -> Self {
        self.authentication = Some(AuthenticationSpec {
            provider_url: provider_url.to_string(),
            client_credentials_secret: secret.to_string(),
        });
        self
    }

    pub fn vector_aggregator(mut self, config_map: &str) -> Self {
        self.vector_aggregator = Some(config_map.to_string());
        self
    }

    pub fn generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Build the HdfsCluster.
    pub fn build(self) -> HdfsCluster {
        let mut roles = self.roles;
        let mut hdfs = HdfsCluster::new(
            &self.name,
            HdfsClusterSpec {
                cluster_config: ClusterConfig {
                    dfs_replication: 3,
                    zookeeper_config_map_name: self.zookeeper_config_map,
                    kerberos: self.kerberos,
                    tls: self.tls,
                    authentication: self.authentication,
                    vector_aggregator_config_map_name: self.vector_aggregator,
                },
                name_nodes: roles.remove(&HdfsRole::NameNode),
                journal_nodes: roles.remove(&HdfsRole::JournalNode),
                data_nodes: roles.remove(&HdfsRole::DataNode),
                ..Default::default()
            },
        );
        hdfs.metadata.namespace = self.namespace;
        hdfs.metadata.generation = self.generation;
        hdfs.metadata.uid = self.uid;
        hdfs
    }
}
