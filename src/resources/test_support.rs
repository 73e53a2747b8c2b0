//! Fixtures shared by the builder tests.

use std::collections::BTreeMap;

use crate::controller::components::ClusterComponentsInfo;
use crate::crd::{
    ClusterConfig, HdfsCluster, HdfsClusterSpec, HdfsRole, RoleGroupConfigFragment, RoleGroupSpec,
    RoleSpec,
};
use crate::resources::{ResolvedDependencies, RoleGroupContext};
use crate::topology::{Topology, TopologyContext};

pub fn role(replicas: i32) -> Option<RoleSpec> {
    Some(RoleSpec {
        role_groups: BTreeMap::from([(
            "default".to_string(),
            RoleGroupSpec {
                replicas,
                config: Some(RoleGroupConfigFragment::default()),
                ..Default::default()
            },
        )]),
        ..Default::default()
    })
}

/// `demo` in `ns1` with one `default` group per role.
pub fn cluster(name_nodes: i32, journal_nodes: i32, data_nodes: i32) -> HdfsCluster {
    let mut hdfs = HdfsCluster::new(
        "demo",
        HdfsClusterSpec {
            cluster_config: ClusterConfig {
                dfs_replication: 3,
                zookeeper_config_map_name: "demo-znode".to_string(),
                ..Default::default()
            },
            name_nodes: role(name_nodes),
            journal_nodes: role(journal_nodes),
            data_nodes: role(data_nodes),
            ..Default::default()
        },
    );
    hdfs.metadata.namespace = Some("ns1".to_string());
    hdfs.metadata.uid = Some("uid-demo".to_string());
    hdfs
}

/// Run `f` with the context of the `default` group of `role`.
pub fn with_ctx<T>(
    hdfs: &HdfsCluster,
    role: HdfsRole,
    dependencies: &ResolvedDependencies,
    f: impl FnOnce(&RoleGroupContext<'_>) -> T,
) -> T {
    let Ok(components) = ClusterComponentsInfo::build(hdfs) else {
        panic!("fixture cluster must merge");
    };
    let topology = Topology::new(
        &components,
        TopologyContext::new(hdfs, "ns1", "cluster.local"),
    );
    let Some(component) = components.get(role, "default") else {
        panic!("fixture has no default group for {}", role);
    };
    let ctx = RoleGroupContext {
        hdfs,
        component,
        topology: &topology,
        dependencies,
    };
    f(&ctx)
}
