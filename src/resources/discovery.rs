//! Client discovery ConfigMap.
//!
//! Carries the `core-site.xml` and `hdfs-site.xml` a client needs to reach
//! the name nodes of the cluster. Named after the instance so that client
//! workloads can mount it without knowing the role-group layout.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;

use crate::controller::error::Result;
use crate::crd::HdfsCluster;
use crate::resources::ResourceBuilder;
use crate::resources::common::{cluster_labels, object_meta};
use crate::topology::naming::discovery_config_map_name;
use crate::topology::{CORE_SITE_XML, HDFS_SITE_XML, Topology};

pub struct DiscoveryBuilder<'a> {
    hdfs: &'a HdfsCluster,
    topology: &'a Topology<'a>,
}

impl<'a> DiscoveryBuilder<'a> {
    pub fn new(hdfs: &'a HdfsCluster, topology: &'a Topology<'a>) -> Self {
        Self { hdfs, topology }
    }
}

impl ResourceBuilder for DiscoveryBuilder<'_> {
    type Object = ConfigMap;

    fn build(&self) -> Result<ConfigMap> {
        let data = BTreeMap::from([
            (
                CORE_SITE_XML.to_string(),
                self.topology.client_core_site().to_hadoop_xml()?,
            ),
            (
                HDFS_SITE_XML.to_string(),
                self.topology.client_hdfs_site().to_hadoop_xml()?,
            ),
        ]);

        Ok(ConfigMap {
            metadata: object_meta(
                self.hdfs,
                discovery_config_map_name(&self.hdfs.name_any()),
                cluster_labels(self.hdfs),
            ),
            data: Some(data),
            ..Default::default()
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::controller::components::ClusterComponentsInfo;
    use crate::resources::test_support::cluster;
    use crate::topology::TopologyContext;

    #[test]
    fn test_discovery_config_map() {
        let hdfs = cluster(2, 3, 1);
        let components = ClusterComponentsInfo::build(&hdfs).unwrap();
        let topology = Topology::new(
            &components,
            TopologyContext::new(&hdfs, "ns1", "cluster.local"),
        );
        let cm = DiscoveryBuilder::new(&hdfs, &topology).build().unwrap();

        assert_eq!(cm.metadata.name.as_deref(), Some("demo"));
        let data = cm.data.unwrap();
        assert!(data["core-site.xml"].contains("<value>hdfs://demo/</value>"));
        let site = &data["hdfs-site.xml"];
        assert!(site.contains("<name>dfs.nameservices</name>"));
        assert!(site.contains("dfs.namenode.rpc-address.demo.demo-namenode-default-1"));
        assert!(!site.contains("qjournal://"));
        assert!(!data["core-site.xml"].contains("ha.zookeeper.quorum"));
    }
}
