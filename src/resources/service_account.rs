//! ServiceAccount shared by every pod of a cluster.

use k8s_openapi::api::core::v1::ServiceAccount;

use crate::controller::error::Result;
use crate::crd::HdfsCluster;
use crate::resources::ResourceBuilder;
use crate::resources::common::{cluster_labels, object_meta};
use crate::topology::naming::service_account_name;

pub struct ServiceAccountBuilder<'a> {
    hdfs: &'a HdfsCluster,
}

impl<'a> ServiceAccountBuilder<'a> {
    pub fn new(hdfs: &'a HdfsCluster) -> Self {
        Self { hdfs }
    }
}

impl ResourceBuilder for ServiceAccountBuilder<'_> {
    type Object = ServiceAccount;

    fn build(&self) -> Result<ServiceAccount> {
        let name = service_account_name(&kube::ResourceExt::name_any(self.hdfs));
        Ok(ServiceAccount {
            metadata: object_meta(self.hdfs, name, cluster_labels(self.hdfs)),
            ..Default::default()
        })
    }
}
