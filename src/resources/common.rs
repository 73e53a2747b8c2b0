//! Common resource generation utilities.
//!
//! Labels, owner references and metadata skeletons shared by all builders.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};

use crate::crd::HdfsCluster;
use crate::topology::naming::RoleGroupNaming;

pub const APP_NAME: &str = "hdfs";
pub const MANAGED_BY: &str = "hdfs-operator";

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_ROLE_GROUP: &str = "app.kubernetes.io/role-group";
pub const LABEL_VERSION: &str = "app.kubernetes.io/version";

/// Labels of cluster-scoped objects (service account, discovery).
pub fn cluster_labels(hdfs: &HdfsCluster) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), APP_NAME.to_string()),
        (LABEL_INSTANCE.to_string(), hdfs.name_any()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
        (LABEL_VERSION.to_string(), hdfs.spec.image.tag.clone()),
    ])
}

/// Labels of role-group objects.
pub fn role_group_labels(
    hdfs: &HdfsCluster,
    naming: &RoleGroupNaming,
) -> BTreeMap<String, String> {
    let mut labels = cluster_labels(hdfs);
    labels.extend(pod_selector_labels(naming));
    labels
}

/// Selector matching the pods of one role group; never changes for a group.
pub fn pod_selector_labels(naming: &RoleGroupNaming) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), APP_NAME.to_string()),
        (LABEL_INSTANCE.to_string(), naming.instance().to_string()),
        (LABEL_COMPONENT.to_string(), naming.role().name().to_string()),
        (LABEL_ROLE_GROUP.to_string(), naming.group().to_string()),
    ])
}

/// Create owner reference for an HdfsCluster
pub fn owner_reference(hdfs: &HdfsCluster) -> OwnerReference {
    OwnerReference {
        api_version: HdfsCluster::api_version(&()).to_string(),
        kind: HdfsCluster::kind(&()).to_string(),
        name: hdfs.name_any(),
        uid: hdfs.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Metadata of an owned object.
pub fn object_meta(
    hdfs: &HdfsCluster,
    name: String,
    labels: BTreeMap<String, String>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: hdfs.namespace(),
        labels: Some(labels),
        owner_references: Some(vec![owner_reference(hdfs)]),
        ..Default::default()
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
    use crate::crd::{HdfsClusterSpec, HdfsRole};

    fn test_cluster() -> HdfsCluster {
        let mut hdfs = HdfsCluster::new("demo", HdfsClusterSpec::default());
        hdfs.metadata.namespace = Some("ns1".to_string());
        hdfs.metadata.uid = Some("uid-1".to_string());
        hdfs
    }

    #[test]
    fn test_owner_reference() {
        let owner = owner_reference(&test_cluster());
        assert_eq!(owner.api_version, "hdfs.kubedoop.dev/v1alpha1");
        assert_eq!(owner.kind, "HdfsCluster");
        assert_eq!(owner.name, "demo");
        assert_eq!(owner.uid, "uid-1");
        assert_eq!(owner.controller, Some(true));
    }

    #[test]
    fn test_role_group_labels() {
        let naming = RoleGroupNaming::new("demo", HdfsRole::DataNode, "hot");
        let labels = role_group_labels(&test_cluster(), &naming);
        assert_eq!(labels.get(LABEL_COMPONENT).unwrap(), "datanode");
        assert_eq!(labels.get(LABEL_ROLE_GROUP).unwrap(), "hot");
        assert_eq!(labels.get(LABEL_MANAGED_BY).unwrap(), MANAGED_BY);

        let selector = pod_selector_labels(&naming);
        assert!(selector.iter().all(|(k, v)| labels.get(k) == Some(v)));
        assert!(!selector.contains_key(LABEL_VERSION));
    }

    #[test]
    fn test_object_meta() {
        let meta = object_meta(&test_cluster(), "demo-x".to_string(), BTreeMap::new());
        assert_eq!(meta.name.as_deref(), Some("demo-x"));
        assert_eq!(meta.namespace.as_deref(), Some("ns1"));
        assert_eq!(meta.owner_references.unwrap().len(), 1);
    }
}
