//! End-to-end reconciliation against a live API server.

use std::time::Duration;

use hdfs_operator::crd::{HdfsCluster, HdfsRole};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use kube::api::{Api, PostParams};

use crate::common::fixtures::HdfsClusterBuilder;
use crate::{
    ScopedOperator, SharedTestCluster, TestNamespace, init_tracing, is_available, ready_groups,
    wait_for_condition, wait_for_deletion, wait_for_generation_observed, wait_for_resource,
};

const TIMEOUT: Duration = Duration::from_secs(60);

async fn setup(prefix: &str) -> (TestNamespace, ScopedOperator) {
    init_tracing();
    let cluster = SharedTestCluster::get().await;
    let client = cluster.new_client().await;
    let ns = TestNamespace::create(client.clone(), prefix).await;
    ns.create_config_map("zk-discovery", &[("ZOOKEEPER", "zookeeper:2181")])
        .await;
    let operator = ScopedOperator::start(client, ns.name()).await;
    (ns, operator)
}

async fn create(ns: &TestNamespace, hdfs: HdfsCluster) -> Api<HdfsCluster> {
    let api: Api<HdfsCluster> = ns.api();
    api.create(&PostParams::default(), &hdfs)
        .await
        .expect("Failed to create HdfsCluster");
    api
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster with CRD installed"]
async fn test_cluster_creates_every_role_group() {
    let (ns, operator) = setup("hdfs-create").await;
    let api = create(&ns, HdfsClusterBuilder::ha("demo", 1).build()).await;

    wait_for_resource(&ns.api::<ServiceAccount>(), "demo-serviceaccount", TIMEOUT)
        .await
        .unwrap();
    for role in HdfsRole::all() {
        let name = format!("demo-{}-default", role);
        wait_for_resource(&ns.api::<Service>(), &name, TIMEOUT)
            .await
            .unwrap();
        wait_for_resource(&ns.api::<ConfigMap>(), &name, TIMEOUT)
            .await
            .unwrap();
        let sts = wait_for_resource(&ns.api::<StatefulSet>(), &name, TIMEOUT)
            .await
            .unwrap();
        let owner = &sts.metadata.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "HdfsCluster");
        assert_eq!(owner.name, "demo");
    }

    let discovery = wait_for_resource(&ns.api::<ConfigMap>(), "demo", TIMEOUT)
        .await
        .unwrap();
    let data = discovery.data.unwrap();
    assert!(data.contains_key("core-site.xml"));
    assert!(data.contains_key("hdfs-site.xml"));

    let hdfs = wait_for_generation_observed(&api, "demo", TIMEOUT)
        .await
        .unwrap();
    assert_eq!(hdfs.status.as_ref().unwrap().roles.len(), 3);
    assert!(operator.is_running());
    assert_eq!(operator.namespace(), ns.name());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster with CRD installed"]
async fn test_group_without_config_is_reported_skipped() {
    let (ns, _operator) = setup("hdfs-skip").await;
    let hdfs = HdfsClusterBuilder::ha("demo", 1)
        .group_without_config(HdfsRole::DataNode, "broken", 1)
        .build();
    let api = create(&ns, hdfs).await;

    let hdfs = wait_for_condition(
        &api,
        "demo",
        |c| ready_groups(c, HdfsRole::DataNode).is_some(),
        TIMEOUT,
    )
    .await
    .unwrap();
    assert!(!is_available(&hdfs));
    assert_eq!(ready_groups(&hdfs, HdfsRole::DataNode).as_deref(), Some("0/2"));

    // The sibling group is still reconciled.
    wait_for_resource(&ns.api::<StatefulSet>(), "demo-datanode-default", TIMEOUT)
        .await
        .unwrap();
    assert!(
        ns.api::<StatefulSet>()
            .get_opt("demo-datanode-broken")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster with CRD installed"]
async fn test_scaling_data_nodes_updates_workload() {
    let (ns, _operator) = setup("hdfs-scale").await;
    let api = create(&ns, HdfsClusterBuilder::ha("demo", 1).build()).await;
    let statefulsets = ns.api::<StatefulSet>();
    wait_for_resource(&statefulsets, "demo-datanode-default", TIMEOUT)
        .await
        .unwrap();

    let mut current = api.get("demo").await.unwrap();
    if let Some(data_nodes) = current.spec.data_nodes.as_mut()
        && let Some(group) = data_nodes.role_groups.get_mut("default")
    {
        group.replicas = 3;
    }
    api.replace("demo", &PostParams::default(), &current)
        .await
        .unwrap();

    let sts = wait_for_condition(
        &statefulsets,
        "demo-datanode-default",
        |s| s.spec.as_ref().and_then(|spec| spec.replicas) == Some(3),
        TIMEOUT,
    )
    .await
    .unwrap();
    assert_eq!(sts.spec.unwrap().replicas, Some(3));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster with CRD installed"]
async fn test_deleting_cluster_removes_owned_objects() {
    let (ns, _operator) = setup("hdfs-delete").await;
    let api = create(&ns, HdfsClusterBuilder::ha("demo", 1).build()).await;
    let configmaps = ns.api::<ConfigMap>();
    wait_for_resource(&configmaps, "demo", TIMEOUT).await.unwrap();

    api.delete("demo", &Default::default()).await.unwrap();
    wait_for_deletion(&configmaps, "demo", TIMEOUT).await.unwrap();
}
