//! Ordering, idempotence and readiness of reconciliation passes.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceAccount};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use hdfs_operator::controller::status::role_available;
use hdfs_operator::crd::{
    AVAILABLE_CONDITION, AffinityFragment, HdfsRole, PdbFragment, RoleGroupConfigFragment,
    RoleGroupSpec,
};

use crate::common::fixtures::HdfsClusterBuilder;
use crate::{MockStore, NAMESPACE, Write, run_pass};

fn demo() -> HdfsClusterBuilder {
    HdfsClusterBuilder::ha("demo", 1)
        .namespace(NAMESPACE)
        .uid("uid-demo")
        .generation(1)
}

fn created(kind: &str, name: &str) -> Write {
    Write::Create {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_first_pass_creates_objects_in_dependency_order() {
    let store = MockStore::new();
    run_pass(&demo().build(), &store).await.unwrap();

    let mut expected = vec![created("ServiceAccount", "demo-serviceaccount")];
    for role in ["namenode", "journalnode", "datanode"] {
        let name = format!("demo-{}-default", role);
        expected.push(created("Service", &name));
        expected.push(created("StatefulSet", &name));
        expected.push(created("ConfigMap", &name));
    }
    expected.push(created("ConfigMap", "demo"));

    assert_eq!(store.take_writes(), expected);
}

#[tokio::test]
async fn test_status_is_patched_last_and_once() {
    let store = MockStore::new();
    run_pass(&demo().build(), &store).await.unwrap();

    let patches = store.status_patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].0, "demo");
    assert_eq!(patches[0].1["status"]["observedGeneration"], 1);
    assert_eq!(patches[0].1["status"]["roles"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_every_object_is_owned_by_the_cluster() {
    let store = MockStore::new();
    run_pass(&demo().build(), &store).await.unwrap();

    let sa: ServiceAccount = store.object(NAMESPACE, "demo-serviceaccount").unwrap();
    let sts: StatefulSet = store.object(NAMESPACE, "demo-datanode-default").unwrap();
    let svc: Service = store.object(NAMESPACE, "demo-datanode-default").unwrap();
    let discovery: ConfigMap = store.object(NAMESPACE, "demo").unwrap();

    for owners in [
        sa.metadata.owner_references,
        sts.metadata.owner_references,
        svc.metadata.owner_references,
        discovery.metadata.owner_references,
    ] {
        let owners = owners.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].kind, "HdfsCluster");
        assert_eq!(owners[0].uid, "uid-demo");
        assert_eq!(owners[0].controller, Some(true));
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_second_pass_is_a_no_op() {
    let store = MockStore::new();
    let hdfs = demo().build();

    run_pass(&hdfs, &store).await.unwrap();
    assert!(!store.take_writes().is_empty());

    run_pass(&hdfs, &store).await.unwrap();
    assert_eq!(store.take_writes(), Vec::<Write>::new());
}

#[tokio::test]
async fn test_removed_node_selector_is_removed_from_workload() {
    let data_nodes = |node_selector: Option<BTreeMap<String, String>>| {
        demo()
            .group_spec(
                HdfsRole::DataNode,
                "default",
                RoleGroupSpec {
                    replicas: 1,
                    config: Some(RoleGroupConfigFragment {
                        affinity: Some(AffinityFragment {
                            node_selector,
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .build()
    };
    let stored_selector = |store: &MockStore| {
        let sts: StatefulSet = store.object(NAMESPACE, "demo-datanode-default").unwrap();
        sts.spec.unwrap().template.spec.unwrap().node_selector
    };

    let store = MockStore::new();
    let ssd = BTreeMap::from([("disk".to_string(), "ssd".to_string())]);
    run_pass(&data_nodes(Some(ssd.clone())), &store).await.unwrap();
    assert_eq!(stored_selector(&store), Some(ssd));
    store.take_writes();

    let without = data_nodes(None);
    run_pass(&without, &store).await.unwrap();
    assert_eq!(
        store.take_writes(),
        vec![Write::Replace {
            kind: "StatefulSet".to_string(),
            name: "demo-datanode-default".to_string(),
        }]
    );
    assert_eq!(stored_selector(&store), None);

    // Converged: nothing left to remove.
    run_pass(&without, &store).await.unwrap();
    assert_eq!(store.take_writes(), Vec::<Write>::new());
}

#[tokio::test]
async fn test_listener_allocations_survive_later_passes() {
    let store = MockStore::new();
    let hdfs = demo()
        .group_spec(
            HdfsRole::NameNode,
            "default",
            RoleGroupSpec {
                replicas: 2,
                config: Some(RoleGroupConfigFragment {
                    listener_class: Some("external-unstable".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .build();

    run_pass(&hdfs, &store).await.unwrap();
    let writes = store.take_writes();
    assert!(writes.contains(&created("Service", "demo-namenode-default-listener")));

    let listener: Service = store
        .object(NAMESPACE, "demo-namenode-default-listener")
        .unwrap();
    let spec = listener.spec.unwrap();
    assert_eq!(spec.type_.as_deref(), Some("NodePort"));
    let node_ports = spec
        .ports
        .unwrap()
        .iter()
        .map(|p| p.node_port)
        .collect::<Vec<_>>();
    assert!(node_ports.iter().all(Option::is_some));

    // Allocated cluster IP and node ports are carried over, nothing is rewritten.
    run_pass(&hdfs, &store).await.unwrap();
    assert_eq!(store.take_writes(), Vec::<Write>::new());

    let listener: Service = store
        .object(NAMESPACE, "demo-namenode-default-listener")
        .unwrap();
    let after = listener
        .spec
        .unwrap()
        .ports
        .unwrap()
        .iter()
        .map(|p| p.node_port)
        .collect::<Vec<_>>();
    assert_eq!(after, node_ports);
}

// ============================================================================
// Readiness and status
// ============================================================================

#[tokio::test]
async fn test_unready_workloads_leave_cluster_unsettled() {
    let store = MockStore::new();
    let report = run_pass(&demo().build(), &store).await.unwrap();

    assert!(!report.is_settled());
    assert!(report.skipped.is_empty());
    for role in &report.roles {
        assert!(!role.is_available(), "{} should not be available", role.role);
        assert_eq!(role.pending(), ["default".to_string()]);
    }
    let condition = report
        .status
        .conditions
        .iter()
        .find(|c| c.r#type == AVAILABLE_CONDITION)
        .unwrap();
    assert_eq!(condition.status, "False");
}

#[tokio::test]
async fn test_ready_workloads_make_cluster_available() {
    let store = MockStore::new();
    let hdfs = demo().build();

    run_pass(&hdfs, &store).await.unwrap();
    store.mark_all_ready(NAMESPACE);
    let report = run_pass(&hdfs, &store).await.unwrap();

    assert!(report.is_settled());
    for role in HdfsRole::all() {
        assert!(role_available(&report.status, role));
    }
    let roles = &report.status.roles;
    assert!(roles.iter().all(|r| r.ready_groups == "1/1"));
    assert!(roles.iter().all(|r| r.conditions.len() == 1));

    let namenode = report
        .roles
        .iter()
        .find(|r| r.role == HdfsRole::NameNode)
        .unwrap();
    assert_eq!(namenode.desired_replicas, 2);
    assert_eq!(namenode.ready_replicas, 2);
}

#[tokio::test]
async fn test_partially_ready_group_keeps_role_unavailable() {
    let store = MockStore::new();
    let hdfs = demo().build();

    run_pass(&hdfs, &store).await.unwrap();
    store.mark_all_ready(NAMESPACE);
    store.set_ready_replicas(NAMESPACE, "demo-journalnode-default", 2);
    let report = run_pass(&hdfs, &store).await.unwrap();

    assert!(!report.is_settled());
    assert!(role_available(&report.status, HdfsRole::NameNode));
    assert!(!role_available(&report.status, HdfsRole::JournalNode));
    assert!(role_available(&report.status, HdfsRole::DataNode));
}

#[tokio::test]
async fn test_scaling_updates_workload_and_waits_for_new_replicas() {
    let store = MockStore::new();
    run_pass(&HdfsClusterBuilder::ha("demo", 3).namespace(NAMESPACE).build(), &store)
        .await
        .unwrap();
    store.mark_all_ready(NAMESPACE);
    store.take_writes();

    let scaled = HdfsClusterBuilder::ha("demo", 5).namespace(NAMESPACE).build();
    let report = run_pass(&scaled, &store).await.unwrap();

    let writes = store.take_writes();
    assert!(writes.contains(&Write::Replace {
        kind: "StatefulSet".to_string(),
        name: "demo-datanode-default".to_string(),
    }));
    let sts: StatefulSet = store.object(NAMESPACE, "demo-datanode-default").unwrap();
    assert_eq!(sts.spec.unwrap().replicas, Some(5));

    assert!(!role_available(&report.status, HdfsRole::DataNode));
    let datanode = report
        .roles
        .iter()
        .find(|r| r.role == HdfsRole::DataNode)
        .unwrap();
    assert_eq!(datanode.desired_replicas, 5);
    assert_eq!(datanode.ready_replicas, 3);
}

#[tokio::test]
async fn test_requested_pdb_is_applied_after_config_bundle() {
    let store = MockStore::new();
    let hdfs = demo()
        .group_spec(
            HdfsRole::JournalNode,
            "default",
            RoleGroupSpec {
                replicas: 3,
                config: Some(RoleGroupConfigFragment {
                    pod_disruption_budget: Some(PdbFragment {
                        enabled: Some(true),
                        max_unavailable: Some(1),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .build();

    run_pass(&hdfs, &store).await.unwrap();
    let writes = store.take_writes();
    let position = |kind: &str| {
        writes
            .iter()
            .position(|w| w.kind() == kind && w.name() == "demo-journalnode-default")
            .unwrap()
    };
    assert!(position("ConfigMap") < position("PodDisruptionBudget"));

    assert!(
        store
            .object::<PodDisruptionBudget>(NAMESPACE, "demo-journalnode-default")
            .is_some()
    );
    assert!(
        store
            .object::<PodDisruptionBudget>(NAMESPACE, "demo-namenode-default")
            .is_none()
    );
}

#[tokio::test]
async fn test_groups_are_reconciled_in_name_order() {
    let store = MockStore::new();
    let hdfs = demo()
        .group(HdfsRole::DataNode, "zeta", 1)
        .group(HdfsRole::DataNode, "alpha", 1)
        .build();

    run_pass(&hdfs, &store).await.unwrap();
    let workloads = store
        .take_writes()
        .into_iter()
        .filter(|w| w.kind() == "StatefulSet")
        .map(|w| w.name().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        workloads,
        vec![
            "demo-namenode-default",
            "demo-journalnode-default",
            "demo-datanode-alpha",
            "demo-datanode-default",
            "demo-datanode-zeta",
        ]
    );
}
