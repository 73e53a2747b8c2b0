// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for hdfs-operator.
//!
//! Uses proptest to generate random cluster layouts and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use common::fixtures::HdfsClusterBuilder;
use hdfs_operator::controller::components::ClusterComponentsInfo;
use hdfs_operator::controller::merge::merge_role_group;
use hdfs_operator::crd::{
    CpuFragment, HdfsCluster, HdfsRole, ResourcesFragment, RoleGroupConfigFragment, RoleGroupSpec,
    RoleSpec,
};
use hdfs_operator::engine::diff::{compute_patch, is_empty_patch};
use hdfs_operator::topology::{Topology, TopologyContext};

/// Strategy for generating role group layouts: group name to replicas.
fn group_layout() -> impl Strategy<Value = BTreeMap<String, i32>> {
    prop::collection::btree_map("[a-z]{1,6}", 0..=5i32, 1..=4)
}

fn cluster(
    namenodes: &BTreeMap<String, i32>,
    journals: &BTreeMap<String, i32>,
    datanodes: &BTreeMap<String, i32>,
) -> HdfsCluster {
    let mut builder = HdfsClusterBuilder::new("prop").namespace("ns");
    for (role, layout) in [
        (HdfsRole::NameNode, namenodes),
        (HdfsRole::JournalNode, journals),
        (HdfsRole::DataNode, datanodes),
    ] {
        for (group, replicas) in layout {
            builder = builder.group(role, group, *replicas);
        }
    }
    builder.build()
}

/// Strategy for shallow JSON objects.
fn json_object() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i64>().prop_map(serde_json::Value::from),
        "[a-z0-9]{0,8}".prop_map(serde_json::Value::from),
    ];
    let value = leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
        ]
    });
    prop::collection::btree_map("[a-z]{1,5}", value, 0..5)
        .prop_map(|m| serde_json::Value::Object(m.into_iter().collect()))
}

proptest! {
    /// Every ordinal of every group appears exactly once, in group then
    /// ordinal order.
    #[test]
    fn pod_refs_cover_every_ordinal(layout in group_layout()) {
        let hdfs = cluster(&layout, &BTreeMap::new(), &BTreeMap::new());
        let components = ClusterComponentsInfo::build(&hdfs).unwrap();
        let topology = Topology::new(&components, TopologyContext::new(&hdfs, "ns", "cluster.local"));

        let refs = topology.pod_refs(HdfsRole::NameNode);
        let expected = layout
            .iter()
            .flat_map(|(group, replicas)| {
                (0..*replicas).map(move |i| format!("prop-namenode-{}-{}", group, i))
            })
            .collect::<Vec<_>>();
        let names = refs.iter().map(|r| r.pod_name.clone()).collect::<Vec<_>>();
        prop_assert_eq!(&names, &expected);

        let unique = names.iter().collect::<BTreeSet<_>>();
        prop_assert_eq!(unique.len(), names.len());
        prop_assert_eq!(
            components.total_replicas(HdfsRole::NameNode),
            layout.values().sum::<i32>()
        );
    }

    /// The quorum URL names every journal ordinal once and is absent
    /// without journals.
    #[test]
    fn quorum_url_matches_journal_replicas(journals in group_layout()) {
        let namenodes = BTreeMap::from([("default".to_string(), 2)]);
        let hdfs = cluster(&namenodes, &journals, &BTreeMap::new());
        let components = ClusterComponentsInfo::build(&hdfs).unwrap();
        let topology = Topology::new(&components, TopologyContext::new(&hdfs, "ns", "cluster.local"));

        let total = journals.values().sum::<i32>();
        match topology.quorum_url() {
            None => prop_assert_eq!(total, 0),
            Some(url) => {
                prop_assert!(url.starts_with("qjournal://"));
                prop_assert!(url.ends_with("/prop"));
                let hosts = url
                    .trim_start_matches("qjournal://")
                    .trim_end_matches("/prop")
                    .split(';')
                    .collect::<Vec<_>>();
                prop_assert_eq!(hosts.len() as i32, total);
                prop_assert!(hosts.iter().all(|h| h.ends_with(".svc.cluster.local:8485")));
            }
        }
    }

    /// A pass' topology does not depend on which role group is being built.
    #[test]
    fn name_node_site_is_identical_for_every_role(
        namenodes in group_layout(),
        journals in group_layout(),
        datanodes in group_layout(),
    ) {
        let hdfs = cluster(&namenodes, &journals, &datanodes);
        let components = ClusterComponentsInfo::build(&hdfs).unwrap();
        let topology = Topology::new(&components, TopologyContext::new(&hdfs, "ns", "cluster.local"));

        let discovery = topology.namenode_discovery();
        for role in HdfsRole::all() {
            let site = topology.hdfs_site(role);
            for (key, value) in discovery.iter() {
                prop_assert_eq!(site.get(key), Some(value));
            }
        }
    }

    /// Group values win over role values, role values over defaults.
    #[test]
    fn merge_precedence(
        role_min in proptest::option::of("[1-9][0-9]{0,2}m"),
        group_min in proptest::option::of("[1-9][0-9]{0,2}m"),
    ) {
        let fragment = |min: &Option<String>| RoleGroupConfigFragment {
            resources: Some(ResourcesFragment {
                cpu: Some(CpuFragment { min: min.clone(), max: None }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let group = RoleGroupSpec {
            replicas: 1,
            config: Some(fragment(&group_min)),
            ..Default::default()
        };
        let role = RoleSpec {
            config: Some(fragment(&role_min)),
            role_groups: BTreeMap::from([("default".to_string(), group.clone())]),
            ..Default::default()
        };

        let merged = merge_role_group(HdfsRole::DataNode, &role, "default", &group).unwrap();
        let expected = group_min.or(role_min).unwrap_or_else(|| "100m".to_string());
        prop_assert_eq!(merged.resources.cpu_min, expected);
        prop_assert_eq!(merged.resources.cpu_max, "400m");
    }

    /// An object never drifts from itself.
    #[test]
    fn identical_objects_need_no_patch(object in json_object()) {
        prop_assert!(is_empty_patch(&compute_patch(&object, &object)));
    }
}
