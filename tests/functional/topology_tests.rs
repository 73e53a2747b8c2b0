//! Generated configuration as it lands in the stored objects.

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::ConfigMap;
use hdfs_operator::crd::HdfsRole;
use hdfs_operator::resources::statefulset::SECRET_STORAGE_CLASS;

use crate::common::fixtures::HdfsClusterBuilder;
use crate::{MockStore, NAMESPACE, Write, run_pass};

/// Value of `key` in a rendered Hadoop XML document.
fn property(xml: &str, key: &str) -> Option<String> {
    let name = format!("<name>{}</name>", key);
    let rest = &xml[xml.find(&name)? + name.len()..];
    let start = rest.find("<value>")? + "<value>".len();
    let end = rest.find("</value>")?;
    Some(rest[start..end].to_string())
}

fn bundle_file(store: &MockStore, name: &str, file: &str) -> String {
    let cm: ConfigMap = store.object(NAMESPACE, name).unwrap();
    cm.data.unwrap().remove(file).unwrap()
}

fn journal_address(ordinal: i32) -> String {
    format!(
        "demo-journalnode-default-{}.demo-journalnode-default.{}.svc.cluster.local:8485",
        ordinal, NAMESPACE
    )
}

#[tokio::test]
async fn test_quorum_url_lists_every_journal_in_ordinal_order() {
    let store = MockStore::new();
    run_pass(&HdfsClusterBuilder::ha("demo", 1).namespace(NAMESPACE).build(), &store)
        .await
        .unwrap();

    let site = bundle_file(&store, "demo-namenode-default", "hdfs-site.xml");
    let expected = format!(
        "qjournal://{};{};{}/demo",
        journal_address(0),
        journal_address(1),
        journal_address(2)
    );
    assert_eq!(
        property(&site, "dfs.namenode.shared.edits.dir"),
        Some(expected)
    );
    assert_eq!(
        property(&site, "dfs.ha.namenodes.demo").as_deref(),
        Some("demo-namenode-default-0,demo-namenode-default-1")
    );
}

#[tokio::test]
async fn test_journal_scale_out_rewrites_name_node_configuration() {
    let store = MockStore::new();
    run_pass(&HdfsClusterBuilder::ha("demo", 1).namespace(NAMESPACE).build(), &store)
        .await
        .unwrap();
    store.take_writes();

    let scaled = HdfsClusterBuilder::new("demo")
        .namespace(NAMESPACE)
        .group(HdfsRole::NameNode, "default", 2)
        .group(HdfsRole::JournalNode, "default", 5)
        .group(HdfsRole::DataNode, "default", 1)
        .build();
    run_pass(&scaled, &store).await.unwrap();

    let writes = store.take_writes();
    assert!(writes.contains(&Write::Replace {
        kind: "ConfigMap".to_string(),
        name: "demo-namenode-default".to_string(),
    }));
    let site = bundle_file(&store, "demo-namenode-default", "hdfs-site.xml");
    let quorum = property(&site, "dfs.namenode.shared.edits.dir").unwrap();
    assert_eq!(quorum.matches(":8485").count(), 5);
    assert!(quorum.contains(&journal_address(4)));
}

#[tokio::test]
async fn test_name_nodes_across_groups_share_one_nameservice() {
    let store = MockStore::new();
    let hdfs = HdfsClusterBuilder::new("demo")
        .namespace(NAMESPACE)
        .group(HdfsRole::NameNode, "a", 1)
        .group(HdfsRole::NameNode, "b", 1)
        .group(HdfsRole::JournalNode, "default", 3)
        .group(HdfsRole::DataNode, "default", 1)
        .build();
    run_pass(&hdfs, &store).await.unwrap();

    let expected = "demo-namenode-a-0,demo-namenode-b-0";
    for file_owner in ["demo-namenode-a", "demo-namenode-b", "demo-datanode-default"] {
        let site = bundle_file(&store, file_owner, "hdfs-site.xml");
        assert_eq!(
            property(&site, "dfs.ha.namenodes.demo").as_deref(),
            Some(expected)
        );
    }
}

#[tokio::test]
async fn test_discovery_document_is_client_facing() {
    let store = MockStore::new();
    run_pass(&HdfsClusterBuilder::ha("demo", 1).namespace(NAMESPACE).build(), &store)
        .await
        .unwrap();

    let core = bundle_file(&store, "demo", "core-site.xml");
    let site = bundle_file(&store, "demo", "hdfs-site.xml");
    assert_eq!(property(&core, "fs.defaultFS").as_deref(), Some("hdfs://demo/"));
    assert_eq!(property(&core, "ha.zookeeper.quorum"), None);
    assert_eq!(property(&site, "dfs.namenode.shared.edits.dir"), None);
    assert!(
        property(&site, "dfs.namenode.rpc-address.demo.demo-namenode-default-0")
            .unwrap()
            .ends_with(":8020")
    );
}

#[tokio::test]
async fn test_role_overrides_win_over_generated_properties() {
    let store = MockStore::new();
    let hdfs = HdfsClusterBuilder::ha("demo", 1)
        .namespace(NAMESPACE)
        .role_spec(HdfsRole::DataNode, |role| {
            role.config_overrides.insert(
                "hdfs-site.xml".to_string(),
                [("dfs.datanode.handler.count".to_string(), "10".to_string())]
                    .into_iter()
                    .collect(),
            );
        })
        .build();
    run_pass(&hdfs, &store).await.unwrap();

    let datanode = bundle_file(&store, "demo-datanode-default", "hdfs-site.xml");
    assert_eq!(
        property(&datanode, "dfs.datanode.handler.count").as_deref(),
        Some("10")
    );
    let namenode = bundle_file(&store, "demo-namenode-default", "hdfs-site.xml");
    assert_eq!(
        property(&namenode, "dfs.namenode.handler.count").as_deref(),
        Some("50")
    );
}

#[tokio::test]
async fn test_secured_cluster_mounts_secret_volumes_and_serves_https() {
    let store = MockStore::new();
    let hdfs = HdfsClusterBuilder::ha("demo", 1)
        .namespace(NAMESPACE)
        .kerberos("kerberos", "EXAMPLE.COM")
        .tls("tls")
        .build();
    run_pass(&hdfs, &store).await.unwrap();

    let bundle: ConfigMap = store.object(NAMESPACE, "demo-namenode-default").unwrap();
    let data = bundle.data.unwrap();
    assert!(data.contains_key("ssl-server.xml"));
    assert!(data.contains_key("ssl-client.xml"));
    assert_eq!(
        property(&data["core-site.xml"], "hadoop.security.authentication").as_deref(),
        Some("kerberos")
    );

    let sts: StatefulSet = store.object(NAMESPACE, "demo-namenode-default").unwrap();
    let pod = sts.spec.unwrap().template.spec.unwrap();
    let secret_volumes = pod
        .volumes
        .unwrap()
        .into_iter()
        .filter(|v| {
            v.ephemeral
                .as_ref()
                .and_then(|e| e.volume_claim_template.as_ref())
                .and_then(|t| t.spec.storage_class_name.as_deref())
                == Some(SECRET_STORAGE_CLASS)
        })
        .count();
    assert_eq!(secret_volumes, 2);

    let main = pod.containers.iter().find(|c| c.name == "namenode").unwrap();
    let ports = main
        .ports
        .as_ref()
        .unwrap()
        .iter()
        .map(|p| p.name.clone().unwrap())
        .collect::<Vec<_>>();
    assert!(ports.contains(&"https".to_string()));
    assert!(!ports.contains(&"http".to_string()));
    let probe = main.readiness_probe.as_ref().unwrap().http_get.as_ref().unwrap();
    assert_eq!(probe.scheme.as_deref(), Some("HTTPS"));
}
