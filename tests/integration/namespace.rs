//! Per-test namespaces, deleted on drop.
//!
//! Tests holding a [`TestNamespace`] must use
//! `#[tokio::test(flavor = "multi_thread")]`: cleanup blocks on the runtime
//! through `block_in_place`.

use std::collections::BTreeMap;

use hdfs_operator::crd::HdfsCluster;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace};
use kube::api::{Api, DeleteParams, ObjectMeta, PostParams, PropagationPolicy};
use kube::{Client, ResourceExt};
use uuid::Uuid;

pub struct TestNamespace {
    client: Client,
    name: String,
}

impl TestNamespace {
    /// Create `{prefix}-{8 hex chars}`.
    pub async fn create(client: Client, prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let name = format!("{}-{}", prefix, &suffix[..8]);

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.clone()),
                labels: Some(BTreeMap::from([(
                    "app.kubernetes.io/managed-by".to_string(),
                    "integration-test".to_string(),
                )])),
                ..Default::default()
            },
            ..Default::default()
        };
        Api::<Namespace>::all(client.clone())
            .create(&PostParams::default(), &ns)
            .await
            .unwrap_or_else(|e| panic!("Failed to create test namespace {}: {}", name, e));
        tracing::info!(namespace = %name, "Created test namespace");

        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn api<K>(&self) -> Api<K>
    where
        K: kube::Resource<Scope = kube::core::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), &self.name)
    }

    /// Seed a ConfigMap the cluster depends on (ZooKeeper or aggregator discovery).
    pub async fn create_config_map(&self, name: &str, data: &[(&str, &str)]) {
        let cm = ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        };
        self.api::<ConfigMap>()
            .create(&PostParams::default(), &cm)
            .await
            .unwrap_or_else(|e| panic!("Failed to create ConfigMap {}: {}", name, e));
    }

    async fn cleanup(client: Client, name: String) {
        // Owned objects are garbage collected with their cluster.
        let clusters: Api<HdfsCluster> = Api::namespaced(client.clone(), &name);
        if let Ok(list) = clusters.list(&Default::default()).await {
            for cluster in list.items {
                let cluster_name = cluster.name_any();
                if let Err(e) = clusters.delete(&cluster_name, &DeleteParams::default()).await {
                    tracing::debug!(cluster = %cluster_name, error = %e, "Failed to delete HdfsCluster");
                }
            }
        }

        let dp = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Background),
            ..Default::default()
        };
        match Api::<Namespace>::all(client).delete(&name, &dp).await {
            Ok(_) => tracing::debug!(namespace = %name, "Namespace deletion initiated"),
            Err(kube::Error::Api(e)) if e.code == 404 => {}
            Err(e) => tracing::warn!(namespace = %name, error = %e, "Failed to delete namespace"),
        }
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let client = self.client.clone();
        let name = std::mem::take(&mut self.name);
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(Self::cleanup(client, name));
        });
    }
}
