//! Watch-based waiting on objects and HdfsCluster status.

use std::fmt::Debug;
use std::time::Duration;

use hdfs_operator::controller::status::is_condition_true;
use hdfs_operator::crd::{AVAILABLE_CONDITION, HdfsCluster, HdfsRole};
use kube::api::Api;
use kube::runtime::wait::{await_condition, conditions};
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("Timeout waiting for condition after {0:?}")]
    Timeout(Duration),

    #[error("Watch failed: {0}")]
    Watch(#[from] kube::runtime::wait::Error),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("{0} was deleted while waiting")]
    Deleted(String),
}

/// Wait until the named object exists and satisfies `condition`.
pub async fn wait_for_condition<K, F>(
    api: &Api<K>,
    name: &str,
    condition: F,
    timeout_duration: Duration,
) -> Result<K, WaitError>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    F: Fn(&K) -> bool + Send,
{
    let found = timeout(
        timeout_duration,
        await_condition(api.clone(), name, move |obj: Option<&K>| {
            obj.is_some_and(&condition)
        }),
    )
    .await
    .map_err(|_| WaitError::Timeout(timeout_duration))??;
    found.ok_or_else(|| WaitError::Deleted(name.to_string()))
}

pub async fn wait_for_resource<K>(
    api: &Api<K>,
    name: &str,
    timeout_duration: Duration,
) -> Result<K, WaitError>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    wait_for_condition(api, name, |_| true, timeout_duration).await
}

/// Wait until the object currently stored under `name` is gone.
pub async fn wait_for_deletion<K>(
    api: &Api<K>,
    name: &str,
    timeout_duration: Duration,
) -> Result<(), WaitError>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
{
    let Some(current) = api.get_opt(name).await? else {
        return Ok(());
    };
    let uid = current.uid().unwrap_or_default();
    timeout(
        timeout_duration,
        await_condition(api.clone(), name, conditions::is_deleted(&uid)),
    )
    .await
    .map_err(|_| WaitError::Timeout(timeout_duration))??;
    Ok(())
}

/// Whether the cluster reports the `Available` condition as true.
pub fn is_available(cluster: &HdfsCluster) -> bool {
    cluster
        .status
        .as_ref()
        .is_some_and(|s| is_condition_true(&s.conditions, AVAILABLE_CONDITION))
}

/// Whether the status reflects the current generation.
pub fn generation_observed(cluster: &HdfsCluster) -> bool {
    match (cluster.metadata.generation, &cluster.status) {
        (Some(current_gen), Some(status)) => status.observed_generation == Some(current_gen),
        _ => false,
    }
}

/// `readyGroups` reported for `role`, if the role has a status entry.
pub fn ready_groups(cluster: &HdfsCluster, role: HdfsRole) -> Option<String> {
    cluster
        .status
        .as_ref()?
        .roles
        .iter()
        .find(|r| r.role == role.name())
        .map(|r| r.ready_groups.clone())
}

pub async fn wait_for_generation_observed(
    api: &Api<HdfsCluster>,
    name: &str,
    timeout_duration: Duration,
) -> Result<HdfsCluster, WaitError> {
    wait_for_condition(api, name, generation_observed, timeout_duration).await
}
