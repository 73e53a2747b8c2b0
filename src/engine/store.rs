//! Seam between the engine and the platform's object store.

use std::fmt::Debug;
use std::future::Future;

use kube::api::{Patch, PatchParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::controller::context::FIELD_MANAGER;
use crate::controller::error::{Error, Result};

/// Namespaced kinds the engine can manage.
pub trait ManagedObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Read and write access to namespaced objects.
///
/// Writes carry the resource version of the object they replace; a stale
/// version fails with [`Error::Conflict`].
pub trait ObjectStore: Send + Sync {
    fn get<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Result<Option<K>>> + Send;

    fn create<K: ManagedObject>(
        &self,
        namespace: &str,
        object: &K,
    ) -> impl Future<Output = Result<K>> + Send;

    fn replace<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        object: &K,
    ) -> impl Future<Output = Result<K>> + Send;

    fn patch_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`ObjectStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn map_write_error<K: ManagedObject>(name: &str, error: kube::Error) -> Error {
    match error {
        kube::Error::Api(ref response) if response.code == 409 => Error::Conflict {
            kind: K::kind(&()).to_string(),
            name: name.to_string(),
        },
        other => Error::Kube(other),
    }
}

impl ObjectStore for KubeStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> Result<Option<K>> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> Result<K> {
        let name = object.meta().name.clone().unwrap_or_default();
        debug!(kind = %K::kind(&()), name = %name, namespace = %namespace, "Creating object");
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), object)
            .await
            .map_err(|e| map_write_error::<K>(&name, e))
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, name: &str, object: &K) -> Result<K> {
        debug!(kind = %K::kind(&()), name = %name, namespace = %namespace, "Replacing object");
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| map_write_error::<K>(name, e))
    }

    async fn patch_status<K: ManagedObject>(
        &self,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<()> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(status))
            .await
            .map_err(|e| map_write_error::<K>(name, e))?;
        Ok(())
    }
}
