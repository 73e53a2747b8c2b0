//! Build, diff and apply one managed object.

use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{Resource, ResourceExt};
use tracing::debug;

use crate::controller::error::{Error, Result};
use crate::engine::diff::{DiffPolicy, compute_patch, is_empty_patch};
use crate::engine::state::{ObjectEvent, ObjectPhase};
use crate::engine::store::{ManagedObject, ObjectStore};
use crate::resources::{Augmentation, ResourceBuilder};

/// Readiness predicate evaluated on the applied object.
pub type Readiness<K> = fn(&K) -> bool;

/// How one kind of object is reconciled.
pub struct Strategy<K> {
    pub diff_policy: DiffPolicy,
    /// Applied to the built object before diffing.
    pub override_hook: Option<Box<dyn Augmentation<K>>>,
    /// `None` for objects that are done once applied.
    pub readiness: Option<Readiness<K>>,
}

impl<K> Strategy<K> {
    /// Config bundles, disruption budgets, service accounts.
    pub fn configuration() -> Self {
        Self {
            diff_policy: DiffPolicy::Strict,
            override_hook: None,
            readiness: None,
        }
    }

    /// Services: platform allocations survive updates.
    pub fn endpoint() -> Self {
        Self {
            diff_policy: DiffPolicy::PreserveAllocations,
            override_hook: None,
            readiness: None,
        }
    }

    /// Workloads with a readiness check.
    pub fn workload(readiness: Readiness<K>) -> Self {
        Self {
            diff_policy: DiffPolicy::Strict,
            override_hook: None,
            readiness: Some(readiness),
        }
    }

    pub fn with_override_hook(mut self, hook: Box<dyn Augmentation<K>>) -> Self {
        self.override_hook = Some(hook);
        self
    }
}

/// What the apply step did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    NoChange,
}

/// An applied object, readiness not yet evaluated.
#[derive(Debug)]
pub struct Reconciled<K> {
    pub outcome: ApplyOutcome,
    pub phase: ObjectPhase,
    pub object: K,
    readiness: Option<Readiness<K>>,
}

impl<K> Reconciled<K> {
    /// Evaluate readiness and move to a terminal phase.
    ///
    /// Returns `true` unless the object has a readiness check that failed.
    pub fn evaluate(&mut self) -> Result<bool> {
        let event = match self.readiness {
            Some(check) if check(&self.object) => ObjectEvent::Ready,
            Some(_) => ObjectEvent::NotReady,
            None => ObjectEvent::Finished,
        };
        self.phase = self.phase.on(event)?;
        Ok(self.phase != ObjectPhase::Unsatisfied)
    }
}

/// All ready replicas equal the desired count.
pub fn statefulset_ready(sts: &StatefulSet) -> bool {
    let desired = sts.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let ready = sts
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    ready == desired
}

/// Reconciles objects of one namespace against an [`ObjectStore`].
pub struct Reconciler<'a, S> {
    store: &'a S,
    namespace: &'a str,
}

impl<'a, S: ObjectStore> Reconciler<'a, S> {
    pub fn new(store: &'a S, namespace: &'a str) -> Self {
        Self { store, namespace }
    }

    /// Build the desired object, diff it against the current one and write
    /// it if anything changed.
    pub async fn reconcile<B>(
        &self,
        builder: &B,
        strategy: Strategy<B::Object>,
    ) -> Result<Reconciled<B::Object>>
    where
        B: ResourceBuilder + Sync,
        B::Object: ManagedObject,
    {
        let kind = B::Object::kind(&()).to_string();
        let phase = ObjectPhase::Unbuilt;

        let mut desired = match builder.build() {
            Ok(desired) => desired,
            Err(e) => {
                let failed = phase.on(ObjectEvent::BuildFailed)?;
                debug!(kind = %kind, phase = %failed, error = %e, "Build failed");
                return Err(e);
            }
        };
        let phase = phase.on(ObjectEvent::Built)?;

        if let Some(hook) = strategy.override_hook.as_ref() {
            hook.apply(&mut desired)?;
        }

        let name = desired
            .meta()
            .name
            .clone()
            .ok_or_else(|| Error::Internal(format!("built {} has no name", kind)))?;

        let current = self.store.get::<B::Object>(self.namespace, &name).await?;
        let phase = phase.on(ObjectEvent::Compared)?;

        let (outcome, object) = match current {
            None => {
                let created = self.store.create(self.namespace, &desired).await?;
                (ApplyOutcome::Created, created)
            }
            Some(current) => {
                let mut desired_value = serde_json::to_value(&desired)?;
                let current_value = serde_json::to_value(&current)?;
                strategy.diff_policy.prepare(&mut desired_value, &current_value);

                let patch = compute_patch(&desired_value, &current_value);
                if is_empty_patch(&patch) {
                    (ApplyOutcome::NoChange, current)
                } else {
                    debug!(kind = %kind, name = %name, patch = %patch, "Object drifted");
                    let mut replacement: B::Object = serde_json::from_value(desired_value)?;
                    replacement.meta_mut().resource_version = current.resource_version();
                    let replaced = self
                        .store
                        .replace(self.namespace, &name, &replacement)
                        .await?;
                    (ApplyOutcome::Updated, replaced)
                }
            }
        };

        let phase = match outcome {
            ApplyOutcome::NoChange => phase.on(ObjectEvent::Unchanged)?,
            ApplyOutcome::Created | ApplyOutcome::Updated => phase.on(ObjectEvent::Written)?,
        };

        debug!(
            kind = %kind,
            name = %name,
            namespace = %self.namespace,
            outcome = ?outcome,
            "Object reconciled"
        );

        Ok(Reconciled {
            outcome,
            phase,
            object,
            readiness: strategy.readiness,
        })
    }
}
