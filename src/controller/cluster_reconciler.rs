//! Reconciliation loop for HdfsCluster.
//!
//! One pass applies every object of the cluster in dependency order and
//! aggregates workload readiness into the status. Objects are owned by the
//! cluster, deletion is left to the garbage collector.

use std::sync::Arc;
use std::time::Instant;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::controller::components::ClusterComponentsInfo;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::status::{
    GroupOutcome, RoleProgress, build_status, is_condition_true, skipped_groups_changed,
};
use crate::crd::{AVAILABLE_CONDITION, HdfsCluster, HdfsClusterStatus, HdfsRole};
use crate::engine::{KubeStore, ObjectStore, Reconciler, Strategy, statefulset_ready};
use crate::resources::config_bundle::ConfigBundleBuilder;
use crate::resources::discovery::DiscoveryBuilder;
use crate::resources::pdb::PdbBuilder;
use crate::resources::service_account::ServiceAccountBuilder;
use crate::resources::services::ServiceBuilder;
use crate::resources::statefulset::WorkloadBuilder;
use crate::resources::{AuthProxySettings, ResolvedDependencies, RoleGroupContext};
use crate::topology::{Topology, TopologyContext};

/// Settings of one pass that do not come from the cluster object.
#[derive(Clone, Debug)]
pub struct PassSettings {
    pub cluster_domain: String,
}

/// A role group left out of this pass.
#[derive(Clone, Debug)]
pub struct SkippedRoleGroup {
    pub role: HdfsRole,
    pub group: String,
    pub reason: String,
}

/// Outcome of one reconciliation pass.
#[derive(Clone, Debug)]
pub struct PassReport {
    pub roles: Vec<RoleProgress>,
    pub skipped: Vec<SkippedRoleGroup>,
    pub status: HdfsClusterStatus,
}

impl PassReport {
    /// Every role is available and nothing was skipped.
    pub fn is_settled(&self) -> bool {
        self.skipped.is_empty() && self.roles.iter().all(RoleProgress::is_available)
    }
}

struct GroupResult {
    ready: bool,
    ready_replicas: i32,
}

/// Run one reconciliation pass for `hdfs` against `store`.
///
/// Configuration, dependency and internal errors skip the affected role
/// group. Conflicts and API errors end the pass.
pub async fn reconcile_cluster<S: ObjectStore>(
    hdfs: &HdfsCluster,
    store: &S,
    settings: &PassSettings,
) -> Result<PassReport> {
    let name = hdfs.name_any();
    let namespace = hdfs
        .namespace()
        .ok_or_else(|| Error::Internal(format!("HdfsCluster {} has no namespace", name)))?;
    let reconciler = Reconciler::new(store, &namespace);

    reconciler
        .reconcile(&ServiceAccountBuilder::new(hdfs), Strategy::configuration())
        .await?
        .evaluate()?;

    let mut components = ClusterComponentsInfo::build(hdfs)?;
    let mut skipped = components
        .take_skipped()
        .into_iter()
        .map(|s| {
            log_skip(&name, s.role, &s.group, &s.error);
            SkippedRoleGroup {
                role: s.role,
                group: s.group,
                reason: s.error.to_string(),
            }
        })
        .collect::<Vec<_>>();

    let dependencies = resolve_dependencies(hdfs, store, &namespace).await;
    let topology = Topology::new(
        &components,
        TopologyContext::new(hdfs, &namespace, &settings.cluster_domain),
    );

    let mut roles = Vec::new();
    for role in HdfsRole::all() {
        let mut progress = RoleProgress::new(role);
        for s in skipped.iter().filter(|s| s.role == role) {
            let desired = components
                .members(role)
                .find(|m| m.group == s.group)
                .map_or(0, |m| m.replicas);
            progress.add_replicas(desired, 0);
            progress.record(&s.group, GroupOutcome::Skipped);
        }

        for component in components.role(role) {
            let ctx = RoleGroupContext {
                hdfs,
                component,
                topology: &topology,
                dependencies: &dependencies,
            };
            match reconcile_role_group(&reconciler, &ctx).await {
                Ok(result) => {
                    let outcome = if result.ready {
                        GroupOutcome::Ready
                    } else {
                        GroupOutcome::Pending
                    };
                    progress.add_replicas(component.replicas, result.ready_replicas);
                    progress.record(&component.group, outcome);
                }
                Err(e) if e.skips_role_group() => {
                    log_skip(&name, role, &component.group, &e);
                    progress.add_replicas(component.replicas, 0);
                    progress.record(&component.group, GroupOutcome::Skipped);
                    skipped.push(SkippedRoleGroup {
                        role,
                        group: component.group.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!(
                        name = %name,
                        role = %role,
                        group = %component.group,
                        error = %e,
                        "Ending reconciliation pass early"
                    );
                    return Err(e);
                }
            }
        }
        roles.push(progress);
    }

    reconciler
        .reconcile(&DiscoveryBuilder::new(hdfs, &topology), Strategy::configuration())
        .await?
        .evaluate()?;

    let status = build_status(hdfs.status.as_ref(), &roles, hdfs.metadata.generation);
    store
        .patch_status::<HdfsCluster>(&namespace, &name, &json!({ "status": status }))
        .await?;

    Ok(PassReport {
        roles,
        skipped,
        status,
    })
}

/// Endpoints, workload, config bundle and disruption budget of one group,
/// then the workload's readiness.
async fn reconcile_role_group<S: ObjectStore>(
    reconciler: &Reconciler<'_, S>,
    ctx: &RoleGroupContext<'_>,
) -> Result<GroupResult> {
    reconciler
        .reconcile(&ServiceBuilder::headless(ctx), Strategy::endpoint())
        .await?
        .evaluate()?;
    if ctx.component.config.listener_class.is_external() {
        reconciler
            .reconcile(&ServiceBuilder::listener(ctx), Strategy::endpoint())
            .await?
            .evaluate()?;
    }

    let workload = WorkloadBuilder::new(ctx);
    let strategy =
        Strategy::workload(statefulset_ready).with_override_hook(workload.override_hook());
    let mut statefulset = reconciler.reconcile(&workload, strategy).await?;

    reconciler
        .reconcile(&ConfigBundleBuilder::new(ctx), Strategy::configuration())
        .await?
        .evaluate()?;

    let pdb = PdbBuilder::new(ctx);
    if pdb.enabled() {
        reconciler
            .reconcile(&pdb, Strategy::configuration())
            .await?
            .evaluate()?;
    }

    let ready = statefulset.evaluate()?;
    let ready_replicas = statefulset
        .object
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0);
    debug!(
        group = %ctx.component.naming.name(),
        ready = ready,
        ready_replicas = ready_replicas,
        desired = ctx.component.replicas,
        "Role group reconciled"
    );

    Ok(GroupResult {
        ready,
        ready_replicas,
    })
}

/// Look up the external objects augmentations depend on.
///
/// A missing or unreadable object disables its augmentation for this pass.
pub async fn resolve_dependencies<S: ObjectStore>(
    hdfs: &HdfsCluster,
    store: &S,
    namespace: &str,
) -> ResolvedDependencies {
    let cluster_config = &hdfs.spec.cluster_config;
    let name = hdfs.name_any();

    let auth_proxy = match &cluster_config.authentication {
        Some(auth) => match store
            .get::<Secret>(namespace, &auth.client_credentials_secret)
            .await
        {
            Ok(Some(_)) => Some(AuthProxySettings {
                provider_url: auth.provider_url.clone(),
                credentials_secret: auth.client_credentials_secret.clone(),
            }),
            Ok(None) => {
                warn!(
                    name = %name,
                    secret = %auth.client_credentials_secret,
                    "Authentication credentials Secret not found, omitting auth proxy"
                );
                None
            }
            Err(e) => {
                warn!(
                    name = %name,
                    secret = %auth.client_credentials_secret,
                    error = %e,
                    "Failed to read authentication credentials, omitting auth proxy"
                );
                None
            }
        },
        None => None,
    };

    let vector_aggregator = match &cluster_config.vector_aggregator_config_map_name {
        Some(cm) => match store.get::<ConfigMap>(namespace, cm).await {
            Ok(Some(_)) => Some(cm.clone()),
            Ok(None) => {
                warn!(name = %name, config_map = %cm, "Vector aggregator ConfigMap not found");
                None
            }
            Err(e) => {
                warn!(
                    name = %name,
                    config_map = %cm,
                    error = %e,
                    "Failed to read vector aggregator ConfigMap"
                );
                None
            }
        },
        None => None,
    };

    ResolvedDependencies {
        auth_proxy,
        vector_aggregator,
    }
}

fn log_skip(name: &str, role: HdfsRole, group: &str, error: &Error) {
    if matches!(error, Error::Internal(_)) {
        error!(name = %name, role = %role, group = %group, error = %error, "Skipping role group");
    } else {
        warn!(name = %name, role = %role, group = %group, error = %error, "Skipping role group");
    }
}

/// Reconcile an HdfsCluster
///
/// Entry point called by the controller runtime.
pub async fn reconcile(obj: Arc<HdfsCluster>, ctx: Arc<Context>) -> Result<Action> {
    let start_time = Instant::now();
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    debug!(name = %name, namespace = %namespace, "Reconciling HdfsCluster");

    let store = KubeStore::new(ctx.client.clone());
    let settings = PassSettings {
        cluster_domain: ctx.config.cluster_domain.clone(),
    };
    let report = reconcile_cluster(&obj, &store, &settings).await?;

    // One event per change of a role's skip set, not per requeue.
    let previous_status = obj.status.as_ref();
    for skipped in report
        .skipped
        .iter()
        .filter(|s| skipped_groups_changed(previous_status, &report.status, s.role))
    {
        ctx.publish_warning_event(
            &obj,
            "RoleGroupSkipped",
            "Reconcile",
            Some(format!("{}/{}: {}", skipped.role, skipped.group, skipped.reason)),
        )
        .await;
    }

    let was_available = obj
        .status
        .as_ref()
        .is_some_and(|s| is_condition_true(&s.conditions, AVAILABLE_CONDITION));
    let settled = report.is_settled();
    if settled && !was_available {
        info!(name = %name, namespace = %namespace, "HdfsCluster is available");
        ctx.publish_normal_event(&obj, "Available", "Reconcile", None)
            .await;
    }

    if let Some(ref health_state) = ctx.health_state {
        let metrics = &health_state.metrics;
        metrics.record_reconcile(&namespace, &name, start_time.elapsed().as_secs_f64());
        for role in &report.roles {
            metrics.set_role_state(
                &namespace,
                &name,
                role.role.name(),
                role.is_available(),
                i64::from(role.desired_replicas),
                i64::from(role.ready_replicas),
            );
            if !role.skipped().is_empty() {
                metrics.record_skipped(
                    &namespace,
                    &name,
                    role.role.name(),
                    role.skipped().len() as u64,
                );
            }
        }
    }

    if settled {
        Ok(Action::requeue(ctx.config.resync_interval))
    } else {
        debug!(
            name = %name,
            skipped = report.skipped.len(),
            "HdfsCluster not settled, requeueing"
        );
        Ok(Action::requeue(ctx.config.requeue_interval))
    }
}

/// Error policy for the controller
pub fn error_policy(obj: Arc<HdfsCluster>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());

    if let Some(ref health_state) = ctx.health_state {
        health_state.metrics.record_error(&namespace, &name);
    }

    if error.is_not_found() {
        debug!(name = %name, "Resource not found (likely deleted)");
        return Action::await_change();
    }

    if error.is_retryable() {
        warn!(name = %name, error = %error, "Retryable error, will retry");
    } else {
        error!(name = %name, error = %error, "Non-retryable error");
    }
    Action::requeue(error.requeue_after(ctx.config.requeue_interval))
}
