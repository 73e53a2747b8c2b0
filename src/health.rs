//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 when ready to serve traffic)
//! - `/metrics` - Prometheus metrics endpoint

use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::info;

/// Labels for reconciliation metrics (namespace + name)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReconcileLabels {
    pub namespace: String,
    pub name: String,
}

impl EncodeLabelSet for ReconcileLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-role metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct RoleLabels {
    pub namespace: String,
    pub name: String,
    pub role: String,
}

impl EncodeLabelSet for RoleLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("namespace", self.namespace.as_str()).encode(encoder.encode_label())?;
        ("name", self.name.as_str()).encode(encoder.encode_label())?;
        ("role", self.role.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

impl ReconcileLabels {
    fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

impl RoleLabels {
    fn new(namespace: &str, name: &str, role: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            role: role.to_string(),
        }
    }
}

/// Shared metrics for the operator
pub struct Metrics {
    /// Total reconciliations counter
    pub reconciliations_total: Family<ReconcileLabels, Counter>,
    /// Failed reconciliations counter
    pub reconciliation_errors_total: Family<ReconcileLabels, Counter>,
    /// Reconciliation duration histogram
    pub reconcile_duration_seconds: Family<ReconcileLabels, Histogram>,
    /// 1 when the role reported Available on the last pass
    pub role_available: Family<RoleLabels, Gauge>,
    /// Role groups skipped because of configuration or dependency errors
    pub skipped_role_groups_total: Family<RoleLabels, Counter>,
    /// Desired replicas per role
    pub role_replicas_desired: Family<RoleLabels, Gauge>,
    /// Ready replicas per role
    pub role_replicas_ready: Family<RoleLabels, Gauge>,
    /// Unix time of the last completed pass
    pub last_reconcile_timestamp_seconds: Gauge,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let reconciliations_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "hdfs_operator_reconciliations",
            "Total number of reconciliations",
            reconciliations_total.clone(),
        );

        let reconciliation_errors_total = Family::<ReconcileLabels, Counter>::default();
        registry.register(
            "hdfs_operator_reconciliation_errors",
            "Total number of reconciliation errors",
            reconciliation_errors_total.clone(),
        );

        let reconcile_duration_seconds =
            Family::<ReconcileLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "hdfs_operator_reconcile_duration_seconds",
            "Duration of reconciliation in seconds",
            reconcile_duration_seconds.clone(),
        );

        let role_available = Family::<RoleLabels, Gauge>::default();
        registry.register(
            "hdfs_operator_role_available",
            "Whether each role of an HdfsCluster is available",
            role_available.clone(),
        );

        let skipped_role_groups_total = Family::<RoleLabels, Counter>::default();
        registry.register(
            "hdfs_operator_skipped_role_groups",
            "Total number of role groups skipped during reconciliation",
            skipped_role_groups_total.clone(),
        );

        let role_replicas_desired = Family::<RoleLabels, Gauge>::default();
        registry.register(
            "hdfs_operator_role_replicas_desired",
            "Desired number of replicas for each role",
            role_replicas_desired.clone(),
        );

        let role_replicas_ready = Family::<RoleLabels, Gauge>::default();
        registry.register(
            "hdfs_operator_role_replicas_ready",
            "Number of ready replicas for each role",
            role_replicas_ready.clone(),
        );

        let last_reconcile_timestamp_seconds = Gauge::default();
        registry.register(
            "hdfs_operator_last_reconcile_timestamp_seconds",
            "Unix time of the last completed reconciliation pass",
            last_reconcile_timestamp_seconds.clone(),
        );

        Self {
            reconciliations_total,
            reconciliation_errors_total,
            reconcile_duration_seconds,
            role_available,
            skipped_role_groups_total,
            role_replicas_desired,
            role_replicas_ready,
            last_reconcile_timestamp_seconds,
            registry,
        }
    }

    /// Record a completed pass
    pub fn record_reconcile(&self, namespace: &str, name: &str, duration_secs: f64) {
        let labels = ReconcileLabels::new(namespace, name);
        self.reconciliations_total.get_or_create(&labels).inc();
        self.reconcile_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
        self.last_reconcile_timestamp_seconds
            .set(jiff::Timestamp::now().as_second());
    }

    /// Record a failed reconciliation
    pub fn record_error(&self, namespace: &str, name: &str) {
        self.reconciliation_errors_total
            .get_or_create(&ReconcileLabels::new(namespace, name))
            .inc();
    }

    /// Update the availability and replica metrics of one role
    pub fn set_role_state(
        &self,
        namespace: &str,
        name: &str,
        role: &str,
        available: bool,
        desired: i64,
        ready: i64,
    ) {
        let labels = RoleLabels::new(namespace, name, role);
        self.role_available
            .get_or_create(&labels)
            .set(i64::from(available));
        self.role_replicas_desired
            .get_or_create(&labels)
            .set(desired);
        self.role_replicas_ready.get_or_create(&labels).set(ready);
    }

    /// Record role groups skipped during one pass
    pub fn record_skipped(&self, namespace: &str, name: &str, role: &str, count: u64) {
        self.skipped_role_groups_total
            .get_or_create(&RoleLabels::new(namespace, name, role))
            .inc_by(count);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Whether the operator is ready (acquired leadership and running controller)
    ready: RwLock<bool>,
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts as not ready)
    pub fn new() -> Self {
        Self {
            ready: RwLock::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark the operator as ready or not ready
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Check if the operator is ready
    pub async fn is_ready(&self) -> bool {
        *self.ready.read().await
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
/// This is a simple check - if we can respond, we're alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK if the operator is ready to serve.
/// Returns 503 Service Unavailable if not ready.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server
///
/// Binds to 0.0.0.0 on `port` and serves health/metrics endpoints.
pub async fn run_health_server(state: Arc<HealthState>, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port = port, "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
