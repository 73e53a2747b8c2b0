//! hdfs-operator - A Kubernetes operator for highly-available HDFS clusters.
//!
//! Startup order: logging, configuration, health server, leader election,
//! then the controller. Only the lease holder reconciles.

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tracing::{error, info, warn};

use hdfs_operator::OperatorConfig;
use hdfs_operator::health::{HealthState, run_health_server};
use hdfs_operator::run_controller;

const LEASE_NAME: &str = "hdfs-operator-leader";
const LEASE_TTL: Duration = Duration::from_secs(15);
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// Time given to in-flight passes after a shutdown signal.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

fn lease_lock(client: Client, config: &OperatorConfig) -> LeaseLock {
    LeaseLock::new(
        client,
        &config.pod_namespace,
        LeaseLockParams {
            holder_id: config.pod_name.clone(),
            lease_name: LEASE_NAME.to_string(),
            lease_ttl: LEASE_TTL,
        },
    )
}

/// Block until this pod holds the lease.
async fn acquire_leadership(lock: &LeaseLock) {
    info!("Waiting to acquire leadership...");
    loop {
        match lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                return;
            }
            Ok(_) => info!("Another instance is leader, waiting..."),
            Err(e) => warn!("Failed to acquire lease: {}, retrying...", e),
        }
        tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
    }
}

/// Renew the lease until it is lost, then return the reason.
async fn hold_leadership(lock: LeaseLock) -> String {
    loop {
        tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
        match lock.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {}
            Ok(_) => return "lease taken by another instance".to_string(),
            Err(e) => return format!("failed to renew lease: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hdfs_operator=info".parse()?)
                .add_directive("kube=info".parse()?)
                .add_directive("kube_leader_election=info".parse()?),
        )
        .json()
        .init();

    info!("Starting hdfs-operator");

    let client = Client::try_default().await?;
    let config = OperatorConfig::from_env();
    info!(
        holder_id = %config.pod_name,
        namespace = %config.pod_namespace,
        cluster_domain = %config.cluster_domain,
        watch_namespace = config.watch_namespace.as_deref().unwrap_or("<all>"),
        lease_name = LEASE_NAME,
        "Loaded operator configuration"
    );

    // Probes must answer while this instance is still a follower.
    let health_state = Arc::new(HealthState::new());
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    acquire_leadership(&lease_lock(client.clone(), &config)).await;
    let renewal_lock = lease_lock(client.clone(), &config);

    let controller_handle = {
        let health_state = health_state.clone();
        tokio::spawn(run_controller(client, config, Some(health_state)))
    };

    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        reason = hold_leadership(renewal_lock) => {
            // Restart and re-enter the election rather than reconcile without the lease.
            error!(reason = %reason, "Lost leadership, shutting down");
            return Err(reason.into());
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");
            health_state.set_ready(false).await;
            info!(
                "Waiting {}s for in-flight reconciliations to complete...",
                SHUTDOWN_GRACE_PERIOD.as_secs()
            );
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
///
/// A handler that cannot be installed is fatal.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
