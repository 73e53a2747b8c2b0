//! Service generation for HDFS role groups.
//!
//! Creates up to two services per role group:
//! - **Headless Service**: stable per-ordinal DNS names, published before
//!   the pods are ready so that name nodes can reach journal nodes while
//!   the quorum forms
//! - **Listener Service**: NodePort or LoadBalancer exposure when the
//!   group's listener class is external

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::controller::error::{Error, Result};
use crate::controller::merge::ListenerClass;
use crate::resources::augmentations::{AUTH_PROXY_PORT, AUTH_PROXY_PORT_NAME};
use crate::resources::common::{object_meta, pod_selector_labels, role_group_labels};
use crate::resources::{ResourceBuilder, RoleGroupContext};
use crate::topology::{PortKind, role_ports};

const LABEL_SERVICE_TYPE: &str = "app.kubernetes.io/service-type";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServiceKind {
    Headless,
    Listener,
}

/// Builds one of the services of a role group.
pub struct ServiceBuilder<'a> {
    ctx: &'a RoleGroupContext<'a>,
    kind: ServiceKind,
}

impl<'a> ServiceBuilder<'a> {
    pub fn headless(ctx: &'a RoleGroupContext<'a>) -> Self {
        Self {
            ctx,
            kind: ServiceKind::Headless,
        }
    }

    pub fn listener(ctx: &'a RoleGroupContext<'a>) -> Self {
        Self {
            ctx,
            kind: ServiceKind::Listener,
        }
    }

    fn ports(&self) -> Vec<ServicePort> {
        let role = self.ctx.component.role;
        let security = self.ctx.topology.security();

        let mut ports = role_ports(role, security)
            .into_iter()
            .filter(|(kind, _)| self.kind == ServiceKind::Headless || *kind != PortKind::Metrics)
            .map(|(kind, number)| service_port(kind.name(), number))
            .collect::<Vec<_>>();
        if self.ctx.dependencies.auth_proxy.is_some() {
            ports.push(service_port(AUTH_PROXY_PORT_NAME, AUTH_PROXY_PORT));
        }
        ports
    }
}

fn service_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::String(name.to_string())),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

impl ResourceBuilder for ServiceBuilder<'_> {
    type Object = Service;

    fn build(&self) -> Result<Service> {
        let naming = &self.ctx.component.naming;
        let mut labels = role_group_labels(self.ctx.hdfs, naming);

        let (name, spec) = match self.kind {
            ServiceKind::Headless => {
                labels.insert(LABEL_SERVICE_TYPE.to_string(), "headless".to_string());
                let spec = ServiceSpec {
                    cluster_ip: Some("None".to_string()),
                    publish_not_ready_addresses: Some(true),
                    selector: Some(pod_selector_labels(naming)),
                    ports: Some(self.ports()),
                    ..Default::default()
                };
                (naming.service_name(), spec)
            }
            ServiceKind::Listener => {
                let service_type = match self.ctx.component.config.listener_class {
                    ListenerClass::ExternalUnstable => "NodePort",
                    ListenerClass::ExternalStable => "LoadBalancer",
                    ListenerClass::ClusterInternal => {
                        return Err(Error::Internal(format!(
                            "listener service requested for cluster-internal group {}",
                            naming.name()
                        )));
                    }
                };
                labels.insert(LABEL_SERVICE_TYPE.to_string(), "listener".to_string());
                let spec = ServiceSpec {
                    type_: Some(service_type.to_string()),
                    selector: Some(pod_selector_labels(naming)),
                    ports: Some(self.ports()),
                    ..Default::default()
                };
                (naming.listener_service_name(), spec)
            }
        };

        Ok(Service {
            metadata: object_meta(self.ctx.hdfs, name, labels),
            spec: Some(spec),
            ..Default::default()
        })
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::get_unwrap
)]
mod tests {
    use super::*;
    use crate::crd::{HdfsCluster, HdfsRole, RoleGroupConfigFragment};
    use crate::resources::test_support::{cluster, with_ctx};
    use crate::resources::{AuthProxySettings, ResolvedDependencies};

    fn port_names(service: &Service) -> Vec<String> {
        service
            .spec
            .as_ref()
            .unwrap()
            .ports
            .as_ref()
            .unwrap()
            .iter()
            .map(|p| p.name.clone().unwrap())
            .collect()
    }

    fn with_listener(class: &str) -> HdfsCluster {
        let mut hdfs = cluster(2, 1, 1);
        let group = hdfs
            .spec
            .name_nodes
            .as_mut()
            .unwrap()
            .role_groups
            .get_mut("default")
            .unwrap();
        group.config = Some(RoleGroupConfigFragment {
            listener_class: Some(class.to_string()),
            ..Default::default()
        });
        hdfs
    }

    #[test]
    fn test_headless_service() {
        let hdfs = cluster(2, 1, 3);
        let service = with_ctx(&hdfs, HdfsRole::DataNode, &ResolvedDependencies::default(), |ctx| {
            ServiceBuilder::headless(ctx).build().unwrap()
        });

        assert_eq!(service.metadata.name.as_deref(), Some("demo-datanode-default"));
        let spec = service.spec.as_ref().unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        assert_eq!(port_names(&service), vec!["data", "http", "ipc", "metrics"]);
    }

    #[test]
    fn test_auth_proxy_port_is_exposed() {
        let hdfs = cluster(2, 1, 1);
        let deps = ResolvedDependencies {
            auth_proxy: Some(AuthProxySettings {
                provider_url: "https://idp".to_string(),
                credentials_secret: "oidc".to_string(),
            }),
            vector_aggregator: None,
        };
        let service = with_ctx(&hdfs, HdfsRole::NameNode, &deps, |ctx| {
            ServiceBuilder::headless(ctx).build().unwrap()
        });
        assert_eq!(
            port_names(&service),
            vec!["rpc", "http", "metrics", AUTH_PROXY_PORT_NAME]
        );
    }

    #[test]
    fn test_listener_service_types() {
        for (class, expected) in [
            ("external-unstable", "NodePort"),
            ("external-stable", "LoadBalancer"),
        ] {
            let hdfs = with_listener(class);
            let service = with_ctx(&hdfs, HdfsRole::NameNode, &ResolvedDependencies::default(), |ctx| {
                ServiceBuilder::listener(ctx).build().unwrap()
            });
            assert_eq!(
                service.metadata.name.as_deref(),
                Some("demo-namenode-default-listener")
            );
            assert_eq!(service.spec.as_ref().unwrap().type_.as_deref(), Some(expected));
            assert_eq!(port_names(&service), vec!["rpc", "http"]);
        }
    }

    #[test]
    fn test_listener_for_internal_group_is_internal_error() {
        let hdfs = cluster(2, 1, 1);
        let result = with_ctx(&hdfs, HdfsRole::NameNode, &ResolvedDependencies::default(), |ctx| {
            ServiceBuilder::listener(ctx).build()
        });
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
