//! Cross-cutting additions to role workloads.
//!
//! The workload builder composes these in a fixed order: log agent, then
//! auth proxy. Command and env overrides run last as the reconciler's
//! override hook.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, ContainerPort, EnvVar, EnvVarSource, PodSpec,
    SecretKeySelector, VolumeMount,
};
use tracing::{debug, warn};

use crate::controller::error::{Error, Result};
use crate::controller::merge::Overrides;
use crate::resources::{Augmentation, RoleGroupContext};
use crate::topology::{CONFIG_DIR, LOG_DIR, port, web_port_kind};

pub const VECTOR_CONTAINER: &str = "vector";
pub const VECTOR_IMAGE: &str = "timberio/vector:0.41.1-debian";
pub const VECTOR_CONFIG_FILE: &str = "vector.yaml";

pub const AUTH_PROXY_CONTAINER: &str = "oauth2-proxy";
pub const AUTH_PROXY_IMAGE: &str = "quay.io/oauth2-proxy/oauth2-proxy:v7.6.0";
pub const AUTH_PROXY_PORT: i32 = 4180;
pub const AUTH_PROXY_PORT_NAME: &str = "oauth-proxy";

/// Volume names shared with the workload builder.
pub const CONFIG_VOLUME: &str = "config";
pub const LOG_VOLUME: &str = "log";

/// External lookups resolved once per pass before any builder runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedDependencies {
    /// `None` when authentication is not configured or its Secret is missing.
    pub auth_proxy: Option<AuthProxySettings>,
    /// Aggregator discovery ConfigMap name.
    pub vector_aggregator: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthProxySettings {
    pub provider_url: String,
    pub credentials_secret: String,
}

fn pod_spec_mut(sts: &mut StatefulSet) -> Result<&mut PodSpec> {
    sts.spec
        .as_mut()
        .and_then(|spec| spec.template.spec.as_mut())
        .ok_or_else(|| Error::Internal("StatefulSet has no pod template".to_string()))
}

/// Vector sidecar shipping the log directory to the aggregator.
pub struct LogAgent {
    enabled: bool,
    aggregator: Option<String>,
    group: String,
}

impl LogAgent {
    pub fn new(ctx: &RoleGroupContext<'_>) -> Self {
        Self {
            enabled: ctx.component.config.logging.enable_vector_agent,
            aggregator: ctx.dependencies.vector_aggregator.clone(),
            group: ctx.component.naming.name(),
        }
    }
}

impl Augmentation<StatefulSet> for LogAgent {
    fn name(&self) -> &'static str {
        "log-agent"
    }

    fn apply(&self, sts: &mut StatefulSet) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(aggregator) = self.aggregator.as_ref() else {
            warn!(
                role_group = %self.group,
                "Log agent enabled but no aggregator ConfigMap is configured, skipping sidecar"
            );
            return Ok(());
        };

        let container = Container {
            name: VECTOR_CONTAINER.to_string(),
            image: Some(VECTOR_IMAGE.to_string()),
            args: Some(vec![
                "--config".to_string(),
                format!("{}/{}", CONFIG_DIR, VECTOR_CONFIG_FILE),
            ]),
            env: Some(vec![EnvVar {
                name: "VECTOR_AGGREGATOR_ADDRESS".to_string(),
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: aggregator.clone(),
                        key: "ADDRESS".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: CONFIG_VOLUME.to_string(),
                    mount_path: CONFIG_DIR.to_string(),
                    ..Default::default()
                },
                VolumeMount {
                    name: LOG_VOLUME.to_string(),
                    mount_path: LOG_DIR.to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };

        pod_spec_mut(sts)?.containers.push(container);
        debug!(role_group = %self.group, "Added log agent sidecar");
        Ok(())
    }
}

/// Vector configuration tailing every sub-container's log file.
pub fn vector_config(log_containers: &[&str]) -> String {
    let includes = log_containers
        .iter()
        .map(|c| format!("      - {}/{}/*.log\n", LOG_DIR, c))
        .collect::<String>();
    format!(
        "data_dir: /tmp/vector\n\
         sources:\n  \
           files:\n    \
             type: file\n    \
             include:\n{includes}\
         sinks:\n  \
           aggregator:\n    \
             type: vector\n    \
             inputs:\n      - files\n    \
             address: ${{VECTOR_AGGREGATOR_ADDRESS}}\n"
    )
}

/// OAuth2 reverse proxy in front of the web UI.
pub struct AuthProxy {
    settings: Option<AuthProxySettings>,
    upstream: String,
    tls: bool,
}

impl AuthProxy {
    pub fn new(ctx: &RoleGroupContext<'_>) -> Self {
        let security = ctx.topology.security();
        let role = ctx.component.role;
        let scheme = if security.tls { "https" } else { "http" };
        let web = port(role, web_port_kind(security)).unwrap_or_default();
        Self {
            settings: ctx.dependencies.auth_proxy.clone(),
            upstream: format!("{}://localhost:{}", scheme, web),
            tls: security.tls,
        }
    }
}

fn secret_env(name: &str, secret: &str, key: &str, optional: bool) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                optional: optional.then_some(true),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

impl Augmentation<StatefulSet> for AuthProxy {
    fn name(&self) -> &'static str {
        "auth-proxy"
    }

    fn apply(&self, sts: &mut StatefulSet) -> Result<()> {
        let Some(settings) = self.settings.as_ref() else {
            return Ok(());
        };

        let mut args = vec![
            format!("--http-address=0.0.0.0:{}", AUTH_PROXY_PORT),
            format!("--upstream={}", self.upstream),
            "--provider=oidc".to_string(),
            format!("--oidc-issuer-url={}", settings.provider_url),
            "--email-domain=*".to_string(),
        ];
        if self.tls {
            args.push("--ssl-upstream-insecure-skip-verify=true".to_string());
        }

        let secret = &settings.credentials_secret;
        let container = Container {
            name: AUTH_PROXY_CONTAINER.to_string(),
            image: Some(AUTH_PROXY_IMAGE.to_string()),
            args: Some(args),
            env: Some(vec![
                secret_env("OAUTH2_PROXY_CLIENT_ID", secret, "CLIENT_ID", false),
                secret_env("OAUTH2_PROXY_CLIENT_SECRET", secret, "CLIENT_SECRET", false),
                secret_env("OAUTH2_PROXY_COOKIE_SECRET", secret, "COOKIE_SECRET", true),
            ]),
            ports: Some(vec![ContainerPort {
                name: Some(AUTH_PROXY_PORT_NAME.to_string()),
                container_port: AUTH_PROXY_PORT,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };

        pod_spec_mut(sts)?.containers.push(container);
        Ok(())
    }
}

/// Replaces the named container's command and env entries with the user's.
///
/// A non-empty CLI override replaces the whole `command` and clears `args`.
/// Env replacement is per variable: each override replaces the variable of
/// the same name, including a `valueFrom` source, or is appended. Generated
/// variables without an override (`POD_NAME`, `ZOOKEEPER`) stay, since the
/// role's processes cannot start without them.
pub struct CommandEnvOverrides {
    container: String,
    cli: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandEnvOverrides {
    pub fn new(container: &str, overrides: &Overrides) -> Self {
        Self {
            container: container.to_string(),
            cli: overrides.cli.clone(),
            env: overrides.env.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cli.is_empty() && self.env.is_empty()
    }
}

impl Augmentation<StatefulSet> for CommandEnvOverrides {
    fn name(&self) -> &'static str {
        "command-env-overrides"
    }

    fn apply(&self, sts: &mut StatefulSet) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let container = pod_spec_mut(sts)?
            .containers
            .iter_mut()
            .find(|c| c.name == self.container)
            .ok_or_else(|| {
                Error::Internal(format!("override target container {} not found", self.container))
            })?;

        if !self.cli.is_empty() {
            container.command = Some(self.cli.clone());
            container.args = None;
        }

        let env = container.env.get_or_insert_with(Vec::new);
        for (name, value) in &self.env {
            let replacement = EnvVar {
                name: name.clone(),
                value: Some(value.clone()),
                value_from: None,
            };
            match env.iter_mut().find(|var| &var.name == name) {
                Some(existing) => *existing = replacement,
                None => env.push(replacement),
            }
        }
        Ok(())
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
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn sts_with(containers: Vec<Container>) -> StatefulSet {
        StatefulSet {
            spec: Some(StatefulSetSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn main_container() -> Container {
        Container {
            name: "namenode".to_string(),
            command: Some(vec!["/bin/bash".to_string()]),
            args: Some(vec!["run".to_string()]),
            env: Some(vec![EnvVar {
                name: "POD_NAME".to_string(),
                value_from: Some(EnvVarSource::default()),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    fn containers(sts: &StatefulSet) -> &[Container] {
        &sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers
    }

    #[test]
    fn test_log_agent_requires_aggregator() {
        let agent = LogAgent {
            enabled: true,
            aggregator: None,
            group: "demo-namenode-default".to_string(),
        };
        let mut sts = sts_with(vec![main_container()]);
        agent.apply(&mut sts).unwrap();
        assert_eq!(containers(&sts).len(), 1);
    }

    #[test]
    fn test_log_agent_adds_sidecar() {
        let agent = LogAgent {
            enabled: true,
            aggregator: Some("vector-aggregator".to_string()),
            group: "demo-namenode-default".to_string(),
        };
        let mut sts = sts_with(vec![main_container()]);
        agent.apply(&mut sts).unwrap();
        let sidecar = &containers(&sts)[1];
        assert_eq!(sidecar.name, VECTOR_CONTAINER);
        let env = &sidecar.env.as_ref().unwrap()[0];
        let selector = env
            .value_from
            .as_ref()
            .unwrap()
            .config_map_key_ref
            .as_ref()
            .unwrap();
        assert_eq!(selector.name, "vector-aggregator");
        assert_eq!(selector.key, "ADDRESS");
    }

    #[test]
    fn test_disabled_log_agent_is_noop() {
        let agent = LogAgent {
            enabled: false,
            aggregator: Some("vector-aggregator".to_string()),
            group: "g".to_string(),
        };
        let mut sts = sts_with(vec![main_container()]);
        agent.apply(&mut sts).unwrap();
        assert_eq!(containers(&sts).len(), 1);
    }

    #[test]
    fn test_auth_proxy() {
        let proxy = AuthProxy {
            settings: Some(AuthProxySettings {
                provider_url: "https://idp.example.com/realms/hdfs".to_string(),
                credentials_secret: "oidc".to_string(),
            }),
            upstream: "https://localhost:9871".to_string(),
            tls: true,
        };
        let mut sts = sts_with(vec![main_container()]);
        proxy.apply(&mut sts).unwrap();

        let sidecar = &containers(&sts)[1];
        assert_eq!(sidecar.name, AUTH_PROXY_CONTAINER);
        let args = sidecar.args.as_ref().unwrap();
        assert!(args.contains(&"--upstream=https://localhost:9871".to_string()));
        assert!(args.contains(&"--oidc-issuer-url=https://idp.example.com/realms/hdfs".to_string()));
        assert_eq!(
            sidecar.ports.as_ref().unwrap()[0].container_port,
            AUTH_PROXY_PORT
        );
    }

    #[test]
    fn test_auth_proxy_without_settings_is_noop() {
        let proxy = AuthProxy {
            settings: None,
            upstream: "http://localhost:9870".to_string(),
            tls: false,
        };
        let mut sts = sts_with(vec![main_container()]);
        proxy.apply(&mut sts).unwrap();
        assert_eq!(containers(&sts).len(), 1);
    }

    #[test]
    fn test_command_env_overrides_replace() {
        let overrides = Overrides {
            cli: vec!["sleep".to_string(), "infinity".to_string()],
            env: BTreeMap::from([
                ("POD_NAME".to_string(), "fixed".to_string()),
                ("EXTRA".to_string(), "1".to_string()),
            ]),
            ..Default::default()
        };
        let hook = CommandEnvOverrides::new("namenode", &overrides);
        let mut sts = sts_with(vec![main_container()]);
        hook.apply(&mut sts).unwrap();

        let container = &containers(&sts)[0];
        assert_eq!(
            container.command.as_deref().unwrap(),
            &["sleep".to_string(), "infinity".to_string()]
        );
        assert!(container.args.is_none());

        let env = container.env.as_ref().unwrap();
        assert_eq!(env.len(), 2);
        let pod_name = env.iter().find(|v| v.name == "POD_NAME").unwrap();
        assert_eq!(pod_name.value.as_deref(), Some("fixed"));
        assert!(pod_name.value_from.is_none());
    }

    #[test]
    fn test_env_override_replaces_per_variable_not_whole_list() {
        let mut container = main_container();
        container.env.as_mut().unwrap().push(EnvVar {
            name: "ZOOKEEPER".to_string(),
            value: Some("zk:2181".to_string()),
            ..Default::default()
        });
        let overrides = Overrides {
            env: BTreeMap::from([("POD_NAME".to_string(), "fixed".to_string())]),
            ..Default::default()
        };
        let mut sts = sts_with(vec![container]);
        CommandEnvOverrides::new("namenode", &overrides)
            .apply(&mut sts)
            .unwrap();

        let container = &containers(&sts)[0];
        let env: Vec<_> = container
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| (v.name.as_str(), v.value.as_deref()))
            .collect();
        assert_eq!(env, vec![("POD_NAME", Some("fixed")), ("ZOOKEEPER", Some("zk:2181"))]);
        assert_eq!(container.command.as_deref().unwrap(), &["/bin/bash".to_string()]);
        assert_eq!(container.args.as_deref().unwrap(), &["run".to_string()]);
    }

    #[test]
    fn test_command_env_overrides_missing_container() {
        let overrides = Overrides {
            env: BTreeMap::from([("A".to_string(), "1".to_string())]),
            ..Default::default()
        };
        let hook = CommandEnvOverrides::new("datanode", &overrides);
        let mut sts = sts_with(vec![main_container()]);
        assert!(matches!(hook.apply(&mut sts), Err(Error::Internal(_))));

        let empty = CommandEnvOverrides::new("datanode", &Overrides::default());
        assert!(empty.apply(&mut sts).is_ok());
    }

    #[test]
    fn test_vector_config_lists_containers() {
        let config = vector_config(&["namenode", "zkfc"]);
        assert!(config.contains("- /opt/hdfs/log/namenode/*.log"));
        assert!(config.contains("- /opt/hdfs/log/zkfc/*.log"));
        assert!(config.contains("address: ${VECTOR_AGGREGATOR_ADDRESS}"));
    }
}
