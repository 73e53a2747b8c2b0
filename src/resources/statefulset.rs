//! StatefulSet generation for HDFS role groups.
//!
//! Creates one StatefulSet per role group:
//! - Stable network identity via the group's headless service
//! - Persistent data volume per ordinal
//! - Config bundle, log directory and optional secret volumes
//! - Probes on the web port, scheme chosen by the TLS flag
//! - Role-specific init containers and sidecars from [`RoleWorkload`]

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Affinity, ConfigMapKeySelector, ConfigMapVolumeSource, Container, ContainerPort,
    EmptyDirVolumeSource, EnvVar, EnvVarSource, EphemeralVolumeSource, HTTPGetAction,
    LocalObjectReference, ObjectFieldSelector, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimTemplate, PodAffinityTerm, PodAntiAffinity, PodSecurityContext, PodSpec,
    PodTemplateSpec, Probe, ResourceRequirements, Toleration, Volume, VolumeMount,
    VolumeResourceRequirements, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::controller::error::{Error, Result};
use crate::resources::augmentations::{
    AuthProxy, CONFIG_VOLUME, CommandEnvOverrides, LOG_VOLUME, LogAgent,
};
use crate::resources::common::{
    APP_NAME, LABEL_COMPONENT, LABEL_INSTANCE, LABEL_NAME, object_meta, pod_selector_labels,
    role_group_labels,
};
use crate::resources::roles::{RoleWorkload, ScriptContainer, role_workload};
use crate::resources::{Augmentation, ResourceBuilder, RoleGroupContext};
use crate::topology::naming::service_account_name;
use crate::topology::{
    CONFIG_DIR, DATA_DIR, KERBEROS_DIR, LOG_DIR, SECURITY_PROPERTIES, TLS_STORE_DIR,
    TLS_STORE_PASSWORD, log4j_file_name, role_ports, web_port_kind,
};

/// Hadoop user ID in the product image
const HADOOP_USER_ID: i64 = 1000;

const DATA_VOLUME: &str = "data";
const TLS_VOLUME: &str = "tls";
const KERBEROS_VOLUME: &str = "kerberos";

/// Storage class of the secret provisioner.
pub const SECRET_STORAGE_CLASS: &str = "secrets.kubedoop.dev";
const SECRET_ANNOTATION_PREFIX: &str = "secrets.kubedoop.dev";

const SHELL_COMMAND: [&str; 5] = ["/bin/bash", "-x", "-euo", "pipefail", "-c"];

/// Builds the StatefulSet of one role group.
pub struct WorkloadBuilder<'a> {
    ctx: &'a RoleGroupContext<'a>,
    workload: &'static dyn RoleWorkload,
    augmentations: Vec<Box<dyn Augmentation<StatefulSet>>>,
}

impl<'a> WorkloadBuilder<'a> {
    pub fn new(ctx: &'a RoleGroupContext<'a>) -> Self {
        let augmentations: Vec<Box<dyn Augmentation<StatefulSet>>> =
            vec![Box::new(LogAgent::new(ctx)), Box::new(AuthProxy::new(ctx))];
        Self {
            ctx,
            workload: role_workload(ctx.component.role),
            augmentations,
        }
    }

    /// Command and env overrides of the group, applied after every augmentation.
    pub fn override_hook(&self) -> Box<dyn Augmentation<StatefulSet>> {
        Box::new(CommandEnvOverrides::new(
            self.workload.main_container_name(),
            &self.ctx.component.config.overrides,
        ))
    }

    fn zookeeper_config_map(&self) -> Result<&str> {
        let name = self.ctx.hdfs.spec.cluster_config.zookeeper_config_map_name.as_str();
        if name.is_empty() {
            return Err(Error::Configuration(
                "clusterConfig.zookeeperConfigMapName must be set".to_string(),
            ));
        }
        Ok(name)
    }

    fn pod_template(&self, labels: &BTreeMap<String, String>) -> Result<PodTemplateSpec> {
        let zookeeper = self.zookeeper_config_map()?;
        let config = &self.ctx.component.config;

        let init_containers = self
            .workload
            .init_containers(self.ctx)
            .iter()
            .map(|c| self.script_container(c, zookeeper))
            .collect::<Vec<_>>();

        let main = ScriptContainer {
            name: self.workload.main_container_name(),
            script: self.workload.main_script(),
        };
        let mut containers = vec![self.main_container(&main, zookeeper)];
        containers.extend(
            self.workload
                .sidecars(self.ctx)
                .iter()
                .map(|c| self.script_container(c, zookeeper)),
        );

        let node_selector = if config.affinity.node_selector.is_empty() {
            None
        } else {
            Some(config.affinity.node_selector.clone())
        };

        Ok(PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels.clone()),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                service_account_name: Some(service_account_name(&self.ctx.component.instance)),
                termination_grace_period_seconds: Some(
                    i64::try_from(config.graceful_shutdown_timeout.as_secs()).unwrap_or(i64::MAX),
                ),
                security_context: Some(PodSecurityContext {
                    run_as_user: Some(HADOOP_USER_ID),
                    run_as_group: Some(0),
                    fs_group: Some(HADOOP_USER_ID),
                    ..Default::default()
                }),
                affinity: Some(self.affinity()),
                init_containers: (!init_containers.is_empty()).then_some(init_containers),
                containers,
                volumes: Some(self.volumes()),
                node_selector,
                tolerations: convert_tolerations(&config.affinity.tolerations),
                image_pull_secrets: convert_pull_secrets(&self.ctx.hdfs.spec.image.pull_secrets),
                ..Default::default()
            }),
        })
    }

    /// Spread the pods of a role across the configured topology domain.
    fn affinity(&self) -> Affinity {
        let naming = &self.ctx.component.naming;
        let selector = BTreeMap::from([
            (LABEL_NAME.to_string(), APP_NAME.to_string()),
            (LABEL_INSTANCE.to_string(), naming.instance().to_string()),
            (LABEL_COMPONENT.to_string(), naming.role().name().to_string()),
        ]);
        Affinity {
            pod_anti_affinity: Some(PodAntiAffinity {
                preferred_during_scheduling_ignored_during_execution: Some(vec![
                    WeightedPodAffinityTerm {
                        weight: 70,
                        pod_affinity_term: PodAffinityTerm {
                            label_selector: Some(LabelSelector {
                                match_labels: Some(selector),
                                ..Default::default()
                            }),
                            topology_key: self
                                .ctx
                                .component
                                .config
                                .affinity
                                .anti_affinity_topology_key
                                .clone(),
                            ..Default::default()
                        },
                    },
                ]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn main_container(&self, main: &ScriptContainer, zookeeper: &str) -> Container {
        let security = self.ctx.topology.security();
        let role = self.ctx.component.role;
        let resources = &self.ctx.component.config.resources;

        let ports = role_ports(role, security)
            .into_iter()
            .map(|(kind, number)| ContainerPort {
                name: Some(kind.name().to_string()),
                container_port: number,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            })
            .collect();

        let mut container = self.script_container(main, zookeeper);
        container.ports = Some(ports);
        container.resources = Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(resources.cpu_min.clone())),
                ("memory".to_string(), Quantity(resources.memory_limit.clone())),
            ])),
            limits: Some(BTreeMap::from([
                ("cpu".to_string(), Quantity(resources.cpu_max.clone())),
                ("memory".to_string(), Quantity(resources.memory_limit.clone())),
            ])),
            ..Default::default()
        });
        container.readiness_probe = Some(self.web_probe(10, 10, 5));
        container.liveness_probe = Some(self.web_probe(30, 10, 5));
        container
    }

    /// HTTP(S) GET on the web port; endpoints exist before the role is active.
    fn web_probe(&self, initial_delay: i32, period: i32, failure_threshold: i32) -> Probe {
        let security = self.ctx.topology.security();
        Probe {
            http_get: Some(HTTPGetAction {
                path: Some("/".to_string()),
                port: IntOrString::String(web_port_kind(security).name().to_string()),
                scheme: Some(if security.tls { "HTTPS" } else { "HTTP" }.to_string()),
                ..Default::default()
            }),
            initial_delay_seconds: Some(initial_delay),
            period_seconds: Some(period),
            failure_threshold: Some(failure_threshold),
            timeout_seconds: Some(5),
            ..Default::default()
        }
    }

    fn script_container(&self, spec: &ScriptContainer, zookeeper: &str) -> Container {
        let image = &self.ctx.hdfs.spec.image;
        Container {
            name: spec.name.to_string(),
            image: Some(image.reference()),
            image_pull_policy: Some(image.pull_policy.clone()),
            command: Some(SHELL_COMMAND.iter().map(|s| s.to_string()).collect()),
            args: Some(vec![format!(
                "mkdir -p {}/{}\n{}",
                LOG_DIR, spec.name, spec.script
            )]),
            env: Some(self.env_vars(spec.name, zookeeper)),
            volume_mounts: Some(self.volume_mounts()),
            ..Default::default()
        }
    }

    fn env_vars(&self, container: &str, zookeeper: &str) -> Vec<EnvVar> {
        let security = self.ctx.topology.security();
        let mut hadoop_opts = vec![format!(
            "-Djava.security.properties={}/{}",
            CONFIG_DIR, SECURITY_PROPERTIES
        )];
        if self.workload.log_containers().iter().any(|c| *c == container) {
            hadoop_opts.push(format!(
                "-Dlog4j.configuration=file:{}/{}",
                CONFIG_DIR,
                log4j_file_name(container)
            ));
        }

        let mut env = vec![
            plain_env("HADOOP_CONF_DIR", CONFIG_DIR),
            plain_env("HADOOP_LOG_DIR", &format!("{}/{}", LOG_DIR, container)),
            field_env("POD_NAME", "metadata.name"),
            field_env("POD_NAMESPACE", "metadata.namespace"),
            EnvVar {
                name: "ZOOKEEPER".to_string(),
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: zookeeper.to_string(),
                        key: "ZOOKEEPER".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ];

        if security.kerberos
            && let Some(kerberos) = self.ctx.hdfs.spec.cluster_config.kerberos.as_ref()
        {
            let krb5 = format!("{}/krb5.conf", KERBEROS_DIR);
            hadoop_opts.push(format!("-Djava.security.krb5.conf={}", krb5));
            env.push(plain_env("KERBEROS_REALM", &kerberos.realm));
            env.push(plain_env("KRB5_CONFIG", &krb5));
        }

        env.push(plain_env("HADOOP_OPTS", &hadoop_opts.join(" ")));
        env
    }

    fn volume_mounts(&self) -> Vec<VolumeMount> {
        let security = self.ctx.topology.security();
        let mut mounts = vec![
            mount(CONFIG_VOLUME, CONFIG_DIR),
            mount(LOG_VOLUME, LOG_DIR),
            mount(DATA_VOLUME, DATA_DIR),
        ];
        if security.tls {
            mounts.push(mount(TLS_VOLUME, TLS_STORE_DIR));
        }
        if security.kerberos {
            mounts.push(mount(KERBEROS_VOLUME, KERBEROS_DIR));
        }
        mounts
    }

    fn volumes(&self) -> Vec<Volume> {
        let cluster_config = &self.ctx.hdfs.spec.cluster_config;
        let naming = &self.ctx.component.naming;

        let mut volumes = vec![
            Volume {
                name: CONFIG_VOLUME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: naming.name(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Volume {
                name: LOG_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
        ];

        if let Some(tls) = cluster_config.tls.as_ref() {
            volumes.push(secret_volume(
                TLS_VOLUME,
                BTreeMap::from([
                    ("class", tls.secret_class.clone()),
                    ("scope", format!("pod,node,service={}", naming.service_name())),
                    ("format", "tls-p12".to_string()),
                    ("tlsPKCS12Password", TLS_STORE_PASSWORD.to_string()),
                ]),
            ));
        }
        if let Some(kerberos) = cluster_config.kerberos.as_ref() {
            let service = self.ctx.component.role.kerberos_service_name();
            volumes.push(secret_volume(
                KERBEROS_VOLUME,
                BTreeMap::from([
                    ("class", kerberos.secret_class.clone()),
                    ("scope", format!("service={}", naming.service_name())),
                    ("format", "kerberos".to_string()),
                    ("kerberosServiceNames", format!("{},HTTP", service)),
                ]),
            ));
        }
        volumes
    }

    fn data_claim(&self) -> PersistentVolumeClaim {
        let resources = &self.ctx.component.config.resources;
        PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(DATA_VOLUME.to_string()),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                storage_class_name: resources.storage_class.clone(),
                resources: Some(VolumeResourceRequirements {
                    requests: Some(BTreeMap::from([(
                        "storage".to_string(),
                        Quantity(resources.storage_capacity.clone()),
                    )])),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl ResourceBuilder for WorkloadBuilder<'_> {
    type Object = StatefulSet;

    fn build(&self) -> Result<StatefulSet> {
        let component = self.ctx.component;
        let naming = &component.naming;
        let labels = role_group_labels(self.ctx.hdfs, naming);

        let mut sts = StatefulSet {
            metadata: object_meta(self.ctx.hdfs, naming.name(), labels.clone()),
            spec: Some(StatefulSetSpec {
                replicas: Some(component.replicas),
                service_name: Some(naming.service_name()),
                selector: LabelSelector {
                    match_labels: Some(pod_selector_labels(naming)),
                    ..Default::default()
                },
                // All ordinals start together; the init containers order them
                pod_management_policy: Some("Parallel".to_string()),
                template: self.pod_template(&labels)?,
                volume_claim_templates: Some(vec![self.data_claim()]),
                ..Default::default()
            }),
            ..Default::default()
        };

        for augmentation in &self.augmentations {
            augmentation.apply(&mut sts)?;
        }
        Ok(sts)
    }
}

fn plain_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn field_env(name: &str, field_path: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: field_path.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

/// Ephemeral volume provisioned by the secret operator.
fn secret_volume(name: &str, annotations: BTreeMap<&str, String>) -> Volume {
    let annotations = annotations
        .into_iter()
        .map(|(key, value)| (format!("{}/{}", SECRET_ANNOTATION_PREFIX, key), value))
        .collect();
    Volume {
        name: name.to_string(),
        ephemeral: Some(EphemeralVolumeSource {
            volume_claim_template: Some(PersistentVolumeClaimTemplate {
                metadata: Some(ObjectMeta {
                    annotations: Some(annotations),
                    ..Default::default()
                }),
                spec: PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    storage_class_name: Some(SECRET_STORAGE_CLASS.to_string()),
                    resources: Some(VolumeResourceRequirements {
                        requests: Some(BTreeMap::from([(
                            "storage".to_string(),
                            Quantity("1".to_string()),
                        )])),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            }),
        }),
        ..Default::default()
    }
}

/// Convert CRD tolerations to k8s-openapi Tolerations.
fn convert_tolerations(tolerations: &[crate::crd::Toleration]) -> Option<Vec<Toleration>> {
    if tolerations.is_empty() {
        return None;
    }

    Some(
        tolerations
            .iter()
            .map(|t| Toleration {
                key: t.key.clone(),
                operator: t.operator.clone(),
                value: t.value.clone(),
                effect: t.effect.clone(),
                toleration_seconds: t.toleration_seconds,
            })
            .collect(),
    )
}

fn convert_pull_secrets(pull_secrets: &[String]) -> Option<Vec<LocalObjectReference>> {
    if pull_secrets.is_empty() {
        return None;
    }

    Some(
        pull_secrets
            .iter()
            .map(|name| LocalObjectReference { name: name.clone() })
            .collect(),
    )
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
    use crate::crd::{
        AuthenticationSpec, HdfsCluster, HdfsRole, LoggingFragment, RoleGroupConfigFragment,
        TlsSpec,
    };
    use crate::resources::augmentations::{AUTH_PROXY_CONTAINER, VECTOR_CONTAINER};
    use crate::resources::test_support::{cluster, with_ctx};
    use crate::resources::{AuthProxySettings, ResolvedDependencies};

    fn build(hdfs: &HdfsCluster, role: HdfsRole, deps: &ResolvedDependencies) -> StatefulSet {
        with_ctx(hdfs, role, deps, |ctx| WorkloadBuilder::new(ctx).build().unwrap())
    }

    fn pod_spec(sts: &StatefulSet) -> &PodSpec {
        sts.spec.as_ref().unwrap().template.spec.as_ref().unwrap()
    }

    fn container_names(containers: &[Container]) -> Vec<&str> {
        containers.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_namenode_statefulset() {
        let hdfs = cluster(2, 3, 1);
        let sts = build(&hdfs, HdfsRole::NameNode, &ResolvedDependencies::default());

        assert_eq!(sts.metadata.name.as_deref(), Some("demo-namenode-default"));
        let spec = sts.spec.as_ref().unwrap();
        assert_eq!(spec.replicas, Some(2));
        assert_eq!(spec.service_name.as_deref(), Some("demo-namenode-default"));
        assert_eq!(spec.pod_management_policy.as_deref(), Some("Parallel"));

        let pod = pod_spec(&sts);
        assert_eq!(container_names(&pod.containers), vec!["namenode", "zkfc"]);
        assert_eq!(
            container_names(pod.init_containers.as_ref().unwrap()),
            vec!["wait-for-journalnodes", "format-namenodes"]
        );
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some("demo-serviceaccount")
        );
        assert_eq!(pod.termination_grace_period_seconds, Some(900));
    }

    #[test]
    fn test_main_container() {
        let hdfs = cluster(2, 3, 1);
        let sts = build(&hdfs, HdfsRole::NameNode, &ResolvedDependencies::default());
        let main = &pod_spec(&sts).containers[0];

        assert_eq!(main.image.as_deref(), Some("apache/hadoop:3.4.1"));
        assert_eq!(main.command.as_ref().unwrap()[0], "/bin/bash");
        assert!(main.args.as_ref().unwrap()[0].ends_with("exec hdfs namenode"));

        let ports = main.ports.as_ref().unwrap();
        let names: Vec<_> = ports.iter().map(|p| p.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["rpc", "http", "metrics"]);

        let env = main.env.as_ref().unwrap();
        let zookeeper = env.iter().find(|e| e.name == "ZOOKEEPER").unwrap();
        let selector = zookeeper
            .value_from
            .as_ref()
            .unwrap()
            .config_map_key_ref
            .as_ref()
            .unwrap();
        assert_eq!(selector.name, "demo-znode");
        let opts = env.iter().find(|e| e.name == "HADOOP_OPTS").unwrap();
        assert!(opts
            .value
            .as_deref()
            .unwrap()
            .contains("-Dlog4j.configuration=file:/opt/hdfs/config/namenode.log4j.properties"));

        let limits = main.resources.as_ref().unwrap().limits.as_ref().unwrap();
        assert_eq!(limits.get("cpu").unwrap().0, "1");
        assert_eq!(limits.get("memory").unwrap().0, "1Gi");
    }

    #[test]
    fn test_probe_scheme_follows_tls() {
        let mut hdfs = cluster(2, 3, 1);
        let plain = build(&hdfs, HdfsRole::DataNode, &ResolvedDependencies::default());
        let probe = pod_spec(&plain).containers[0].readiness_probe.clone().unwrap();
        let http_get = probe.http_get.unwrap();
        assert_eq!(http_get.scheme.as_deref(), Some("HTTP"));
        assert_eq!(http_get.port, IntOrString::String("http".to_string()));

        hdfs.spec.cluster_config.tls = Some(TlsSpec {
            secret_class: "tls".to_string(),
        });
        let tls = build(&hdfs, HdfsRole::DataNode, &ResolvedDependencies::default());
        let pod = pod_spec(&tls);
        let http_get = pod.containers[0]
            .readiness_probe
            .clone()
            .unwrap()
            .http_get
            .unwrap();
        assert_eq!(http_get.scheme.as_deref(), Some("HTTPS"));
        assert_eq!(http_get.port, IntOrString::String("https".to_string()));

        let volume = pod
            .volumes
            .as_ref()
            .unwrap()
            .iter()
            .find(|v| v.name == TLS_VOLUME)
            .unwrap();
        let template = volume
            .ephemeral
            .as_ref()
            .unwrap()
            .volume_claim_template
            .as_ref()
            .unwrap();
        assert_eq!(
            template.spec.storage_class_name.as_deref(),
            Some(SECRET_STORAGE_CLASS)
        );
        let annotations = template.metadata.as_ref().unwrap().annotations.as_ref().unwrap();
        assert_eq!(annotations.get("secrets.kubedoop.dev/class").unwrap(), "tls");
        assert_eq!(
            annotations.get("secrets.kubedoop.dev/format").unwrap(),
            "tls-p12"
        );
    }

    #[test]
    fn test_data_claim_uses_merged_storage() {
        let hdfs = cluster(2, 3, 1);
        let sts = build(&hdfs, HdfsRole::DataNode, &ResolvedDependencies::default());
        let claims = sts.spec.unwrap().volume_claim_templates.unwrap();
        let requests = claims[0]
            .spec
            .as_ref()
            .unwrap()
            .resources
            .as_ref()
            .unwrap()
            .requests
            .as_ref()
            .unwrap();
        assert_eq!(requests.get("storage").unwrap().0, "10Gi");
    }

    #[test]
    fn test_augmentation_order() {
        let mut hdfs = cluster(2, 3, 1);
        let group = hdfs
            .spec
            .journal_nodes
            .as_mut()
            .unwrap()
            .role_groups
            .get_mut("default")
            .unwrap();
        group.config = Some(RoleGroupConfigFragment {
            logging: Some(LoggingFragment {
                enable_vector_agent: Some(true),
                root_log_level: None,
            }),
            ..Default::default()
        });
        hdfs.spec.cluster_config.authentication = Some(AuthenticationSpec {
            provider_url: "https://idp".to_string(),
            client_credentials_secret: "oidc".to_string(),
        });
        let deps = ResolvedDependencies {
            auth_proxy: Some(AuthProxySettings {
                provider_url: "https://idp".to_string(),
                credentials_secret: "oidc".to_string(),
            }),
            vector_aggregator: Some("aggregator".to_string()),
        };

        let sts = build(&hdfs, HdfsRole::JournalNode, &deps);
        assert_eq!(
            container_names(&pod_spec(&sts).containers),
            vec!["journalnode", VECTOR_CONTAINER, AUTH_PROXY_CONTAINER]
        );
    }

    #[test]
    fn test_missing_zookeeper_is_configuration_error() {
        let mut hdfs = cluster(2, 3, 1);
        hdfs.spec.cluster_config.zookeeper_config_map_name = String::new();
        let result = with_ctx(&hdfs, HdfsRole::NameNode, &ResolvedDependencies::default(), |ctx| {
            WorkloadBuilder::new(ctx).build()
        });
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_override_hook_targets_main_container() {
        let mut hdfs = cluster(2, 3, 1);
        let data_nodes = hdfs.spec.data_nodes.as_mut().unwrap();
        data_nodes
            .env_overrides
            .insert("HADOOP_HEAPSIZE".to_string(), "2048".to_string());

        let sts = with_ctx(&hdfs, HdfsRole::DataNode, &ResolvedDependencies::default(), |ctx| {
            let builder = WorkloadBuilder::new(ctx);
            let mut sts = builder.build().unwrap();
            builder.override_hook().apply(&mut sts).unwrap();
            sts
        });
        let env = pod_spec(&sts).containers[0].env.clone().unwrap();
        assert!(env
            .iter()
            .any(|e| e.name == "HADOOP_HEAPSIZE" && e.value.as_deref() == Some("2048")));
    }
}
