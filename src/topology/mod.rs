//! Topology generator.
//!
//! Derives pod identities, addresses, the journal quorum URL and the Hadoop
//! configuration documents from the pass-scoped components index. Every
//! function here is pure: identical input produces identical output.

pub mod naming;
pub mod properties;

use crate::controller::components::ClusterComponentsInfo;
use crate::crd::{HdfsCluster, HdfsRole};
use properties::PropertyDocument;

pub const CONFIG_DIR: &str = "/opt/hdfs/config";
pub const LOG_DIR: &str = "/opt/hdfs/log";
pub const DATA_DIR: &str = "/opt/hdfs/data";
pub const TLS_STORE_DIR: &str = "/opt/hdfs/tls";
pub const KERBEROS_DIR: &str = "/opt/hdfs/kerberos";
pub const TLS_STORE_PASSWORD: &str = "changeit";

pub const CORE_SITE_XML: &str = "core-site.xml";
pub const HDFS_SITE_XML: &str = "hdfs-site.xml";
pub const HADOOP_POLICY_XML: &str = "hadoop-policy.xml";
pub const SSL_SERVER_XML: &str = "ssl-server.xml";
pub const SSL_CLIENT_XML: &str = "ssl-client.xml";
pub const SECURITY_PROPERTIES: &str = "security.properties";

const FAILOVER_PROXY_PROVIDER: &str =
    "org.apache.hadoop.hdfs.server.namenode.ha.ConfiguredFailoverProxyProvider";

/// Kind of a role port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortKind {
    Rpc,
    Http,
    Https,
    Metrics,
    Data,
    Ipc,
}

impl PortKind {
    pub fn name(&self) -> &'static str {
        match self {
            PortKind::Rpc => "rpc",
            PortKind::Http => "http",
            PortKind::Https => "https",
            PortKind::Metrics => "metrics",
            PortKind::Data => "data",
            PortKind::Ipc => "ipc",
        }
    }
}

/// Port number of a role, `None` if the role does not listen on that kind.
pub fn port(role: HdfsRole, kind: PortKind) -> Option<i32> {
    match (role, kind) {
        (HdfsRole::NameNode, PortKind::Rpc) => Some(8020),
        (HdfsRole::NameNode, PortKind::Http) => Some(9870),
        (HdfsRole::NameNode, PortKind::Https) => Some(9871),
        (HdfsRole::NameNode, PortKind::Metrics) => Some(8183),
        (HdfsRole::JournalNode, PortKind::Rpc) => Some(8485),
        (HdfsRole::JournalNode, PortKind::Http) => Some(8480),
        (HdfsRole::JournalNode, PortKind::Https) => Some(8481),
        (HdfsRole::JournalNode, PortKind::Metrics) => Some(8081),
        (HdfsRole::DataNode, PortKind::Data) => Some(9866),
        (HdfsRole::DataNode, PortKind::Http) => Some(9864),
        (HdfsRole::DataNode, PortKind::Https) => Some(9865),
        (HdfsRole::DataNode, PortKind::Ipc) => Some(9867),
        (HdfsRole::DataNode, PortKind::Metrics) => Some(8082),
        _ => None,
    }
}

/// Web port kind for the security flags.
pub fn web_port_kind(security: SecurityFlags) -> PortKind {
    if security.tls {
        PortKind::Https
    } else {
        PortKind::Http
    }
}

/// Ports a role exposes, the web port chosen by the TLS flag.
pub fn role_ports(role: HdfsRole, security: SecurityFlags) -> Vec<(PortKind, i32)> {
    let web = web_port_kind(security);
    let kinds = match role {
        HdfsRole::NameNode | HdfsRole::JournalNode => vec![PortKind::Rpc, web, PortKind::Metrics],
        HdfsRole::DataNode => vec![PortKind::Data, web, PortKind::Ipc, PortKind::Metrics],
    };
    kinds
        .into_iter()
        .filter_map(|kind| port(role, kind).map(|p| (kind, p)))
        .collect()
}

/// The two orthogonal security switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SecurityFlags {
    pub kerberos: bool,
    pub tls: bool,
}

impl SecurityFlags {
    pub fn from_cluster(hdfs: &HdfsCluster) -> Self {
        Self {
            kerberos: hdfs.spec.cluster_config.kerberos.is_some(),
            tls: hdfs.spec.cluster_config.tls.is_some(),
        }
    }

    fn web_scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }
}

/// Cluster-wide inputs of the generator.
#[derive(Clone, Debug, PartialEq)]
pub struct TopologyContext {
    pub instance: String,
    pub namespace: String,
    pub cluster_domain: String,
    pub security: SecurityFlags,
    pub dfs_replication: i32,
}

impl TopologyContext {
    pub fn new(hdfs: &HdfsCluster, namespace: &str, cluster_domain: &str) -> Self {
        Self {
            instance: kube::ResourceExt::name_any(hdfs),
            namespace: namespace.to_string(),
            cluster_domain: cluster_domain.to_string(),
            security: SecurityFlags::from_cluster(hdfs),
            dfs_replication: hdfs.spec.cluster_config.dfs_replication,
        }
    }
}

/// Stable identity of one pod ordinal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PodRef {
    pub role: HdfsRole,
    pub group: String,
    pub pod_name: String,
    pub service_name: String,
    pub namespace: String,
    pub cluster_domain: String,
}

impl PodRef {
    pub fn fqdn(&self) -> String {
        format!(
            "{}.{}.{}.svc.{}",
            self.pod_name, self.service_name, self.namespace, self.cluster_domain
        )
    }

    pub fn address(&self, port: i32) -> String {
        format!("{}:{}", self.fqdn(), port)
    }
}

/// Generator bound to one pass' components index.
pub struct Topology<'a> {
    components: &'a ClusterComponentsInfo,
    ctx: TopologyContext,
}

impl<'a> Topology<'a> {
    pub fn new(components: &'a ClusterComponentsInfo, ctx: TopologyContext) -> Self {
        Self { components, ctx }
    }

    pub fn context(&self) -> &TopologyContext {
        &self.ctx
    }

    pub fn security(&self) -> SecurityFlags {
        self.ctx.security
    }

    /// Every ordinal of every group of a role, by group name then ordinal.
    ///
    /// Groups skipped this pass still contribute their ordinals.
    pub fn pod_refs(&self, role: HdfsRole) -> Vec<PodRef> {
        self.components
            .members(role)
            .flat_map(|member| {
                let service_name = member.naming.service_name();
                member
                    .naming
                    .pod_names(member.replicas)
                    .into_iter()
                    .map(move |pod_name| PodRef {
                        role,
                        group: member.group.clone(),
                        pod_name,
                        service_name: service_name.clone(),
                        namespace: self.ctx.namespace.clone(),
                        cluster_domain: self.ctx.cluster_domain.clone(),
                    })
            })
            .collect()
    }

    /// `qjournal://{jn-0}:8485;...;{jn-N}:8485/{instance}` over all journal groups.
    pub fn quorum_url(&self) -> Option<String> {
        let journals = self.pod_refs(HdfsRole::JournalNode);
        if journals.is_empty() {
            return None;
        }
        let rpc = port(HdfsRole::JournalNode, PortKind::Rpc)?;
        let addresses = journals
            .iter()
            .map(|pod| pod.address(rpc))
            .collect::<Vec<_>>()
            .join(";");
        Some(format!("qjournal://{}/{}", addresses, self.ctx.instance))
    }

    /// Nameservice and per-ordinal name node addresses.
    pub fn namenode_discovery(&self) -> PropertyDocument {
        let instance = &self.ctx.instance;
        let namenodes = self.pod_refs(HdfsRole::NameNode);
        let web_kind = web_port_kind(self.ctx.security);
        let web_key = if self.ctx.security.tls {
            "dfs.namenode.https-address"
        } else {
            "dfs.namenode.http-address"
        };

        let mut doc = PropertyDocument::new();
        doc.set("dfs.nameservices", instance.as_str());
        doc.set(
            format!("dfs.ha.namenodes.{}", instance),
            namenodes
                .iter()
                .map(|pod| pod.pod_name.as_str())
                .collect::<Vec<_>>()
                .join(","),
        );

        if let Some(rpc) = port(HdfsRole::NameNode, PortKind::Rpc) {
            for pod in &namenodes {
                doc.set(
                    format!("dfs.namenode.rpc-address.{}.{}", instance, pod.pod_name),
                    pod.address(rpc),
                );
            }
        }
        if let Some(web) = port(HdfsRole::NameNode, web_kind) {
            for pod in &namenodes {
                doc.set(
                    format!("{}.{}.{}", web_key, instance, pod.pod_name),
                    pod.address(web),
                );
            }
        }
        doc
    }

    pub fn core_site(&self) -> PropertyDocument {
        let mut doc = self.client_core_site();
        doc.set("ha.zookeeper.quorum", "${env.ZOOKEEPER}");
        doc.set("hadoop.http.authentication.simple.anonymous.allowed", "true");
        doc
    }

    /// Core site without the server-only failover controller settings.
    pub fn client_core_site(&self) -> PropertyDocument {
        let instance = &self.ctx.instance;
        let mut doc = PropertyDocument::new();
        doc.set("fs.defaultFS", format!("hdfs://{}/", instance));
        doc.set(
            format!("dfs.client.failover.proxy.provider.{}", instance),
            FAILOVER_PROXY_PROVIDER,
        );
        doc.set("io.file.buffer.size", "131072");

        if self.ctx.security.kerberos {
            doc.set("hadoop.security.authentication", "kerberos");
            doc.set("hadoop.security.authorization", "true");
            doc.set("hadoop.rpc.protection", "privacy");
            doc.set("hadoop.registry.kerberos.realm", "${env.KERBEROS_REALM}");
        }
        if self.ctx.security.tls {
            doc.set("hadoop.ssl.require.client.cert", "false");
            doc.set("hadoop.ssl.server.conf", SSL_SERVER_XML);
            doc.set("hadoop.ssl.client.conf", SSL_CLIENT_XML);
        }
        doc
    }

    /// Site properties for the pods of one role.
    pub fn hdfs_site(&self, role: HdfsRole) -> PropertyDocument {
        let mut doc = self.client_hdfs_site();
        let security = self.ctx.security;

        doc.set("dfs.replication", self.ctx.dfs_replication.to_string());
        doc.set("dfs.ha.fencing.methods", "shell(/bin/true)");
        doc.set("dfs.ha.automatic-failover.enabled", "true");
        doc.set("dfs.ha.namenode.id", "${env.POD_NAME}");
        if let Some(quorum) = self.quorum_url() {
            doc.set("dfs.namenode.shared.edits.dir", quorum);
        }

        match role {
            HdfsRole::NameNode => {
                doc.set("dfs.namenode.name.dir", format!("{}/namenode", DATA_DIR));
                doc.set("dfs.namenode.handler.count", "50");
            }
            HdfsRole::JournalNode => {
                doc.set("dfs.journalnode.edits.dir", format!("{}/journalnode", DATA_DIR));
                self.set_bind_addresses(&mut doc, role, "dfs.journalnode");
            }
            HdfsRole::DataNode => {
                doc.set("dfs.datanode.data.dir", format!("{}/datanode", DATA_DIR));
                doc.set("dfs.datanode.handler.count", "50");
                if let Some(data) = port(role, PortKind::Data) {
                    doc.set("dfs.datanode.address", format!("0.0.0.0:{}", data));
                }
                if let Some(ipc) = port(role, PortKind::Ipc) {
                    doc.set("dfs.datanode.ipc.address", format!("0.0.0.0:{}", ipc));
                }
                self.set_bind_addresses(&mut doc, role, "dfs.datanode");
            }
        }

        if security.kerberos {
            let keytab = format!("{}/keytab", KERBEROS_DIR);
            for role in HdfsRole::all() {
                let prefix = format!("dfs.{}", role.name());
                doc.set(
                    format!("{}.kerberos.principal", prefix),
                    format!("{}/_HOST@${{env.KERBEROS_REALM}}", role.kerberos_service_name()),
                );
                doc.set(format!("{}.keytab.file", prefix), keytab.as_str());
            }
            doc.set(
                "dfs.journalnode.kerberos.internal.spnego.principal",
                "HTTP/_HOST@${env.KERBEROS_REALM}",
            );
            doc.set(
                "dfs.web.authentication.kerberos.principal",
                "HTTP/_HOST@${env.KERBEROS_REALM}",
            );
            doc.set("dfs.web.authentication.kerberos.keytab", keytab.as_str());
            doc.set("dfs.block.access.token.enable", "true");
        }
        doc
    }

    /// Site properties clients need to reach the name nodes.
    pub fn client_hdfs_site(&self) -> PropertyDocument {
        let security = self.ctx.security;
        let mut doc = self.namenode_discovery();
        doc.set(
            format!("dfs.client.failover.proxy.provider.{}", self.ctx.instance),
            FAILOVER_PROXY_PROVIDER,
        );
        doc.set(
            "dfs.http.policy",
            if security.tls { "HTTPS_ONLY" } else { "HTTP_ONLY" },
        );
        if security.kerberos {
            doc.set("dfs.data.transfer.protection", "privacy");
            doc.set(
                "dfs.namenode.kerberos.principal",
                "nn/_HOST@${env.KERBEROS_REALM}",
            );
        }
        doc
    }

    fn set_bind_addresses(&self, doc: &mut PropertyDocument, role: HdfsRole, prefix: &str) {
        let kind = web_port_kind(self.ctx.security);
        // journal nodes use http-address, data nodes http.address
        let separator = if role == HdfsRole::DataNode { "." } else { "-" };
        if let Some(web) = port(role, kind) {
            doc.set(
                format!(
                    "{}.{}{}address",
                    prefix,
                    self.ctx.security.web_scheme(),
                    separator
                ),
                format!("0.0.0.0:{}", web),
            );
        }
    }

    /// JVM networking properties.
    pub fn security_properties(&self) -> PropertyDocument {
        [
            ("networkaddress.cache.ttl", "30"),
            ("networkaddress.cache.negative.ttl", "0"),
        ]
        .into_iter()
        .collect()
    }

    /// Authorization policy. Only exists so users can override it.
    pub fn hadoop_policy(&self) -> PropertyDocument {
        [
            ("security.client.protocol.acl", "*"),
            ("security.client.datanode.protocol.acl", "*"),
            ("security.datanode.protocol.acl", "*"),
            ("security.inter.datanode.protocol.acl", "*"),
            ("security.namenode.protocol.acl", "*"),
            ("security.qjournal.service.protocol.acl", "*"),
            ("security.zkfc.protocol.acl", "*"),
        ]
        .into_iter()
        .collect()
    }

    /// Server keystore settings, empty without TLS.
    pub fn ssl_server(&self) -> PropertyDocument {
        let mut doc = PropertyDocument::new();
        if self.ctx.security.tls {
            doc.set(
                "ssl.server.truststore.location",
                format!("{}/truststore.p12", TLS_STORE_DIR),
            );
            doc.set("ssl.server.truststore.type", "pkcs12");
            doc.set("ssl.server.truststore.password", TLS_STORE_PASSWORD);
            doc.set(
                "ssl.server.keystore.location",
                format!("{}/keystore.p12", TLS_STORE_DIR),
            );
            doc.set("ssl.server.keystore.type", "pkcs12");
            doc.set("ssl.server.keystore.password", TLS_STORE_PASSWORD);
        }
        doc
    }

    /// Client truststore settings, empty without TLS.
    pub fn ssl_client(&self) -> PropertyDocument {
        let mut doc = PropertyDocument::new();
        if self.ctx.security.tls {
            doc.set(
                "ssl.client.truststore.location",
                format!("{}/truststore.p12", TLS_STORE_DIR),
            );
            doc.set("ssl.client.truststore.type", "pkcs12");
            doc.set("ssl.client.truststore.password", TLS_STORE_PASSWORD);
        }
        doc
    }
}

/// Log4j configuration of one sub-container.
pub fn log4j_properties(container: &str, root_level: &str) -> PropertyDocument {
    let file = format!("{}/{}/{}.log", LOG_DIR, container, container);
    [
        ("log4j.rootLogger", format!("{}, CONSOLE, FILE", root_level)),
        ("log4j.appender.CONSOLE", "org.apache.log4j.ConsoleAppender".to_string()),
        ("log4j.appender.CONSOLE.Threshold", root_level.to_string()),
        ("log4j.appender.CONSOLE.layout", "org.apache.log4j.PatternLayout".to_string()),
        (
            "log4j.appender.CONSOLE.layout.ConversionPattern",
            "%d{ISO8601} %-5p %c{2} (%F:%M(%L)) - %m%n".to_string(),
        ),
        ("log4j.appender.FILE", "org.apache.log4j.RollingFileAppender".to_string()),
        ("log4j.appender.FILE.File", file),
        ("log4j.appender.FILE.MaxFileSize", "5MB".to_string()),
        ("log4j.appender.FILE.MaxBackupIndex", "1".to_string()),
        ("log4j.appender.FILE.layout", "org.apache.log4j.xml.XMLLayout".to_string()),
    ]
    .into_iter()
    .collect()
}

/// File name of a sub-container's log4j configuration.
pub fn log4j_file_name(container: &str) -> String {
    format!("{}.log4j.properties", container)
}
