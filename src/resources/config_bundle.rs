//! ConfigMap generation for HDFS role groups.
//!
//! The bundle holds every file the role's processes read from the config
//! directory. User overrides are applied per file name: XML documents get
//! the overridden properties set in place or appended, `.properties` files
//! get the overrides rendered after the generated content.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use tracing::debug;

use crate::controller::error::Result;
use crate::resources::augmentations::{VECTOR_CONFIG_FILE, vector_config};
use crate::resources::common::{object_meta, role_group_labels};
use crate::resources::roles::role_workload;
use crate::resources::{ResourceBuilder, RoleGroupContext};
use crate::topology::properties::PropertyDocument;
use crate::topology::{
    CORE_SITE_XML, HADOOP_POLICY_XML, HDFS_SITE_XML, SECURITY_PROPERTIES, SSL_CLIENT_XML,
    SSL_SERVER_XML, log4j_file_name, log4j_properties,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FileFormat {
    HadoopXml,
    JavaProperties,
}

struct BundleFile {
    name: String,
    format: FileFormat,
    document: PropertyDocument,
}

impl BundleFile {
    fn xml(name: &str, document: PropertyDocument) -> Self {
        Self {
            name: name.to_string(),
            format: FileFormat::HadoopXml,
            document,
        }
    }

    fn properties(name: String, document: PropertyDocument) -> Self {
        Self {
            name,
            format: FileFormat::JavaProperties,
            document,
        }
    }

    fn render(mut self, overrides: Option<&BTreeMap<String, String>>) -> Result<String> {
        match self.format {
            FileFormat::HadoopXml => {
                if let Some(overrides) = overrides {
                    self.document.apply_overrides(overrides);
                }
                Ok(self.document.to_hadoop_xml()?)
            }
            FileFormat::JavaProperties => {
                let mut rendered = self.document.to_java_properties()?;
                if let Some(overrides) = overrides {
                    let appended: PropertyDocument = overrides
                        .iter()
                        .map(|(k, v)| (k.as_str(), v.as_str()))
                        .collect();
                    rendered.push_str(&appended.to_java_properties()?);
                }
                Ok(rendered)
            }
        }
    }
}

/// Builds the config bundle of one role group.
pub struct ConfigBundleBuilder<'a> {
    ctx: &'a RoleGroupContext<'a>,
}

impl<'a> ConfigBundleBuilder<'a> {
    pub fn new(ctx: &'a RoleGroupContext<'a>) -> Self {
        Self { ctx }
    }

    fn files(&self) -> Vec<BundleFile> {
        let topology = self.ctx.topology;
        let role = self.ctx.component.role;
        let level = &self.ctx.component.config.logging.root_log_level;

        let mut files = vec![
            BundleFile::xml(CORE_SITE_XML, topology.core_site()),
            BundleFile::xml(HDFS_SITE_XML, topology.hdfs_site(role)),
            BundleFile::xml(HADOOP_POLICY_XML, topology.hadoop_policy()),
        ];
        if topology.security().tls {
            files.push(BundleFile::xml(SSL_SERVER_XML, topology.ssl_server()));
            files.push(BundleFile::xml(SSL_CLIENT_XML, topology.ssl_client()));
        }
        files.push(BundleFile::properties(
            SECURITY_PROPERTIES.to_string(),
            topology.security_properties(),
        ));
        for container in role_workload(role).log_containers() {
            files.push(BundleFile::properties(
                log4j_file_name(container),
                log4j_properties(container, level),
            ));
        }
        files
    }
}

impl ResourceBuilder for ConfigBundleBuilder<'_> {
    type Object = ConfigMap;

    fn build(&self) -> Result<ConfigMap> {
        let component = self.ctx.component;
        let overrides = &component.config.overrides.config;

        let files = self.files();
        for file in overrides.keys() {
            if !files.iter().any(|f| &f.name == file) {
                debug!(
                    role_group = %component.naming.name(),
                    file = %file,
                    "Ignoring overrides for unknown config file"
                );
            }
        }

        let mut data = files
            .into_iter()
            .map(|file| {
                let name = file.name.clone();
                let content = file.render(overrides.get(&name))?;
                Ok((name, content))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        if component.config.logging.enable_vector_agent {
            let workload = role_workload(component.role);
            data.insert(
                VECTOR_CONFIG_FILE.to_string(),
                vector_config(&workload.log_containers()),
            );
        }

        Ok(ConfigMap {
            metadata: object_meta(
                self.ctx.hdfs,
                component.naming.name(),
                role_group_labels(self.ctx.hdfs, &component.naming),
            ),
            data: Some(data),
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
    use crate::crd::{HdfsCluster, HdfsRole, TlsSpec};
    use crate::resources::ResolvedDependencies;
    use crate::resources::test_support::{cluster, with_ctx};
    use crate::topology::properties::hadoop_property;

    fn build(hdfs: &HdfsCluster, role: HdfsRole) -> BTreeMap<String, String> {
        with_ctx(hdfs, role, &ResolvedDependencies::default(), |ctx| {
            ConfigBundleBuilder::new(ctx).build().unwrap().data.unwrap()
        })
    }

    #[test]
    fn test_bundle_files() {
        let data = build(&cluster(3, 3, 1), HdfsRole::NameNode);
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "core-site.xml",
                "format-namenodes.log4j.properties",
                "hadoop-policy.xml",
                "hdfs-site.xml",
                "namenode.log4j.properties",
                "security.properties",
                "zkfc.log4j.properties",
            ]
        );
        let hdfs_site = &data["hdfs-site.xml"];
        for ordinal in 0..3 {
            assert!(hdfs_site.contains(&format!(
                "<name>dfs.namenode.rpc-address.demo.demo-namenode-default-{}</name>",
                ordinal
            )));
        }
        assert!(hdfs_site.contains("qjournal://"));
    }

    #[test]
    fn test_tls_adds_ssl_files() {
        let mut hdfs = cluster(2, 1, 1);
        hdfs.spec.cluster_config.tls = Some(TlsSpec {
            secret_class: "tls".to_string(),
        });
        let data = build(&hdfs, HdfsRole::DataNode);
        assert!(data["ssl-server.xml"].contains("ssl.server.keystore.location"));
        assert!(data["ssl-client.xml"].contains("ssl.client.truststore.location"));
        assert!(data["hdfs-site.xml"].contains("HTTPS_ONLY"));
    }

    #[test]
    fn test_xml_override_replaces_in_place() {
        let mut hdfs = cluster(2, 1, 1);
        let role = hdfs.spec.data_nodes.as_mut().unwrap();
        role.config_overrides.insert(
            "hdfs-site.xml".to_string(),
            BTreeMap::from([
                ("dfs.replication".to_string(), "1".to_string()),
                ("dfs.custom.key".to_string(), "x".to_string()),
            ]),
        );
        let site = build(&hdfs, HdfsRole::DataNode).remove("hdfs-site.xml").unwrap();
        assert_eq!(hadoop_property(&site, "dfs.replication").as_deref(), Some("1"));
        assert_eq!(site.matches("<name>dfs.replication</name>").count(), 1);
        assert!(site.contains("<name>dfs.custom.key</name>"));
    }

    #[test]
    fn test_properties_override_is_appended() {
        let mut hdfs = cluster(2, 1, 1);
        let role = hdfs.spec.journal_nodes.as_mut().unwrap();
        role.config_overrides.insert(
            "security.properties".to_string(),
            BTreeMap::from([("networkaddress.cache.ttl".to_string(), "5".to_string())]),
        );
        let rendered = build(&hdfs, HdfsRole::JournalNode)
            .remove("security.properties")
            .unwrap();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.first(), Some(&"networkaddress.cache.ttl=30"));
        assert_eq!(lines.last(), Some(&"networkaddress.cache.ttl=5"));
    }

    #[test]
    fn test_unknown_override_file_is_ignored() {
        let hdfs = cluster(2, 1, 1);
        let baseline = build(&hdfs, HdfsRole::JournalNode);

        let mut with_unknown = hdfs.clone();
        let role = with_unknown.spec.journal_nodes.as_mut().unwrap();
        role.config_overrides.insert(
            "mapred-site.xml".to_string(),
            BTreeMap::from([("a".to_string(), "b".to_string())]),
        );
        assert_eq!(build(&with_unknown, HdfsRole::JournalNode), baseline);
    }
}
