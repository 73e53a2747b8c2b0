//! Per-role workload contract.
//!
//! Each role declares its main process, the init containers that gate it and
//! the sidecars that run next to it. The workload builder turns these into
//! containers with the shared env, mounts and log configuration.

use crate::crd::HdfsRole;
use crate::resources::RoleGroupContext;
use crate::topology::{DATA_DIR, KERBEROS_DIR, PortKind, port};

/// A container described by the shell script it runs.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptContainer {
    pub name: &'static str,
    pub script: String,
}

impl ScriptContainer {
    fn new(name: &'static str, script: String) -> Self {
        Self { name, script }
    }
}

/// What a role runs inside its pods.
pub trait RoleWorkload: Send + Sync {
    fn role(&self) -> HdfsRole;

    fn main_container_name(&self) -> &'static str {
        self.role().name()
    }

    fn main_script(&self) -> String {
        format!("exec hdfs {}", self.role().name())
    }

    fn init_containers(&self, _ctx: &RoleGroupContext<'_>) -> Vec<ScriptContainer> {
        Vec::new()
    }

    fn sidecars(&self, _ctx: &RoleGroupContext<'_>) -> Vec<ScriptContainer> {
        Vec::new()
    }

    /// Sub-containers that get their own log4j configuration.
    fn log_containers(&self) -> Vec<&'static str>;
}

pub struct NameNodeWorkload;
pub struct JournalNodeWorkload;
pub struct DataNodeWorkload;

/// The workload of a role.
pub fn role_workload(role: HdfsRole) -> &'static dyn RoleWorkload {
    match role {
        HdfsRole::NameNode => &NameNodeWorkload,
        HdfsRole::JournalNode => &JournalNodeWorkload,
        HdfsRole::DataNode => &DataNodeWorkload,
    }
}

pub const WAIT_FOR_JOURNALNODES: &str = "wait-for-journalnodes";
pub const FORMAT_NAMENODES: &str = "format-namenodes";
pub const WAIT_FOR_NAMENODES: &str = "wait-for-namenodes";
pub const ZKFC: &str = "zkfc";

fn kinit(service: &str) -> String {
    format!(
        "kinit -kt {}/keytab {}/$(hostname -f)@${{KERBEROS_REALM}}\n",
        KERBEROS_DIR, service
    )
}

impl RoleWorkload for NameNodeWorkload {
    fn role(&self) -> HdfsRole {
        HdfsRole::NameNode
    }

    fn init_containers(&self, ctx: &RoleGroupContext<'_>) -> Vec<ScriptContainer> {
        let topology = ctx.topology;
        let mut inits = Vec::new();

        let rpc = port(HdfsRole::JournalNode, PortKind::Rpc).unwrap_or_default();
        let journals = topology
            .pod_refs(HdfsRole::JournalNode)
            .iter()
            .map(|pod| pod.fqdn())
            .collect::<Vec<_>>();
        if !journals.is_empty() {
            let script = format!(
                "for host in {hosts}; do\n  \
                 until (echo > /dev/tcp/$host/{rpc}) 2>/dev/null; do\n    \
                 echo \"waiting for journal node $host\"; sleep 2\n  \
                 done\n\
                 done\n",
                hosts = journals.join(" "),
            );
            inits.push(ScriptContainer::new(WAIT_FOR_JOURNALNODES, script));
        }

        let namenodes = topology
            .pod_refs(HdfsRole::NameNode)
            .into_iter()
            .map(|pod| pod.pod_name)
            .collect::<Vec<_>>();
        let first = namenodes.first().cloned().unwrap_or_default();
        let kinit = if topology.security().kerberos {
            kinit(HdfsRole::NameNode.kerberos_service_name())
        } else {
            String::new()
        };
        // A running peer always wins over formatting, even on the first pod.
        let script = format!(
            "{kinit}\
             if [ -f {data}/namenode/current/VERSION ]; then\n  \
             echo \"name directory already formatted\"\n  \
             exit 0\n\
             fi\n\
             ACTIVE=\"\"\n\
             for id in {ids}; do\n  \
             if [ \"$id\" != \"$POD_NAME\" ] && hdfs haadmin -getServiceState \"$id\" 2>/dev/null | grep -q active; then\n    \
             ACTIVE=\"$id\"; break\n  \
             fi\n\
             done\n\
             if [ -n \"$ACTIVE\" ]; then\n  \
             echo \"bootstrapping from active name node $ACTIVE\"\n  \
             exec hdfs namenode -bootstrapStandby -nonInteractive\n\
             elif [ \"$POD_NAME\" = \"{first}\" ]; then\n  \
             hdfs namenode -format -nonInteractive -clusterId {instance}\n  \
             hdfs zkfc -formatZK -nonInteractive || true\n\
             else\n  \
             until hdfs namenode -bootstrapStandby -nonInteractive; do\n    \
             echo \"waiting for an active name node\"; sleep 5\n  \
             done\n\
             fi\n",
            data = DATA_DIR,
            ids = namenodes.join(" "),
            instance = topology.context().instance,
        );
        inits.push(ScriptContainer::new(FORMAT_NAMENODES, script));
        inits
    }

    fn sidecars(&self, _ctx: &RoleGroupContext<'_>) -> Vec<ScriptContainer> {
        vec![ScriptContainer::new(ZKFC, "exec hdfs zkfc".to_string())]
    }

    fn log_containers(&self) -> Vec<&'static str> {
        vec![self.main_container_name(), ZKFC, FORMAT_NAMENODES]
    }
}

impl RoleWorkload for JournalNodeWorkload {
    fn role(&self) -> HdfsRole {
        HdfsRole::JournalNode
    }

    fn log_containers(&self) -> Vec<&'static str> {
        vec![self.main_container_name()]
    }
}

impl RoleWorkload for DataNodeWorkload {
    fn role(&self) -> HdfsRole {
        HdfsRole::DataNode
    }

    fn init_containers(&self, ctx: &RoleGroupContext<'_>) -> Vec<ScriptContainer> {
        let kinit = if ctx.topology.security().kerberos {
            kinit(HdfsRole::DataNode.kerberos_service_name())
        } else {
            String::new()
        };
        let script = format!(
            "{kinit}\
             until hdfs haadmin -getAllServiceState | grep -q active; do\n  \
             echo \"waiting for an active name node\"; sleep 5\n\
             done\n"
        );
        vec![ScriptContainer::new(WAIT_FOR_NAMENODES, script)]
    }

    fn log_containers(&self) -> Vec<&'static str> {
        vec![self.main_container_name(), WAIT_FOR_NAMENODES]
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
    use crate::crd::KerberosSpec;
    use crate::resources::ResolvedDependencies;
    use crate::resources::test_support::{cluster, with_ctx};

    fn inits(hdfs: &crate::crd::HdfsCluster, role: HdfsRole) -> Vec<ScriptContainer> {
        with_ctx(hdfs, role, &ResolvedDependencies::default(), |ctx| {
            role_workload(role).init_containers(ctx)
        })
    }

    #[test]
    fn test_namenode_inits() {
        let inits = inits(&cluster(2, 3, 1), HdfsRole::NameNode);
        assert_eq!(inits.len(), 2);
        assert_eq!(inits[0].name, WAIT_FOR_JOURNALNODES);
        assert!(inits[0]
            .script
            .contains("demo-journalnode-default-2.demo-journalnode-default.ns1.svc.cluster.local"));
        assert_eq!(inits[1].name, FORMAT_NAMENODES);
        assert!(inits[1].script.contains("\"demo-namenode-default-0\""));
        assert!(inits[1].script.contains("-clusterId demo"));
        assert!(!inits[1].script.contains("kinit"));
    }

    #[test]
    fn test_format_only_without_an_active_peer() {
        let inits = inits(&cluster(3, 1, 1), HdfsRole::NameNode);
        let script = &inits[1].script;
        assert!(script.contains(
            "for id in demo-namenode-default-0 demo-namenode-default-1 demo-namenode-default-2; do"
        ));

        let position = |needle: &str| script.find(needle).unwrap();
        let formatted = position("current/VERSION");
        let peer_check = position("hdfs haadmin -getServiceState");
        let bootstrap = position("exec hdfs namenode -bootstrapStandby");
        let format = position("hdfs namenode -format");
        assert!(formatted < peer_check);
        assert!(peer_check < bootstrap);
        assert!(bootstrap < format);
        assert!(script[..format].contains("elif [ \"$POD_NAME\" = \"demo-namenode-default-0\" ]"));
    }

    #[test]
    fn test_namenode_without_journals_skips_wait() {
        let inits = inits(&cluster(2, 0, 1), HdfsRole::NameNode);
        assert_eq!(inits.len(), 1);
        assert_eq!(inits[0].name, FORMAT_NAMENODES);
    }

    #[test]
    fn test_kerberos_adds_kinit() {
        let mut hdfs = cluster(2, 1, 1);
        hdfs.spec.cluster_config.kerberos = Some(KerberosSpec {
            secret_class: "kerberos".to_string(),
            realm: "EXAMPLE.COM".to_string(),
        });
        let inits = inits(&hdfs, HdfsRole::DataNode);
        assert_eq!(inits[0].name, WAIT_FOR_NAMENODES);
        assert!(inits[0].script.starts_with("kinit -kt /opt/hdfs/kerberos/keytab dn/"));
    }

    #[test]
    fn test_role_contracts() {
        let nn = role_workload(HdfsRole::NameNode);
        assert_eq!(nn.main_container_name(), "namenode");
        assert_eq!(nn.main_script(), "exec hdfs namenode");
        assert_eq!(nn.log_containers(), vec!["namenode", ZKFC, FORMAT_NAMENODES]);

        let jn = role_workload(HdfsRole::JournalNode);
        assert_eq!(jn.log_containers(), vec!["journalnode"]);

        let hdfs = cluster(2, 1, 1);
        with_ctx(&hdfs, HdfsRole::JournalNode, &ResolvedDependencies::default(), |ctx| {
            assert!(jn.init_containers(ctx).is_empty());
            assert!(jn.sidecars(ctx).is_empty());
            assert_eq!(nn.sidecars(ctx)[0].name, ZKFC);
        });
    }
}
