//! PodDisruptionBudget generation for HDFS role groups.
//!
//! Only built when the group requests one; limits voluntary disruptions
//! such as node drains to the configured number of pods.

use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::controller::error::Result;
use crate::resources::common::{object_meta, pod_selector_labels, role_group_labels};
use crate::resources::{ResourceBuilder, RoleGroupContext};

pub struct PdbBuilder<'a> {
    ctx: &'a RoleGroupContext<'a>,
}

impl<'a> PdbBuilder<'a> {
    pub fn new(ctx: &'a RoleGroupContext<'a>) -> Self {
        Self { ctx }
    }

    /// Whether the group asked for a disruption budget.
    pub fn enabled(&self) -> bool {
        self.ctx.component.config.pod_disruption_budget.enabled
    }
}

impl ResourceBuilder for PdbBuilder<'_> {
    type Object = PodDisruptionBudget;

    fn build(&self) -> Result<PodDisruptionBudget> {
        let naming = &self.ctx.component.naming;
        let budget = &self.ctx.component.config.pod_disruption_budget;

        Ok(PodDisruptionBudget {
            metadata: object_meta(
                self.ctx.hdfs,
                naming.name(),
                role_group_labels(self.ctx.hdfs, naming),
            ),
            spec: Some(PodDisruptionBudgetSpec {
                max_unavailable: Some(IntOrString::Int(budget.max_unavailable)),
                selector: Some(LabelSelector {
                    match_labels: Some(pod_selector_labels(naming)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
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
    use crate::crd::{HdfsRole, PdbFragment, RoleGroupConfigFragment};
    use crate::resources::ResolvedDependencies;
    use crate::resources::test_support::{cluster, with_ctx};

    #[test]
    fn test_disabled_by_default() {
        let hdfs = cluster(2, 3, 1);
        let enabled = with_ctx(&hdfs, HdfsRole::JournalNode, &ResolvedDependencies::default(), |ctx| {
            PdbBuilder::new(ctx).enabled()
        });
        assert!(!enabled);
    }

    #[test]
    fn test_requested_budget() {
        let mut hdfs = cluster(2, 3, 1);
        hdfs.spec.journal_nodes.as_mut().unwrap().config = Some(RoleGroupConfigFragment {
            pod_disruption_budget: Some(PdbFragment {
                enabled: Some(true),
                max_unavailable: Some(2),
            }),
            ..Default::default()
        });

        let (enabled, pdb) = with_ctx(&hdfs, HdfsRole::JournalNode, &ResolvedDependencies::default(), |ctx| {
            let builder = PdbBuilder::new(ctx);
            (builder.enabled(), builder.build().unwrap())
        });
        assert!(enabled);
        assert_eq!(pdb.metadata.name.as_deref(), Some("demo-journalnode-default"));
        let spec = pdb.spec.unwrap();
        assert_eq!(spec.max_unavailable, Some(IntOrString::Int(2)));
        let selector = spec.selector.unwrap().match_labels.unwrap();
        assert_eq!(
            selector.get("app.kubernetes.io/role-group").map(String::as_str),
            Some("default")
        );
    }
}
