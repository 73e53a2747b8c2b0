//! Status management utilities.
//!
//! Aggregates the per-group outcomes of a pass into the `Available`
//! condition of each role and of the cluster.

use crate::crd::{AVAILABLE_CONDITION, Condition, HdfsClusterStatus, HdfsRole, RoleStatus};

/// Builder for managing conditions list
pub struct ConditionBuilder {
    conditions: Vec<Condition>,
}

impl ConditionBuilder {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Start from previously reported conditions.
    pub fn from_existing(conditions: &[Condition]) -> Self {
        Self {
            conditions: conditions.to_vec(),
        }
    }

    /// Add or update a condition.
    ///
    /// The transition time of an existing condition is kept when its status
    /// does not change.
    pub fn set(&mut self, mut condition: Condition) -> &mut Self {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
        self
    }

    /// Set Available condition
    pub fn available(
        &mut self,
        available: bool,
        reason: &str,
        message: &str,
        generation: Option<i64>,
    ) -> &mut Self {
        self.set(Condition::available(available, reason, message, generation))
    }

    pub fn build(self) -> Vec<Condition> {
        self.conditions
    }
}

impl Default for ConditionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a condition type is true
pub fn is_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .is_some_and(Condition::is_true)
}

/// Get the reason for a condition
pub fn get_condition_reason<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a str> {
    conditions
        .iter()
        .find(|c| c.r#type == condition_type)
        .map(|c| c.reason.as_str())
}

/// How one role group ended the pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupOutcome {
    /// Workload reached its declared replica count.
    Ready,
    /// Applied, still waiting for replicas.
    Pending,
    /// Not reconciled this pass.
    Skipped,
}

/// Per-role tally of group outcomes.
#[derive(Clone, Debug)]
pub struct RoleProgress {
    pub role: HdfsRole,
    pub desired_replicas: i32,
    pub ready_replicas: i32,
    ready: Vec<String>,
    pending: Vec<String>,
    skipped: Vec<String>,
}

impl RoleProgress {
    pub fn new(role: HdfsRole) -> Self {
        Self {
            role,
            desired_replicas: 0,
            ready_replicas: 0,
            ready: Vec::new(),
            pending: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn record(&mut self, group: &str, outcome: GroupOutcome) {
        let list = match outcome {
            GroupOutcome::Ready => &mut self.ready,
            GroupOutcome::Pending => &mut self.pending,
            GroupOutcome::Skipped => &mut self.skipped,
        };
        list.push(group.to_string());
    }

    pub fn add_replicas(&mut self, desired: i32, ready: i32) {
        self.desired_replicas += desired;
        self.ready_replicas += ready;
    }

    pub fn total_groups(&self) -> usize {
        self.ready.len() + self.pending.len() + self.skipped.len()
    }

    pub fn ready_groups(&self) -> usize {
        self.ready.len()
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Every declared group is ready and none was skipped.
    pub fn is_available(&self) -> bool {
        self.total_groups() > 0 && self.pending.is_empty() && self.skipped.is_empty()
    }

    fn reason_and_message(&self) -> (&'static str, String) {
        if self.total_groups() == 0 {
            ("NoRoleGroups", "no role groups declared".to_string())
        } else if !self.skipped.is_empty() {
            (
                "RoleGroupsSkipped",
                format!("role groups not reconciled: {}", self.skipped.join(", ")),
            )
        } else if !self.pending.is_empty() {
            (
                "ReplicasNotReady",
                format!(
                    "{}/{} replicas ready, waiting for: {}",
                    self.ready_replicas,
                    self.desired_replicas,
                    self.pending.join(", ")
                ),
            )
        } else {
            (
                "AllReplicasReady",
                format!("{} replicas ready", self.ready_replicas),
            )
        }
    }

    /// Role status carrying the single `Available` condition.
    pub fn to_status(&self, previous: Option<&RoleStatus>, generation: Option<i64>) -> RoleStatus {
        let (reason, message) = self.reason_and_message();
        let mut conditions = ConditionBuilder::from_existing(
            previous.map(|p| p.conditions.as_slice()).unwrap_or_default(),
        );
        conditions.available(self.is_available(), reason, &message, generation);

        RoleStatus {
            role: self.role.name().to_string(),
            ready_groups: format!("{}/{}", self.ready_groups(), self.total_groups()),
            conditions: conditions.build(),
        }
    }
}

/// Cluster status from this pass's role progress.
///
/// The cluster is available when every role is.
pub fn build_status(
    previous: Option<&HdfsClusterStatus>,
    progress: &[RoleProgress],
    generation: Option<i64>,
) -> HdfsClusterStatus {
    let roles = progress
        .iter()
        .map(|p| {
            let prev = previous.and_then(|s| s.roles.iter().find(|r| r.role == p.role.name()));
            p.to_status(prev, generation)
        })
        .collect::<Vec<_>>();

    let unavailable = progress
        .iter()
        .filter(|p| !p.is_available())
        .map(|p| p.role.name())
        .collect::<Vec<_>>();

    let mut conditions = ConditionBuilder::from_existing(
        previous.map(|p| p.conditions.as_slice()).unwrap_or_default(),
    );
    if unavailable.is_empty() {
        conditions.available(true, "AllRolesAvailable", "all roles available", generation);
    } else {
        conditions.available(
            false,
            "RolesUnavailable",
            &format!("roles not available: {}", unavailable.join(", ")),
            generation,
        );
    }

    HdfsClusterStatus {
        observed_generation: generation,
        conditions: conditions.build(),
        roles,
    }
}

/// Whether the role reported as available in `status`.
pub fn role_available(status: &HdfsClusterStatus, role: HdfsRole) -> bool {
    status
        .roles
        .iter()
        .find(|r| r.role == role.name())
        .is_some_and(|r| is_condition_true(&r.conditions, AVAILABLE_CONDITION))
}

fn skipped_message(status: &HdfsClusterStatus, role: HdfsRole) -> Option<&str> {
    status
        .roles
        .iter()
        .find(|r| r.role == role.name())?
        .conditions
        .iter()
        .find(|c| c.r#type == AVAILABLE_CONDITION && c.reason == "RoleGroupsSkipped")
        .map(|c| c.message.as_str())
}

/// Whether `current` reports a different set of skipped groups for `role`
/// than `previous` did.
pub fn skipped_groups_changed(
    previous: Option<&HdfsClusterStatus>,
    current: &HdfsClusterStatus,
    role: HdfsRole,
) -> bool {
    previous.and_then(|p| skipped_message(p, role)) != skipped_message(current, role)
}
