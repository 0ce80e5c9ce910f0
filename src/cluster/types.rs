// ABOUTME: Data model for services, task definitions, scaling resources, and tasks.
// ABOUTME: Spec types deserialize from manifests; view types come back from describe calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{TargetGroupArn, TaskArn, TaskDefinitionArn};

/// Lifecycle status the control plane reports for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Active,
    Draining,
    Inactive,
}

/// Binding between a service's container port and a load balancer target group.
///
/// The target group may be left unset in a manifest when the deployment
/// resolves it at runtime (blue/green stage binding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_group: Option<TargetGroupArn>,
    pub container_name: String,
    pub container_port: u16,
}

/// Desired state of a service: what a create or replace request carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub service_name: String,

    /// Cluster the service runs in. Manifests may omit it; planning fills it
    /// from the deployment target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    /// Task definition reference (`family:revision`). Unset in manifests;
    /// filled after registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,

    pub desired_count: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub load_balancers: Vec<LoadBalancerBinding>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_type: Option<String>,
}

/// Live view of a service as returned by a describe call.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceView {
    pub service_name: String,
    pub cluster: String,
    pub status: ServiceStatus,
    pub desired_count: i64,
    pub running_count: i64,
    pub pending_count: i64,
    pub task_definition: Option<String>,
    pub load_balancers: Vec<LoadBalancerBinding>,
    pub tags: BTreeMap<String, String>,
    /// Number of in-flight rollout generations the scheduler reports.
    /// Steady state requires exactly one.
    pub deployment_count: usize,
    pub events: Vec<ServiceEvent>,
}

impl ServiceView {
    /// Rebuild the desired-state spec for this service, used when capturing
    /// rollback snapshots.
    pub fn to_spec(&self) -> ServiceSpec {
        ServiceSpec {
            service_name: self.service_name.clone(),
            cluster: Some(self.cluster.clone()),
            task_definition: self.task_definition.clone(),
            desired_count: self.desired_count,
            load_balancers: self.load_balancers.clone(),
            tags: self.tags.clone(),
            launch_type: None,
        }
    }
}

/// One event from a service's event stream, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceEvent {
    pub id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// In-place update of an existing service.
///
/// `desired_count: None` keeps whatever count the service currently runs,
/// which is how a deploy preserves manual scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service_name: String,
    pub desired_count: Option<i64>,
    pub task_definition: Option<String>,
    pub force_new_deployment: bool,
}

/// Task definition template from a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinitionSpec {
    pub family: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_definitions: Vec<ContainerDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essential: Option<bool>,
}

/// Handle to a registered task definition revision.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTaskDefinition {
    pub arn: TaskDefinitionArn,
    pub family: String,
    pub revision: i64,
}

impl RegisteredTaskDefinition {
    /// The `family:revision` reference services are pointed at.
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.family, self.revision)
    }
}

/// Scalable target attached to a service (resource id is derived from the
/// cluster and service by the client, so the spec does not carry it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalableTargetSpec {
    pub scalable_dimension: String,
    pub min_capacity: i64,
    pub max_capacity: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
}

/// Scaling policy attached to a service. The policy body is carried opaquely;
/// the orchestrator only sequences registration, it never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicySpec {
    pub policy_name: String,
    pub policy_type: String,
    pub scalable_dimension: String,

    #[serde(default, skip_serializing_if = "serde_yaml::Value::is_null")]
    pub configuration: serde_yaml::Value,
}

/// Request to launch one-off tasks outside any service.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTaskSpec {
    pub cluster: String,
    pub task_definition: String,
    pub count: i64,
    pub group: Option<String>,
    pub launch_type: Option<String>,
}

/// Live view of a one-off task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskView {
    pub arn: TaskArn,
    pub last_status: String,
    pub stopped_reason: Option<String>,
    pub containers: Vec<TaskContainerView>,
}

/// Status the control plane reports for a stopped task.
pub const TASK_STATUS_STOPPED: &str = "STOPPED";

#[derive(Debug, Clone, PartialEq)]
pub struct TaskContainerView {
    pub name: String,
    pub exit_code: Option<i64>,
}

impl TaskView {
    pub fn is_stopped(&self) -> bool {
        self.last_status == TASK_STATUS_STOPPED
    }

    /// Containers that stopped with a non-zero (or missing) exit code.
    pub fn failed_containers(&self) -> impl Iterator<Item = &TaskContainerView> {
        self.containers
            .iter()
            .filter(|c| !matches!(c.exit_code, Some(0)))
    }
}

/// Placeholder a manifest may use where the stage target group ARN will be
/// substituted during a blue/green create.
pub const TARGET_GROUP_PLACEHOLDER: &str = "<+targetGroupArn>";

impl ServiceSpec {
    /// Replace placeholder target groups with the given resolved ARN.
    /// Bindings that already carry a concrete target group are left alone.
    pub fn with_target_group(mut self, target_group: &TargetGroupArn) -> Self {
        for binding in &mut self.load_balancers {
            let is_placeholder = binding
                .target_group
                .as_ref()
                .is_none_or(|tg| tg.as_str() == TARGET_GROUP_PLACEHOLDER);
            if is_placeholder {
                binding.target_group = Some(target_group.clone());
            }
        }
        self
    }
}
