// ABOUTME: Capability traits for the cluster control plane.
// ABOUTME: Service lifecycle, app autoscaling, load balancer rules, and one-off tasks.

use async_trait::async_trait;

use super::error::ClusterError;
use super::types::{
    RegisteredTaskDefinition, RunTaskSpec, ScalableTargetSpec, ScalingPolicySpec, ServiceSpec,
    ServiceUpdate, ServiceView, TaskDefinitionSpec, TaskView,
};
use crate::types::{ListenerArn, ListenerRuleArn, TargetGroupArn, TaskArn};

/// Service and task definition lifecycle operations.
///
/// Implementations are provided by the surrounding system; this crate only
/// consumes them. Absence of a service is data (`Option`), not an error:
/// callers decide whether a missing service matters.
#[async_trait]
pub trait ServiceOps: Send + Sync {
    /// Register a new revision of a task definition family.
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<RegisteredTaskDefinition, ClusterError>;

    /// Create a service from the given desired state.
    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceView, ClusterError>;

    /// Update an existing service in place.
    async fn update_service(&self, update: &ServiceUpdate) -> Result<ServiceView, ClusterError>;

    /// Delete a service. The service drains before going inactive.
    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), ClusterError>;

    /// Look up a single service. Returns `None` when it does not exist.
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceView>, ClusterError>;

    /// Set a tag on a service, replacing any existing value for the key.
    async fn tag_service(
        &self,
        cluster: &str,
        service: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ClusterError>;
}

/// Application autoscaling operations scoped to one service.
#[async_trait]
pub trait ScalingOps: Send + Sync {
    async fn list_scalable_targets(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<ScalableTargetSpec>, ClusterError>;

    async fn register_scalable_target(
        &self,
        cluster: &str,
        service: &str,
        spec: &ScalableTargetSpec,
    ) -> Result<(), ClusterError>;

    async fn deregister_scalable_target(
        &self,
        cluster: &str,
        service: &str,
        scalable_dimension: &str,
    ) -> Result<(), ClusterError>;

    async fn list_scaling_policies(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<ScalingPolicySpec>, ClusterError>;

    async fn put_scaling_policy(
        &self,
        cluster: &str,
        service: &str,
        spec: &ScalingPolicySpec,
    ) -> Result<(), ClusterError>;

    async fn delete_scaling_policy(
        &self,
        cluster: &str,
        service: &str,
        policy_name: &str,
        scalable_dimension: &str,
    ) -> Result<(), ClusterError>;
}

/// Load balancer listener rule operations used by blue/green swaps.
#[async_trait]
pub trait LoadBalancingOps: Send + Sync {
    /// Resolve the target group a listener rule currently forwards to.
    /// `rule: None` means the listener's default rule.
    async fn target_group_for_rule(
        &self,
        listener: &ListenerArn,
        rule: Option<&ListenerRuleArn>,
    ) -> Result<TargetGroupArn, ClusterError>;

    /// Re-point a listener rule at a different target group.
    /// `rule: None` means the listener's default rule.
    async fn modify_listener_rule(
        &self,
        listener: &ListenerArn,
        rule: Option<&ListenerRuleArn>,
        target_group: &TargetGroupArn,
    ) -> Result<(), ClusterError>;
}

/// One-off task operations.
#[async_trait]
pub trait TaskOps: Send + Sync {
    /// Launch tasks and return their views (ARNs at minimum).
    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<TaskView>, ClusterError>;

    /// Describe the listed tasks.
    async fn describe_tasks(
        &self,
        cluster: &str,
        task_arns: &[TaskArn],
    ) -> Result<Vec<TaskView>, ClusterError>;
}
