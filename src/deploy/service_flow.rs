// ABOUTME: Shared service lifecycle: create or update in place, wait steady, reattach scaling.
// ABOUTME: Scaling detaches before an update and reattaches after, targets before policies.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cluster::{
    ClusterErrorKind, ScalableTargetSpec, ScalingOps, ScalingPolicySpec, ServiceOps, ServiceSpec,
    ServiceStatus, ServiceUpdate,
};
use crate::config::PollSettings;
use crate::progress::ProgressSink;

use super::error::DeployError;
use super::waiter;

/// Inputs for one create-or-update pass over a single service.
pub(crate) struct ServicePlan<'a> {
    pub spec: &'a ServiceSpec,
    pub scalable_targets: &'a [ScalableTargetSpec],
    pub scaling_policies: &'a [ScalingPolicySpec],
    /// Update without a desired count, keeping whatever the service runs.
    pub same_as_running: bool,
    pub force_new_deployment: bool,
    pub poll: &'a PollSettings,
}

impl<'a> ServicePlan<'a> {
    /// A plan with no scaling resources and default update behavior.
    pub fn bare(spec: &'a ServiceSpec, poll: &'a PollSettings) -> Self {
        Self {
            spec,
            scalable_targets: &[],
            scaling_policies: &[],
            same_as_running: false,
            force_new_deployment: false,
            poll,
        }
    }
}

/// Converge one service onto the plan's desired state.
///
/// An active service is updated in place: its scaling policies and scalable
/// targets are detached first (the control plane rejects updates on services
/// with live autoscaling attachments), and the plan's scaling resources are
/// attached again once the service is steady. A draining service is waited
/// out and recreated; an absent or inactive one is created fresh.
pub(crate) async fn create_or_update_service<C>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    cluster: &str,
    plan: &ServicePlan<'_>,
) -> Result<(), DeployError>
where
    C: ServiceOps + ScalingOps,
{
    let name = plan.spec.service_name.as_str();
    let existing = client.describe_service(cluster, name).await?;
    debug!(
        service = name,
        cluster,
        status = ?existing.as_ref().map(|v| v.status),
        "resolved current service state"
    );

    match existing {
        Some(view) if view.status == ServiceStatus::Active => {
            progress.progress(&format!("updating service {name} in place"));
            detach_scaling(client, cluster, name).await?;

            let update = ServiceUpdate {
                cluster: cluster.to_string(),
                service_name: name.to_string(),
                desired_count: if plan.same_as_running {
                    None
                } else {
                    Some(plan.spec.desired_count)
                },
                task_definition: plan.spec.task_definition.clone(),
                force_new_deployment: plan.force_new_deployment,
            };
            client.update_service(&update).await?;
        }
        Some(view) if view.status == ServiceStatus::Draining => {
            progress.progress(&format!(
                "service {name} is draining, waiting before recreating it"
            ));
            waiter::await_service_inactive(client, cluster, name, plan.poll, progress, cancel)
                .await?;
            progress.progress(&format!("creating service {name}"));
            client.create_service(plan.spec).await?;
        }
        _ => {
            progress.progress(&format!("creating service {name}"));
            client.create_service(plan.spec).await?;
        }
    }

    waiter::await_service_steady(client, cluster, name, plan.poll, progress, cancel).await?;
    attach_scaling(
        client,
        cluster,
        name,
        plan.scalable_targets,
        plan.scaling_policies,
    )
    .await?;

    Ok(())
}

/// Attach scaling resources to a steady service, always targets before
/// policies: a policy referencing an unregistered target is rejected.
pub(crate) async fn attach_scaling<C: ScalingOps>(
    client: &C,
    cluster: &str,
    service: &str,
    targets: &[ScalableTargetSpec],
    policies: &[ScalingPolicySpec],
) -> Result<(), DeployError> {
    for target in targets {
        client
            .register_scalable_target(cluster, service, target)
            .await?;
    }
    for policy in policies {
        client.put_scaling_policy(cluster, service, policy).await?;
    }
    Ok(())
}

/// Detach whatever scaling resources the service currently carries, policies
/// first (the reverse of attachment order).
async fn detach_scaling<C: ScalingOps>(
    client: &C,
    cluster: &str,
    service: &str,
) -> Result<(), DeployError> {
    for policy in client.list_scaling_policies(cluster, service).await? {
        client
            .delete_scaling_policy(
                cluster,
                service,
                &policy.policy_name,
                &policy.scalable_dimension,
            )
            .await?;
    }
    for target in client.list_scalable_targets(cluster, service).await? {
        client
            .deregister_scalable_target(cluster, service, &target.scalable_dimension)
            .await?;
    }
    Ok(())
}

/// Delete a service if it is live, and wait for the name to free up.
///
/// Returns whether anything was actually deleted: an absent, draining, or
/// inactive service is left alone and reported as not deleted. A not-found
/// race on the delete call itself counts as not deleted too.
pub(crate) async fn delete_service_if_active<C: ServiceOps>(
    client: &C,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
    cluster: &str,
    name: &str,
    poll: &PollSettings,
) -> Result<bool, DeployError> {
    match client.describe_service(cluster, name).await? {
        Some(view) if view.status == ServiceStatus::Active => {
            progress.progress(&format!("deleting service {name}"));
            match client.delete_service(cluster, name).await {
                Ok(()) => {}
                Err(e) if e.kind() == ClusterErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            }
            waiter::await_service_inactive(client, cluster, name, poll, progress, cancel).await?;
            Ok(true)
        }
        Some(view) => {
            debug!(service = name, cluster, status = ?view.status, "nothing live to delete");
            Ok(false)
        }
        None => Ok(false),
    }
}
