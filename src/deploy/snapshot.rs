// ABOUTME: Rollback snapshots: capture a service's prior state before mutating it.
// ABOUTME: Payloads are serialized YAML, opaque until a rollback parses them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::{
    ScalableTargetSpec, ScalingOps, ScalingPolicySpec, ServiceOps, ServiceSpec, ServiceStatus,
};
use crate::progress::ProgressSink;

use super::error::DeployError;

/// Everything needed to put a service back the way it was.
///
/// Captured before any mutation. The service spec and scaling resources are
/// stored as YAML strings so the snapshot survives transport through job
/// queues and result stores without this crate dictating their schema;
/// capture order of targets and policies is preserved because restore
/// replays them in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackSnapshot {
    pub service_name: String,

    pub cluster: String,

    /// True when there was nothing live to capture: the service did not
    /// exist, or only a draining/inactive husk of it did. Rolling back a
    /// first deployment deletes what the deploy created and nothing more.
    pub first_deployment: bool,

    /// The prior desired state, serialized to YAML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Scalable targets in capture order, each serialized to YAML.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scalable_targets: Vec<String>,

    /// Scaling policies in capture order, each serialized to YAML.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scaling_policies: Vec<String>,

    pub captured_at: DateTime<Utc>,
}

impl RollbackSnapshot {
    /// Record the current state of `service_name` in `cluster`.
    ///
    /// Never mutates anything. A service that is absent, draining, or
    /// inactive yields a first-deployment snapshot.
    pub async fn capture<C>(
        client: &C,
        cluster: &str,
        service_name: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Self, DeployError>
    where
        C: ServiceOps + ScalingOps,
    {
        let view = client.describe_service(cluster, service_name).await?;

        let live = match view {
            Some(v) if v.status == ServiceStatus::Active => v,
            Some(v) => {
                progress.detail(&format!(
                    "service {service_name} is {:?}, treating as first deployment",
                    v.status
                ));
                return Ok(Self::first_deployment(cluster, service_name));
            }
            None => {
                progress.detail(&format!(
                    "service {service_name} does not exist, treating as first deployment"
                ));
                return Ok(Self::first_deployment(cluster, service_name));
            }
        };

        progress.progress(&format!(
            "capturing rollback snapshot of {service_name} (desired count {})",
            live.desired_count
        ));

        let service = serialize("service state", &live.to_spec())?;

        let mut scalable_targets = Vec::new();
        for target in client.list_scalable_targets(cluster, service_name).await? {
            scalable_targets.push(serialize("scalable target", &target)?);
        }

        let mut scaling_policies = Vec::new();
        for policy in client.list_scaling_policies(cluster, service_name).await? {
            scaling_policies.push(serialize("scaling policy", &policy)?);
        }

        Ok(Self {
            service_name: service_name.to_string(),
            cluster: cluster.to_string(),
            first_deployment: false,
            service: Some(service),
            scalable_targets,
            scaling_policies,
            captured_at: Utc::now(),
        })
    }

    fn first_deployment(cluster: &str, service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            cluster: cluster.to_string(),
            first_deployment: true,
            service: None,
            scalable_targets: Vec::new(),
            scaling_policies: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    /// Parse the captured desired state back into a spec.
    pub fn service_spec(&self) -> Result<Option<ServiceSpec>, DeployError> {
        self.service
            .as_deref()
            .map(|yaml| parse("service state", yaml))
            .transpose()
    }

    /// Parse the captured scalable targets, in capture order.
    pub fn scalable_target_specs(&self) -> Result<Vec<ScalableTargetSpec>, DeployError> {
        self.scalable_targets
            .iter()
            .map(|yaml| parse("scalable target", yaml))
            .collect()
    }

    /// Parse the captured scaling policies, in capture order.
    pub fn scaling_policy_specs(&self) -> Result<Vec<ScalingPolicySpec>, DeployError> {
        self.scaling_policies
            .iter()
            .map(|yaml| parse("scaling policy", yaml))
            .collect()
    }
}

fn serialize<T: Serialize>(what: &str, value: &T) -> Result<String, DeployError> {
    serde_yaml::to_string(value)
        .map_err(|e| DeployError::Snapshot(format!("could not serialize {what}: {e}")))
}

pub(crate) fn parse<T: for<'de> Deserialize<'de>>(what: &str, yaml: &str) -> Result<T, DeployError> {
    serde_yaml::from_str(yaml)
        .map_err(|e| DeployError::Snapshot(format!("could not parse captured {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_snapshot() -> RollbackSnapshot {
        let spec = ServiceSpec {
            service_name: "ecssvc".to_string(),
            cluster: Some("prod".to_string()),
            task_definition: Some("ecssvc:7".to_string()),
            desired_count: 8,
            load_balancers: Vec::new(),
            tags: BTreeMap::new(),
            launch_type: None,
        };
        RollbackSnapshot {
            service_name: "ecssvc".to_string(),
            cluster: "prod".to_string(),
            first_deployment: false,
            service: Some(serde_yaml::to_string(&spec).unwrap()),
            scalable_targets: vec![
                serde_yaml::to_string(&ScalableTargetSpec {
                    scalable_dimension: "ecs:service:DesiredCount".to_string(),
                    min_capacity: 2,
                    max_capacity: 10,
                    role_arn: None,
                })
                .unwrap(),
            ],
            scaling_policies: Vec::new(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let snapshot = sample_snapshot();
        let yaml = serde_yaml::to_string(&snapshot).expect("should serialize");
        let restored: RollbackSnapshot = serde_yaml::from_str(&yaml).expect("should deserialize");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn captured_payloads_parse_back_to_specs() {
        let snapshot = sample_snapshot();

        let spec = snapshot
            .service_spec()
            .expect("should parse")
            .expect("should be present");
        assert_eq!(spec.service_name, "ecssvc");
        assert_eq!(spec.desired_count, 8);

        let targets = snapshot.scalable_target_specs().expect("should parse");
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].max_capacity, 10);
    }

    #[test]
    fn corrupted_payload_is_a_snapshot_error() {
        let mut snapshot = sample_snapshot();
        snapshot.service = Some(": not yaml {".to_string());
        let err = snapshot.service_spec().expect_err("should fail");
        assert!(matches!(err, DeployError::Snapshot(_)));
    }

    #[test]
    fn first_deployment_snapshot_has_no_payloads() {
        let snapshot = RollbackSnapshot::first_deployment("prod", "ecssvc");
        assert!(snapshot.first_deployment);
        assert!(snapshot.service.is_none());
        assert!(snapshot.scalable_targets.is_empty());
        assert!(snapshot.scaling_policies.is_empty());
        assert!(snapshot.service_spec().expect("should parse").is_none());
    }
}
