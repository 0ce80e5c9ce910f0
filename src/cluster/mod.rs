// ABOUTME: Cluster control plane seam: capability traits, data model, errors.
// ABOUTME: Implementations live outside this crate; tests script a fake.

mod error;
mod factory;
mod ops;
mod types;

pub use error::{ClusterError, ClusterErrorKind};
pub use factory::{ClientFactory, ClientKey, CredentialsHandle};
pub use ops::{LoadBalancingOps, ScalingOps, ServiceOps, TaskOps};
pub use types::{
    ContainerDefinition, LoadBalancerBinding, RegisteredTaskDefinition, RunTaskSpec,
    ScalableTargetSpec, ScalingPolicySpec, ServiceEvent, ServiceSpec, ServiceStatus, ServiceUpdate,
    ServiceView, TASK_STATUS_STOPPED, TARGET_GROUP_PLACEHOLDER, TaskContainerView,
    TaskDefinitionSpec, TaskView,
};
