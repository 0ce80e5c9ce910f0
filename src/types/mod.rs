// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ARN confusion at compile time.

mod id;
mod service_name;

pub use id::{Id, ListenerArn, ListenerRuleArn, TargetGroupArn, TaskArn, TaskDefinitionArn};
pub use service_name::{ServiceName, ServiceNameError};
