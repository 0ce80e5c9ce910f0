// ABOUTME: Phantom-typed identifiers for compile-time type safety.
// ABOUTME: Prevents accidental swapping of task, task definition, listener, and target group ARNs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum TaskDefinitionMarker {}
pub enum TaskMarker {}
pub enum ListenerMarker {}
pub enum ListenerRuleMarker {}
pub enum TargetGroupMarker {}

/// A type-safe identifier that prevents accidental mixing of different ARN types.
///
/// Using phantom types, this ensures you can't accidentally pass a `TargetGroupArn`
/// where a `ListenerArn` is expected, catching bugs at compile time. The swap
/// operations in blue/green deployments juggle several ARNs at once, which is
/// exactly where string identifiers get crossed.
#[must_use = "ARNs reference control plane resources and should not be ignored"]
pub struct Id<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// Manual trait implementations that don't require T to implement the trait.
// This is necessary because T is only used as a phantom type marker.

impl<T> std::fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Id").field("value", &self.value).finish()
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> std::fmt::Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

pub type TaskDefinitionArn = Id<TaskDefinitionMarker>;
pub type TaskArn = Id<TaskMarker>;
pub type ListenerArn = Id<ListenerMarker>;
pub type ListenerRuleArn = Id<ListenerRuleMarker>;
pub type TargetGroupArn = Id<TargetGroupMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_displays_the_raw_value() {
        let arn = TargetGroupArn::new("arn:elb:targetgroup/tg-prod");
        assert_eq!(arn.as_str(), "arn:elb:targetgroup/tg-prod");
        assert_eq!(arn.to_string(), "arn:elb:targetgroup/tg-prod");
        assert_eq!(arn.into_inner(), "arn:elb:targetgroup/tg-prod");
    }

    #[test]
    fn equality_compares_values_within_one_type() {
        assert_eq!(ListenerArn::new("arn:a"), ListenerArn::new("arn:a"));
        assert_ne!(ListenerArn::new("arn:a"), ListenerArn::new("arn:b"));
    }

    #[test]
    fn serializes_as_a_plain_string() {
        // Snapshot payloads embed ARNs; they must round-trip as bare strings.
        let arn = TaskArn::new("arn:aws:ecs:task/1");
        let yaml = serde_yaml::to_string(&arn).expect("should serialize");
        assert_eq!(yaml.trim(), "arn:aws:ecs:task/1");
        let back: TaskArn = serde_yaml::from_str(&yaml).expect("should deserialize");
        assert_eq!(back, arn);
    }
}
