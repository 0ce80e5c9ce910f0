// ABOUTME: Library root for capstan - rollout orchestration for managed container services.
// ABOUTME: Strategy executors live in deploy; the cluster control plane is a trait seam.

pub mod cluster;
pub mod config;
pub mod deploy;
pub mod error;
pub mod progress;
pub mod types;
