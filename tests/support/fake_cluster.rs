// ABOUTME: In-memory scriptable control plane implementing the cluster capability traits.
// ABOUTME: Records every call, emulates convergence, and injects failures on demand.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use capstan::cluster::{
    ClusterError, LoadBalancingOps, RegisteredTaskDefinition, RunTaskSpec, ScalableTargetSpec,
    ScalingOps, ScalingPolicySpec, ServiceOps, ServiceSpec, ServiceStatus, ServiceUpdate,
    ServiceView, TASK_STATUS_STOPPED, TaskContainerView, TaskDefinitionSpec, TaskOps, TaskView,
};
use capstan::types::{ListenerArn, ListenerRuleArn, TargetGroupArn, TaskArn, TaskDefinitionArn};

/// How many extra describes a draining service needs before it goes inactive.
const DRAIN_PROBES: usize = 1;

struct FakeService {
    view: ServiceView,
    /// Describes needed before the service reports steady. `usize::MAX`
    /// never settles.
    settles_after: usize,
    probes: usize,
}

struct FakeTask {
    view: TaskView,
    stops_after: usize,
    probes: usize,
    exit_code: Option<i64>,
}

#[derive(Default)]
struct State {
    services: BTreeMap<String, FakeService>,
    task_definitions: Vec<String>,
    scalable_targets: BTreeMap<String, Vec<ScalableTargetSpec>>,
    scaling_policies: BTreeMap<String, Vec<ScalingPolicySpec>>,
    rules: BTreeMap<String, TargetGroupArn>,
    tasks: BTreeMap<String, FakeTask>,
    task_counter: usize,
    /// Applied to services created or updated from now on.
    default_settle: usize,
    /// Applied to tasks launched from now on.
    task_stops_after: usize,
    task_exit_code: Option<i64>,
    calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ClusterError>>,
}

/// Scriptable in-memory cluster. Shared behind an `Arc` between the test and
/// the orchestrator under test.
pub struct FakeCluster {
    state: Mutex<State>,
}

fn service_key(cluster: &str, name: &str) -> String {
    format!("{cluster}/{name}")
}

fn rule_key(listener: &ListenerArn, rule: Option<&ListenerRuleArn>) -> String {
    match rule {
        Some(rule) => format!("{listener}#{rule}"),
        None => listener.to_string(),
    }
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                task_exit_code: Some(0),
                ..State::default()
            }),
        })
    }

    /// Seed an active, already-steady service.
    pub fn seed_service(&self, cluster: &str, name: &str, desired: i64) {
        self.seed_service_with(ServiceView {
            service_name: name.to_string(),
            cluster: cluster.to_string(),
            status: ServiceStatus::Active,
            desired_count: desired,
            running_count: desired,
            pending_count: 0,
            task_definition: Some(format!("{name}:1")),
            load_balancers: Vec::new(),
            tags: BTreeMap::new(),
            deployment_count: 1,
            events: Vec::new(),
        });
    }

    pub fn seed_service_with(&self, view: ServiceView) {
        let key = service_key(&view.cluster, &view.service_name);
        self.state.lock().services.insert(
            key,
            FakeService {
                view,
                settles_after: 0,
                probes: 0,
            },
        );
    }

    /// Tag a seeded service without going through the traits.
    pub fn set_tag(&self, cluster: &str, name: &str, key: &str, value: &str) {
        let mut state = self.state.lock();
        if let Some(service) = state.services.get_mut(&service_key(cluster, name)) {
            service.view.tags.insert(key.to_string(), value.to_string());
        }
    }

    /// Services created or updated after this call need `probes` describes
    /// to reach steady state. `usize::MAX` means they never settle.
    pub fn set_default_settle(&self, probes: usize) {
        self.state.lock().default_settle = probes;
    }

    /// Make one existing service never reach steady state.
    pub fn never_settle(&self, cluster: &str, name: &str) {
        let mut state = self.state.lock();
        if let Some(service) = state.services.get_mut(&service_key(cluster, name)) {
            service.settles_after = usize::MAX;
            service.probes = 0;
        }
    }

    /// Bind a listener rule to a target group. `rule: None` is the default
    /// rule of the listener.
    pub fn set_rule(&self, listener: &str, rule: Option<&str>, target_group: &str) {
        let key = rule_key(
            &ListenerArn::new(listener),
            rule.map(ListenerRuleArn::new).as_ref(),
        );
        self.state
            .lock()
            .rules
            .insert(key, TargetGroupArn::new(target_group));
    }

    /// Current target group of a listener rule.
    pub fn rule_target(&self, listener: &str, rule: Option<&str>) -> Option<String> {
        let key = rule_key(
            &ListenerArn::new(listener),
            rule.map(ListenerRuleArn::new).as_ref(),
        );
        self.state
            .lock()
            .rules
            .get(&key)
            .map(|tg| tg.to_string())
    }

    /// Attach a scalable target to a service without going through the traits.
    pub fn seed_scalable_target(&self, cluster: &str, name: &str, spec: ScalableTargetSpec) {
        self.state
            .lock()
            .scalable_targets
            .entry(service_key(cluster, name))
            .or_default()
            .push(spec);
    }

    /// Attach a scaling policy to a service without going through the traits.
    pub fn seed_scaling_policy(&self, cluster: &str, name: &str, spec: ScalingPolicySpec) {
        self.state
            .lock()
            .scaling_policies
            .entry(service_key(cluster, name))
            .or_default()
            .push(spec);
    }

    /// Tasks launched after this call stop with the given exit code.
    pub fn set_task_exit_code(&self, exit_code: Option<i64>) {
        self.state.lock().task_exit_code = exit_code;
    }

    /// Tasks launched after this call keep running for `probes` describes
    /// before stopping.
    pub fn set_task_stops_after(&self, probes: usize) {
        self.state.lock().task_stops_after = probes;
    }

    /// Forget everything recorded so far. Useful after seeding through the
    /// traits, so assertions see only the calls the code under test made.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Queue a failure for the next call to `method`.
    pub fn fail_next(&self, method: &'static str, error: ClusterError) {
        self.state
            .lock()
            .failures
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Everything that was called, in order, one formatted line per call.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// The calls whose formatted line starts with `prefix`, in order.
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Current view of a service, bypassing convergence emulation.
    pub fn service(&self, cluster: &str, name: &str) -> Option<ServiceView> {
        self.state
            .lock()
            .services
            .get(&service_key(cluster, name))
            .map(|s| s.view.clone())
    }

    pub fn scalable_targets(&self, cluster: &str, name: &str) -> Vec<ScalableTargetSpec> {
        self.state
            .lock()
            .scalable_targets
            .get(&service_key(cluster, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn scaling_policies(&self, cluster: &str, name: &str) -> Vec<ScalingPolicySpec> {
        self.state
            .lock()
            .scaling_policies
            .get(&service_key(cluster, name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn registered_task_definitions(&self) -> Vec<String> {
        self.state.lock().task_definitions.clone()
    }
}

impl State {
    fn take_failure(&mut self, method: &'static str) -> Result<(), ClusterError> {
        if let Some(queue) = self.failures.get_mut(method) {
            if let Some(err) = queue.pop_front() {
                return Err(err);
            }
        }
        Ok(())
    }

    fn record(&mut self, line: String) {
        self.calls.push(line);
    }
}

#[async_trait]
impl ServiceOps for FakeCluster {
    async fn register_task_definition(
        &self,
        spec: &TaskDefinitionSpec,
    ) -> Result<RegisteredTaskDefinition, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("register_task_definition {}", spec.family));
        state.take_failure("register_task_definition")?;

        state.task_definitions.push(spec.family.clone());
        let revision = state
            .task_definitions
            .iter()
            .filter(|family| **family == spec.family)
            .count() as i64;
        Ok(RegisteredTaskDefinition {
            arn: TaskDefinitionArn::new(format!(
                "arn:aws:ecs:task-definition/{}:{revision}",
                spec.family
            )),
            family: spec.family.clone(),
            revision,
        })
    }

    async fn create_service(&self, spec: &ServiceSpec) -> Result<ServiceView, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("create_service {}", spec.service_name));
        state.take_failure("create_service")?;

        let cluster = spec.cluster.clone().unwrap_or_default();
        let key = service_key(&cluster, &spec.service_name);
        if let Some(existing) = state.services.get(&key) {
            if existing.view.status != ServiceStatus::Inactive {
                return Err(ClusterError::InvalidRequest {
                    message: format!(
                        "service {} already exists and is {:?}",
                        spec.service_name, existing.view.status
                    ),
                });
            }
        }

        let view = ServiceView {
            service_name: spec.service_name.clone(),
            cluster,
            status: ServiceStatus::Active,
            desired_count: spec.desired_count,
            running_count: 0,
            pending_count: spec.desired_count,
            task_definition: spec.task_definition.clone(),
            load_balancers: spec.load_balancers.clone(),
            tags: spec.tags.clone(),
            deployment_count: 1,
            events: Vec::new(),
        };
        let settles_after = state.default_settle;
        state.services.insert(
            key,
            FakeService {
                view: view.clone(),
                settles_after,
                probes: 0,
            },
        );
        Ok(view)
    }

    async fn update_service(&self, update: &ServiceUpdate) -> Result<ServiceView, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!(
            "update_service {} desired={:?}",
            update.service_name, update.desired_count
        ));
        state.take_failure("update_service")?;

        let default_settle = state.default_settle;
        let key = service_key(&update.cluster, &update.service_name);
        let service = state
            .services
            .get_mut(&key)
            .ok_or_else(|| ClusterError::not_found("service", update.service_name.clone()))?;
        if service.view.status != ServiceStatus::Active {
            return Err(ClusterError::InvalidRequest {
                message: format!("service {} is not active", update.service_name),
            });
        }
        if let Some(desired) = update.desired_count {
            service.view.desired_count = desired;
        }
        if let Some(task_definition) = &update.task_definition {
            service.view.task_definition = Some(task_definition.clone());
        }
        service.settles_after = default_settle;
        service.probes = 0;
        Ok(service.view.clone())
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("delete_service {service}"));
        state.take_failure("delete_service")?;

        let key = service_key(cluster, service);
        let entry = state
            .services
            .get_mut(&key)
            .ok_or_else(|| ClusterError::not_found("service", service.to_string()))?;
        entry.view.status = ServiceStatus::Draining;
        entry.probes = 0;
        Ok(())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Option<ServiceView>, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("describe_service {service}"));
        state.take_failure("describe_service")?;

        let key = service_key(cluster, service);
        let Some(entry) = state.services.get_mut(&key) else {
            return Ok(None);
        };
        entry.probes += 1;
        match entry.view.status {
            ServiceStatus::Active => {
                if entry.probes > entry.settles_after {
                    entry.view.running_count = entry.view.desired_count;
                    entry.view.pending_count = 0;
                    entry.view.deployment_count = 1;
                } else {
                    entry.view.running_count = (entry.view.desired_count - 1).max(0);
                    entry.view.pending_count = 1;
                    entry.view.deployment_count = 2;
                }
            }
            ServiceStatus::Draining => {
                if entry.probes > DRAIN_PROBES {
                    entry.view.status = ServiceStatus::Inactive;
                    entry.view.running_count = 0;
                    entry.view.desired_count = 0;
                }
            }
            ServiceStatus::Inactive => {}
        }
        Ok(Some(entry.view.clone()))
    }

    async fn tag_service(
        &self,
        cluster: &str,
        service: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("tag_service {service} {key}={value}"));
        state.take_failure("tag_service")?;

        let service_key = service_key(cluster, service);
        let entry = state
            .services
            .get_mut(&service_key)
            .ok_or_else(|| ClusterError::not_found("service", service.to_string()))?;
        entry.view.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[async_trait]
impl ScalingOps for FakeCluster {
    async fn list_scalable_targets(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<ScalableTargetSpec>, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("list_scalable_targets {service}"));
        state.take_failure("list_scalable_targets")?;

        let key = service_key(cluster, service);
        Ok(state.scalable_targets.get(&key).cloned().unwrap_or_default())
    }

    async fn register_scalable_target(
        &self,
        cluster: &str,
        service: &str,
        spec: &ScalableTargetSpec,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("register_scalable_target {service}"));
        state.take_failure("register_scalable_target")?;

        let key = service_key(cluster, service);
        let targets = state.scalable_targets.entry(key).or_default();
        targets.retain(|t| t.scalable_dimension != spec.scalable_dimension);
        targets.push(spec.clone());
        Ok(())
    }

    async fn deregister_scalable_target(
        &self,
        cluster: &str,
        service: &str,
        scalable_dimension: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("deregister_scalable_target {service}"));
        state.take_failure("deregister_scalable_target")?;

        let key = service_key(cluster, service);
        if let Some(targets) = state.scalable_targets.get_mut(&key) {
            targets.retain(|t| t.scalable_dimension != scalable_dimension);
        }
        Ok(())
    }

    async fn list_scaling_policies(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<Vec<ScalingPolicySpec>, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("list_scaling_policies {service}"));
        state.take_failure("list_scaling_policies")?;

        let key = service_key(cluster, service);
        Ok(state.scaling_policies.get(&key).cloned().unwrap_or_default())
    }

    async fn put_scaling_policy(
        &self,
        cluster: &str,
        service: &str,
        spec: &ScalingPolicySpec,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("put_scaling_policy {service} {}", spec.policy_name));
        state.take_failure("put_scaling_policy")?;

        let key = service_key(cluster, service);
        let policies = state.scaling_policies.entry(key).or_default();
        policies.retain(|p| p.policy_name != spec.policy_name);
        policies.push(spec.clone());
        Ok(())
    }

    async fn delete_scaling_policy(
        &self,
        cluster: &str,
        service: &str,
        policy_name: &str,
        _scalable_dimension: &str,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("delete_scaling_policy {service} {policy_name}"));
        state.take_failure("delete_scaling_policy")?;

        let key = service_key(cluster, service);
        if let Some(policies) = state.scaling_policies.get_mut(&key) {
            policies.retain(|p| p.policy_name != policy_name);
        }
        Ok(())
    }
}

#[async_trait]
impl LoadBalancingOps for FakeCluster {
    async fn target_group_for_rule(
        &self,
        listener: &ListenerArn,
        rule: Option<&ListenerRuleArn>,
    ) -> Result<TargetGroupArn, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("target_group_for_rule {listener}"));
        state.take_failure("target_group_for_rule")?;

        let key = rule_key(listener, rule);
        state
            .rules
            .get(&key)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("listener rule", key))
    }

    async fn modify_listener_rule(
        &self,
        listener: &ListenerArn,
        rule: Option<&ListenerRuleArn>,
        target_group: &TargetGroupArn,
    ) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("modify_listener_rule {listener} -> {target_group}"));
        state.take_failure("modify_listener_rule")?;

        let key = rule_key(listener, rule);
        state.rules.insert(key, target_group.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskOps for FakeCluster {
    async fn run_task(&self, spec: &RunTaskSpec) -> Result<Vec<TaskView>, ClusterError> {
        let mut state = self.state.lock();
        state.record(format!("run_task {} x{}", spec.task_definition, spec.count));
        state.take_failure("run_task")?;

        let mut launched = Vec::new();
        for _ in 0..spec.count {
            state.task_counter += 1;
            let arn = format!("arn:aws:ecs:task/{}", state.task_counter);
            let view = TaskView {
                arn: TaskArn::new(&arn),
                last_status: "RUNNING".to_string(),
                stopped_reason: None,
                containers: vec![TaskContainerView {
                    name: "main".to_string(),
                    exit_code: None,
                }],
            };
            let stops_after = state.task_stops_after;
            let exit_code = state.task_exit_code;
            state.tasks.insert(
                arn,
                FakeTask {
                    view: view.clone(),
                    stops_after,
                    probes: 0,
                    exit_code,
                },
            );
            launched.push(view);
        }
        Ok(launched)
    }

    async fn describe_tasks(
        &self,
        _cluster: &str,
        task_arns: &[TaskArn],
    ) -> Result<Vec<TaskView>, ClusterError> {
        let mut state = self.state.lock();
        state.record("describe_tasks".to_string());
        state.take_failure("describe_tasks")?;

        let mut views = Vec::new();
        for arn in task_arns {
            let Some(task) = state.tasks.get_mut(arn.as_str()) else {
                return Err(ClusterError::not_found("task", arn.to_string()));
            };
            task.probes += 1;
            if task.probes > task.stops_after {
                task.view.last_status = TASK_STATUS_STOPPED.to_string();
                for container in &mut task.view.containers {
                    container.exit_code = task.exit_code;
                }
                if task.exit_code != Some(0) {
                    task.view.stopped_reason = Some("essential container exited".to_string());
                }
            }
            views.push(task.view.clone());
        }
        Ok(views)
    }
}
