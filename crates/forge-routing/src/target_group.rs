//! Health-gated target groups.

use serde::Serialize;
use tracing::{debug, info};

use forge_core::LoadBalancingRule;
use forge_health::{HealthCheck, HealthStatus, HealthTracker, ProbeResult, http_probe};

use crate::balancer::RoundRobinBalancer;
use crate::error::{RoutingError, RoutingResult};

/// One replica behind a load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    pub id: String,
    /// `host:port` the health check and traffic go to.
    pub address: String,
}

#[derive(Debug)]
struct Registered {
    target: Target,
    tracker: HealthTracker,
}

/// Replicas of one service plus the health check that decides which of
/// them receive traffic.
#[derive(Debug)]
pub struct TargetGroup {
    name: String,
    check: HealthCheck,
    targets: Vec<Registered>,
    balancer: RoundRobinBalancer,
}

impl TargetGroup {
    pub fn new(name: &str, check: HealthCheck) -> Self {
        Self {
            name: name.to_string(),
            check,
            targets: Vec::new(),
            balancer: RoundRobinBalancer::new(),
        }
    }

    pub fn from_rule(rule: &LoadBalancingRule) -> RoutingResult<Self> {
        Ok(Self::new(&rule.name, HealthCheck::from_spec(&rule.health)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self) -> &HealthCheck {
        &self.check
    }

    /// Register a replica. Re-registering an id replaces its address and
    /// resets its health.
    pub fn register(&mut self, target: Target) {
        let tracker = HealthTracker::new(&self.check);
        debug!(group = %self.name, target = %target.id, address = %target.address, "registered");
        match self.targets.iter_mut().find(|r| r.target.id == target.id) {
            Some(existing) => {
                existing.target = target;
                existing.tracker = tracker;
            }
            None => self.targets.push(Registered { target, tracker }),
        }
    }

    pub fn deregister(&mut self, id: &str) -> bool {
        let before = self.targets.len();
        self.targets.retain(|r| r.target.id != id);
        before != self.targets.len()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Feed one probe result for `id` into its tracker.
    pub fn record(&mut self, id: &str, result: ProbeResult) -> RoutingResult<HealthStatus> {
        let group = &self.name;
        let registered = self
            .targets
            .iter_mut()
            .find(|r| r.target.id == id)
            .ok_or_else(|| RoutingError::UnknownTarget {
                group: group.clone(),
                target: id.to_string(),
            })?;
        let before = registered.tracker.status();
        let after = registered.tracker.record(result);
        if before != after {
            info!(group = %group, target = %id, from = ?before, to = ?after, "target health changed");
        }
        Ok(after)
    }

    pub fn status(&self, id: &str) -> Option<HealthStatus> {
        self.targets
            .iter()
            .find(|r| r.target.id == id)
            .map(|r| r.tracker.status())
    }

    /// Targets currently in rotation.
    pub fn eligible(&self) -> Vec<&Target> {
        self.targets
            .iter()
            .filter(|r| r.tracker.is_healthy())
            .map(|r| &r.target)
            .collect()
    }

    /// Next eligible target, round-robin.
    pub fn next_target(&self) -> Option<&Target> {
        self.balancer.pick(&self.eligible()).copied()
    }

    /// Probe every registered target once and record the results.
    pub async fn probe_all(&mut self) -> Vec<(String, HealthStatus)> {
        let mut results = Vec::with_capacity(self.targets.len());
        for registered in &mut self.targets {
            let probe = http_probe(&registered.target.address, &self.check).await;
            let status = registered.tracker.record(probe);
            debug!(group = %self.name, target = %registered.target.id, ?probe, ?status, "probed");
            results.push((registered.target.id.clone(), status));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> TargetGroup {
        let check = HealthCheck {
            unhealthy_threshold: 2,
            healthy_threshold: 1,
            ..HealthCheck::default()
        };
        let mut group = TargetGroup::new("web", check);
        for (id, address) in [("webui-1", "10.0.1.10:8080"), ("webui-2", "10.0.1.11:8080")] {
            group.register(Target {
                id: id.to_string(),
                address: address.to_string(),
            });
        }
        group
    }

    #[test]
    fn unproven_targets_are_not_eligible() {
        let group = group();
        assert!(group.eligible().is_empty());
        assert!(group.next_target().is_none());
    }

    #[test]
    fn unhealthy_replica_leaves_rotation_and_returns() {
        let mut group = group();
        group.record("webui-1", ProbeResult::Healthy).unwrap();
        group.record("webui-2", ProbeResult::Healthy).unwrap();
        assert_eq!(group.eligible().len(), 2);

        group.record("webui-2", ProbeResult::Unhealthy).unwrap();
        assert_eq!(group.eligible().len(), 2, "one failure is under threshold");
        group.record("webui-2", ProbeResult::Unhealthy).unwrap();
        let eligible: Vec<&str> = group.eligible().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(eligible, ["webui-1"]);
        for _ in 0..4 {
            assert_eq!(group.next_target().unwrap().id, "webui-1");
        }

        group.record("webui-2", ProbeResult::Healthy).unwrap();
        assert_eq!(group.eligible().len(), 2);
    }

    #[test]
    fn round_robin_alternates_between_healthy_targets() {
        let mut group = group();
        group.record("webui-1", ProbeResult::Healthy).unwrap();
        group.record("webui-2", ProbeResult::Healthy).unwrap();
        let picks: Vec<String> = (0..4).map(|_| group.next_target().unwrap().id.clone()).collect();
        assert_eq!(picks, ["webui-1", "webui-2", "webui-1", "webui-2"]);
    }

    #[test]
    fn unknown_target_is_an_error() {
        let mut group = group();
        assert!(matches!(
            group.record("webui-9", ProbeResult::Healthy),
            Err(RoutingError::UnknownTarget { .. })
        ));
    }

    #[test]
    fn reregistering_resets_health() {
        let mut group = group();
        group.record("webui-1", ProbeResult::Healthy).unwrap();
        group.register(Target {
            id: "webui-1".to_string(),
            address: "10.0.2.10:8080".to_string(),
        });
        assert_eq!(group.len(), 2);
        assert_eq!(group.status("webui-1"), Some(HealthStatus::Unknown));
        assert!(group.deregister("webui-1"));
        assert!(!group.deregister("webui-1"));
    }

    #[test]
    fn rule_health_spec_becomes_the_check() {
        let config = forge_core::StackConfig::scaffold("chat", "us-east-1");
        let group = TargetGroup::from_rule(&config.load_balancers[0]).unwrap();
        assert_eq!(group.name(), "web");
        assert_eq!(group.check().path, "/health");
        assert_eq!(group.check().expected_status, 200);
    }
}
