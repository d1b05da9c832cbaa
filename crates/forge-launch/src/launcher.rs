//! Start-order enforcement for one service unit.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use forge_core::{ContainerSpec, DependencyCondition, ServiceUnit};
use forge_graph::DependencyGraph;

use crate::error::{LaunchError, LaunchResult};
use crate::runtime::{ContainerHandle, ContainerRuntime, ExitStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContainerState {
    Running { id: String },
    Exited { id: String, code: i32 },
    /// Never started because an upstream condition cannot be met.
    Skipped { reason: String },
    /// The runtime refused to start it.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerLaunch {
    pub name: String,
    pub state: ContainerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitHealth {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct LaunchReport {
    pub unit: String,
    /// Containers in the order they were considered.
    pub containers: Vec<ContainerLaunch>,
    pub health: UnitHealth,
    /// Why the unit is unhealthy; empty when healthy.
    pub reasons: Vec<String>,
}

impl LaunchReport {
    pub fn container(&self, name: &str) -> Option<&ContainerState> {
        self.containers
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.state)
    }

    pub fn is_healthy(&self) -> bool {
        self.health == UnitHealth::Healthy
    }
}

/// Observed facts about one container during a launch.
#[derive(Default)]
struct Observed {
    handle: Option<ContainerHandle>,
    exit: Option<ExitStatus>,
    healthy: Option<bool>,
    /// `Skipped` or `Failed` when no handle was obtained.
    not_started: Option<ContainerState>,
}

pub struct UnitLauncher {
    runtime: Arc<dyn ContainerRuntime>,
}

impl UnitLauncher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Containers of `unit` in an order where every upstream precedes its
    /// dependents. Independent containers are ordered by name.
    pub fn start_order(unit: &ServiceUnit) -> LaunchResult<Vec<String>> {
        let mut graph = DependencyGraph::new();
        for container in &unit.containers {
            graph.add_node(container.name.clone());
        }
        for container in &unit.containers {
            for dep in &container.depends_on {
                if !graph.contains(&dep.container) {
                    return Err(LaunchError::UnknownDependency {
                        container: container.name.clone(),
                        upstream: dep.container.clone(),
                    });
                }
                graph.add_edge(container.name.clone(), dep.container.clone());
            }
        }
        graph.topological_order().map_err(|members| LaunchError::Cycle {
            unit: unit.name.clone(),
            members,
        })
    }

    /// Start every container of `unit` whose upstream conditions hold.
    ///
    /// Returns an error only for a malformed unit (unknown upstream,
    /// cycle); container-level problems are reported in the
    /// [`LaunchReport`].
    pub async fn launch(&self, unit: &ServiceUnit) -> LaunchResult<LaunchReport> {
        let order = Self::start_order(unit)?;
        let specs: BTreeMap<&str, &ContainerSpec> =
            unit.containers.iter().map(|c| (c.name.as_str(), c)).collect();
        let mut observed: BTreeMap<String, Observed> = BTreeMap::new();
        let mut reasons = Vec::new();

        info!(unit = %unit.name, containers = order.len(), "launching unit");

        for name in &order {
            let Some(spec) = specs.get(name.as_str()).copied() else {
                continue;
            };

            let mut unmet = None;
            for dep in &spec.depends_on {
                if let Some(reason) = self.condition(&dep.container, dep.condition, &mut observed).await {
                    unmet = Some(reason);
                    break;
                }
            }
            if let Some(reason) = unmet {
                warn!(unit = %unit.name, container = %name, reason = %reason, "container skipped");
                reasons.push(format!("{name} skipped: {reason}"));
                observed.entry(name.clone()).or_default().not_started =
                    Some(ContainerState::Skipped { reason });
                continue;
            }

            match self.runtime.start(spec).await {
                Ok(handle) => {
                    debug!(unit = %unit.name, container = %name, id = %handle.id, "container started");
                    observed.entry(name.clone()).or_default().handle = Some(handle);
                }
                Err(err) => {
                    warn!(unit = %unit.name, container = %name, error = %err, "container failed to start");
                    reasons.push(format!("{name} failed to start: {err}"));
                    observed.entry(name.clone()).or_default().not_started = Some(ContainerState::Failed {
                        error: err.to_string(),
                    });
                }
            }
        }

        let mut containers = Vec::with_capacity(order.len());
        for name in &order {
            let facts = observed.remove(name).unwrap_or_default();
            let essential = specs.get(name.as_str()).is_some_and(|s| s.essential);
            let state = match (facts.handle, facts.exit, facts.not_started) {
                (Some(handle), Some(exit), _) => {
                    if essential && !exit.success() {
                        reasons.push(format!("essential container {name} exited with {exit}"));
                    }
                    ContainerState::Exited {
                        id: handle.id,
                        code: exit.code,
                    }
                }
                (Some(handle), None, _) => ContainerState::Running { id: handle.id },
                (None, _, Some(state)) => state,
                (None, _, None) => ContainerState::Skipped {
                    reason: "not reached".to_string(),
                },
            };
            containers.push(ContainerLaunch {
                name: name.clone(),
                state,
            });
        }

        let health = if reasons.is_empty() {
            UnitHealth::Healthy
        } else {
            UnitHealth::Unhealthy
        };
        info!(unit = %unit.name, ?health, "unit launched");
        Ok(LaunchReport {
            unit: unit.name.clone(),
            containers,
            health,
            reasons,
        })
    }

    /// `None` when `upstream` satisfies `condition`, otherwise the reason
    /// it never will.
    async fn condition(
        &self,
        upstream: &str,
        condition: DependencyCondition,
        observed: &mut BTreeMap<String, Observed>,
    ) -> Option<String> {
        let facts = observed.entry(upstream.to_string()).or_default();
        let Some(handle) = facts.handle.clone() else {
            return Some(format!("{upstream} was never started"));
        };
        match condition {
            DependencyCondition::Start => None,
            DependencyCondition::Complete | DependencyCondition::Success => {
                let exit = match facts.exit {
                    Some(exit) => exit,
                    None => match self.runtime.wait_exit(&handle).await {
                        Ok(exit) => {
                            facts.exit = Some(exit);
                            exit
                        }
                        Err(err) => return Some(format!("waiting for {upstream} to exit: {err}")),
                    },
                };
                if condition == DependencyCondition::Success && !exit.success() {
                    Some(format!("{upstream} exited with {exit}, {condition} required"))
                } else {
                    None
                }
            }
            DependencyCondition::Healthy => {
                let healthy = match facts.healthy {
                    Some(healthy) => healthy,
                    None => {
                        let healthy = self.runtime.wait_healthy(&handle).await.unwrap_or(false);
                        facts.healthy = Some(healthy);
                        healthy
                    }
                };
                (!healthy).then(|| format!("{upstream} never became healthy"))
            }
        }
    }
}
