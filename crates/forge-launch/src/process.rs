//! Runs containers as local processes.
//!
//! Each container's `command` is spawned directly with its literal
//! environment. No image is pulled; this runtime is for exercising a
//! unit's start order on a workstation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tokio::process::{Child, Command};
use tracing::debug;

use forge_core::ContainerSpec;

use crate::error::LaunchError;
use crate::runtime::{ContainerHandle, ContainerRuntime, ExitStatus, RuntimeFuture};

#[derive(Default)]
pub struct ProcessRuntime {
    extra_env: BTreeMap<String, String>,
    running: Mutex<HashMap<String, Child>>,
    exited: Mutex<HashMap<String, ExitStatus>>,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment added to every container, e.g. resolved secret values.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.extra_env.insert(key.to_string(), value.to_string());
        self
    }

    fn take_child(&self, id: &str) -> Option<Child> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
    }

    fn exited(&self, id: &str) -> Option<ExitStatus> {
        self.exited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .copied()
    }

    fn record_exit(&self, id: &str, status: ExitStatus) {
        self.exited
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string(), status);
    }
}

impl ContainerRuntime for ProcessRuntime {
    fn start<'a>(&'a self, spec: &'a ContainerSpec) -> RuntimeFuture<'a, ContainerHandle> {
        Box::pin(async move {
            let (program, args) = spec
                .command
                .split_first()
                .ok_or_else(|| LaunchError::runtime(&spec.name, "no command to run"))?;
            let child = Command::new(program)
                .args(args)
                .envs(&spec.env)
                .envs(&self.extra_env)
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| LaunchError::runtime(&spec.name, format!("spawn {program}: {e}")))?;
            let id = child
                .id()
                .map(|pid| pid.to_string())
                .ok_or_else(|| LaunchError::runtime(&spec.name, "exited before it could be tracked"))?;
            debug!(container = %spec.name, pid = %id, "process started");
            self.running
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .insert(id.clone(), child);
            Ok(ContainerHandle {
                container: spec.name.clone(),
                id,
            })
        })
    }

    fn wait_exit<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, ExitStatus> {
        Box::pin(async move {
            if let Some(status) = self.exited(&handle.id) {
                return Ok(status);
            }
            let mut child = self
                .take_child(&handle.id)
                .ok_or_else(|| LaunchError::runtime(&handle.container, "not running"))?;
            let status = child
                .wait()
                .await
                .map_err(|e| LaunchError::runtime(&handle.container, e.to_string()))?;
            // Killed by a signal: report the shell convention.
            let status = ExitStatus {
                code: status.code().unwrap_or(128),
            };
            self.record_exit(&handle.id, status);
            Ok(status)
        })
    }

    /// A process is healthy while it runs.
    fn wait_healthy<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, bool> {
        Box::pin(async move {
            if self.exited(&handle.id).is_some() {
                return Ok(false);
            }
            let mut running = self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let Some(child) = running.get_mut(&handle.id) else {
                return Ok(false);
            };
            match child.try_wait() {
                Ok(None) => Ok(true),
                Ok(Some(_)) | Err(_) => Ok(false),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, script: &str) -> ContainerSpec {
        ContainerSpec {
            name: name.to_string(),
            image: "local".to_string(),
            essential: true,
            cpu: None,
            memory_mb: None,
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            ports: Vec::new(),
            env: BTreeMap::from([("CODE".to_string(), "3".to_string())]),
            env_from: BTreeMap::new(),
            secrets: BTreeMap::new(),
            log_group: None,
            depends_on: Vec::new(),
        }
    }

    #[tokio::test]
    async fn exit_code_is_reported() {
        let runtime = ProcessRuntime::new();
        let handle = runtime.start(&spec("init", "exit $CODE")).await.unwrap();
        let status = runtime.wait_exit(&handle).await.unwrap();
        assert_eq!(status.code, 3);
        assert!(!status.success());
        // Cached after the first wait.
        assert_eq!(runtime.wait_exit(&handle).await.unwrap().code, 3);
        assert!(!runtime.wait_healthy(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn running_process_is_healthy() {
        let runtime = ProcessRuntime::new();
        let handle = runtime.start(&spec("app", "sleep 5")).await.unwrap();
        assert!(runtime.wait_healthy(&handle).await.unwrap());
    }

    #[tokio::test]
    async fn missing_command_is_a_runtime_error() {
        let runtime = ProcessRuntime::new();
        let mut spec = spec("app", "true");
        spec.command.clear();
        assert!(matches!(
            runtime.start(&spec).await,
            Err(LaunchError::Runtime { container, .. }) if container == "app"
        ));
    }
}
