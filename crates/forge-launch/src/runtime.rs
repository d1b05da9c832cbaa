//! The container runtime seam.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use forge_core::ContainerSpec;

use crate::error::LaunchError;

pub type RuntimeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LaunchError>> + Send + 'a>>;

/// A started container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerHandle {
    pub container: String,
    /// Runtime-specific identifier (process id, container id).
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitStatus {
    pub code: i32,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exit code {}", self.code)
    }
}

pub trait ContainerRuntime: Send + Sync {
    fn start<'a>(&'a self, spec: &'a ContainerSpec) -> RuntimeFuture<'a, ContainerHandle>;

    /// Resolve when the container exits.
    fn wait_exit<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, ExitStatus>;

    /// Resolve to `true` once the container reports healthy, `false` if
    /// it never will (it exited or its health check gave up).
    fn wait_healthy<'a>(&'a self, handle: &'a ContainerHandle) -> RuntimeFuture<'a, bool>;
}
