//! forge-launch — starts the containers of one service unit in order.
//!
//! A container may wait on another container of the same unit with a
//! condition: `start`, `complete`, `success` or `healthy`. The launcher
//! orders containers by these dependencies and never starts a container
//! whose condition cannot be met; the unit is then reported unhealthy.
//! One-shot initializers (`success`) are the usual case: schema setup
//! must exit 0 before the application container starts.
//!
//! Containers are started through a [`ContainerRuntime`]. The
//! [`ProcessRuntime`] runs each container's command as a local process.

pub mod error;
pub mod launcher;
pub mod process;
pub mod runtime;

pub use error::{LaunchError, LaunchResult};
pub use launcher::{ContainerLaunch, ContainerState, LaunchReport, UnitHealth, UnitLauncher};
pub use process::ProcessRuntime;
pub use runtime::{ContainerHandle, ContainerRuntime, ExitStatus, RuntimeFuture};
