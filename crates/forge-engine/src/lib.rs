//! forge-engine — turns a resource graph into live resources.
//!
//! # Architecture
//!
//! ```text
//! ResourceGraph + live ResourceRecords
//!   └── Plan::compute           Create / Update / Delete / NoOp per resource
//!         └── Engine::apply     wave by wave, bounded JoinSet per wave
//!               ├── Provisioner::create|update, then wait_ready
//!               ├── StateStore: Creating → Ready | Failed, one commit per resource
//!               ├── on failure: stop, report, optional orphan rollback
//!               └── outputs rendered from ready attributes
//! Engine::destroy              reverse dependency order, deletion policies
//! ```
//!
//! Provisioning backends implement [`Provisioner`]. [`LocalProvisioner`]
//! synthesizes deterministic attributes so a full deploy runs offline.

pub mod destroy;
pub mod engine;
pub mod error;
pub mod local;
pub mod plan;
pub mod provisioner;
pub mod report;

#[cfg(test)]
mod testing;

pub use engine::{Engine, EngineOptions, RollbackPolicy, render_outputs};
pub use error::{EngineError, EngineResult, ProvisionError};
pub use local::LocalProvisioner;
pub use plan::{Change, ChangeKind, Plan};
pub use provisioner::{Attributes, ProvisionFuture, ProvisionRequest, Provisioner};
pub use report::{ApplyReport, DestroyReport, FailedResource};
