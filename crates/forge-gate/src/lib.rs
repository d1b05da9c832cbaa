//! forge-gate — the activation gate a container runs before its main
//! process.
//!
//! ```text
//! GateEnv::from_env()          DATABASE_HOST / DATABASE_PORT / DATABASE_USER
//!   └── ActivationGate::wait   Waiting ──(probe reachable)──▶ Ready
//!         │                    fixed interval, each failure logged
//!         │                    bounded by max_attempts, or unbounded
//!         └── Handoff::handoff exec the main command, exactly once
//! ```
//!
//! The gate only proves infrastructure-level reachability (a TCP connect
//! succeeds), not that the schema is migrated.

pub mod env;
pub mod error;
pub mod gate;
pub mod handoff;
pub mod probe;

pub use env::GateEnv;
pub use error::{GateError, GateResult};
pub use gate::{ActivationGate, GateReport, GateState};
pub use handoff::{ExecHandoff, Handoff};
pub use probe::{Probe, ProbeOutcome, TcpProbe};
