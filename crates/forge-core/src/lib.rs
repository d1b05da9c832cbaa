//! forge-core — shared model for StackForge.
//!
//! A stack is authored as a `stack.toml` file describing the network,
//! secrets, security boundaries, managed database, compute cluster,
//! service units and load balancers of one deployment. This crate parses
//! and validates that file; the graph, engine and runtime crates consume
//! the resulting [`StackConfig`].

pub mod config;
pub mod duration;
pub mod error;
pub mod source;
pub mod types;

pub use config::*;
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
pub use source::ImageSource;
pub use types::*;
