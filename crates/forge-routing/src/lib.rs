//! forge-routing — where traffic goes once a stack is running.
//!
//! A [`TargetGroup`] is the runtime side of a load-balancing rule: the
//! registered replicas of one service, each with its own health tracker.
//! Only healthy replicas are eligible, and the [`RoundRobinBalancer`]
//! rotates over whatever is eligible at the moment of selection.
//!
//! The [`ServiceRegistry`] resolves discovery names (`gateway.chat.local`)
//! to addresses and renders the OpenAI-compatible base URL services use
//! to reach each other.

pub mod balancer;
pub mod error;
pub mod registry;
pub mod target_group;

pub use balancer::RoundRobinBalancer;
pub use error::{RoutingError, RoutingResult};
pub use registry::{ServiceEndpoint, ServiceRegistry};
pub use target_group::{Target, TargetGroup};
