//! forge-graph — the desired-state resource graph.
//!
//! Expands a validated [`forge_core::StackConfig`] into typed resource
//! nodes joined by explicit dependency edges, then answers ordering
//! questions about it.
//!
//! # Architecture
//!
//! ```text
//! StackConfig
//!   └── GraphBuilder::from_stack
//!         ├── SubnetLayout (tier × zone CIDR allocation, route targets)
//!         ├── node expansion (network, subnets, gateways, boundaries,
//!         │   rules, secrets, roles, grants, database, cluster, task
//!         │   definitions, services, discovery, load balancers)
//!         ├── reference resolution (dangling → error, nothing mutated)
//!         └── topology invariants (isolated/public tier placement,
//!             single-ingress database boundary)
//!               → ResourceGraph
//!                   ├── creation_order()    Kahn, lexicographic ties
//!                   ├── destruction_order() exact reverse
//!                   └── waves()             independent layers
//! ```
//!
//! Ordering never depends on declaration order: edges are data, and
//! ties are broken by resource id.

pub mod builder;
pub mod error;
pub mod graph;
pub mod layout;
pub mod order;
pub mod resource;

pub use builder::GraphBuilder;
pub use error::{DanglingRef, GraphError, GraphResult};
pub use graph::ResourceGraph;
pub use layout::{RouteTarget, Subnet, SubnetLayout};
pub use order::DependencyGraph;
pub use resource::{Binding, ResourceId, ResourceKind, ResourceNode};
