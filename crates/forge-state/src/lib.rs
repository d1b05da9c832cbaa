//! forge-state — live state of an applied stack.
//!
//! Backed by [redb](https://docs.rs/redb). Records what the engine has
//! actually provisioned: one `ResourceRecord` per resource (with the
//! fingerprint of the desired properties it was applied from), the
//! stack's resolved outputs, and generated secret material.
//!
//! # Architecture
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns.
//! Keys are prefixed with the stack name (`{stack}/...`) so one store can
//! hold several stacks and a prefix scan lists one of them.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across the engine's concurrent apply tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
