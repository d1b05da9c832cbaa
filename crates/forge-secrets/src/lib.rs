//! forge-secrets — generated credentials, consumed by reference.
//!
//! Every secret declared in a stack has exactly one [`SecretPolicy`]
//! (length, excluded characters). Material is generated once per stack by
//! the [`SecretVault`], persisted in the state store, and reused on every
//! later deploy until it is explicitly rotated.
//!
//! Consumers never see material in configuration. They hold a
//! [`SecretRef`], an opaque capability naming where the material lives;
//! only the vault turns a reference back into a value.

pub mod error;
pub mod policy;
pub mod reference;
pub mod vault;

pub use error::{SecretError, SecretResult};
pub use policy::{SecretMaterial, SecretPolicy};
pub use reference::SecretRef;
pub use vault::SecretVault;
