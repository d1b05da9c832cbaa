//! redb table definitions for the StackForge state store.
//!
//! Every key starts with `{stack}/` so a prefix scan selects one stack.

use redb::TableDefinition;

/// Applied resources keyed by `{stack}/{kind}/{name}`.
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

/// Resolved stack outputs keyed by `{stack}/{output}`.
pub const OUTPUTS: TableDefinition<&str, &[u8]> = TableDefinition::new("outputs");

/// Generated secret material keyed by `{stack}/{secret}`.
pub const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");
