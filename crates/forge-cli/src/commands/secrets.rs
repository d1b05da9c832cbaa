use std::path::Path;

use anyhow::{Context, Result};

use forge_secrets::SecretVault;

use crate::commands::{bootstrap_state, load_stack};

/// Dependents keep the reference; they see the new material on their
/// next restart.
pub fn rotate(stack: &Path, state_dir: &Path, secret: &str) -> Result<()> {
    let config = load_stack(stack)?;
    let store = bootstrap_state(state_dir)?;
    let mut vault = SecretVault::new(store, &config.stack.name, &config.secrets)?;
    let reference = vault
        .rotate(secret)
        .with_context(|| format!("rotating secret {secret}"))?;
    println!("✓ rotated {} ({})", reference.name(), reference.locator());
    Ok(())
}
