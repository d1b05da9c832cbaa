use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use tracing::info;

use forge_engine::{Engine, EngineOptions, LocalProvisioner};
use forge_graph::ResourceKind;
use forge_secrets::SecretVault;

use crate::commands::{existing_state, load_stack};

/// Tear the stack down, dependents first. Secret material is purged
/// only when no secret resource was kept by a retain policy.
pub async fn destroy(stack: &Path, state_dir: &Path) -> Result<()> {
    let config = load_stack(stack)?;
    let Some(store) = existing_state(state_dir)? else {
        println!("Nothing to destroy: no state for stack {}.", config.stack.name);
        return Ok(());
    };

    // Teardown derives every attribute it needs from live state, so the
    // account is only cosmetic here.
    let account = std::env::var("CDK_DEFAULT_ACCOUNT")
        .or_else(|_| std::env::var("AWS_ACCOUNT_ID"))
        .unwrap_or_else(|_| "000000000000".to_string());
    let provisioner = Arc::new(LocalProvisioner::new(&config.stack.region, &account));
    let engine = Engine::new(store.clone(), provisioner, EngineOptions::default());
    let report = engine.destroy(&config.stack.name).await?;
    println!("{report}");

    if !report.is_success() {
        bail!(
            "destroy of stack {} stopped; {} resources left in place",
            config.stack.name,
            report.remaining.len()
        );
    }

    if report.retained.iter().any(|id| id.kind == ResourceKind::Secret) {
        info!(stack = %config.stack.name, "secret retained, keeping stored material");
    } else {
        let purged = SecretVault::new(store, &config.stack.name, &config.secrets)?.purge()?;
        println!("{purged} secrets purged");
    }
    Ok(())
}
