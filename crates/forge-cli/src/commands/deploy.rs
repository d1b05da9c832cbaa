use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

use forge_core::{ImageSource, parse_duration};
use forge_engine::{Engine, EngineOptions, LocalProvisioner, Plan, RollbackPolicy};
use forge_secrets::SecretVault;

use crate::commands::plan::print_outputs;
use crate::commands::{bootstrap_state, build_graph, load_stack};
use crate::preflight;

pub struct DeployOptions {
    pub parallelism: usize,
    pub rollback: bool,
    pub ready_timeout: String,
}

impl DeployOptions {
    fn engine_options(&self) -> Result<EngineOptions> {
        if self.parallelism == 0 {
            bail!("--parallelism must be at least 1");
        }
        let ready_timeout = parse_duration(&self.ready_timeout)
            .filter(|d| *d > Duration::ZERO)
            .with_context(|| format!("invalid --ready-timeout {:?}", self.ready_timeout))?;
        Ok(EngineOptions {
            parallelism: self.parallelism,
            rollback: if self.rollback {
                RollbackPolicy::RollbackOrphans
            } else {
                RollbackPolicy::LeaveInPlace
            },
            ready_timeout,
        })
    }
}

/// Preflight, then apply the stack without a confirmation step.
pub async fn deploy(stack: &Path, state_dir: &Path, options: DeployOptions) -> Result<()> {
    let engine_options = options.engine_options()?;
    let config = load_stack(stack)?;
    let env = preflight::check(&config.stack.required_tools)?;
    info!(stack = %config.stack.name, account = %env.account, profile = ?env.profile, "preflight passed");
    let graph = build_graph(&config)?;

    let store = bootstrap_state(state_dir)?;
    let mut vault = SecretVault::new(store.clone(), &config.stack.name, &config.secrets)?;
    let refs = vault.resolve_all().context("resolving secrets")?;
    info!(stack = %config.stack.name, secrets = refs.len(), "secrets resolved");

    for service in &config.services {
        for container in &service.containers {
            let source = ImageSource::parse(&container.image)?;
            if source.needs_build() {
                info!(service = %service.name, container = %container.name, image = %source, "image asset will be built");
            }
        }
    }

    let live = store.list_resources(graph.stack())?;
    let plan = Plan::compute(&graph, &live).context("computing plan")?;
    println!("{plan}");
    println!();

    let provisioner = Arc::new(LocalProvisioner::new(&config.stack.region, &env.account));
    let engine = Engine::new(store, provisioner, engine_options);
    let report = engine.apply(&graph, &plan).await?;

    println!("{report}");
    if !report.is_success() {
        bail!(
            "deploy of stack {} failed; {} resources failed, {} skipped",
            config.stack.name,
            report.failed.len(),
            report.skipped.len()
        );
    }
    if !report.outputs.is_empty() {
        println!();
        println!("Outputs:");
        print_outputs(&report.outputs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(parallelism: usize, ready_timeout: &str) -> DeployOptions {
        DeployOptions {
            parallelism,
            rollback: true,
            ready_timeout: ready_timeout.to_string(),
        }
    }

    #[test]
    fn flags_map_onto_engine_options() {
        let opts = options(2, "90s").engine_options().unwrap();
        assert_eq!(opts.parallelism, 2);
        assert_eq!(opts.rollback, RollbackPolicy::RollbackOrphans);
        assert_eq!(opts.ready_timeout, Duration::from_secs(90));
    }

    #[test]
    fn bad_flags_are_rejected() {
        assert!(options(0, "30m").engine_options().is_err());
        assert!(options(4, "soon").engine_options().is_err());
        assert!(options(4, "0s").engine_options().is_err());
    }
}
