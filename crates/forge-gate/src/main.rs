use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use forge_gate::env::{parse_interval, parse_max_attempts};
use forge_gate::{ActivationGate, ExecHandoff, GateEnv, TcpProbe};

#[derive(Parser)]
#[command(
    name = "forge-gate",
    about = "Block until the database accepts connections, then exec the main process",
    version
)]
struct Cli {
    /// Pause between probes, e.g. 2s or 500ms. Overrides GATE_INTERVAL.
    #[arg(long)]
    interval: Option<String>,
    /// Give up after this many probes; 0 waits forever. Overrides
    /// GATE_MAX_ATTEMPTS.
    #[arg(long)]
    max_attempts: Option<String>,
    /// Per-probe connect timeout.
    #[arg(long, default_value = "2s")]
    connect_timeout: String,
    /// Log output: text or json.
    #[arg(long, default_value = "text", env = "FORGE_LOG_FORMAT")]
    log_format: String,
    /// Command to exec once the dependency is ready.
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    command: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_format)?;

    let mut env = GateEnv::from_env().context("activation gate environment")?;
    if let Some(interval) = &cli.interval {
        env.interval = parse_interval(interval)?;
    }
    if let Some(max_attempts) = &cli.max_attempts {
        env.max_attempts = parse_max_attempts(max_attempts)?;
    }
    let connect_timeout = forge_core::parse_duration(&cli.connect_timeout)
        .filter(|d| *d > Duration::ZERO)
        .with_context(|| format!("invalid --connect-timeout {:?}", cli.connect_timeout))?;

    tracing::info!(address = %env.address(), user = %env.user, "activation gate starting");
    let probe = TcpProbe::new(&env.address(), connect_timeout);
    ActivationGate::from_env(&env)
        .run(&probe, &mut ExecHandoff, &cli.command)
        .await
        .with_context(|| format!("activation gate for {}", cli.command.join(" ")))?;
    Ok(())
}

/// Same default as the `forge` CLI: info everywhere, debug for our crates.
fn default_filter() -> anyhow::Result<tracing_subscriber::EnvFilter> {
    Ok(tracing_subscriber::EnvFilter::new("info").add_directive("forge=debug".parse()?))
}

fn init_tracing(format: &str) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => default_filter()?,
    };
    match format {
        "json" => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        "text" => tracing_subscriber::fmt().with_env_filter(filter).init(),
        other => anyhow::bail!("unknown log format {other:?}, expected text or json"),
    }
    Ok(())
}
