use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

mod commands;
mod preflight;

#[derive(Parser)]
#[command(
    name = "forge",
    about = "StackForge — declarative stacks, applied in dependency order",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "FORGE_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
pub struct StackArgs {
    /// Stack file
    #[arg(long, default_value = "stack.toml", env = "FORGE_STACK")]
    pub stack: PathBuf,
}

#[derive(Args)]
pub struct StateArgs {
    /// Directory holding the state store
    #[arg(long, default_value = ".forge", env = "FORGE_STATE_DIR")]
    pub state_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a complete chat stack file to start from
    Init {
        #[arg(long, default_value = "stack.toml")]
        stack: PathBuf,
        #[arg(long, default_value = "chat")]
        name: String,
        #[arg(long, default_value = "us-east-1")]
        region: String,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check the stack file and its resource graph without touching state
    Validate {
        #[command(flatten)]
        stack: StackArgs,
    },
    /// Print creation order, parallel waves and the subnet layout
    Graph {
        #[command(flatten)]
        stack: StackArgs,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show what a deploy would change
    Plan {
        #[command(flatten)]
        stack: StackArgs,
        #[command(flatten)]
        state: StateArgs,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Check prerequisites, then apply the stack without confirmation.
    ///
    /// Requires the stack's required tools on PATH, cloud credentials
    /// (AWS_ACCESS_KEY_ID + AWS_SECRET_ACCESS_KEY, or AWS_PROFILE) and an
    /// account id (CDK_DEFAULT_ACCOUNT or AWS_ACCOUNT_ID).
    Deploy {
        #[command(flatten)]
        stack: StackArgs,
        #[command(flatten)]
        state: StateArgs,
        /// Resources provisioned at once within a wave
        #[arg(long, default_value_t = 4, env = "FORGE_PARALLELISM")]
        parallelism: usize,
        /// On failure, delete resources this run created that nothing ready depends on
        #[arg(long)]
        rollback: bool,
        /// Upper bound on one resource becoming ready
        #[arg(long, default_value = "30m")]
        ready_timeout: String,
    },
    /// Delete every resource of the stack, dependents first
    Destroy {
        #[command(flatten)]
        stack: StackArgs,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Print the outputs recorded by the last successful deploy
    Outputs {
        #[command(flatten)]
        stack: StackArgs,
        #[command(flatten)]
        state: StateArgs,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Generate new material for one secret
    Rotate {
        #[command(flatten)]
        stack: StackArgs,
        #[command(flatten)]
        state: StateArgs,
        /// Secret name
        secret: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Init {
            stack,
            name,
            region,
            force,
        } => commands::init::init(&stack, &name, &region, force),
        Commands::Validate { stack } => commands::inspect::validate(&stack.stack),
        Commands::Graph { stack, format } => commands::inspect::graph(&stack.stack, format),
        Commands::Plan {
            stack,
            state,
            format,
        } => commands::plan::plan(&stack.stack, &state.state_dir, format),
        Commands::Deploy {
            stack,
            state,
            parallelism,
            rollback,
            ready_timeout,
        } => runtime()?.block_on(commands::deploy::deploy(
            &stack.stack,
            &state.state_dir,
            commands::deploy::DeployOptions {
                parallelism,
                rollback,
                ready_timeout,
            },
        )),
        Commands::Destroy { stack, state } => {
            runtime()?.block_on(commands::destroy::destroy(&stack.stack, &state.state_dir))
        }
        Commands::Outputs {
            stack,
            state,
            format,
        } => commands::plan::outputs(&stack.stack, &state.state_dir, format),
        Commands::Rotate {
            stack,
            state,
            secret,
        } => commands::secrets::rotate(&stack.stack, &state.state_dir, &secret),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => tracing_subscriber::EnvFilter::new("info").add_directive("forge=debug".parse()?),
    };
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    Ok(())
}
