pub mod deploy;
pub mod destroy;
pub mod init;
pub mod inspect;
pub mod plan;
pub mod secrets;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use forge_core::StackConfig;
use forge_graph::{GraphBuilder, ResourceGraph};
use forge_state::StateStore;

pub const STATE_FILE: &str = "state.redb";

pub fn load_stack(path: &Path) -> Result<StackConfig> {
    StackConfig::from_file(path).with_context(|| format!("loading stack file {}", path.display()))
}

/// Graph errors surface here, before any state is touched.
pub fn build_graph(config: &StackConfig) -> Result<ResourceGraph> {
    GraphBuilder::from_stack(config)
        .with_context(|| format!("building resource graph for stack {}", config.stack.name))
}

pub fn state_path(state_dir: &Path) -> PathBuf {
    state_dir.join(STATE_FILE)
}

/// Open the state store, creating the directory on first use.
pub fn bootstrap_state(state_dir: &Path) -> Result<StateStore> {
    if !state_dir.exists() {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;
        tracing::info!(path = %state_dir.display(), "bootstrapped state directory");
    }
    let path = state_path(state_dir);
    StateStore::open(&path).with_context(|| format!("opening state store {}", path.display()))
}

/// Open an existing state store; `None` when nothing was deployed yet.
pub fn existing_state(state_dir: &Path) -> Result<Option<StateStore>> {
    let path = state_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let store = StateStore::open(&path).with_context(|| format!("opening state store {}", path.display()))?;
    Ok(Some(store))
}
