use std::path::Path;

use anyhow::{Context, Result, bail};

use forge_core::StackConfig;

pub fn init(path: &Path, name: &str, region: &str, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = StackConfig::scaffold(name, region);
    config.validate().context("scaffolded stack is invalid")?;
    let toml = config.to_toml_string()?;
    std::fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
    println!("✓ Generated {}", path.display());
    println!("  Stack:  {name} ({region})");
    println!("  Next:   forge plan --stack {}", path.display());
    Ok(())
}
