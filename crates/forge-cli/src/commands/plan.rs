use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use forge_engine::{ChangeKind, Plan};

use crate::OutputFormat;
use crate::commands::{build_graph, existing_state, load_stack};

/// Diff the stack file against recorded state. A missing store means
/// every resource is a create.
pub fn plan(stack: &Path, state_dir: &Path, format: OutputFormat) -> Result<()> {
    let config = load_stack(stack)?;
    let graph = build_graph(&config)?;
    let live = match existing_state(state_dir)? {
        Some(store) => store.list_resources(graph.stack())?,
        None => Vec::new(),
    };
    let plan = Plan::compute(&graph, &live).context("computing plan")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        OutputFormat::Text if plan.is_empty() => {
            println!("No changes. {} resources up to date.", plan.count(ChangeKind::NoOp));
        }
        OutputFormat::Text => println!("{plan}"),
    }
    Ok(())
}

pub fn outputs(stack: &Path, state_dir: &Path, format: OutputFormat) -> Result<()> {
    let config = load_stack(stack)?;
    let outputs: BTreeMap<String, String> = match existing_state(state_dir)? {
        Some(store) => store
            .list_outputs(&config.stack.name)?
            .into_iter()
            .map(|o| (o.name, o.value))
            .collect(),
        None => BTreeMap::new(),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
        OutputFormat::Text if outputs.is_empty() => {
            println!("No outputs recorded for stack {}.", config.stack.name);
        }
        OutputFormat::Text => print_outputs(&outputs),
    }
    Ok(())
}

pub(crate) fn print_outputs(outputs: &BTreeMap<String, String>) {
    let width = outputs.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in outputs {
        println!("  {name:<width$}  {value}");
    }
}
