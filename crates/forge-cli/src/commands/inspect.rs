use std::path::Path;

use anyhow::Result;
use serde_json::json;

use crate::OutputFormat;
use crate::commands::{build_graph, load_stack};

pub fn validate(stack: &Path) -> Result<()> {
    let config = load_stack(stack)?;
    let graph = build_graph(&config)?;
    let waves = graph.waves()?;
    println!(
        "✓ stack {} is valid: {} resources, {} dependencies, {} waves",
        config.stack.name,
        graph.len(),
        graph.edge_count(),
        waves.len()
    );
    Ok(())
}

pub fn graph(stack: &Path, format: OutputFormat) -> Result<()> {
    let config = load_stack(stack)?;
    let graph = build_graph(&config)?;
    let order = graph.creation_order()?;
    let waves = graph.waves()?;

    match format {
        OutputFormat::Json => {
            let resources: Vec<_> = order
                .iter()
                .map(|id| {
                    json!({
                        "id": id,
                        "depends_on": graph.dependencies(id),
                    })
                })
                .collect();
            let out = json!({
                "stack": graph.stack(),
                "resources": resources,
                "waves": waves,
                "subnets": graph.layout().subnets(),
                "outputs": graph.outputs().iter().map(|(k, v)| (k.clone(), v.to_string())).collect::<std::collections::BTreeMap<_, _>>(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("Stack {} ({} resources)", graph.stack(), graph.len());
            println!();
            println!("Subnets:");
            for subnet in graph.layout().subnets() {
                println!(
                    "  {:<12} {:<9} {:<12} {:<16} {:?}",
                    subnet.name,
                    subnet.kind.as_str(),
                    subnet.availability_zone,
                    subnet.cidr,
                    subnet.route
                );
            }
            println!();
            println!("Waves:");
            for (index, wave) in waves.iter().enumerate() {
                let ids: Vec<String> = wave.iter().map(ToString::to_string).collect();
                println!("  {index:>2}  {}", ids.join(", "));
            }
            println!();
            println!("Creation order:");
            for (index, id) in order.iter().enumerate() {
                let deps: Vec<String> = graph.dependencies(id).iter().map(ToString::to_string).collect();
                if deps.is_empty() {
                    println!("  {:>3}. {id}", index + 1);
                } else {
                    println!("  {:>3}. {id}  ← {}", index + 1, deps.join(", "));
                }
            }
        }
    }
    Ok(())
}
