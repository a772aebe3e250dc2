//! `hub entities` command implementation

use colored::Colorize;
use hub_flow::FlowResolver;

use crate::config::HubConfig;
use crate::error::Result;

/// List the entities of the project with their flow counts
pub async fn run(config: &HubConfig) -> Result<()> {
    let resolver = FlowResolver::new(&config.project_dir);
    let names = resolver.list_entities()?;

    if names.is_empty() {
        println!("No entities found under {}.", resolver.layout().entities_dir().display());
        return Ok(());
    }

    println!("{}", "Entities:".cyan().bold());
    for name in &names {
        let entity = resolver.get_entity(name)?;
        println!(
            "  {}  ({} input, {} harmonize)",
            name.green(),
            entity.input_flows.len(),
            entity.harmonize_flows.len()
        );
    }
    Ok(())
}
