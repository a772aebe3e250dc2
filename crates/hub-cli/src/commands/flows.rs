//! `hub flows` command implementation

use colored::Colorize;
use hub_flow::{FlowResolver, FlowType};

use crate::config::HubConfig;
use crate::error::Result;

/// List an entity's flows grouped by type
pub async fn run(config: &HubConfig, entity: &str) -> Result<()> {
    let resolver = FlowResolver::new(&config.project_dir);
    let entity = resolver.get_entity(entity)?;

    println!("{}", entity.name.cyan().bold());
    for flow_type in FlowType::ALL {
        let flows = entity.flows(flow_type);
        println!("  {}:", flow_type.as_str().bold());
        if flows.is_empty() {
            println!("    (none)");
        }
        for flow in flows {
            println!(
                "    {}  [{}, {}]",
                flow.name.green(),
                flow.data_format,
                flow.plugin_format
            );
        }
    }
    Ok(())
}
