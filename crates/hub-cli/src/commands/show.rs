//! `hub show` command implementation

use colored::Colorize;
use hub_flow::flow::StageLocation;
use hub_flow::{Flow, FlowResolver, FlowType};

use crate::config::HubConfig;
use crate::error::Result;

/// Print how a flow resolves
pub async fn run(config: &HubConfig, entity: &str, flow: &str, flow_type: FlowType, json: bool) -> Result<()> {
    let resolver = FlowResolver::new(&config.project_dir);
    let flow = resolver.get_flow(entity, flow, flow_type)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&flow)?);
    } else {
        println!("{}", flow.qualified_name().cyan().bold());
        print!("{}", describe(&flow));
    }
    Ok(())
}

/// Plain-text description of a resolved flow
pub fn describe(flow: &Flow) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Data format:   {}\n", flow.data_format));
    out.push_str(&format!("  Plugin format: {}\n", flow.plugin_format));
    out.push_str(&format!("  Source:        {}\n", flow.selector));
    out.push_str("  Stages:\n");
    for stage in &flow.stages {
        let location = match &stage.location {
            Some(StageLocation::Module { path, .. }) => path.display().to_string(),
            None => "identity".to_string(),
        };
        out.push_str(&format!("    {:<10} {}\n", stage.name, location));
    }
    out
}
