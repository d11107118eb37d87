//! List command - show available resources

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use serde::Serialize;

/// Arguments for the list command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print names only, one per line
    #[arg(long)]
    pub names: bool,
}

#[derive(Debug, Serialize)]
struct ResourceSummary<'a> {
    name: &'a str,
    description: &'a str,
}

impl ListArgs {
    /// Execute the list command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let names = ctx.registry.names();

        if self.names {
            for name in &names {
                println!("{}", name);
            }
            return Ok(0);
        }

        let modules: Vec<_> = names
            .iter()
            .filter_map(|name| ctx.registry.get(name))
            .collect();
        let summaries: Vec<ResourceSummary<'_>> = modules
            .iter()
            .map(|module| ResourceSummary {
                name: module.name(),
                description: module.description(),
            })
            .collect();

        if ctx.output.is_human() {
            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| vec![s.name.to_string(), s.description.to_string()])
                .collect();
            ctx.output.table(&["RESOURCE", "DESCRIPTION"], &rows);
        } else {
            ctx.output.document(&summaries)?;
        }
        Ok(0)
    }
}
