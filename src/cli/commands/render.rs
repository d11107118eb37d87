//! Render command - desired configuration to CLI commands

use super::{load_document, CommandContext};
use anyhow::Result;
use clap::Parser;
use netres::modules::{ModuleContext, ModuleParams};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Arguments for the render command
#[derive(Parser, Debug, Clone)]
pub struct RenderArgs {
    /// Resource to render
    #[arg(short = 'r', long)]
    pub resource: String,

    /// YAML or JSON file holding the desired configuration
    #[arg(short = 'w', long)]
    pub want: PathBuf,
}

impl RenderArgs {
    /// Execute the render command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let mut params = ModuleParams::new();
        params.insert("state".to_string(), Value::from("rendered"));
        params.insert("config".to_string(), load_document(&self.want)?);

        let output = ctx.run(&self.resource, &params, &ModuleContext::new())?;
        let rendered: Vec<String> = output
            .data
            .get("rendered")
            .and_then(Value::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(|line| line.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if ctx.output.is_human() {
            for line in &rendered {
                println!("{}", line);
            }
        } else {
            ctx.output.document(&json!({ "rendered": rendered }))?;
        }
        Ok(0)
    }
}
