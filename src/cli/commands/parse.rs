//! Parse command - running configuration to structured facts

use super::{load_text, CommandContext};
use anyhow::Result;
use clap::Parser;
use netres::modules::{ModuleContext, ModuleParams};
use serde_json::Value;
use std::path::PathBuf;

/// Arguments for the parse command
#[derive(Parser, Debug, Clone)]
pub struct ParseArgs {
    /// Resource to parse
    #[arg(short = 'r', long)]
    pub resource: String,

    /// File holding `show running-config` output
    #[arg(long)]
    pub running: PathBuf,
}

impl ParseArgs {
    /// Execute the parse command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let mut params = ModuleParams::new();
        params.insert("state".to_string(), Value::from("parsed"));
        params.insert(
            "running_config".to_string(),
            Value::from(load_text(&self.running)?),
        );

        let output = ctx.run(&self.resource, &params, &ModuleContext::new())?;
        let parsed = output.data.get("parsed").cloned().unwrap_or(Value::Null);
        ctx.output.document(&parsed)?;
        Ok(0)
    }
}
