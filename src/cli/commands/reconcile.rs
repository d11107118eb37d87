//! Reconcile command - compute the commands that bring a device in line
//!
//! The CLI works against saved `show running-config` output, so runs are
//! always in check mode: commands are computed and reported, never sent.

use super::{load_document, load_text, CommandContext, EXIT_CHANGED};
use anyhow::Result;
use clap::Parser;
use netres::engine::DeviceTransport;
use netres::modules::network::StaticDevice;
use netres::modules::{ModuleContext, ModuleParams};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Arguments for the reconcile command
#[derive(Parser, Debug, Clone)]
pub struct ReconcileArgs {
    /// Resource to reconcile
    #[arg(short = 'r', long)]
    pub resource: String,

    /// merged, replaced, overridden, deleted, purged, gathered, parsed or rendered
    #[arg(short = 's', long)]
    pub state: Option<String>,

    /// YAML or JSON file holding the desired configuration
    #[arg(short = 'w', long)]
    pub want: Option<PathBuf>,

    /// File holding `show running-config` output
    #[arg(long)]
    pub running: PathBuf,

    /// Show a diff of the facts before and after
    #[arg(long, short = 'D')]
    pub diff: bool,
}

impl ReconcileArgs {
    /// Execute the reconcile command
    pub fn execute(&self, ctx: &CommandContext) -> Result<i32> {
        let state = self
            .state
            .clone()
            .unwrap_or_else(|| ctx.config.defaults.state.clone());

        let mut params = ModuleParams::new();
        params.insert("state".to_string(), Value::from(state.as_str()));
        if let Some(want) = &self.want {
            params.insert("config".to_string(), load_document(want)?);
        }
        let running = load_text(&self.running)?;
        params.insert("running_config".to_string(), Value::from(running.as_str()));

        let device: Arc<dyn DeviceTransport + Send + Sync> = Arc::new(StaticDevice::new(
            self.running.display().to_string(),
            running,
        ));
        let context = ModuleContext::new()
            .with_check_mode(true)
            .with_diff_mode(self.diff)
            .with_device(device);

        debug!(resource = %self.resource, state = %state, "reconciling against snapshot");
        let output = ctx.run(&self.resource, &params, &context)?;

        if ctx.output.is_human() {
            ctx.output.status(&self.resource, output.status, &output.msg);
            ctx.output.commands(&output.commands());
            if let Some(diff) = &output.diff {
                ctx.output.diff(diff);
            }
            for key in ["gathered", "parsed", "rendered"] {
                if let Some(value) = output.data.get(key) {
                    ctx.output.section(key);
                    ctx.output.document(value)?;
                }
            }
            ctx.output.flush();
        } else {
            ctx.output.document(&output)?;
        }

        Ok(if output.changed { EXIT_CHANGED } else { 0 })
    }
}
