//! Subcommands module for netres CLI
//!
//! This module contains all the subcommand implementations.

pub mod list;
pub mod parse;
pub mod reconcile;
pub mod render;

use crate::cli::output::OutputFormatter;
use crate::cli::OutputFormat;
use crate::config::Config;
use anyhow::{bail, Context, Result};
use netres::modules::network::ResourceDefinition;
use netres::modules::{ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Exit code when a run computed changes.
pub const EXIT_CHANGED: i32 = 2;

/// Common context shared between commands
pub struct CommandContext {
    /// Configuration
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
    /// Built-in resources plus those loaded from table directories
    pub registry: ModuleRegistry,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let format = cli.output.unwrap_or_else(|| {
            config
                .defaults
                .output
                .parse::<OutputFormat>()
                .unwrap_or_default()
        });
        let output = OutputFormatter::new(
            !cli.no_color,
            format,
            cli.verbosity(),
            config.colors.clone(),
        );

        let mut registry = ModuleRegistry::with_builtins();
        for dir in &config.tables.paths {
            if let Err(e) = load_tables(dir, &mut registry) {
                output.warning(&format!("{:#}", e));
            }
        }

        Self {
            config,
            output,
            verbosity: cli.verbosity(),
            registry,
        }
    }

    /// Run a resource and return its output.
    pub fn run(&self, resource: &str, params: &ModuleParams, context: &ModuleContext) -> Result<ModuleOutput> {
        if !self.registry.contains(resource) {
            bail!(netres::modules::ModuleError::NotFound(format!(
                "{} (available: {})",
                resource,
                self.registry.names().join(", ")
            )));
        }
        Ok(self.registry.execute(resource, params, context)?)
    }
}

/// Register every `*.yml`/`*.yaml` resource definition found in `dir`.
pub fn load_tables(dir: &Path, registry: &mut ModuleRegistry) -> Result<usize> {
    if !dir.is_dir() {
        bail!("table path {} is not a directory", dir.display());
    }

    let mut loaded = 0;
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        let path = entry.path();
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yml") | Some("yaml")
        );
        if !entry.file_type().is_file() || !is_yaml {
            continue;
        }

        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read table {}", path.display()))?;
        let module = ResourceDefinition::from_yaml(&source)
            .and_then(ResourceDefinition::build)
            .with_context(|| format!("Invalid table {}", path.display()))?;
        if registry.contains(module.table().name()) {
            warn!(resource = %module.table().name(), path = %path.display(), "table replaces a registered resource");
        }
        debug!(resource = %module.table().name(), path = %path.display(), "table loaded");
        registry.register(Arc::new(module));
        loaded += 1;
    }
    Ok(loaded)
}

/// Read a YAML or JSON document.
pub fn load_document(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        _ => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
    };
    Ok(value)
}

/// Read a text file.
pub fn load_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HOSTNAME_TABLE: &str = r#"
name: custom_hostname
description: Device hostname
show_filter: include ^hostname
rules:
  - name: hostname
    getval: '^hostname (?P<hostname>\S+)$'
    compval: hostname
    result:
      hostname: { var: hostname }
    setval: 'hostname {{ hostname }}'
"#;

    #[test]
    fn test_load_tables_registers_yaml_definitions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hostname.yaml"), HOSTNAME_TABLE).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = ModuleRegistry::new();
        assert_eq!(load_tables(dir.path(), &mut registry).unwrap(), 1);
        assert!(registry.contains("custom_hostname"));
    }

    #[test]
    fn test_load_tables_rejects_missing_dir() {
        let mut registry = ModuleRegistry::new();
        assert!(load_tables(Path::new("/nonexistent/netres/tables"), &mut registry).is_err());
    }

    #[test]
    fn test_load_document_formats() {
        let mut yaml = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(yaml, "- vlan_id: 10\n  name: users").unwrap();
        assert_eq!(
            load_document(yaml.path()).unwrap(),
            serde_json::json!([{"vlan_id": 10, "name": "users"}])
        );

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, "{{\"as_number\": 65000}}").unwrap();
        assert_eq!(
            load_document(json.path()).unwrap(),
            serde_json::json!({"as_number": 65000})
        );
    }
}
