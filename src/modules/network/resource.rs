//! Generic resource module.
//!
//! Every network resource is the same module driven by a different pattern
//! table: a [`ResourceDefinition`] names the resource, says how to narrow
//! the running configuration, and carries the table spec. Resources whose
//! configuration is naturally a list (VLANs, ACLs, static routes) declare a
//! `list_key`; their `config` parameter and fact snapshots are that list
//! rather than a map.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::common::generate_facts_diff;
use crate::engine::{Facts, PatternTable, ReconcileReport, ReconcileRequest, Reconciler, RunState, TableSpec};
use crate::error::{Error, Result};
use crate::modules::{
    Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
};

/// Declarative description of a resource.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceDefinition {
    /// One-line summary shown by `netres list`
    pub description: String,
    /// Output modifier for `show running-config`
    pub show_filter: String,
    /// Sequence holding the resource's list form, if any
    pub list_key: Option<String>,
    #[serde(flatten)]
    pub table: TableSpec,
}

impl ResourceDefinition {
    pub fn new(table: TableSpec, description: &str, show_filter: &str) -> Self {
        Self {
            description: description.to_string(),
            show_filter: show_filter.to_string(),
            list_key: None,
            table,
        }
    }

    pub fn list_key(mut self, key: &str) -> Self {
        self.list_key = Some(key.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Load a definition from a YAML document: the table spec plus
    /// `description`, `show_filter` and `list_key`.
    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Compile into a module.
    pub fn build(self) -> Result<ResourceModule> {
        ResourceModule::new(self)
    }
}

/// A module reconciling one resource through its pattern table.
#[derive(Debug)]
pub struct ResourceModule {
    name: String,
    description: String,
    show_filter: String,
    list_key: Option<String>,
    table: PatternTable,
}

impl ResourceModule {
    pub fn new(definition: ResourceDefinition) -> Result<Self> {
        let ResourceDefinition {
            description,
            show_filter,
            list_key,
            table,
        } = definition;
        if let Some(key) = &list_key {
            if !table.sequences.contains_key(key) {
                return Err(Error::TableConstruction {
                    table: table.name.clone(),
                    rule: key.clone(),
                    message: "list_key is not a declared sequence".to_string(),
                });
            }
        }
        let name = table.name.clone();
        let table = PatternTable::new(table)?;
        Ok(Self {
            name,
            description,
            show_filter,
            list_key,
            table,
        })
    }

    pub fn table(&self) -> &PatternTable {
        &self.table
    }

    pub fn show_filter(&self) -> &str {
        &self.show_filter
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.table, self.show_filter.clone())
    }

    /// Convert a `config` parameter into a facts tree.
    pub fn to_facts(&self, config: &Value) -> Result<Facts> {
        match (config, &self.list_key) {
            (Value::Object(map), _) => Ok(map.clone()),
            (Value::Array(items), Some(key)) => {
                let mut facts = Facts::new();
                facts.insert(key.clone(), Value::Array(items.clone()));
                Ok(facts)
            }
            (Value::Null, _) => Ok(Facts::new()),
            (other, _) => Err(Error::invalid_input(format!(
                "config for '{}' must be {}, got {}",
                self.name,
                if self.list_key.is_some() {
                    "a list or a mapping"
                } else {
                    "a mapping"
                },
                kind_of(other)
            ))),
        }
    }

    /// Present a facts tree the way users write `config`.
    pub fn from_facts(&self, facts: &Facts) -> Value {
        match &self.list_key {
            Some(key) => facts
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            None => Value::Object(facts.clone()),
        }
    }

    fn output(&self, report: ReconcileReport, context: &ModuleContext) -> ModuleOutput {
        let mut output = if report.changed {
            let verb = if context.check_mode { "would send" } else { "sent" };
            ModuleOutput::changed(format!(
                "{}: {} {} command(s)",
                self.name,
                verb,
                report.commands.len()
            ))
        } else {
            ModuleOutput::ok(format!("{}: {}", self.name, report.state))
        };

        if report.state.policy().is_some() {
            output = output.with_data("commands", Value::from(report.commands.clone()));
        }
        if context.diff_mode {
            if let (Some(before), Some(after)) = (&report.before, &report.after) {
                output = output.with_diff(generate_facts_diff(
                    &self.from_facts(before),
                    &self.from_facts(after),
                ));
            }
        }
        for (key, facts) in [
            ("before", &report.before),
            ("after", &report.after),
            ("gathered", &report.gathered),
            ("parsed", &report.parsed),
        ] {
            if let Some(facts) = facts {
                output = output.with_data(key, self.from_facts(facts));
            }
        }
        if let Some(rendered) = report.rendered {
            output = output.with_data("rendered", Value::from(rendered));
        }
        output
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

impl Module for ResourceModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        let state = state_of(params)?;
        if let Some(config) = params.get("config") {
            self.to_facts(config)?;
        }
        if state == RunState::Parsed && params.get_string("running_config")?.is_none() {
            return Err(ModuleError::MissingParameter("running_config".to_string()));
        }
        Ok(())
    }

    fn execute(&self, params: &ModuleParams, context: &ModuleContext) -> ModuleResult<ModuleOutput> {
        let state = state_of(params)?;
        let mut request = ReconcileRequest::new(state).check_mode(context.check_mode);
        if let Some(config) = params.get("config").filter(|v| !v.is_null()) {
            request = request.want(self.to_facts(config)?);
        }
        if let Some(text) = params.get_string("running_config")? {
            request = request.running_config(text);
        }

        debug!(resource = %self.name, state = %state, "executing resource module");
        let report = self.reconciler().run(&request, context.transport())?;
        if report.changed {
            info!(
                resource = %self.name,
                state = %state,
                commands = report.commands.len(),
                check_mode = context.check_mode,
                "resource changed"
            );
        }
        Ok(self.output(report, context))
    }
}

fn state_of(params: &ModuleParams) -> ModuleResult<RunState> {
    match params.get_string("state")? {
        Some(state) => Ok(state.parse()?),
        None => Ok(RunState::default()),
    }
}
