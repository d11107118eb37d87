//! Reconciliation orchestrator.
//!
//! One [`Reconciler`] drives one resource through a run:
//! `Init → FactsLoaded → Diffed → Rendered → Reported`, stopping early for
//! the read-only states. Device I/O goes through [`DeviceTransport`]; the
//! engine itself never retries anything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::diff::{apply, diff, Delta, MergePolicy};
use super::facts::Facts;
use super::parser::parse;
use super::render::render;
use super::table::PatternTable;
use crate::error::{Error, Phase, PhaseContext, ReconcileError, TransportError};

/// Access to a device's configuration.
pub trait DeviceTransport {
    /// Fetch running configuration text, narrowed by a `show` filter
    /// (for example `section ^router bgp`).
    fn running_config(&self, filter: &str) -> std::result::Result<String, TransportError>;

    /// Send configuration commands, in order.
    fn apply_config(&self, commands: &[String]) -> std::result::Result<(), TransportError>;
}

/// Operating state requested for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Merged,
    Replaced,
    Overridden,
    Deleted,
    Purged,
    Gathered,
    Parsed,
    Rendered,
}

impl RunState {
    pub const ALL: [RunState; 8] = [
        RunState::Merged,
        RunState::Replaced,
        RunState::Overridden,
        RunState::Deleted,
        RunState::Purged,
        RunState::Gathered,
        RunState::Parsed,
        RunState::Rendered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Merged => "merged",
            RunState::Replaced => "replaced",
            RunState::Overridden => "overridden",
            RunState::Deleted => "deleted",
            RunState::Purged => "purged",
            RunState::Gathered => "gathered",
            RunState::Parsed => "parsed",
            RunState::Rendered => "rendered",
        }
    }

    /// The merge policy of a mutating state.
    pub fn policy(&self) -> Option<MergePolicy> {
        match self {
            RunState::Merged => Some(MergePolicy::Merged),
            RunState::Replaced => Some(MergePolicy::Replaced),
            RunState::Overridden => Some(MergePolicy::Overridden),
            RunState::Deleted => Some(MergePolicy::Deleted),
            RunState::Purged => Some(MergePolicy::Purged),
            _ => None,
        }
    }

    /// Whether the state reads from or writes to a device.
    pub fn needs_device(&self) -> bool {
        !matches!(self, RunState::Parsed | RunState::Rendered)
    }

    /// Whether the state needs a desired configuration.
    pub fn needs_config(&self) -> bool {
        matches!(
            self,
            RunState::Merged | RunState::Replaced | RunState::Overridden | RunState::Rendered
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let lower = s.to_ascii_lowercase();
        RunState::ALL
            .into_iter()
            .find(|state| state.as_str() == lower)
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    FactsLoaded,
    Diffed,
    Rendered,
    Reported,
    Failed,
}

/// Inputs of one run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileRequest {
    pub state: RunState,
    /// Desired configuration
    pub want: Option<Facts>,
    /// Operator supplied device text for `parsed`
    pub running_config: Option<String>,
    /// Compute commands without applying them
    pub check_mode: bool,
}

impl ReconcileRequest {
    pub fn new(state: RunState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    pub fn want(mut self, want: Facts) -> Self {
        self.want = Some(want);
        self
    }

    pub fn running_config(mut self, text: impl Into<String>) -> Self {
        self.running_config = Some(text.into());
        self
    }

    pub fn check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub state: RunState,
    /// Last stage reached
    pub stage: Stage,
    pub changed: bool,
    pub commands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Facts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Facts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gathered: Option<Facts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Facts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendered: Option<Vec<String>>,
    #[serde(skip)]
    pub delta: Option<Delta>,
}

impl ReconcileReport {
    fn new(state: RunState, stage: Stage) -> Self {
        Self {
            state,
            stage,
            changed: false,
            commands: Vec::new(),
            before: None,
            after: None,
            gathered: None,
            parsed: None,
            rendered: None,
            delta: None,
        }
    }
}

/// Drives runs for one resource.
#[derive(Debug)]
pub struct Reconciler<'t> {
    table: &'t PatternTable,
    show_filter: String,
}

impl<'t> Reconciler<'t> {
    pub fn new(table: &'t PatternTable, show_filter: impl Into<String>) -> Self {
        Self {
            table,
            show_filter: show_filter.into(),
        }
    }

    pub fn table(&self) -> &PatternTable {
        self.table
    }

    /// Diff and render in one step.
    pub fn plan(&self, want: &Facts, have: &Facts, policy: MergePolicy) -> Result<Delta, ReconcileError> {
        let mut delta = diff(want, have, policy, self.table).in_phase(Phase::Diff)?;
        self.stage(Stage::Diffed);
        delta.commands = render(&delta, self.table).in_phase(Phase::Render)?;
        self.stage(Stage::Rendered);
        Ok(delta)
    }

    /// Execute one run.
    pub fn run(
        &self,
        request: &ReconcileRequest,
        transport: Option<&dyn DeviceTransport>,
    ) -> Result<ReconcileReport, ReconcileError> {
        let state = request.state;
        debug!(resource = %self.table.name(), state = %state, check_mode = request.check_mode, "run started");

        if state.needs_config() && request.want.is_none() {
            return Err(ReconcileError::new(
                Phase::LoadFacts,
                Error::invalid_input(format!("state '{}' requires a config", state)),
            ));
        }
        let empty = Facts::new();
        let want = request.want.as_ref().unwrap_or(&empty);

        match state {
            RunState::Parsed => {
                let text = request.running_config.as_deref().ok_or_else(|| {
                    ReconcileError::new(
                        Phase::LoadFacts,
                        Error::invalid_input("state 'parsed' requires running_config"),
                    )
                })?;
                let facts = parse(text, self.table);
                self.stage(Stage::FactsLoaded);
                let mut report = ReconcileReport::new(state, Stage::FactsLoaded);
                report.parsed = Some(facts);
                Ok(report)
            }
            RunState::Rendered => {
                self.stage(Stage::FactsLoaded);
                let delta = self.plan(want, &Facts::new(), MergePolicy::Merged)?;
                let mut report = ReconcileReport::new(state, Stage::Rendered);
                report.rendered = Some(delta.commands.clone());
                report.delta = Some(delta);
                Ok(report)
            }
            RunState::Gathered => {
                let transport = self.require(transport, state)?;
                let have = self.load_facts(transport)?;
                let mut report = ReconcileReport::new(state, Stage::FactsLoaded);
                report.gathered = Some(have);
                Ok(report)
            }
            _ => {
                let policy = state.policy().ok_or_else(|| {
                    ReconcileError::new(Phase::Diff, Error::UnknownState(state.to_string()))
                })?;
                let transport = self.require(transport, state)?;
                let have = self.load_facts(transport)?;
                let delta = self.plan(want, &have, policy)?;

                let mut report = ReconcileReport::new(state, Stage::Rendered);
                report.changed = !delta.commands.is_empty();
                report.commands = delta.commands.clone();

                if request.check_mode {
                    report.after = Some(apply(&have, &delta, self.table));
                } else {
                    if report.changed {
                        transport.apply_config(&delta.commands).map_err(|e| {
                            ReconcileError::new(
                                Phase::Apply,
                                Error::ApplyFailed {
                                    message: e.to_string(),
                                    commands: delta.commands.clone(),
                                },
                            )
                        })?;
                        info!(
                            resource = %self.table.name(),
                            commands = delta.commands.len(),
                            "configuration applied"
                        );
                        report.after = Some(self.load_facts(transport)?);
                    } else {
                        report.after = Some(have.clone());
                    }
                    report.stage = Stage::Reported;
                    self.stage(Stage::Reported);
                }
                report.before = Some(have);
                report.delta = Some(delta);
                Ok(report)
            }
        }
    }

    fn require<'d>(
        &self,
        transport: Option<&'d dyn DeviceTransport>,
        state: RunState,
    ) -> Result<&'d dyn DeviceTransport, ReconcileError> {
        transport.ok_or_else(|| {
            ReconcileError::new(
                Phase::LoadFacts,
                Error::invalid_input(format!("state '{}' requires a device connection", state)),
            )
        })
    }

    fn load_facts(&self, transport: &dyn DeviceTransport) -> Result<Facts, ReconcileError> {
        let text = transport
            .running_config(&self.show_filter)
            .in_phase(Phase::LoadFacts)?;
        let facts = parse(&text, self.table);
        self.stage(Stage::FactsLoaded);
        Ok(facts)
    }

    fn stage(&self, stage: Stage) {
        debug!(resource = %self.table.name(), stage = ?stage, "stage reached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule::RuleSpec;
    use crate::engine::table::TableSpec;
    use crate::engine::template::Expr;
    use serde_json::json;
    use std::cell::RefCell;

    struct FakeDevice {
        config: RefCell<String>,
        sent: RefCell<Vec<String>>,
        reject: bool,
    }

    impl FakeDevice {
        fn new(config: &str) -> Self {
            Self {
                config: RefCell::new(config.to_string()),
                sent: RefCell::new(Vec::new()),
                reject: false,
            }
        }
    }

    impl DeviceTransport for FakeDevice {
        fn running_config(&self, _filter: &str) -> std::result::Result<String, TransportError> {
            Ok(self.config.borrow().clone())
        }

        fn apply_config(&self, commands: &[String]) -> std::result::Result<(), TransportError> {
            if self.reject {
                return Err(TransportError::Rejected {
                    command: commands[0].clone(),
                    message: "% Invalid input".into(),
                });
            }
            self.sent.borrow_mut().extend(commands.iter().cloned());
            let mut config = self.config.borrow_mut();
            for command in commands {
                config.push_str(command);
                config.push('\n');
            }
            Ok(())
        }
    }

    fn table() -> PatternTable {
        PatternTable::new(
            TableSpec::new("hostname").rule(
                RuleSpec::new("hostname", r"^hostname (?P<hostname>\S+)$")
                    .compval("hostname")
                    .result("hostname", Expr::var("hostname"))
                    .setval("hostname {{ hostname }}"),
            ),
        )
        .unwrap()
    }

    fn want(name: &str) -> Facts {
        json!({ "hostname": name }).as_object().cloned().unwrap()
    }

    #[test]
    fn test_run_state_parsing() {
        assert_eq!("gathered".parse::<RunState>().unwrap(), RunState::Gathered);
        assert_eq!(RunState::Purged.policy(), Some(MergePolicy::Purged));
        assert_eq!(RunState::Parsed.policy(), None);
        assert!("bogus".parse::<RunState>().is_err());
    }

    #[test]
    fn test_parsed_never_touches_device() {
        let table = table();
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Parsed).running_config("hostname r1\n");
        let report = reconciler.run(&request, None).unwrap();
        assert_eq!(report.parsed, Some(want("r1")));
        assert_eq!(report.stage, Stage::FactsLoaded);
    }

    #[test]
    fn test_rendered_uses_empty_facts() {
        let table = table();
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Rendered).want(want("r9"));
        let report = reconciler.run(&request, None).unwrap();
        assert_eq!(report.rendered, Some(vec!["hostname r9".to_string()]));
    }

    #[test]
    fn test_merged_applies_and_regathers() {
        let table = table();
        let device = FakeDevice::new("hostname r1\n");
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Merged).want(want("r2"));

        let report = reconciler.run(&request, Some(&device)).unwrap();
        assert!(report.changed);
        assert_eq!(report.stage, Stage::Reported);
        assert_eq!(*device.sent.borrow(), vec!["hostname r2".to_string()]);
        assert_eq!(report.before, Some(want("r1")));
        assert_eq!(report.after, Some(want("r2")));
    }

    #[test]
    fn test_check_mode_predicts_after() {
        let table = table();
        let device = FakeDevice::new("hostname r1\n");
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Merged)
            .want(want("r2"))
            .check_mode(true);

        let report = reconciler.run(&request, Some(&device)).unwrap();
        assert!(device.sent.borrow().is_empty());
        assert_eq!(report.stage, Stage::Rendered);
        assert_eq!(report.after, Some(want("r2")));
    }

    #[test]
    fn test_apply_failure_carries_commands() {
        let table = table();
        let mut device = FakeDevice::new("hostname r1\n");
        device.reject = true;
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Merged).want(want("r2"));

        let err = reconciler.run(&request, Some(&device)).unwrap_err();
        assert_eq!(err.phase, Phase::Apply);
        assert_eq!(err.commands(), ["hostname r2".to_string()]);
    }

    #[test]
    fn test_mutating_state_requires_transport() {
        let table = table();
        let reconciler = Reconciler::new(&table, "include hostname");
        let request = ReconcileRequest::new(RunState::Deleted);
        let err = reconciler.run(&request, None).unwrap_err();
        assert_eq!(err.phase, Phase::LoadFacts);
        assert!(matches!(err.source, Error::InvalidInput(_)));
    }

    #[test]
    fn test_diff_failure_reports_phase() {
        let table = PatternTable::new(
            TableSpec::new("vlans")
                .sequence("vlans", &["vlan_id"])
                .rule(
                    RuleSpec::new("vlan", r"^vlan (?P<vlan_id>\d+)$")
                        .path("vlans")
                        .context()
                        .result("vlans.vlan_id", Expr::int("vlan_id"))
                        .setval("vlan {{ vlan_id }}"),
                ),
        )
        .unwrap();
        let device = FakeDevice::new("vlan 10\n");
        let reconciler = Reconciler::new(&table, "section ^vlan");
        let want = json!({"vlans": [{"vlan_id": 20}, {"vlan_id": 20}]})
            .as_object()
            .cloned()
            .unwrap();
        let request = ReconcileRequest::new(RunState::Merged).want(want);
        let err = reconciler.run(&request, Some(&device)).unwrap_err();
        assert_eq!(err.phase, Phase::Diff);
        assert!(matches!(err.source, Error::KeyCollision { .. }));
    }
}
