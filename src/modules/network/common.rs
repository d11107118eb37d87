//! Common network device utilities and types
//!
//! This module provides shared functionality for the resource modules:
//! - Fact diff generation for diff mode
//! - Command generation for CLI configuration sessions
//! - Device transports over an interactive CLI session or a saved snapshot

use crate::engine::DeviceTransport;
use crate::error::TransportError;
use crate::modules::Diff;
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use tracing::{trace, warn};

// ============================================================================
// Fact Diff
// ============================================================================

/// Generate a unified diff between two texts
pub fn generate_config_diff(before: &str, after: &str) -> Diff {
    let text_diff = TextDiff::from_lines(before, after);

    let mut details = String::new();
    let mut additions = 0;
    let mut deletions = 0;

    for change in text_diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => {
                deletions += 1;
                "-"
            }
            ChangeTag::Insert => {
                additions += 1;
                "+"
            }
            ChangeTag::Equal => " ",
        };
        details.push_str(&format!("{}{}", sign, change));
        if change.missing_newline() {
            details.push('\n');
        }
    }

    Diff {
        before: format!("{} lines", before.lines().count()),
        after: format!(
            "{} lines ({} additions, {} deletions)",
            after.lines().count(),
            additions,
            deletions
        ),
        details: Some(details),
    }
}

/// Diff two fact documents through their YAML form.
pub fn generate_facts_diff(before: &serde_json::Value, after: &serde_json::Value) -> Diff {
    let before = serde_yaml::to_string(before).unwrap_or_default();
    let after = serde_yaml::to_string(after).unwrap_or_default();
    let mut diff = generate_config_diff(&before, &after);
    diff.before = before;
    diff.after = after;
    diff
}

// ============================================================================
// Command Generation
// ============================================================================

/// Generate platform-specific session commands
pub trait ConfigCommandGenerator {
    /// Commands to enter configuration mode
    fn enter_config_mode(&self) -> Vec<String>;

    /// Commands to exit configuration mode
    fn exit_config_mode(&self) -> Vec<String>;

    /// Command to show running configuration narrowed by a filter
    fn show_running_config(&self, filter: &str) -> String;

    /// Commands that make output machine readable (no paging)
    fn prepare_session(&self) -> Vec<String>;

    /// Wrap configuration lines in a configuration session
    fn apply_config_lines(&self, lines: &[String]) -> Vec<String> {
        let mut commands = self.enter_config_mode();
        commands.extend(lines.iter().cloned());
        commands.extend(self.exit_config_mode());
        commands
    }
}

/// Cisco IOS command generator
#[derive(Debug, Clone, Copy, Default)]
pub struct IosCommandGenerator;

impl ConfigCommandGenerator for IosCommandGenerator {
    fn enter_config_mode(&self) -> Vec<String> {
        vec!["configure terminal".to_string()]
    }

    fn exit_config_mode(&self) -> Vec<String> {
        vec!["end".to_string()]
    }

    fn show_running_config(&self, filter: &str) -> String {
        if filter.trim().is_empty() {
            "show running-config".to_string()
        } else {
            format!("show running-config | {}", filter.trim())
        }
    }

    fn prepare_session(&self) -> Vec<String> {
        vec![
            "terminal length 0".to_string(),
            "terminal width 512".to_string(),
        ]
    }
}

/// Markers IOS prints when it refuses a line.
const ERROR_MARKERS: &[&str] = &[
    "% Invalid",
    "% Incomplete",
    "% Ambiguous",
    "% Unknown",
    "% Bad",
    "% Error",
];

/// Clean up command output (remove command echo, prompts, etc.)
pub fn clean_config_output(output: &str) -> String {
    let mut lines: Vec<&str> = output.lines().collect();

    if lines.first().is_some_and(|first| first.contains("show ")) {
        lines.remove(0);
    }

    while let Some(last) = lines.last() {
        let last = last.trim();
        if last.ends_with('#') || last.ends_with('>') || last.is_empty() {
            lines.pop();
        } else {
            break;
        }
    }

    lines.retain(|line| {
        !line.starts_with("Building configuration") && !line.starts_with("Current configuration")
    });
    lines.join("\n")
}

// ============================================================================
// Device Transports
// ============================================================================

/// An interactive CLI session: one command in, its output back.
pub trait CliSession {
    fn send(&self, command: &str) -> Result<String, TransportError>;
}

/// A device driven through a CLI session.
pub struct CliDevice<S, G = IosCommandGenerator> {
    session: S,
    generator: G,
    prepared: std::sync::Once,
}

impl<S: CliSession> CliDevice<S, IosCommandGenerator> {
    pub fn ios(session: S) -> Self {
        Self::new(session, IosCommandGenerator)
    }
}

impl<S: CliSession, G: ConfigCommandGenerator> CliDevice<S, G> {
    pub fn new(session: S, generator: G) -> Self {
        Self {
            session,
            generator,
            prepared: std::sync::Once::new(),
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn prepare(&self) {
        self.prepared.call_once(|| {
            for command in self.generator.prepare_session() {
                if let Err(e) = self.session.send(&command) {
                    warn!(command = %command, error = %e, "session preparation failed");
                }
            }
        });
    }
}

impl<S: CliSession, G: ConfigCommandGenerator> DeviceTransport for CliDevice<S, G> {
    fn running_config(&self, filter: &str) -> Result<String, TransportError> {
        self.prepare();
        let command = self.generator.show_running_config(filter);
        let output = self.session.send(&command)?;
        Ok(clean_config_output(&output))
    }

    fn apply_config(&self, commands: &[String]) -> Result<(), TransportError> {
        self.prepare();
        for command in self.generator.apply_config_lines(commands) {
            let output = self.session.send(&command)?;
            trace!(command = %command, output = %output, "configuration line sent");
            if let Some(marker) = ERROR_MARKERS.iter().copied().find(|m| output.contains(m)) {
                let message = output
                    .lines()
                    .find(|line| line.contains(marker))
                    .unwrap_or(marker)
                    .trim()
                    .to_string();
                // leave configuration mode before reporting
                for exit in self.generator.exit_config_mode() {
                    if let Err(e) = self.session.send(&exit) {
                        warn!(command = %exit, error = %e, "could not leave configuration mode");
                    }
                }
                return Err(TransportError::Rejected { command, message });
            }
        }
        Ok(())
    }
}

/// A read-only device backed by saved `show running-config` output.
///
/// Filters are evaluated locally the way IOS evaluates them, so one saved
/// configuration serves every resource.
#[derive(Debug, Clone)]
pub struct StaticDevice {
    name: String,
    config: String,
}

impl StaticDevice {
    pub fn new(name: impl Into<String>, config: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: config.into(),
        }
    }

    /// Load a snapshot from a file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, TransportError> {
        let config = std::fs::read_to_string(path)?;
        Ok(Self::new(path.display().to_string(), config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl DeviceTransport for StaticDevice {
    fn running_config(&self, filter: &str) -> Result<String, TransportError> {
        apply_output_filter(&self.config, filter)
    }

    fn apply_config(&self, commands: &[String]) -> Result<(), TransportError> {
        Err(TransportError::Rejected {
            command: commands.first().cloned().unwrap_or_default(),
            message: format!("'{}' is a read-only snapshot", self.name),
        })
    }
}

/// Evaluate an IOS output modifier (`section REGEX`, `include REGEX`,
/// `exclude REGEX`) against configuration text.
pub fn apply_output_filter(text: &str, filter: &str) -> Result<String, TransportError> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Ok(text.to_string());
    }
    let (verb, pattern) = filter.split_once(' ').unwrap_or((filter, ""));
    let regex = Regex::new(pattern.trim()).map_err(|e| TransportError::Rejected {
        command: filter.to_string(),
        message: e.to_string(),
    })?;

    let lines: Vec<&str> = text.lines().collect();
    let selected: Vec<&str> = match verb {
        "include" | "i" => lines.into_iter().filter(|l| regex.is_match(l)).collect(),
        "exclude" | "e" => lines.into_iter().filter(|l| !regex.is_match(l)).collect(),
        "section" | "s" => {
            let mut out = Vec::new();
            let mut in_section = false;
            for line in lines {
                let top_level = !line.starts_with(' ');
                if top_level {
                    in_section = regex.is_match(line);
                }
                if in_section {
                    out.push(line);
                }
            }
            out
        }
        _ => {
            return Err(TransportError::Rejected {
                command: filter.to_string(),
                message: format!("unsupported output modifier '{}'", verb),
            })
        }
    };
    Ok(selected.join("\n"))
}
