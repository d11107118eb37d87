//! Shared test utilities for the netres test suite.
//!
//! This module provides:
//! - [`SimulatedDevice`], an in-memory IOS-like device that applies
//!   configuration commands to a block tree
//! - Helpers for building facts and module parameters
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::{Arc, Mutex, OnceLock};

use netres::engine::{DeviceTransport, Facts};
use netres::error::TransportError;
use netres::modules::network::apply_output_filter;
use netres::modules::{ModuleContext, ModuleParams};
use regex::Regex;
use serde_json::Value;

// ============================================================================
// Simulated device
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Node {
    line: String,
    children: Vec<Node>,
}

impl Node {
    fn new(line: &str) -> Self {
        Self {
            line: line.to_string(),
            children: Vec::new(),
        }
    }
}

/// Nesting level of a line that opens a configuration block.
fn block_level(line: &str) -> Option<usize> {
    if line.starts_with("router bgp ")
        || line.starts_with("ip access-list ")
        || line.starts_with("interface ")
        || (line.starts_with("vlan ") && line[5..].chars().all(|c| c.is_ascii_digit()))
    {
        Some(0)
    } else if line.starts_with("address-family ") {
        Some(1)
    } else {
        None
    }
}

/// IOS prints the unicast address families without their SAFI.
fn canonical(line: &str) -> String {
    if line.starts_with("address-family ") {
        line.split(' ')
            .filter(|token| *token != "unicast")
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        line.to_string()
    }
}

fn children_at<'a>(root: &'a mut Vec<Node>, path: &[usize]) -> &'a mut Vec<Node> {
    let mut current = root;
    for index in path {
        current = &mut current[*index].children;
    }
    current
}

fn render_tree(nodes: &[Node], depth: usize, out: &mut String) {
    for node in nodes {
        out.push_str(&" ".repeat(depth));
        out.push_str(&node.line);
        out.push('\n');
        render_tree(&node.children, depth + 1, out);
    }
}

fn parse_tree(text: &str) -> Vec<Node> {
    let mut root: Vec<Node> = Vec::new();
    let mut path: Vec<usize> = Vec::new();
    for raw in text.lines() {
        let trimmed = raw.trim_end();
        let line = trimmed.trim_start();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let depth = trimmed.len() - line.len();
        path.truncate(depth);
        let siblings = children_at(&mut root, &path);
        siblings.push(Node::new(&canonical(line)));
        let index = siblings.len() - 1;
        if block_level(line).is_some() {
            path.push(index);
        }
    }
    root
}

/// An in-memory device that keeps its configuration as a block tree.
///
/// Commands are applied the way IOS applies them in configuration mode:
/// block lines enter (or create) a block, `no <block>` removes one, other
/// lines go into the current block, `no <line>` removes the matching line
/// or is stored when nothing matches (for settings that are on by default).
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    tree: Mutex<Vec<Node>>,
    sent: Mutex<Vec<Vec<String>>>,
    reject: Option<String>,
}

impl SimulatedDevice {
    pub fn new(running: &str) -> Self {
        Self {
            tree: Mutex::new(parse_tree(running)),
            ..Self::default()
        }
    }

    /// Reject any batch containing a command starting with `prefix`.
    pub fn rejecting(mut self, prefix: &str) -> Self {
        self.reject = Some(prefix.to_string());
        self
    }

    /// Whole running configuration.
    pub fn running(&self) -> String {
        let mut out = String::new();
        render_tree(&self.tree.lock().unwrap(), 0, &mut out);
        out
    }

    /// Batches of commands received so far.
    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn into_context(self: Arc<Self>) -> ModuleContext {
        let device: Arc<dyn DeviceTransport + Send + Sync> = self;
        ModuleContext::new().with_device(device)
    }

    fn apply(&self, commands: &[String]) {
        let mut tree = self.tree.lock().unwrap();
        let mut path: Vec<usize> = Vec::new();

        for command in commands {
            let command = canonical(command.trim());
            let (negated, body) = match command.strip_prefix("no ") {
                Some(rest) => (true, rest.to_string()),
                None => (false, command.clone()),
            };

            if let Some(level) = block_level(&body) {
                path.truncate(level);
                let siblings = children_at(&mut tree, &path);
                let found = siblings.iter().position(|n| n.line == body);
                if negated {
                    if let Some(index) = found {
                        siblings.remove(index);
                    }
                    continue;
                }
                let index = found.unwrap_or_else(|| {
                    siblings.push(Node::new(&body));
                    siblings.len() - 1
                });
                path.push(index);
                continue;
            }

            let siblings = children_at(&mut tree, &path);
            if negated {
                let prefix = format!("{} ", body);
                match siblings
                    .iter()
                    .position(|n| n.line == body || n.line.starts_with(&prefix))
                {
                    Some(index) => {
                        siblings.remove(index);
                    }
                    None => siblings.push(Node::new(&command)),
                }
                continue;
            }

            let disabled = format!("no {}", body);
            siblings.retain(|n| n.line != disabled);
            if siblings.iter().any(|n| n.line == body) {
                continue;
            }
            let key = setting_key(&body);
            let replaced = key.and_then(|key| {
                siblings
                    .iter()
                    .position(|n| setting_key(&n.line).as_deref() == Some(key.as_str()))
            });
            match replaced {
                Some(index) => siblings[index] = Node::new(&body),
                None => siblings.push(Node::new(&body)),
            }
        }
    }
}

/// Lines that hold a single value: a new value replaces the old line.
fn settings() -> &'static [Regex] {
    static SETTINGS: OnceLock<Vec<Regex>> = OnceLock::new();
    SETTINGS.get_or_init(|| {
        [
            r"^(\d+) ",
            r"^(name|mtu|state|bgp router-id|default-metric|timers bgp|table-map|snmp-server contact|snmp-server location|snmp-server packetsize) ",
            r"^(neighbor \S+ (?:remote-as|description|update-source|password|send-community))\b",
            r"^(neighbor \S+ route-map) \S+ (in|out)$",
            r"^(snmp-server (?:community|host) \S+)\b",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect()
    })
}

fn setting_key(line: &str) -> Option<String> {
    settings().iter().find_map(|regex| {
        regex.captures(line).map(|caps| {
            caps.iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
    })
}

impl DeviceTransport for SimulatedDevice {
    fn running_config(&self, filter: &str) -> Result<String, TransportError> {
        apply_output_filter(&self.running(), filter)
    }

    fn apply_config(&self, commands: &[String]) -> Result<(), TransportError> {
        if let Some(prefix) = &self.reject {
            if let Some(bad) = commands.iter().find(|c| c.starts_with(prefix.as_str())) {
                return Err(TransportError::Rejected {
                    command: bad.clone(),
                    message: "% Invalid input detected at '^' marker.".to_string(),
                });
            }
        }
        self.sent.lock().unwrap().push(commands.to_vec());
        self.apply(commands);
        Ok(())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// A facts tree from a JSON object literal.
pub fn facts(value: Value) -> Facts {
    value
        .as_object()
        .cloned()
        .expect("facts must be a JSON object")
}

/// Module parameters for a state and an optional config.
pub fn params(state: &str, config: Option<Value>) -> ModuleParams {
    let mut params = ModuleParams::new();
    params.insert("state".to_string(), Value::from(state));
    if let Some(config) = config {
        params.insert("config".to_string(), config);
    }
    params
}
