//! Pattern tables.
//!
//! A [`PatternTable`] is the shared, read-only input of both directions of
//! the engine: the line parser asks it which rule matches a line, the diff
//! engine asks it for natural keys and atomic fields, and the command
//! renderer asks it for render templates. Keeping both directions on one
//! table is what makes parsing and rendering symmetric.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use minijinja::Environment;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::facts::{join_path, scalar_repr, Facts};
use super::rule::{PatternRule, Render, RuleKind, RuleSpec};
use crate::error::{Error, Result};

/// Declarative description of a whole table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSpec {
    /// Table (resource) name
    pub name: String,
    /// Identity fields of the root container
    pub root_keys: Vec<String>,
    /// Sequence path → natural key fields
    pub sequences: IndexMap<String, Vec<String>>,
    /// Key field path → value assumed when desired config omits it
    pub key_defaults: IndexMap<String, Value>,
    /// Rules in match order
    pub rules: Vec<RuleSpec>,
}

impl TableSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn root_keys(mut self, keys: &[&str]) -> Self {
        self.root_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn sequence(mut self, path: &str, keys: &[&str]) -> Self {
        self.sequences
            .insert(path.to_string(), keys.iter().map(|k| k.to_string()).collect());
        self
    }

    /// Declare the value a natural-key field takes when it is left out, as
    /// the device does when it prints `address-family ipv4` for unicast.
    pub fn key_default(mut self, field_path: &str, value: impl Into<Value>) -> Self {
        self.key_defaults.insert(field_path.to_string(), value.into());
        self
    }

    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Ordered content of an entity, as the renderer visits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityItem {
    /// A field rule, by index into the table
    Field(usize),
    /// A nested sequence path
    Child(String),
}

/// A compiled, validated pattern table.
pub struct PatternTable {
    name: String,
    rules: Vec<PatternRule>,
    root_keys: Vec<String>,
    sequences: IndexMap<String, Vec<String>>,
    key_defaults: HashMap<String, Vec<(String, Value)>>,
    items: HashMap<String, Vec<EntityItem>>,
    env: Environment<'static>,
}

impl fmt::Debug for PatternTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternTable")
            .field("name", &self.name)
            .field("rules", &self.rules.len())
            .field("root_keys", &self.root_keys)
            .field("sequences", &self.sequences)
            .finish()
    }
}

impl PatternTable {
    /// Compile and validate a table.
    ///
    /// Every problem found here is a [`Error::TableConstruction`]: a bad
    /// table never reaches the parser.
    pub fn new(spec: TableSpec) -> Result<Self> {
        let table_name = spec.name.clone();
        let fail = |rule: &str, message: String| Error::TableConstruction {
            table: table_name.clone(),
            rule: rule.to_string(),
            message,
        };

        for (path, keys) in &spec.sequences {
            if keys.is_empty() {
                return Err(fail(path, "sequence declares an empty natural key".to_string()));
            }
        }

        let mut key_defaults: HashMap<String, Vec<(String, Value)>> = HashMap::new();
        for (field_path, value) in spec.key_defaults {
            let declared = field_path
                .rsplit_once('.')
                .filter(|(path, field)| {
                    spec.sequences
                        .get(*path)
                        .map_or(false, |keys| keys.iter().any(|k| k.as_str() == *field))
                });
            let Some((path, field)) = declared else {
                return Err(fail(
                    &field_path,
                    "key default does not name a key field of a declared sequence".to_string(),
                ));
            };
            key_defaults
                .entry(path.to_string())
                .or_default()
                .push((field.to_string(), value));
        }

        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);

        let mut rules: Vec<PatternRule> = Vec::with_capacity(spec.rules.len());
        for rule in spec.rules {
            if rules.iter().any(|r| r.name == rule.name) {
                return Err(fail(&rule.name, "duplicate rule name".to_string()));
            }
            let getval = Regex::new(&rule.getval)
                .map_err(|e| fail(&rule.name, format!("invalid extraction pattern: {}", e)))?;
            if !rule.path.is_empty() && !spec.sequences.contains_key(&rule.path) {
                return Err(fail(
                    &rule.name,
                    format!("path '{}' is not a declared sequence", rule.path),
                ));
            }

            let render = match (rule.render_fn, &rule.setval) {
                (Some(function), _) => Some(Render::Function(function)),
                (None, Some(source)) => {
                    env.add_template_owned(rule.name.clone(), source.clone())
                        .map_err(|e| fail(&rule.name, format!("invalid render template: {}", e)))?;
                    Some(Render::Template(source.clone()))
                }
                (None, None) => None,
            };

            let kind = match (rule.context, rule.compval) {
                (true, Some(_)) => {
                    return Err(fail(&rule.name, "a context rule cannot own a field".to_string()))
                }
                (true, None) => RuleKind::Context,
                (false, Some(field)) => RuleKind::Field(field),
                (false, None) if render.is_some() => RuleKind::Entity,
                (false, None) => RuleKind::ParseOnly,
            };
            if kind == RuleKind::Context && render.is_none() {
                return Err(fail(&rule.name, "a context rule needs a render template".to_string()));
            }

            rules.push(PatternRule {
                name: rule.name,
                getval,
                result: rule.result,
                render,
                path: rule.path,
                kind,
                shared: rule.shared,
                depth: rule.depth,
            });
        }

        let table = Self {
            name: spec.name,
            rules,
            root_keys: spec.root_keys,
            sequences: spec.sequences,
            key_defaults,
            items: HashMap::new(),
            env,
        };
        table.check_entity_rules()?;
        let items = table.compute_items();

        debug!(table = %table.name, rules = table.rules.len(), "pattern table compiled");
        Ok(Self { items, ..table })
    }

    /// Load a table from a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let spec: TableSpec = serde_yaml::from_str(source)?;
        Self::new(spec)
    }

    fn check_entity_rules(&self) -> Result<()> {
        let mut contexts: HashMap<&str, &str> = HashMap::new();
        for rule in &self.rules {
            let conflict = match rule.kind {
                RuleKind::Context => {
                    if let Some(other) = contexts.insert(rule.path.as_str(), rule.name.as_str()) {
                        Some(format!("second context rule for '{}' (first: '{}')", rule.path, other))
                    } else {
                        None
                    }
                }
                RuleKind::Entity => self
                    .rules
                    .iter()
                    .find(|r| r.path == rule.path && matches!(r.kind, RuleKind::Field(_)))
                    .map(|r| {
                        format!(
                            "entity rule conflicts with field rule '{}' on '{}'",
                            r.name, rule.path
                        )
                    }),
                _ => None,
            };
            if let Some(message) = conflict {
                return Err(Error::TableConstruction {
                    table: self.name.clone(),
                    rule: rule.name.clone(),
                    message,
                });
            }
        }
        Ok(())
    }

    fn compute_items(&self) -> HashMap<String, Vec<EntityItem>> {
        let mut items: HashMap<String, Vec<EntityItem>> = HashMap::new();
        let register_chain = |items: &mut HashMap<String, Vec<EntityItem>>, path: &str| {
            let mut child = path.to_string();
            while !child.is_empty() {
                let parent = self.parent_entity(&child);
                let entry = items.entry(parent.clone()).or_default();
                let item = EntityItem::Child(child.clone());
                if !entry.contains(&item) {
                    entry.push(item);
                }
                child = parent;
            }
        };

        for (index, rule) in self.rules.iter().enumerate() {
            register_chain(&mut items, &rule.path);
            if let RuleKind::Field(_) = rule.kind {
                items
                    .entry(rule.path.clone())
                    .or_default()
                    .push(EntityItem::Field(index));
            }
        }
        for path in self.sequences.keys() {
            register_chain(&mut items, path);
        }
        items
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> &PatternRule {
        &self.rules[index]
    }

    /// First rule, in table order, whose pattern matches the line.
    pub fn match_line<'l>(&self, line: &'l str) -> Option<(&PatternRule, Captures<'l>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.getval.captures(line).map(|caps| (rule, caps)))
    }

    pub fn is_sequence(&self, path: &str) -> bool {
        self.sequences.contains_key(path)
    }

    pub fn sequences(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.sequences.iter().map(|(p, k)| (p.as_str(), k.as_slice()))
    }

    /// Identity fields of the entity at `path`: the root keys for the root,
    /// the natural key for a sequence element.
    pub fn identity_keys(&self, path: &str) -> &[String] {
        if path.is_empty() {
            &self.root_keys
        } else {
            self.sequences.get(path).map(Vec::as_slice).unwrap_or(&[])
        }
    }

    /// Whether `key` is an identity field of the entity at `path`.
    pub fn is_identity(&self, path: &str, key: &str) -> bool {
        self.identity_keys(path).iter().any(|k| k == key)
    }

    /// Natural key of a sequence element, in canonical text form.
    pub fn key_of(&self, path: &str, element: &Facts) -> Vec<Option<String>> {
        self.identity_keys(path)
            .iter()
            .map(|k| element.get(k).and_then(scalar_repr))
            .collect()
    }

    /// Fill declared key defaults into every sequence element that omits
    /// the field, so desired config matches what the parser reports.
    pub fn with_key_defaults(&self, facts: &Facts) -> Facts {
        let mut out = facts.clone();
        if !self.key_defaults.is_empty() {
            self.fill_key_defaults(&mut out, "");
        }
        out
    }

    fn fill_key_defaults(&self, facts: &mut Facts, base: &str) {
        for (key, value) in facts.iter_mut() {
            let child = join_path(base, key);
            match value {
                Value::Array(items) if self.is_sequence(&child) => {
                    let defaults = self.key_defaults.get(&child);
                    for element in items.iter_mut().filter_map(Value::as_object_mut) {
                        for (field, default) in defaults.into_iter().flatten() {
                            element
                                .entry(field.clone())
                                .or_insert_with(|| default.clone());
                        }
                        self.fill_key_defaults(element, &child);
                    }
                }
                Value::Object(map) => self.fill_key_defaults(map, &child),
                _ => {}
            }
        }
    }

    /// Human readable natural key, for error messages.
    pub fn describe_key(&self, path: &str, element: &Facts) -> String {
        let parts: Vec<String> = self
            .identity_keys(path)
            .iter()
            .filter_map(|k| {
                element
                    .get(k)
                    .and_then(scalar_repr)
                    .map(|v| format!("{}={}", k, v))
            })
            .collect();
        format!("{{{}}}", parts.join(", "))
    }

    /// Nearest enclosing entity (declared sequence or the root) of a path.
    pub fn parent_entity(&self, path: &str) -> String {
        self.sequences
            .keys()
            .filter(|s| path.len() > s.len() && path.starts_with(s.as_str()) && path[s.len()..].starts_with('.'))
            .max_by_key(|s| s.len())
            .cloned()
            .unwrap_or_default()
    }

    pub fn context_rule(&self, path: &str) -> Option<&PatternRule> {
        self.rules
            .iter()
            .find(|r| r.path == path && r.kind == RuleKind::Context)
    }

    pub fn entity_rule(&self, path: &str) -> Option<&PatternRule> {
        self.rules
            .iter()
            .find(|r| r.path == path && r.kind == RuleKind::Entity)
    }

    /// Containers are removed by identity alone: the root, entities opened
    /// by a context rule, and grouping entities that own no rule of their own.
    pub fn is_container(&self, path: &str) -> bool {
        path.is_empty()
            || self.context_rule(path).is_some()
            || !self.rules.iter().any(|r| {
                r.path == path && matches!(r.kind, RuleKind::Entity | RuleKind::Field(_))
            })
    }

    /// Whether a field path is owned by a rule and so compared as a whole.
    pub fn is_atomic(&self, field_path: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.field_path().as_deref() == Some(field_path))
    }

    /// The rendering rule that owns a field path.
    pub fn field_rule(&self, field_path: &str) -> Option<&PatternRule> {
        self.rules
            .iter()
            .find(|r| r.can_render() && r.field_path().as_deref() == Some(field_path))
    }

    /// Field rules and child sequences of an entity, in table order.
    pub fn entity_items(&self, path: &str) -> &[EntityItem] {
        self.items.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Render the rule owning `field_path` (a field, or an entity/context
    /// path) against `subtree`.
    pub fn render(&self, field_path: &str, subtree: &Facts) -> Result<Vec<String>> {
        let rule = self
            .field_rule(field_path)
            .or_else(|| self.entity_rule(field_path))
            .or_else(|| self.context_rule(field_path))
            .ok_or_else(|| Error::RenderLookup {
                table: self.name.clone(),
                path: field_path.to_string(),
            })?;
        self.render_rule(rule, subtree)
    }

    /// Apply a rule's render template to a set of variables.
    pub fn render_rule(&self, rule: &PatternRule, vars: &Facts) -> Result<Vec<String>> {
        let output = match &rule.render {
            None => {
                return Err(Error::RenderLookup {
                    table: self.name.clone(),
                    path: rule.field_path().unwrap_or_else(|| rule.path.clone()),
                })
            }
            Some(Render::Function(function)) => function(vars),
            Some(Render::Template(_)) => {
                let template = self.env.get_template(&rule.name).map_err(|e| Error::Render {
                    rule: rule.name.clone(),
                    message: e.to_string(),
                })?;
                let rendered = template.render(vars).map_err(|e| Error::Render {
                    rule: rule.name.clone(),
                    message: e.to_string(),
                })?;
                rendered.lines().map(str::to_string).collect()
            }
        };
        Ok(output
            .iter()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|line| !line.is_empty())
            .collect())
    }
}
