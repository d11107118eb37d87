//! Pattern rules.
//!
//! A [`RuleSpec`] is the declarative form of a rule, buildable in code or
//! deserialized from YAML. [`PatternTable::new`](super::PatternTable::new)
//! compiles specs into [`PatternRule`]s.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::facts::{join_path, Facts};
use super::template::{Expr, ResultTemplate};

/// A render function for lines that a string template cannot express.
pub type RenderFn = fn(&Facts) -> Vec<String>;

/// How a rule turns structured data back into CLI lines.
#[derive(Clone)]
pub enum Render {
    /// A minijinja template; each non-empty output line is one command.
    Template(String),
    /// A pure function of the entity variables.
    Function(RenderFn),
}

impl fmt::Debug for Render {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Render::Template(source) => f.debug_tuple("Template").field(source).finish(),
            Render::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Declarative description of one rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Unique rule name
    pub name: String,
    /// Extraction regex with named capture groups
    pub getval: String,
    /// Destination path → expression
    pub result: ResultTemplate,
    /// Render template source
    pub setval: Option<String>,
    /// Entity path the rule belongs to ("" for the root)
    pub path: String,
    /// Field of the entity owned by this rule
    pub compval: Option<String>,
    /// Whether the captures persist as parsing context
    pub shared: bool,
    /// Nesting depth of the shared context
    pub depth: usize,
    /// Whether the rendered line opens a configuration block
    pub context: bool,
    #[serde(skip)]
    pub render_fn: Option<RenderFn>,
}

impl RuleSpec {
    pub fn new(name: &str, getval: &str) -> Self {
        Self {
            name: name.to_string(),
            getval: getval.to_string(),
            ..Self::default()
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn compval(mut self, field: &str) -> Self {
        self.compval = Some(field.to_string());
        self
    }

    pub fn result(mut self, destination: &str, expr: Expr) -> Self {
        self.result.insert(destination.to_string(), expr);
        self
    }

    pub fn setval(mut self, template: &str) -> Self {
        self.setval = Some(template.to_string());
        self
    }

    pub fn render_with(mut self, render: RenderFn) -> Self {
        self.render_fn = Some(render);
        self
    }

    pub fn shared(mut self, depth: usize) -> Self {
        self.shared = true;
        self.depth = depth;
        self
    }

    pub fn context(mut self) -> Self {
        self.context = true;
        self
    }
}

/// Role a rule plays for the entity at its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Opens a configuration block for the entity
    Context,
    /// Renders the whole entity as one line
    Entity,
    /// Renders one field of the entity
    Field(String),
    /// Only contributes to parsing
    ParseOnly,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub name: String,
    pub getval: Regex,
    pub result: ResultTemplate,
    pub render: Option<Render>,
    pub path: String,
    pub kind: RuleKind,
    pub shared: bool,
    pub depth: usize,
}

impl PatternRule {
    /// Full schema path of the field owned by a field rule.
    pub fn field_path(&self) -> Option<String> {
        match &self.kind {
            RuleKind::Field(field) => Some(join_path(&self.path, field)),
            _ => None,
        }
    }

    /// The field owned by a field rule, relative to the entity.
    pub fn compval(&self) -> Option<&str> {
        match &self.kind {
            RuleKind::Field(field) => Some(field.as_str()),
            _ => None,
        }
    }

    pub fn can_render(&self) -> bool {
        self.render.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_spec_builder() {
        let spec = RuleSpec::new("neighbor.remote_as", r"^neighbor (?P<address>\S+) remote-as (?P<remote_as>\d+)")
            .path("neighbor")
            .compval("remote_as")
            .result("neighbor.address", Expr::var("address"))
            .result("neighbor.remote_as", Expr::int("remote_as"))
            .setval("neighbor {{ address }} remote-as {{ remote_as }}");

        assert_eq!(spec.path, "neighbor");
        assert_eq!(spec.compval.as_deref(), Some("remote_as"));
        assert_eq!(spec.result.len(), 2);
        assert!(!spec.shared);
    }

    #[test]
    fn test_rule_spec_from_yaml() {
        let yaml = r#"
name: vlan
getval: '^vlan (?P<vlan_id>\d+)$'
path: vlans
context: true
shared: true
result:
  vlans.vlan_id: { int: { var: vlan_id } }
setval: 'vlan {{ vlan_id }}'
"#;
        let spec: RuleSpec = serde_yaml::from_str(yaml).unwrap();
        assert!(spec.context);
        assert!(spec.shared);
        assert_eq!(spec.depth, 0);
        assert_eq!(spec.result["vlans.vlan_id"], Expr::int("vlan_id"));
    }

    #[test]
    fn test_render_debug() {
        fn none(_: &Facts) -> Vec<String> {
            Vec::new()
        }
        assert_eq!(format!("{:?}", Render::Function(none)), "Function(..)");
    }
}
