//! Result-template mini-language.
//!
//! A result template maps destination paths in the facts tree to small
//! expressions evaluated over the capture groups of a matched line (and the
//! inherited shared context). Templates are plain data: they serialize to
//! and from YAML so pattern tables can be shipped as documents.
//!
//! ```yaml
//! result:
//!   address_family.afi: { var: afi }
//!   address_family.neighbor.remote_as: { int: { var: remote_as } }
//!   address_family.neighbor.activate: { present: activate }
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Variables visible while evaluating a template.
pub type Vars = HashMap<String, String>;

/// An expression over captured variables.
///
/// Serialized as a single-key map (`{ int: { var: x } }`) in every format,
/// YAML included.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The captured text, absent when the group did not participate.
    Var(String),
    /// A constant.
    Literal(Value),
    /// `true` when the named capture exists, otherwise absent.
    Present(String),
    /// `false` when the named capture exists, otherwise `true`; used for
    /// lines that carry an optional `no ` prefix.
    Absent(String),
    /// Integer conversion; text that is not an integer is kept as text.
    Int(Box<Expr>),
    /// Whitespace split into a list of strings.
    Split(Box<Expr>),
    /// Lower-cased text.
    Lower(Box<Expr>),
    /// First expression that yields a value, falling back to a constant.
    Default(Box<Expr>, Value),
    /// `{name}` placeholders substituted from variables; absent if any
    /// placeholder is unresolved.
    Format(String),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn present(name: &str) -> Self {
        Expr::Present(name.to_string())
    }

    pub fn absent(name: &str) -> Self {
        Expr::Absent(name.to_string())
    }

    pub fn int(name: &str) -> Self {
        Expr::Int(Box::new(Expr::var(name)))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn split(name: &str) -> Self {
        Expr::Split(Box::new(Expr::var(name)))
    }

    pub fn lower(name: &str) -> Self {
        Expr::Lower(Box::new(Expr::var(name)))
    }

    pub fn format(pattern: &str) -> Self {
        Expr::Format(pattern.to_string())
    }

    /// Wrap this expression with a fallback constant.
    pub fn or(self, fallback: impl Into<Value>) -> Self {
        Expr::Default(Box::new(self), fallback.into())
    }

    /// Evaluate against the given variables.
    pub fn eval(&self, vars: &Vars) -> Option<Value> {
        match self {
            Expr::Var(name) => vars.get(name).map(|s| Value::String(s.clone())),
            Expr::Literal(value) => Some(value.clone()),
            Expr::Present(name) => vars.get(name).map(|_| Value::Bool(true)),
            Expr::Absent(name) => Some(Value::Bool(!vars.contains_key(name))),
            Expr::Int(inner) => inner.eval(vars).map(|value| match value {
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or(Value::String(s)),
                other => other,
            }),
            Expr::Split(inner) => inner.eval(vars).map(|value| match value {
                Value::String(s) => Value::Array(
                    s.split_whitespace()
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                ),
                other => other,
            }),
            Expr::Lower(inner) => inner.eval(vars).map(|value| match value {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            }),
            Expr::Default(inner, fallback) => {
                inner.eval(vars).or_else(|| Some(fallback.clone()))
            }
            Expr::Format(pattern) => format_placeholders(pattern, vars).map(Value::String),
        }
    }

    /// Names of every variable this expression reads.
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Expr::Var(name) | Expr::Present(name) | Expr::Absent(name) => vec![name.as_str()],
            Expr::Literal(_) => Vec::new(),
            Expr::Int(inner) | Expr::Split(inner) | Expr::Lower(inner) => inner.variables(),
            Expr::Default(inner, _) => inner.variables(),
            Expr::Format(pattern) => placeholders(pattern),
        }
    }
}

/// Serde mirror of [`Expr`]; YAML would otherwise expect `!tag` syntax.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Tagged {
    Var(String),
    Literal(Value),
    Present(String),
    Absent(String),
    Int(Box<Expr>),
    Split(Box<Expr>),
    Lower(Box<Expr>),
    Default(Box<Expr>, Value),
    Format(String),
}

impl From<Tagged> for Expr {
    fn from(tagged: Tagged) -> Self {
        match tagged {
            Tagged::Var(name) => Expr::Var(name),
            Tagged::Literal(value) => Expr::Literal(value),
            Tagged::Present(name) => Expr::Present(name),
            Tagged::Absent(name) => Expr::Absent(name),
            Tagged::Int(inner) => Expr::Int(inner),
            Tagged::Split(inner) => Expr::Split(inner),
            Tagged::Lower(inner) => Expr::Lower(inner),
            Tagged::Default(inner, fallback) => Expr::Default(inner, fallback),
            Tagged::Format(pattern) => Expr::Format(pattern),
        }
    }
}

impl From<Expr> for Tagged {
    fn from(expr: Expr) -> Self {
        match expr {
            Expr::Var(name) => Tagged::Var(name),
            Expr::Literal(value) => Tagged::Literal(value),
            Expr::Present(name) => Tagged::Present(name),
            Expr::Absent(name) => Tagged::Absent(name),
            Expr::Int(inner) => Tagged::Int(inner),
            Expr::Split(inner) => Tagged::Split(inner),
            Expr::Lower(inner) => Tagged::Lower(inner),
            Expr::Default(inner, fallback) => Tagged::Default(inner, fallback),
            Expr::Format(pattern) => Tagged::Format(pattern),
        }
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde_yaml::with::singleton_map::serialize(&Tagged::from(self.clone()), serializer)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_yaml::with::singleton_map::deserialize::<Tagged, D>(deserializer).map(Expr::from)
    }
}

fn placeholders(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

fn format_placeholders(pattern: &str, vars: &Vars) -> Option<String> {
    let mut out = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        out.push_str(vars.get(&after[..end])?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Destination path → expression, evaluated in declaration order.
pub type ResultTemplate = IndexMap<String, Expr>;
