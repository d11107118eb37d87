//! Command renderer: delta to ordered CLI lines.
//!
//! The renderer walks `to_remove` (negated) and then `to_add` (positive)
//! depth-first. Commands are collected into groups keyed by the chain of
//! context lines that must be entered before them. Groups are emitted in the
//! order they were first seen, parents before children, and context lines
//! already entered for the previous group are not repeated.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use super::diff::Delta;
use super::facts::{get_path, join_path, relative_path, Facts};
use super::table::{EntityItem, PatternTable};
use crate::error::{Error, Result};

/// Negate a command: strip an existing `no ` prefix or add one.
pub fn negate_line(line: &str) -> String {
    match line.strip_prefix("no ") {
        Some(rest) => rest.to_string(),
        None => format!("no {}", line),
    }
}

#[derive(Debug, Default)]
struct Group {
    commands: Vec<String>,
    explicit: bool,
}

/// Accumulates commands per context chain.
#[derive(Debug, Default)]
struct Emitter {
    groups: IndexMap<Vec<String>, Group>,
}

impl Emitter {
    fn group(&mut self, chain: &[String]) -> &mut Group {
        for depth in 0..chain.len() {
            if !self.groups.contains_key(&chain[..depth]) {
                self.groups.insert(chain[..depth].to_vec(), Group::default());
            }
        }
        self.groups.entry(chain.to_vec()).or_default()
    }

    fn open(&mut self, chain: &[String], explicit: bool) {
        let group = self.group(chain);
        group.explicit |= explicit;
    }

    fn push(&mut self, chain: &[String], command: String) {
        trace!(context = ?chain, command = %command, "command emitted");
        self.group(chain).commands.push(command);
    }

    fn finish(self) -> Vec<String> {
        let mut out = Vec::new();
        let mut entered: Vec<String> = Vec::new();
        for (chain, group) in self.groups {
            if group.commands.is_empty() && !group.explicit {
                continue;
            }
            let shared = entered
                .iter()
                .zip(&chain)
                .take_while(|(a, b)| a == b)
                .count();
            out.extend(chain[shared..].iter().cloned());
            out.extend(group.commands);
            entered = chain;
        }
        out
    }
}

/// Renderer bound to one pattern table.
#[derive(Debug)]
pub struct CommandRenderer<'t> {
    table: &'t PatternTable,
}

impl<'t> CommandRenderer<'t> {
    pub fn new(table: &'t PatternTable) -> Self {
        Self { table }
    }

    /// Render a delta into commands.
    pub fn render(&self, delta: &Delta) -> Result<Vec<String>> {
        let mut emitter = Emitter::default();
        if !delta.to_remove.is_empty() {
            self.entity(&delta.to_remove, "", &Facts::new(), &[], true, &mut emitter)?;
        }
        if !delta.to_add.is_empty() {
            self.entity(&delta.to_add, "", &Facts::new(), &[], false, &mut emitter)?;
        }
        Ok(emitter.finish())
    }

    fn entity(
        &self,
        entity: &Facts,
        path: &str,
        inherited: &Facts,
        chain: &[String],
        negate: bool,
        emitter: &mut Emitter,
    ) -> Result<()> {
        let mut vars = inherited.clone();
        vars.extend(entity.iter().map(|(k, v)| (k.clone(), v.clone())));
        let identity_only = entity.keys().all(|k| self.table.is_identity(path, k));

        let mut chain = chain.to_vec();
        if let Some(rule) = self.table.context_rule(path) {
            let lines = self.table.render_rule(rule, &vars)?;
            if negate && identity_only {
                for line in lines {
                    emitter.push(&chain, negate_line(&line));
                }
                return Ok(());
            }
            chain.extend(lines);
            emitter.open(&chain, !negate);
        }

        if let Some(rule) = self.table.entity_rule(path) {
            for line in self.table.render_rule(rule, &vars)? {
                emitter.push(&chain, if negate { negate_line(&line) } else { line });
            }
            return Ok(());
        }

        self.check_coverage(entity, path, path)?;

        let mut rendered: HashSet<String> = HashSet::new();
        for item in self.table.entity_items(path) {
            match item {
                EntityItem::Field(index) => {
                    let rule = self.table.rule(*index);
                    let (Some(field), Some(field_path)) = (rule.compval(), rule.field_path()) else {
                        continue;
                    };
                    let Some(value) = get_path(entity, field) else {
                        continue;
                    };
                    if !rule.can_render() || !rendered.insert(field_path.clone()) {
                        continue;
                    }
                    let negated = negate ^ (value == &Value::Bool(false));
                    for line in self.table.render_rule(rule, &vars)? {
                        emitter.push(&chain, if negated { negate_line(&line) } else { line });
                    }
                }
                EntityItem::Child(child) => {
                    let Some(relative) = relative_path(path, child) else {
                        continue;
                    };
                    let Some(Value::Array(elements)) = get_path(entity, relative) else {
                        continue;
                    };
                    for element in elements.iter().filter_map(Value::as_object) {
                        self.entity(element, child, &vars, &chain, negate, emitter)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Every non-identity leaf of an entity must be owned by a rendering
    /// rule or belong to a nested sequence.
    fn check_coverage(&self, map: &Facts, base: &str, entity: &str) -> Result<()> {
        for (key, value) in map {
            if base == entity && self.table.is_identity(entity, key) {
                continue;
            }
            let child = join_path(base, key);
            if self.table.is_sequence(&child) {
                continue;
            }
            if self.table.is_atomic(&child) {
                if self.table.field_rule(&child).is_none() {
                    return Err(Error::RenderLookup {
                        table: self.table.name().to_string(),
                        path: child,
                    });
                }
                continue;
            }
            match value {
                Value::Object(nested) => self.check_coverage(nested, &child, entity)?,
                _ => {
                    return Err(Error::RenderLookup {
                        table: self.table.name().to_string(),
                        path: child,
                    })
                }
            }
        }
        Ok(())
    }
}

/// Render `delta` with `table`.
pub fn render(delta: &Delta, table: &PatternTable) -> Result<Vec<String>> {
    CommandRenderer::new(table).render(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::diff::{diff, MergePolicy};
    use crate::engine::rule::RuleSpec;
    use crate::engine::table::TableSpec;
    use crate::engine::template::Expr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn obj(value: Value) -> Facts {
        value.as_object().cloned().unwrap()
    }

    fn table() -> PatternTable {
        PatternTable::new(
            TableSpec::new("bgp")
                .root_keys(&["as_number"])
                .sequence("neighbor", &["address"])
                .sequence("address_family", &["afi", "safi"])
                .sequence("address_family.network", &["address"])
                .rule(
                    RuleSpec::new("router", r"^router bgp (?P<as_number>\d+)$")
                        .context()
                        .shared(0)
                        .result("as_number", Expr::int("as_number"))
                        .setval("router bgp {{ as_number }}"),
                )
                .rule(
                    RuleSpec::new("log", r"^\s+(?P<neg>no )?bgp log-neighbor-changes$")
                        .compval("log_neighbor_changes")
                        .result("as_number", Expr::int("as_number"))
                        .result("log_neighbor_changes", Expr::absent("neg"))
                        .setval("bgp log-neighbor-changes"),
                )
                .rule(
                    RuleSpec::new("neighbor.remote_as", r"^\s+neighbor (?P<address>\S+) remote-as (?P<remote_as>\d+)$")
                        .path("neighbor")
                        .compval("remote_as")
                        .result("neighbor.address", Expr::var("address"))
                        .result("neighbor.remote_as", Expr::int("remote_as"))
                        .setval("neighbor {{ address }} remote-as {{ remote_as }}"),
                )
                .rule(
                    RuleSpec::new("neighbor.description", r"^\s+neighbor (?P<address>\S+) description (?P<description>.+)$")
                        .path("neighbor")
                        .compval("description")
                        .result("neighbor.address", Expr::var("address"))
                        .result("neighbor.description", Expr::var("description"))
                        .setval("neighbor {{ address }} description {{ description }}"),
                )
                .rule(
                    RuleSpec::new("address_family", r"^\s+address-family (?P<afi>\S+) (?P<safi>\S+)$")
                        .path("address_family")
                        .context()
                        .shared(1)
                        .result("address_family.afi", Expr::var("afi"))
                        .result("address_family.safi", Expr::var("safi"))
                        .setval("address-family {{ afi }} {{ safi }}"),
                )
                .rule(
                    RuleSpec::new("network", r"^\s+network (?P<address>\S+)$")
                        .path("address_family.network")
                        .result("address_family.afi", Expr::var("afi"))
                        .result("address_family.safi", Expr::var("safi"))
                        .result("address_family.network.address", Expr::var("address"))
                        .setval("network {{ address }}"),
                ),
        )
        .unwrap()
    }

    #[test]
    fn test_negate_line() {
        assert_eq!(negate_line("shutdown"), "no shutdown");
        assert_eq!(negate_line("no shutdown"), "shutdown");
    }

    #[test]
    fn test_merged_change_renders_inside_root_context() {
        let have = obj(json!({"as_number": 65000, "neighbor": [{"address": "192.0.2.1", "remote_as": 10}]}));
        let want = obj(json!({"as_number": 65000, "neighbor": [{"address": "192.0.2.1", "remote_as": 20}]}));
        let delta = diff(&want, &have, MergePolicy::Merged, &table()).unwrap();
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec!["router bgp 65000", "neighbor 192.0.2.1 remote-as 20"]
        );
    }

    #[test]
    fn test_context_line_precedes_children() {
        let have = obj(json!({"as_number": 1}));
        let want = obj(json!({
            "as_number": 1,
            "address_family": [{"afi": "ipv4", "safi": "multicast", "network": [{"address": "10.0.0.0"}]}],
            "neighbor": [{"address": "192.0.2.9", "remote_as": 9}]
        }));
        let delta = diff(&want, &have, MergePolicy::Merged, &table()).unwrap();
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec![
                "router bgp 1",
                "neighbor 192.0.2.9 remote-as 9",
                "address-family ipv4 multicast",
                "network 10.0.0.0"
            ]
        );
    }

    #[test]
    fn test_removed_context_entity_is_one_negated_line() {
        let have = obj(json!({
            "as_number": 1,
            "address_family": [{"afi": "ipv6", "safi": "multicast", "network": [{"address": "2001:db8::"}]}]
        }));
        let want = obj(json!({"as_number": 1}));
        let delta = diff(&want, &have, MergePolicy::Overridden, &table()).unwrap();
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec!["router bgp 1", "no address-family ipv6 multicast"]
        );
    }

    #[test]
    fn test_false_inverts_negation() {
        let delta = Delta {
            to_add: obj(json!({"as_number": 1, "log_neighbor_changes": false})),
            ..Delta::default()
        };
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec!["router bgp 1", "no bgp log-neighbor-changes"]
        );
    }

    #[test]
    fn test_purge_is_negated_root_context() {
        let have = obj(json!({"as_number": 1, "neighbor": [{"address": "192.0.2.1", "remote_as": 2}]}));
        let delta = diff(&Facts::new(), &have, MergePolicy::Purged, &table()).unwrap();
        assert_eq!(render(&delta, &table()).unwrap(), vec!["no router bgp 1"]);
    }

    #[test]
    fn test_removals_precede_additions_in_group() {
        let have = obj(json!({"as_number": 1, "neighbor": [{"address": "192.0.2.1", "remote_as": 2, "description": "old"}]}));
        let want = obj(json!({"as_number": 1, "neighbor": [{"address": "192.0.2.1", "remote_as": 3}]}));
        let delta = diff(&want, &have, MergePolicy::Replaced, &table()).unwrap();
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec![
                "router bgp 1",
                "no neighbor 192.0.2.1 remote-as 2",
                "no neighbor 192.0.2.1 description old",
                "neighbor 192.0.2.1 remote-as 3"
            ]
        );
    }

    #[test]
    fn test_unowned_field_is_render_lookup_error() {
        let delta = Delta {
            to_add: obj(json!({"as_number": 1, "neighbor": [{"address": "192.0.2.1", "password": "x"}]})),
            ..Delta::default()
        };
        let err = render(&delta, &table()).unwrap_err();
        assert!(matches!(err, Error::RenderLookup { ref path, .. } if path == "neighbor.password"));
        assert!(err.is_internal());
    }

    #[test]
    fn test_new_context_entity_without_fields_is_emitted() {
        let delta = Delta {
            to_add: obj(json!({"as_number": 1, "address_family": [{"afi": "ipv4", "safi": "unicast"}]})),
            ..Delta::default()
        };
        assert_eq!(
            render(&delta, &table()).unwrap(),
            vec!["router bgp 1", "address-family ipv4 unicast"]
        );
    }
}
