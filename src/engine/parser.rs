//! Line parser: raw device text to a facts tree.
//!
//! The parser walks normalized lines once, asks the [`PatternTable`] for the
//! first matching rule, evaluates the rule's result template and merges the
//! fragment into the accumulated tree.
//!
//! Device configuration has no closing delimiters for nested blocks, so the
//! parser keeps an explicit context stack. A `shared` rule at depth `d`
//! drops every frame at depth `d` or deeper and pushes a new frame. A frame
//! holds the rule's captures overlaid with the scalar values its result
//! template produced (keyed by field name), which lets defaults such as an
//! implied `safi: unicast` flow into the lines that follow.

use serde_json::Value;
use tracing::{debug, trace};

use super::facts::{join_path, merge_facts, set_path, Facts};
use super::rule::PatternRule;
use super::table::PatternTable;
use super::template::Vars;

/// Banners and prompts printed around a configuration dump.
const BANNER_PREFIXES: &[&str] = &[
    "Building configuration",
    "Current configuration",
    "Last configuration change",
    "NVRAM config last updated",
];

/// Split raw text into logical configuration lines.
pub fn normalize_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches(['\r', ' ', '\t']))
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.is_empty()
                && !trimmed.starts_with('!')
                && !BANNER_PREFIXES.iter().any(|p| trimmed.starts_with(p))
                && trimmed != "end"
        })
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
struct Frame {
    depth: usize,
    vars: Vars,
}

/// Parser bound to one pattern table.
#[derive(Debug)]
pub struct LineParser<'t> {
    table: &'t PatternTable,
}

impl<'t> LineParser<'t> {
    pub fn new(table: &'t PatternTable) -> Self {
        Self { table }
    }

    /// Parse raw text into a facts tree. Lines matching no rule are skipped.
    pub fn parse(&self, text: &str) -> Facts {
        let mut facts = Facts::new();
        let mut stack: Vec<Frame> = Vec::new();
        let mut matched = 0usize;
        let lines = normalize_lines(text);

        for line in &lines {
            let Some((rule, caps)) = self.table.match_line(line) else {
                trace!(line = %line, "no rule matched");
                continue;
            };
            matched += 1;

            let captures: Vars = rule
                .getval
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect();

            if rule.shared {
                stack.retain(|frame| frame.depth < rule.depth);
            }

            let mut vars = Vars::new();
            for frame in &stack {
                vars.extend(frame.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            vars.extend(captures.iter().map(|(k, v)| (k.clone(), v.clone())));

            let (fragment, produced) = self.evaluate(rule, &vars);
            trace!(rule = %rule.name, line = %line, "line matched");

            if let Some(fragment) = self.wrap_sequences(fragment, "") {
                merge_facts(&mut facts, fragment, "", self.table);
            } else {
                debug!(rule = %rule.name, line = %line, "dropped entity without natural key");
            }

            if rule.shared {
                let mut frame_vars = captures;
                frame_vars.extend(produced);
                stack.push(Frame {
                    depth: rule.depth,
                    vars: frame_vars,
                });
            }
        }

        debug!(
            table = %self.table.name(),
            lines = lines.len(),
            matched,
            "parsed device text"
        );
        facts
    }

    /// Evaluate a rule's result template. Returns the nested fragment and the
    /// scalar values produced, keyed by their last path segment.
    fn evaluate(&self, rule: &PatternRule, vars: &Vars) -> (Facts, Vars) {
        let mut fragment = Facts::new();
        let mut produced = Vars::new();
        for (destination, expr) in &rule.result {
            let Some(value) = expr.eval(vars) else {
                continue;
            };
            let field = destination.rsplit('.').next().unwrap_or(destination);
            match &value {
                Value::String(s) => {
                    produced.insert(field.to_string(), s.clone());
                }
                Value::Number(n) => {
                    produced.insert(field.to_string(), n.to_string());
                }
                _ => {}
            }
            set_path(&mut fragment, destination, value);
        }
        (fragment, produced)
    }

    /// Turn objects at declared sequence paths into one-element sequences.
    /// Returns `None` when a sequence element carries none of its key fields.
    fn wrap_sequences(&self, fragment: Facts, base: &str) -> Option<Facts> {
        let mut out = Facts::new();
        for (key, value) in fragment {
            let child = join_path(base, &key);
            let value = match value {
                Value::Object(map) => {
                    let inner = self.wrap_sequences(map, &child)?;
                    if self.table.is_sequence(&child) {
                        if self.table.key_of(&child, &inner).iter().all(Option::is_none) {
                            return None;
                        }
                        Value::Array(vec![Value::Object(inner)])
                    } else {
                        Value::Object(inner)
                    }
                }
                other => other,
            };
            out.insert(key, value);
        }
        Some(out)
    }
}

/// Parse `text` with `table`.
pub fn parse(text: &str, table: &PatternTable) -> Facts {
    LineParser::new(table).parse(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rule::RuleSpec;
    use crate::engine::table::TableSpec;
    use crate::engine::template::Expr;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn table() -> PatternTable {
        PatternTable::new(
            TableSpec::new("af")
                .root_keys(&["as_number"])
                .sequence("address_family", &["afi", "safi", "vrf"])
                .sequence("address_family.neighbor", &["address"])
                .rule(
                    RuleSpec::new("router", r"^router bgp (?P<as_number>\d+)")
                        .context()
                        .shared(0)
                        .result("as_number", Expr::int("as_number"))
                        .setval("router bgp {{ as_number }}"),
                )
                .rule(
                    RuleSpec::new(
                        "address_family",
                        r"^\s*address-family (?P<afi>\S+)(?: (?P<safi>unicast|multicast))?(?: vrf (?P<vrf>\S+))?$",
                    )
                    .path("address_family")
                    .context()
                    .shared(1)
                    .result("address_family.afi", Expr::var("afi"))
                    .result("address_family.safi", Expr::var("safi").or("unicast"))
                    .result("address_family.vrf", Expr::var("vrf"))
                    .setval("address-family {{ afi }} {{ safi }}"),
                )
                .rule(
                    RuleSpec::new(
                        "neighbor.activate",
                        r"^\s*neighbor (?P<address>\S+) activate$",
                    )
                    .path("address_family.neighbor")
                    .compval("activate")
                    .result("address_family.afi", Expr::var("afi"))
                    .result("address_family.safi", Expr::var("safi"))
                    .result("address_family.vrf", Expr::var("vrf"))
                    .result("address_family.neighbor.address", Expr::var("address"))
                    .result("address_family.neighbor.activate", Expr::literal(true))
                    .setval("neighbor {{ address }} activate"),
                )
                .rule(
                    RuleSpec::new(
                        "neighbor.remote_as",
                        r"^\s*neighbor (?P<address>\S+) remote-as (?P<remote_as>\d+)$",
                    )
                    .path("address_family.neighbor")
                    .compval("remote_as")
                    .result("address_family.afi", Expr::var("afi"))
                    .result("address_family.safi", Expr::var("safi"))
                    .result("address_family.vrf", Expr::var("vrf"))
                    .result("address_family.neighbor.address", Expr::var("address"))
                    .result("address_family.neighbor.remote_as", Expr::int("remote_as"))
                    .setval("neighbor {{ address }} remote-as {{ remote_as }}"),
                ),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_lines() {
        let text = "Building configuration...\n\n!\nrouter bgp 1   \n address-family ipv4\r\n ! comment\nend\n";
        assert_eq!(normalize_lines(text), vec!["router bgp 1", " address-family ipv4"]);
    }

    #[test]
    fn test_multi_line_entity_merges_by_key() {
        let text = "router bgp 65000\n address-family ipv4\n  neighbor 192.0.2.1 remote-as 10\n  neighbor 192.0.2.1 activate\n";
        let facts = parse(text, &table());
        assert_eq!(
            Value::Object(facts),
            json!({
                "as_number": 65000,
                "address_family": [{
                    "afi": "ipv4",
                    "safi": "unicast",
                    "neighbor": [{"address": "192.0.2.1", "remote_as": 10, "activate": true}]
                }]
            })
        );
    }

    #[test]
    fn test_neighbors_inherit_most_recent_address_family() {
        let same = "router bgp 1\n address-family ipv4 multicast\n  neighbor 10.0.0.1 activate\n  neighbor 10.0.0.2 activate\n";
        let facts = parse(same, &table());
        let afs = facts["address_family"].as_array().unwrap();
        assert_eq!(afs.len(), 1);
        assert_eq!(afs[0]["neighbor"].as_array().unwrap().len(), 2);

        let switched = "router bgp 1\n address-family ipv4 multicast\n  neighbor 10.0.0.1 activate\n address-family ipv6\n  neighbor 10.0.0.2 activate\n";
        let facts = parse(switched, &table());
        let afs = facts["address_family"].as_array().unwrap();
        assert_eq!(afs.len(), 2);
        assert_eq!(afs[0]["neighbor"][0]["address"], json!("10.0.0.1"));
        assert_eq!(afs[1]["afi"], json!("ipv6"));
        assert_eq!(afs[1]["safi"], json!("unicast"));
        assert_eq!(afs[1]["neighbor"][0]["address"], json!("10.0.0.2"));
    }

    #[test]
    fn test_shallower_context_resets_deeper_frames() {
        let text = "router bgp 1\n address-family ipv4 vrf blue\n  neighbor 10.0.0.1 activate\nrouter bgp 2\n  neighbor 10.0.0.2 activate\n";
        let facts = parse(text, &table());
        // the second neighbor has no address-family context left and is dropped
        let afs = facts["address_family"].as_array().unwrap();
        assert_eq!(afs.len(), 1);
        assert_eq!(afs[0]["vrf"], json!("blue"));
        assert_eq!(facts["as_number"], json!(2));
    }

    #[test]
    fn test_unmatched_lines_are_skipped() {
        let text = "hostname r1\nrouter bgp 7\n bgp log-neighbor-changes\n";
        let facts = parse(text, &table());
        assert_eq!(Value::Object(facts), json!({"as_number": 7}));
    }
}
