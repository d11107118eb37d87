//! Structured diff engine.
//!
//! [`diff`] compares a desired tree (`want`) against current facts (`have`)
//! under a [`MergePolicy`] and produces a [`Delta`]: facts-shaped partial
//! trees of additions and removals. Sequences are matched by the natural key
//! the pattern table declares for them, never by position.
//!
//! Every entity in a delta carries its identity fields. An entity that must
//! disappear entirely and owns a context line is encoded by its identity
//! fields alone; the renderer turns it into a single negated context line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::facts::{join_path, prune_nulls, values_eq, Facts};
use super::table::PatternTable;
use crate::error::{Error, Result, Side};

/// How desired configuration is reconciled against current facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    /// Add what is missing or different; never remove
    Merged,
    /// Replace the content of every entity named in want
    Replaced,
    /// Replace, and remove every entity want does not name
    Overridden,
    /// Remove the entities want selects
    Deleted,
    /// Remove the whole root container
    Purged,
}

impl MergePolicy {
    pub const ALL: [MergePolicy; 5] = [
        MergePolicy::Merged,
        MergePolicy::Replaced,
        MergePolicy::Overridden,
        MergePolicy::Deleted,
        MergePolicy::Purged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Merged => "merged",
            MergePolicy::Replaced => "replaced",
            MergePolicy::Overridden => "overridden",
            MergePolicy::Deleted => "deleted",
            MergePolicy::Purged => "purged",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MergePolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s.to_ascii_lowercase())
            .ok_or_else(|| Error::UnknownState(s.to_string()))
    }
}

/// Result of a diff: partial trees plus the rendered commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub to_add: Facts,
    pub to_remove: Facts,
    pub commands: Vec<String>,
}

impl Delta {
    /// A delta with nothing to add or remove.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compare `want` against `have` under `policy`.
///
/// `null` entries in `want` mean "unspecified", and omitted key fields take
/// the table's declared defaults. Duplicate or missing natural keys on
/// either side are rejected before any comparison happens.
pub fn diff(want: &Facts, have: &Facts, policy: MergePolicy, table: &PatternTable) -> Result<Delta> {
    let want = table.with_key_defaults(&prune_nulls(want));
    validate(&want, "", table, Side::Want)?;
    validate(have, "", table, Side::Have)?;

    let differ = Differ { table, policy };
    let (to_add, to_remove) = match policy {
        MergePolicy::Merged | MergePolicy::Replaced | MergePolicy::Overridden => {
            let (add, remove) = differ.diff_map(&want, have, "", "");
            let root_created = !identity_of(table, "", &want).is_empty()
                && identity_of(table, "", have).is_empty();
            let to_add = if !add.is_empty() || root_created {
                let source = if identity_of(table, "", &want).is_empty() { have } else { &want };
                with_identity(table, "", source, add)
            } else {
                Facts::new()
            };
            (to_add, differ.root_removal(have, remove))
        }
        MergePolicy::Deleted => {
            let remove = differ.delete(&want, have, "");
            (Facts::new(), differ.root_removal(have, remove))
        }
        MergePolicy::Purged => (Facts::new(), differ.purge(have)),
    };

    debug!(
        table = %table.name(),
        policy = %policy,
        additions = to_add.len(),
        removals = to_remove.len(),
        "diff computed"
    );
    Ok(Delta {
        to_add,
        to_remove,
        commands: Vec::new(),
    })
}

/// Check sequence shapes and natural-key uniqueness on one side.
fn validate(facts: &Facts, base: &str, table: &PatternTable, side: Side) -> Result<()> {
    for (key, value) in facts {
        let child = join_path(base, key);
        if table.is_sequence(&child) {
            let items = value.as_array().ok_or_else(|| {
                Error::invalid_input(format!("'{}' of {} must be a list", child, side))
            })?;
            let mut seen: Vec<Vec<Option<String>>> = Vec::with_capacity(items.len());
            for item in items {
                let element = item.as_object().ok_or_else(|| {
                    Error::invalid_input(format!("elements of '{}' in {} must be mappings", child, side))
                })?;
                let key = table.key_of(&child, element);
                if key.iter().all(Option::is_none) {
                    return Err(Error::invalid_input(format!(
                        "element of '{}' in {} has none of its key fields ({})",
                        child,
                        side,
                        table.identity_keys(&child).join(", ")
                    )));
                }
                if seen.contains(&key) {
                    let described = table.describe_key(&child, element);
                    return Err(Error::KeyCollision {
                        side,
                        path: child,
                        key: described,
                    });
                }
                seen.push(key);
                validate(element, &child, table, side)?;
            }
        } else if let Value::Object(map) = value {
            validate(map, &child, table, side)?;
        }
    }
    Ok(())
}

fn identity_of(table: &PatternTable, path: &str, entity: &Facts) -> Facts {
    table
        .identity_keys(path)
        .iter()
        .filter_map(|k| entity.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

/// Identity fields of `source` followed by `content`.
fn with_identity(table: &PatternTable, path: &str, source: &Facts, content: Facts) -> Facts {
    let mut out = identity_of(table, path, source);
    for (key, value) in content {
        out.entry(key).or_insert(value);
    }
    out
}

fn objects(value: Option<&Value>) -> Vec<&Facts> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default()
}

/// Whether every field of `want` has an equal value in `have`.
fn covers(have: &Facts, want: &Facts) -> bool {
    want.iter()
        .all(|(k, v)| have.get(k).map_or(false, |h| values_eq(v, h)))
}

struct Differ<'t> {
    table: &'t PatternTable,
    policy: MergePolicy,
}

impl Differ<'_> {
    fn replacing(&self) -> bool {
        matches!(self.policy, MergePolicy::Replaced | MergePolicy::Overridden)
    }

    /// Whether have elements of a sequence that want does not name go away.
    fn removes_unmatched(&self, path: &str) -> bool {
        match self.policy {
            MergePolicy::Overridden => true,
            MergePolicy::Replaced => !self.table.parent_entity(path).is_empty(),
            _ => false,
        }
    }

    /// How an entity is written when it must disappear entirely.
    fn removal_form(&self, path: &str, element: &Facts) -> Facts {
        if self.table.context_rule(path).is_some() {
            return identity_of(self.table, path, element);
        }
        if !self.table.is_container(path) {
            return element.clone();
        }
        element
            .iter()
            .map(|(key, value)| {
                let child = join_path(path, key);
                let value = if self.table.is_sequence(&child) {
                    Value::Array(
                        objects(Some(value))
                            .into_iter()
                            .map(|e| Value::Object(self.removal_form(&child, e)))
                            .collect(),
                    )
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn root_removal(&self, have: &Facts, remove: Facts) -> Facts {
        if remove.is_empty() {
            remove
        } else {
            with_identity(self.table, "", have, remove)
        }
    }

    /// Compare two maps at `base`, inside the entity at `entity`.
    fn diff_map(&self, want: &Facts, have: &Facts, base: &str, entity: &str) -> (Facts, Facts) {
        let mut add = Facts::new();
        let mut remove = Facts::new();
        let at_entity = base == entity;

        for (key, w) in want {
            if at_entity && self.table.is_identity(entity, key) {
                continue;
            }
            let child = join_path(base, key);
            let h = have.get(key);

            if self.table.is_sequence(&child) {
                let (a, r) = self.diff_sequence(&objects(Some(w)), &objects(h), &child);
                if !a.is_empty() {
                    add.insert(key.clone(), Value::Array(a));
                }
                if !r.is_empty() {
                    remove.insert(key.clone(), Value::Array(r));
                }
                continue;
            }

            match (w, h) {
                (Value::Object(wm), Some(Value::Object(hm))) if !self.table.is_atomic(&child) => {
                    let (a, r) = self.diff_map(wm, hm, &child, entity);
                    if !a.is_empty() {
                        add.insert(key.clone(), Value::Object(a));
                    }
                    if !r.is_empty() {
                        remove.insert(key.clone(), Value::Object(r));
                    }
                }
                (w, Some(h)) if values_eq(w, h) => {}
                (w, _) => {
                    add.insert(key.clone(), w.clone());
                }
            }
        }

        if self.replacing() {
            for (key, h) in have {
                if want.contains_key(key) || (at_entity && self.table.is_identity(entity, key)) {
                    continue;
                }
                let child = join_path(base, key);
                if self.table.is_sequence(&child) {
                    if !self.removes_unmatched(&child) {
                        continue;
                    }
                    let gone: Vec<Value> = objects(Some(h))
                        .into_iter()
                        .map(|e| Value::Object(self.removal_form(&child, e)))
                        .collect();
                    if !gone.is_empty() {
                        remove.insert(key.clone(), Value::Array(gone));
                    }
                } else {
                    remove.insert(key.clone(), h.clone());
                }
            }
        }

        (add, remove)
    }

    fn diff_sequence(&self, want: &[&Facts], have: &[&Facts], path: &str) -> (Vec<Value>, Vec<Value>) {
        let mut additions = Vec::new();
        let mut removals: Vec<(usize, Facts)> = Vec::new();
        let mut matched = vec![false; have.len()];
        let atomic = self.table.entity_rule(path).is_some();

        for w in want {
            let key = self.table.key_of(path, w);
            let found = have
                .iter()
                .enumerate()
                .find(|(_, h)| self.table.key_of(path, h) == key);

            let Some((index, h)) = found else {
                additions.push(Value::Object((*w).clone()));
                continue;
            };
            matched[index] = true;

            if self.policy == MergePolicy::Merged {
                if atomic {
                    if !covers(h, w) {
                        let mut overlay = (*h).clone();
                        overlay.extend(w.iter().map(|(k, v)| (k.clone(), v.clone())));
                        additions.push(Value::Object(overlay));
                    }
                } else {
                    let (a, r) = self.diff_map(w, h, path, path);
                    if !a.is_empty() {
                        additions.push(Value::Object(with_identity(self.table, path, w, a)));
                    }
                    if !r.is_empty() {
                        removals.push((index, with_identity(self.table, path, h, r)));
                    }
                }
            } else if self.differs(w, h, path) {
                // whole-entity replace, no partial patch
                removals.push((index, self.removal_form(path, h)));
                additions.push(Value::Object((*w).clone()));
            }
        }

        if self.removes_unmatched(path) {
            for (index, h) in have.iter().enumerate() {
                if !matched[index] {
                    removals.push((index, self.removal_form(path, h)));
                }
            }
        }

        removals.sort_by_key(|(index, _)| *index);
        (
            additions,
            removals.into_iter().map(|(_, r)| Value::Object(r)).collect(),
        )
    }

    /// Whether a matched element's content differs from what want names.
    /// Nested sequences are matched by key, so element order is irrelevant.
    fn differs(&self, want: &Facts, have: &Facts, path: &str) -> bool {
        let (add, remove) = self.diff_map(want, have, path, path);
        !add.is_empty() || !remove.is_empty()
    }

    /// Removals for the `deleted` policy at one entity level.
    fn delete(&self, want: &Facts, have: &Facts, path: &str) -> Facts {
        let selectors: Vec<(&String, Vec<&Facts>)> = want
            .iter()
            .filter(|(key, _)| self.table.is_sequence(&join_path(path, key)))
            .map(|(key, value)| (key, objects(Some(value))))
            .filter(|(_, items)| !items.is_empty())
            .collect();

        let mut remove = Facts::new();
        if selectors.is_empty() {
            for (key, value) in have {
                if self.table.is_identity(path, key) {
                    continue;
                }
                let child = join_path(path, key);
                let value = if self.table.is_sequence(&child) {
                    Value::Array(
                        objects(Some(value))
                            .into_iter()
                            .map(|e| Value::Object(self.removal_form(&child, e)))
                            .collect(),
                    )
                } else {
                    value.clone()
                };
                remove.insert(key.clone(), value);
            }
            return remove;
        }

        for (key, wanted) in selectors {
            let child = join_path(path, key);
            let existing = objects(have.get(key));
            let mut removals: Vec<(usize, Facts)> = Vec::new();
            for w in wanted {
                let target = self.table.key_of(&child, w);
                let Some((index, h)) = existing
                    .iter()
                    .enumerate()
                    .find(|(_, h)| self.table.key_of(&child, h) == target)
                else {
                    debug!(path = %child, key = %self.table.describe_key(&child, w), "nothing to delete");
                    continue;
                };
                let names_nested = w.iter().any(|(k, v)| {
                    self.table.is_sequence(&join_path(&child, k))
                        && v.as_array().map_or(false, |a| !a.is_empty())
                });
                if names_nested {
                    let nested = self.delete(w, h, &child);
                    if !nested.is_empty() {
                        removals.push((index, with_identity(self.table, &child, h, nested)));
                    }
                } else {
                    removals.push((index, self.removal_form(&child, h)));
                }
            }
            removals.sort_by_key(|(index, _)| *index);
            if !removals.is_empty() {
                remove.insert(
                    key.clone(),
                    Value::Array(removals.into_iter().map(|(_, r)| Value::Object(r)).collect()),
                );
            }
        }
        remove
    }

    /// Removals for the `purged` policy.
    fn purge(&self, have: &Facts) -> Facts {
        let identity = identity_of(self.table, "", have);
        if self.table.context_rule("").is_some() && !identity.is_empty() {
            identity
        } else {
            let remove = self.delete(&Facts::new(), have, "");
            self.root_removal(have, remove)
        }
    }
}

/// Predict the facts after a delta has been applied to `have`.
pub fn apply(have: &Facts, delta: &Delta, table: &PatternTable) -> Facts {
    let mut after = have.clone();
    let removal = &delta.to_remove;
    if !removal.is_empty() {
        let purge = table.context_rule("").is_some()
            && removal.keys().all(|k| table.is_identity("", k));
        if purge {
            after.clear();
        } else {
            remove_from(&mut after, removal, "", table);
        }
    }
    overlay(&mut after, &delta.to_add, "", table);
    after
}

fn is_identity_only(table: &PatternTable, path: &str, element: &Facts) -> bool {
    element.keys().all(|k| table.is_identity(path, k))
}

fn remove_from(target: &mut Facts, removal: &Facts, base: &str, table: &PatternTable) {
    for (key, value) in removal {
        if table.is_identity(base, key) {
            continue;
        }
        let child = join_path(base, key);
        if table.is_sequence(&child) {
            let Some(Value::Array(items)) = target.get_mut(key) else {
                continue;
            };
            for gone in objects(Some(value)) {
                let wanted = table.key_of(&child, gone);
                let Some(index) = items.iter().position(|item| {
                    item.as_object()
                        .map_or(false, |e| table.key_of(&child, e) == wanted)
                }) else {
                    continue;
                };
                let whole = if table.context_rule(&child).is_some() {
                    is_identity_only(table, &child, gone)
                } else {
                    !table.is_container(&child)
                };
                if whole {
                    items.remove(index);
                    continue;
                }
                if let Some(element) = items[index].as_object_mut() {
                    remove_from(element, gone, &child, table);
                    if table.context_rule(&child).is_none() && is_identity_only(table, &child, element) {
                        items.remove(index);
                    }
                }
            }
            if items.is_empty() {
                target.remove(key);
            }
        } else if let (Value::Object(nested), false) = (value, table.is_atomic(&child)) {
            if let Some(Value::Object(existing)) = target.get_mut(key) {
                remove_from(existing, nested, &child, table);
                if existing.is_empty() {
                    target.remove(key);
                }
            }
        } else {
            target.remove(key);
        }
    }
}

fn overlay(target: &mut Facts, addition: &Facts, base: &str, table: &PatternTable) {
    for (key, value) in addition {
        let child = join_path(base, key);
        match (target.get_mut(key), value) {
            (Some(Value::Array(items)), Value::Array(added)) if table.is_sequence(&child) => {
                let atomic = table.entity_rule(&child).is_some();
                for element in added.iter().filter_map(Value::as_object) {
                    let wanted = table.key_of(&child, element);
                    let slot = items.iter_mut().find(|item| {
                        item.as_object()
                            .map_or(false, |e| table.key_of(&child, e) == wanted)
                    });
                    match slot {
                        Some(existing) if atomic => *existing = Value::Object(element.clone()),
                        Some(Value::Object(existing)) => overlay(existing, element, &child, table),
                        _ => items.push(Value::Object(element.clone())),
                    }
                }
            }
            (Some(Value::Object(existing)), Value::Object(nested)) if !table.is_atomic(&child) => {
                overlay(existing, nested, &child, table);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
