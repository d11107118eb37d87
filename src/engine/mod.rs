//! Generic configuration reconciliation engine.
//!
//! The engine has four parts, all driven by one [`PatternTable`]:
//!
//! - [`parser`]: device text to a [`Facts`] tree
//! - [`diff`](mod@diff): want vs have under a [`MergePolicy`], producing a [`Delta`]
//! - [`render`](mod@render): a delta back to ordered CLI commands
//! - [`orchestrator`]: the per-run state machine around a [`DeviceTransport`]
//!
//! ```
//! use netres::engine::{plan, MergePolicy, PatternTable, RuleSpec, TableSpec, Expr};
//! use serde_json::json;
//!
//! let table = PatternTable::new(
//!     TableSpec::new("hostname").rule(
//!         RuleSpec::new("hostname", r"^hostname (?P<hostname>\S+)$")
//!             .compval("hostname")
//!             .result("hostname", Expr::var("hostname"))
//!             .setval("hostname {{ hostname }}"),
//!     ),
//! )
//! .unwrap();
//!
//! let have = netres::engine::parse("hostname r1\n", &table);
//! let want = json!({"hostname": "r2"}).as_object().cloned().unwrap();
//! let delta = plan(&want, &have, MergePolicy::Merged, &table).unwrap();
//! assert_eq!(delta.commands, vec!["hostname r2"]);
//! ```

pub mod diff;
pub mod facts;
pub mod orchestrator;
pub mod parser;
pub mod render;
pub mod rule;
pub mod table;
pub mod template;

pub use diff::{apply, diff, Delta, MergePolicy};
pub use facts::{values_eq, Facts};
pub use orchestrator::{
    DeviceTransport, ReconcileReport, ReconcileRequest, Reconciler, RunState, Stage,
};
pub use parser::{normalize_lines, parse, LineParser};
pub use render::{negate_line, render, CommandRenderer};
pub use rule::{PatternRule, Render, RenderFn, RuleKind, RuleSpec};
pub use table::{EntityItem, PatternTable, TableSpec};
pub use template::{Expr, ResultTemplate, Vars};

use crate::error::Result;

/// Diff `want` against `have` and render the commands into the delta.
pub fn plan(want: &Facts, have: &Facts, policy: MergePolicy, table: &PatternTable) -> Result<Delta> {
    let mut delta = diff(want, have, policy, table)?;
    delta.commands = render(&delta, table)?;
    Ok(delta)
}
