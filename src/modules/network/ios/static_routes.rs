//! `ios_static_routes`: `ip route` statements.
//!
//! Routes are grouped by `vrf` and `dest` (`"<prefix> <netmask>"`); each
//! route holds its next hops, keyed by forwarding address and interface.
//! One `ip route` line carries a whole next hop, so next hops are compared
//! and replaced as units.

use serde_json::Value;

use crate::engine::facts::scalar_repr;
use crate::engine::{Expr, Facts, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_static_routes";

const ROUTE: &str = r"^ip route(?: vrf (?P<vrf>\S+))? (?P<address>\d+\.\d+\.\d+\.\d+) (?P<netmask>\d+\.\d+\.\d+\.\d+)(?: (?P<interface>[A-Za-z][\w/.:-]*))?(?: (?P<forward>\d+\.\d+\.\d+\.\d+))?(?: (?P<distance>\d+))?(?: tag (?P<tag>\d+))?(?: name (?P<name>\S+))?(?P<permanent> permanent)?$";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(
        table_spec(),
        "Static routes and their next hops",
        "include ^ip route",
    )
    .list_key("routes")
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .sequence("routes", &["vrf", "dest"])
        .sequence("routes.next_hops", &["forward_router_address", "interface"])
        .rule(
            RuleSpec::new("next_hop", ROUTE)
                .path("routes.next_hops")
                .result("routes.vrf", Expr::var("vrf"))
                .result("routes.dest", Expr::format("{address} {netmask}"))
                .result("routes.next_hops.forward_router_address", Expr::var("forward"))
                .result("routes.next_hops.interface", Expr::var("interface"))
                .result("routes.next_hops.distance_metric", Expr::int("distance"))
                .result("routes.next_hops.tag", Expr::int("tag"))
                .result("routes.next_hops.name", Expr::var("name"))
                .result("routes.next_hops.permanent", Expr::present("permanent"))
                .render_with(route_line),
        )
}

/// Render one next hop, with its route's `vrf` and `dest`, as an
/// `ip route` line.
fn route_line(vars: &Facts) -> Vec<String> {
    let field = |key: &str| vars.get(key).and_then(scalar_repr);
    let Some(dest) = field("dest") else {
        return Vec::new();
    };

    let mut line = String::from("ip route");
    if let Some(vrf) = field("vrf") {
        line.push_str(&format!(" vrf {}", vrf));
    }
    line.push(' ');
    line.push_str(&dest);
    for key in ["interface", "forward_router_address", "distance_metric"] {
        if let Some(value) = field(key) {
            line.push(' ');
            line.push_str(&value);
        }
    }
    if let Some(tag) = field("tag") {
        line.push_str(&format!(" tag {}", tag));
    }
    if let Some(name) = field("name") {
        line.push_str(&format!(" name {}", name));
    }
    if vars.get("permanent") == Some(&Value::Bool(true)) {
        line.push_str(" permanent");
    }
    vec![line]
}
