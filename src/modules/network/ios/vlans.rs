//! `ios_vlans`: VLAN definitions.

use crate::engine::{Expr, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_vlans";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(table_spec(), "VLANs and their attributes", "section ^vlan")
        .list_key("vlans")
}

fn vlan_field(name: &str, getval: &str) -> RuleSpec {
    RuleSpec::new(name, getval)
        .path("vlans")
        .compval(name)
        .result("vlans.vlan_id", Expr::int("vlan_id"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .sequence("vlans", &["vlan_id"])
        .rule(
            RuleSpec::new("vlan", r"^vlan (?P<vlan_id>\d+)$")
                .path("vlans")
                .context()
                .shared(0)
                .result("vlans.vlan_id", Expr::int("vlan_id"))
                .setval("vlan {{ vlan_id }}"),
        )
        .rule(
            vlan_field("name", r"^\s*name (?P<name>.+)$")
                .result("vlans.name", Expr::var("name"))
                .setval("name {{ name }}"),
        )
        .rule(
            vlan_field("state", r"^\s*state (?P<state>active|suspend)$")
                .result("vlans.state", Expr::var("state"))
                .setval("state {{ state }}"),
        )
        .rule(
            vlan_field("mtu", r"^\s*mtu (?P<mtu>\d+)$")
                .result("vlans.mtu", Expr::int("mtu"))
                .setval("mtu {{ mtu }}"),
        )
        .rule(
            vlan_field("shutdown", r"^\s*(?P<negated>no )?shutdown$")
                .result("vlans.shutdown", Expr::absent("negated"))
                .setval("shutdown"),
        )
}
