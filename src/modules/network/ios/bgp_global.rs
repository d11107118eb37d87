//! `ios_bgp_global`: router-level BGP settings and neighbors.
//!
//! Only lines indented one level under `router bgp` belong to this
//! resource; address-family blocks are left to `ios_bgp_address_family`.

use crate::engine::{Expr, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_bgp_global";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(
        table_spec(),
        "Global BGP process settings and neighbors",
        "section ^router bgp",
    )
}

fn neighbor(name: &str, getval: &str) -> RuleSpec {
    RuleSpec::new(name, getval)
        .path("neighbor")
        .result("neighbor.address", Expr::var("address"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .root_keys(&["as_number"])
        .sequence("neighbor", &["address"])
        .rule(
            RuleSpec::new("router", r"^router bgp (?P<as_number>\d+)$")
                .context()
                .shared(0)
                .result("as_number", Expr::int("as_number"))
                .setval("router bgp {{ as_number }}"),
        )
        .rule(
            RuleSpec::new("bgp.router_id", r"^ ?bgp router-id (?P<router_id>\S+)$")
                .compval("bgp.router_id")
                .result("bgp.router_id", Expr::var("router_id"))
                .setval("bgp router-id {{ bgp.router_id }}"),
        )
        .rule(
            RuleSpec::new(
                "bgp.log_neighbor_changes",
                r"^ ?(?P<negated>no )?bgp log-neighbor-changes$",
            )
            .compval("bgp.log_neighbor_changes")
            .result("bgp.log_neighbor_changes", Expr::absent("negated"))
            .setval("bgp log-neighbor-changes"),
        )
        .rule(
            RuleSpec::new(
                "bgp.default.ipv4_unicast",
                r"^ ?(?P<negated>no )?bgp default ipv4-unicast$",
            )
            .compval("bgp.default.ipv4_unicast")
            .result("bgp.default.ipv4_unicast", Expr::absent("negated"))
            .setval("bgp default ipv4-unicast"),
        )
        .rule(
            RuleSpec::new(
                "timers",
                r"^ ?timers bgp (?P<keepalive>\d+) (?P<holdtime>\d+)(?: (?P<min_holdtime>\d+))?$",
            )
            .compval("timers")
            .result("timers.keepalive", Expr::int("keepalive"))
            .result("timers.holdtime", Expr::int("holdtime"))
            .result("timers.min_holdtime", Expr::int("min_holdtime"))
            .setval(
                "timers bgp {{ timers.keepalive }} {{ timers.holdtime }}\
                 {% if timers.min_holdtime is defined %} {{ timers.min_holdtime }}{% endif %}",
            ),
        )
        .rule(
            neighbor(
                "neighbor.remote_as",
                r"^ ?neighbor (?P<address>\S+) remote-as (?P<remote_as>\d+)$",
            )
            .compval("remote_as")
            .result("neighbor.remote_as", Expr::int("remote_as"))
            .setval("neighbor {{ address }} remote-as {{ remote_as }}"),
        )
        .rule(
            neighbor(
                "neighbor.description",
                r"^ ?neighbor (?P<address>\S+) description (?P<description>.+)$",
            )
            .compval("description")
            .result("neighbor.description", Expr::var("description"))
            .setval("neighbor {{ address }} description {{ description }}"),
        )
        .rule(
            neighbor(
                "neighbor.update_source",
                r"^ ?neighbor (?P<address>\S+) update-source (?P<update_source>\S+)$",
            )
            .compval("update_source")
            .result("neighbor.update_source", Expr::var("update_source"))
            .setval("neighbor {{ address }} update-source {{ update_source }}"),
        )
        .rule(
            neighbor("neighbor.shutdown", r"^ ?neighbor (?P<address>\S+) shutdown$")
                .compval("shutdown")
                .result("neighbor.shutdown", Expr::literal(true))
                .setval("neighbor {{ address }} shutdown"),
        )
        .rule(
            neighbor(
                "neighbor.password",
                r"^ ?neighbor (?P<address>\S+) password (?:(?P<encryption>\d) )?(?P<key>\S+)$",
            )
            .compval("password")
            .result("neighbor.password.encryption", Expr::int("encryption"))
            .result("neighbor.password.key", Expr::var("key"))
            .setval(
                "neighbor {{ address }} password\
                 {% if password.encryption is defined %} {{ password.encryption }}{% endif %} {{ password.key }}",
            ),
        )
}
