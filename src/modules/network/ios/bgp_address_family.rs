//! `ios_bgp_address_family`: per address-family BGP configuration.
//!
//! Address families are keyed by `afi`, `safi` and `vrf`. IOS prints
//! `address-family ipv4` for the unicast family, so a missing SAFI means
//! `unicast` both when parsing and in desired configuration.

use crate::engine::{Expr, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_bgp_address_family";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(
        table_spec(),
        "BGP address families, their networks, aggregates and neighbors",
        "section ^router bgp",
    )
}

/// A rule for a field of the address family itself, or of an entity
/// nested in it.
fn af(name: &str, path: &str, getval: &str) -> RuleSpec {
    RuleSpec::new(name, getval)
        .path(path)
        .result("address_family.afi", Expr::var("afi"))
        .result("address_family.safi", Expr::var("safi"))
        .result("address_family.vrf", Expr::var("vrf"))
}

fn neighbor(name: &str, getval: &str) -> RuleSpec {
    af(name, "address_family.neighbor", getval)
        .result("address_family.neighbor.address", Expr::var("address"))
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .root_keys(&["as_number"])
        .sequence("address_family", &["afi", "safi", "vrf"])
        .key_default("address_family.safi", "unicast")
        .sequence("address_family.aggregate_address", &["address", "netmask"])
        .sequence("address_family.neighbor", &["address"])
        .sequence("address_family.network", &["address", "mask"])
        .rule(
            RuleSpec::new("router", r"^router bgp (?P<as_number>\d+)$")
                .context()
                .shared(0)
                .result("as_number", Expr::int("as_number"))
                .setval("router bgp {{ as_number }}"),
        )
        .rule(
            RuleSpec::new(
                "address_family",
                r"^\s*address-family (?P<afi>ipv4|ipv6|vpnv4|vpnv6|l2vpn|nsap)(?: (?P<safi>unicast|multicast|mdt|mvpn|evpn|vpls|flowspec|labeled-unicast))?(?: vrf (?P<vrf>\S+))?$",
            )
            .path("address_family")
            .context()
            .shared(1)
            .result("address_family.afi", Expr::var("afi"))
            .result("address_family.safi", Expr::var("safi").or("unicast"))
            .result("address_family.vrf", Expr::var("vrf"))
            .setval(
                "address-family {{ afi }}{% if safi %} {{ safi }}{% endif %}\
                 {% if vrf %} vrf {{ vrf }}{% endif %}",
            ),
        )
        .rule(
            af("auto_summary", "address_family", r"^\s*auto-summary$")
                .compval("auto_summary")
                .result("address_family.auto_summary", Expr::literal(true))
                .setval("auto-summary"),
        )
        .rule(
            af("synchronization", "address_family", r"^\s*synchronization$")
                .compval("synchronization")
                .result("address_family.synchronization", Expr::literal(true))
                .setval("synchronization"),
        )
        .rule(
            af(
                "default_information",
                "address_family",
                r"^\s*default-information originate$",
            )
            .compval("default_information.originate")
            .result(
                "address_family.default_information.originate",
                Expr::literal(true),
            )
            .setval("default-information originate"),
        )
        .rule(
            af(
                "default_metric",
                "address_family",
                r"^\s*default-metric (?P<default_metric>\d+)$",
            )
            .compval("default_metric")
            .result("address_family.default_metric", Expr::int("default_metric"))
            .setval("default-metric {{ default_metric }}"),
        )
        .rule(
            af(
                "table_map",
                "address_family",
                r"^\s*table-map (?P<table_map>\S+)(?P<filter> filter)?$",
            )
            .compval("table_map")
            .result("address_family.table_map.name", Expr::var("table_map"))
            .result("address_family.table_map.filter", Expr::present("filter"))
            .setval("table-map {{ table_map.name }}{% if table_map.filter %} filter{% endif %}"),
        )
        .rule(
            af(
                "aggregate_address",
                "address_family.aggregate_address",
                r"^\s*aggregate-address (?P<address>\S+) (?P<netmask>\S+)(?P<as_set> as-set)?(?P<summary_only> summary-only)?$",
            )
            .result("address_family.aggregate_address.address", Expr::var("address"))
            .result("address_family.aggregate_address.netmask", Expr::var("netmask"))
            .result("address_family.aggregate_address.as_set", Expr::present("as_set"))
            .result(
                "address_family.aggregate_address.summary_only",
                Expr::present("summary_only"),
            )
            .setval(
                "aggregate-address {{ address }} {{ netmask }}\
                 {% if as_set %} as-set{% endif %}{% if summary_only %} summary-only{% endif %}",
            ),
        )
        .rule(
            af(
                "network",
                "address_family.network",
                r"^\s*network (?P<address>\S+)(?: mask (?P<mask>\S+))?(?: route-map (?P<route_map>\S+))?$",
            )
            .result("address_family.network.address", Expr::var("address"))
            .result("address_family.network.mask", Expr::var("mask"))
            .result("address_family.network.route_map", Expr::var("route_map"))
            .setval(
                "network {{ address }}{% if mask %} mask {{ mask }}{% endif %}\
                 {% if route_map %} route-map {{ route_map }}{% endif %}",
            ),
        )
        .rule(
            neighbor(
                "neighbor.remote_as",
                r"^\s*neighbor (?P<address>\S+) remote-as (?P<remote_as>\d+)$",
            )
            .compval("remote_as")
            .result("address_family.neighbor.remote_as", Expr::int("remote_as"))
            .setval("neighbor {{ address }} remote-as {{ remote_as }}"),
        )
        .rule(
            neighbor("neighbor.activate", r"^\s*neighbor (?P<address>\S+) activate$")
                .compval("activate")
                .result("address_family.neighbor.activate", Expr::literal(true))
                .setval("neighbor {{ address }} activate"),
        )
        .rule(
            neighbor(
                "neighbor.description",
                r"^\s*neighbor (?P<address>\S+) description (?P<description>.+)$",
            )
            .compval("description")
            .result("address_family.neighbor.description", Expr::var("description"))
            .setval("neighbor {{ address }} description {{ description }}"),
        )
        .rule(
            neighbor(
                "neighbor.route_reflector_client",
                r"^\s*neighbor (?P<address>\S+) route-reflector-client$",
            )
            .compval("route_reflector_client")
            .result(
                "address_family.neighbor.route_reflector_client",
                Expr::literal(true),
            )
            .setval("neighbor {{ address }} route-reflector-client"),
        )
        .rule(
            neighbor(
                "neighbor.next_hop_self",
                r"^\s*neighbor (?P<address>\S+) next-hop-self$",
            )
            .compval("next_hop_self")
            .result("address_family.neighbor.next_hop_self", Expr::literal(true))
            .setval("neighbor {{ address }} next-hop-self"),
        )
        .rule(
            neighbor(
                "neighbor.send_community",
                r"^\s*neighbor (?P<address>\S+) send-community(?: (?P<send_community>both|standard|extended))?$",
            )
            .compval("send_community")
            .result(
                "address_family.neighbor.send_community",
                Expr::var("send_community").or("standard"),
            )
            .setval(
                "neighbor {{ address }} send-community\
                 {% if send_community != 'standard' %} {{ send_community }}{% endif %}",
            ),
        )
        .rule(
            neighbor(
                "neighbor.route_map.in",
                r"^\s*neighbor (?P<address>\S+) route-map (?P<route_map>\S+) in$",
            )
            .compval("route_map.inbound")
            .result(
                "address_family.neighbor.route_map.inbound",
                Expr::var("route_map"),
            )
            .setval("neighbor {{ address }} route-map {{ route_map.inbound }} in"),
        )
        .rule(
            neighbor(
                "neighbor.route_map.out",
                r"^\s*neighbor (?P<address>\S+) route-map (?P<route_map>\S+) out$",
            )
            .compval("route_map.outbound")
            .result(
                "address_family.neighbor.route_map.outbound",
                Expr::var("route_map"),
            )
            .setval("neighbor {{ address }} route-map {{ route_map.outbound }} out"),
        )
}
