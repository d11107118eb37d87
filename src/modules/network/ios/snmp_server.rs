//! `ios_snmp_server`: SNMP agent settings, communities and trap hosts.

use crate::engine::{Expr, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_snmp_server";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(
        table_spec(),
        "SNMP contact, location, communities and notification hosts",
        "include ^snmp-server",
    )
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .sequence("communities", &["name"])
        .sequence("hosts", &["host"])
        .rule(
            RuleSpec::new("contact", r"^snmp-server contact (?P<contact>.+)$")
                .compval("contact")
                .result("contact", Expr::var("contact"))
                .setval("snmp-server contact {{ contact }}"),
        )
        .rule(
            RuleSpec::new("location", r"^snmp-server location (?P<location>.+)$")
                .compval("location")
                .result("location", Expr::var("location"))
                .setval("snmp-server location {{ location }}"),
        )
        .rule(
            RuleSpec::new("packet_size", r"^snmp-server packetsize (?P<packet_size>\d+)$")
                .compval("packet_size")
                .result("packet_size", Expr::int("packet_size"))
                .setval("snmp-server packetsize {{ packet_size }}"),
        )
        .rule(
            RuleSpec::new(
                "community",
                r"^snmp-server community (?P<name>\S+)(?: view (?P<view>\S+))?(?: (?P<access>RO|RW))?(?: (?P<acl>\S+))?$",
            )
            .path("communities")
            .result("communities.name", Expr::var("name"))
            .result("communities.view", Expr::var("view"))
            .result("communities.access", Expr::lower("access"))
            .result("communities.acl", Expr::var("acl"))
            .setval(
                "snmp-server community {{ name }}{% if view %} view {{ view }}{% endif %}\
                 {% if access %} {{ access | upper }}{% endif %}{% if acl %} {{ acl }}{% endif %}",
            ),
        )
        .rule(
            RuleSpec::new(
                "host",
                r"^snmp-server host (?P<host>\S+)(?P<informs> informs)?(?: version (?P<version>1|2c|3(?: (?:auth|noauth|priv))?))?(?: (?P<community>\S+))?(?: udp-port (?P<udp_port>\d+))?$",
            )
            .path("hosts")
            .result("hosts.host", Expr::var("host"))
            .result("hosts.informs", Expr::present("informs"))
            .result("hosts.version", Expr::var("version"))
            .result("hosts.community", Expr::var("community"))
            .result("hosts.udp_port", Expr::int("udp_port"))
            .setval(
                "snmp-server host {{ host }}{% if informs %} informs{% endif %}\
                 {% if version %} version {{ version }}{% endif %}\
                 {% if community %} {{ community }}{% endif %}\
                 {% if udp_port %} udp-port {{ udp_port }}{% endif %}",
            ),
        )
}
