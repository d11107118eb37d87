//! `ios_acls`: named IPv4 access lists.
//!
//! Access lists are keyed by name and type, since removing one takes both
//! (`no ip access-list extended WEB`). Entries are keyed by sequence
//! number and replaced as whole lines.

use crate::engine::{Expr, RuleSpec, TableSpec};
use crate::modules::network::resource::ResourceDefinition;

pub const NAME: &str = "ios_acls";

pub fn definition() -> ResourceDefinition {
    ResourceDefinition::new(
        table_spec(),
        "Named standard and extended access lists",
        "section ^ip access-list",
    )
    .list_key("acls")
}

pub fn table_spec() -> TableSpec {
    TableSpec::new(NAME)
        .sequence("acls", &["name", "acl_type"])
        .sequence("acls.aces", &["sequence"])
        .rule(
            RuleSpec::new(
                "acl",
                r"^ip access-list (?P<acl_type>standard|extended) (?P<name>\S+)$",
            )
            .path("acls")
            .context()
            .shared(0)
            .result("acls.name", Expr::var("name"))
            .result("acls.acl_type", Expr::var("acl_type"))
            .setval("ip access-list {{ acl_type }} {{ name }}"),
        )
        .rule(
            RuleSpec::new(
                "ace",
                r"^\s*(?P<sequence>\d+) (?P<grant>permit|deny) (?P<rule>.+?)(?P<log> log)?$",
            )
            .path("acls.aces")
            .result("acls.name", Expr::var("name"))
            .result("acls.acl_type", Expr::var("acl_type"))
            .result("acls.aces.sequence", Expr::int("sequence"))
            .result("acls.aces.grant", Expr::var("grant"))
            .result("acls.aces.rule", Expr::var("rule"))
            .result("acls.aces.log", Expr::present("log"))
            .setval("{{ sequence }} {{ grant }} {{ rule }}{% if log %} log{% endif %}"),
        )
}
