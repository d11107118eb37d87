//! Built-in Cisco IOS resource tables.
//!
//! Each submodule declares one resource as a [`TableSpec`](crate::engine::TableSpec)
//! plus the `show running-config` filter that narrows device output to it.

pub mod acls;
pub mod bgp_address_family;
pub mod bgp_global;
pub mod snmp_server;
pub mod static_routes;
pub mod vlans;

use super::resource::ResourceDefinition;

/// Definitions of every built-in IOS resource.
pub fn definitions() -> Vec<ResourceDefinition> {
    vec![
        acls::definition(),
        bgp_address_family::definition(),
        bgp_global::definition(),
        snmp_server::definition(),
        static_routes::definition(),
        vlans::definition(),
    ]
}
