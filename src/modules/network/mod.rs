//! Network resource modules
//!
//! Each resource is a pattern table plus a little metadata, reconciled by
//! the generic [`ResourceModule`]. Built-in tables cover Cisco IOS; more
//! resources can be loaded from YAML definitions at runtime.
//!
//! # Example Usage
//!
//! ```yaml
//! - name: Ensure the BGP neighbor exists
//!   ios_bgp_global:
//!     state: merged
//!     config:
//!       as_number: 65000
//!       neighbor:
//!         - address: 192.0.2.1
//!           remote_as: 20
//! ```
//!
//! # Architecture
//!
//! ```text
//! +--------------------+     +-------------------+
//! | ios_bgp_global     |     |                   |
//! | ios_static_routes  |---->|  ResourceModule   |
//! | ios_vlans ...      |     |  (PatternTable)   |
//! +--------------------+     +-------------------+
//!                                     |
//!                                     v
//!                            +-------------------+
//!                            |  DeviceTransport  |
//!                            |  - CliDevice      |
//!                            |  - StaticDevice   |
//!                            +-------------------+
//! ```

pub mod common;
pub mod ios;
pub mod resource;

pub use common::{
    apply_output_filter, clean_config_output, generate_config_diff, generate_facts_diff,
    CliDevice, CliSession, ConfigCommandGenerator, IosCommandGenerator, StaticDevice,
};
pub use resource::{ResourceDefinition, ResourceModule};

use crate::modules::ModuleRegistry;
use std::sync::Arc;
use tracing::error;

/// Register all network modules with the registry
pub fn register_network_modules(registry: &mut ModuleRegistry) {
    for definition in ios::definitions() {
        let name = definition.name().to_string();
        match definition.build() {
            Ok(module) => registry.register(Arc::new(module)),
            Err(e) => error!(resource = %name, error = %e, "built-in resource failed to compile"),
        }
    }
}

/// Get a list of all available network module names
pub fn network_module_names() -> Vec<&'static str> {
    vec![
        "ios_acls",
        "ios_bgp_address_family",
        "ios_bgp_global",
        "ios_snmp_server",
        "ios_static_routes",
        "ios_vlans",
    ]
}
