//! # netres - Declarative Network Resource Reconciliation
//!
//! netres turns network device configuration into structured facts and
//! back. A pattern table describes one resource (BGP, static routes, VLANs,
//! ...) as a set of regex/template rules; the same table drives parsing,
//! diffing and command rendering, so the three stay symmetric.
//!
//! ## Core Concepts
//!
//! - **Facts**: a JSON-like tree describing a resource's configuration
//! - **Pattern tables**: rules that map CLI lines to facts and back
//! - **States**: `merged`, `replaced`, `overridden`, `deleted`, `purged`
//!   reconcile a device; `gathered`, `parsed`, `rendered` only translate
//! - **Modules**: one generic resource module per pattern table, looked up
//!   by name in a [`ModuleRegistry`](modules::ModuleRegistry)
//! - **Transports**: anything that can return running configuration and
//!   accept configuration commands
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CLI Interface                          │
//! │                 (clap-based command parsing)                  │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                Module Registry / ResourceModule               │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//!          ┌─────────────────────┼─────────────────────┐
//!          ▼                     ▼                     ▼
//! ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐
//! │   Line Parser   │   │   Diff Engine   │   │    Renderer     │
//! │  (text → facts) │   │ (want vs have)  │   │ (delta → CLI)   │
//! └─────────────────┘   └─────────────────┘   └─────────────────┘
//!          └─────────────────────┼─────────────────────┘
//!                                ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       DeviceTransport                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use netres::prelude::*;
//! use serde_json::json;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let mut params = ModuleParams::new();
//! params.insert("state".into(), json!("rendered"));
//! params.insert("config".into(), json!([{"vlan_id": 10, "name": "users"}]));
//!
//! let output = registry
//!     .execute("ios_vlans", &params, &ModuleContext::new())
//!     .unwrap();
//! assert_eq!(output.data["rendered"], json!(["vlan 10", "name users"]));
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used items in prelude
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Engine
    pub use crate::engine::{
        parse, plan, DeviceTransport, Facts, MergePolicy, PatternTable, ReconcileReport,
        ReconcileRequest, Reconciler, RunState,
    };

    // Error handling
    pub use crate::error::{Error, Result};

    // Module system
    pub use crate::modules::network::{ResourceDefinition, ResourceModule, StaticDevice};
    pub use crate::modules::{
        Module, ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult,
    };
}

// ============================================================================
// Core Modules
// ============================================================================

/// Error types and result aliases for netres operations.
///
/// [`Error`](error::Error) covers table construction, input validation,
/// rendering and device failures; [`ReconcileError`](error::ReconcileError)
/// adds the phase of a run that failed.
pub mod error;

/// The reconciliation engine: pattern tables, parser, diff, renderer and
/// orchestrator.
pub mod engine;

/// Resource modules and the built-in network resources.
pub mod modules;

pub use error::{Error, Result};
