//! Error types for netres.
//!
//! The engine reports everything through [`Error`]. Failures raised while a
//! reconciliation run is in flight are wrapped in [`ReconcileError`], which
//! adds the phase that failed. Device I/O failures come from the transport as
//! [`TransportError`].

use std::fmt;

use thiserror::Error;

/// Result type alias for netres operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a diff an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The desired configuration
    Want,
    /// The current device facts
    Have,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Want => write!(f, "want"),
            Side::Have => write!(f, "have"),
        }
    }
}

/// The main error type for netres.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Pattern Table Errors
    // ========================================================================
    /// A pattern table could not be built.
    #[error("Invalid pattern table '{table}', rule '{rule}': {message}")]
    TableConstruction {
        /// Table name
        table: String,
        /// Offending rule (or sequence path)
        rule: String,
        /// Error message
        message: String,
    },

    /// A changed field has no render template.
    #[error("Pattern table '{table}' has no render template for '{path}'")]
    RenderLookup {
        /// Table name
        table: String,
        /// Field path without a renderer
        path: String,
    },

    /// A render template failed while rendering.
    #[error("Failed to render rule '{rule}': {message}")]
    Render {
        /// Rule name
        rule: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// Two elements of one sequence share a natural key.
    #[error("Duplicate natural key {key} in '{path}' of {side}")]
    KeyCollision {
        /// Side of the diff
        side: Side,
        /// Sequence path
        path: String,
        /// The colliding key
        key: String,
    },

    /// A document does not have the shape the table expects.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown merge policy or run state.
    #[error("Unknown state '{0}'")]
    UnknownState(String),

    // ========================================================================
    // Device Errors
    // ========================================================================
    /// The device transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Commands could not be applied to the device.
    #[error("Failed to apply {} command(s): {message}", .commands.len())]
    ApplyFailed {
        /// Error message
        message: String,
        /// Commands that were computed and handed to the transport
        commands: Vec<String>,
    },

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns true if this error points at a bug in a pattern table rather
    /// than at bad input or a failing device.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Error::TableConstruction { .. } | Error::RenderLookup { .. } | Error::Render { .. }
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::KeyCollision { .. } | Error::InvalidInput(_) | Error::UnknownState(_) => 4,
            Error::Transport(_) | Error::ApplyFailed { .. } => 3,
            e if e.is_internal() => 70,
            _ => 1,
        }
    }
}

/// Failure reported by a device transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The device could not be reached.
    #[error("Device '{device}' unreachable: {message}")]
    Unreachable {
        /// Device name
        device: String,
        /// Error message
        message: String,
    },

    /// The device rejected a command.
    #[error("Device rejected '{command}': {message}")]
    Rejected {
        /// The rejected command
        command: String,
        /// Device response
        message: String,
    },

    /// IO error while talking to the device.
    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage of a reconciliation run in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    LoadFacts,
    Diff,
    Render,
    Apply,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::LoadFacts => "load_facts",
            Phase::Diff => "diff",
            Phase::Render => "render",
            Phase::Apply => "apply",
        };
        f.write_str(name)
    }
}

/// A reconciliation failure with the phase that produced it.
#[derive(Error, Debug)]
#[error("{phase} failed: {source}")]
pub struct ReconcileError {
    /// Failing phase
    pub phase: Phase,
    /// Underlying error
    #[source]
    pub source: Error,
}

impl ReconcileError {
    pub fn new(phase: Phase, source: impl Into<Error>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    /// Commands that were computed before the failure, if any.
    pub fn commands(&self) -> &[String] {
        match &self.source {
            Error::ApplyFailed { commands, .. } => commands,
            _ => &[],
        }
    }
}

/// Extension trait attaching a phase to engine results.
pub trait PhaseContext<T> {
    /// Wraps an error with the phase it happened in.
    fn in_phase(self, phase: Phase) -> std::result::Result<T, ReconcileError>;
}

impl<T, E> PhaseContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn in_phase(self, phase: Phase) -> std::result::Result<T, ReconcileError> {
        self.map_err(|e| ReconcileError::new(phase, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_classification() {
        let lookup = Error::RenderLookup {
            table: "vlans".into(),
            path: "vlans.mtu".into(),
        };
        assert!(lookup.is_internal());
        assert_eq!(lookup.exit_code(), 70);

        let collision = Error::KeyCollision {
            side: Side::Want,
            path: "vlans".into(),
            key: "{vlan_id=10}".into(),
        };
        assert!(!collision.is_internal());
        assert_eq!(
            collision.to_string(),
            "Duplicate natural key {vlan_id=10} in 'vlans' of want"
        );
    }

    #[test]
    fn test_reconcile_error_carries_phase_and_commands() {
        let failed: std::result::Result<(), Error> = Err(Error::ApplyFailed {
            message: "timeout".into(),
            commands: vec!["vlan 10".into()],
        });
        let err = failed.in_phase(Phase::Apply).unwrap_err();
        assert_eq!(err.phase, Phase::Apply);
        assert_eq!(err.commands(), ["vlan 10".to_string()]);
        assert!(err.to_string().starts_with("apply failed"));
    }

    #[test]
    fn test_transport_error_converts() {
        let err: Error = TransportError::Unreachable {
            device: "r1".into(),
            message: "connection refused".into(),
        }
        .into();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.exit_code(), 3);
    }
}
