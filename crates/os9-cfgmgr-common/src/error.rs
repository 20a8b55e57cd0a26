//! Error types for reconciliation operations.
//!
//! Fatal conditions abort the whole pass with no partial output; anything
//! recoverable is reported as a [`ReconcileWarning`] alongside the command
//! list instead.

use std::fmt;
use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Fatal errors that abort a reconciliation pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Device state that should be impossible (e.g. duplicate stack-unit
    /// entries for one port, two VLT domains). A partial command list built
    /// on top of such state could be unsafe to apply.
    #[error("structural inconsistency: {message}")]
    StructuralInconsistency {
        /// Description of the inconsistent state.
        message: String,
    },

    /// Manifest entry that fails validation (e.g. L2 and L3 fields on the
    /// same interface, an empty description, a non-positive MTU).
    #[error("invalid manifest entry '{entity}': {message}")]
    ManifestValidation {
        /// The entity (interface label, VLAN id, port-channel id) at fault.
        entity: String,
        /// Description of the violation.
        message: String,
    },
}

impl ReconcileError {
    /// Creates a structural inconsistency error.
    pub fn structural(message: impl Into<String>) -> Self {
        Self::StructuralInconsistency {
            message: message.into(),
        }
    }

    /// Creates a manifest validation error.
    pub fn manifest(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ManifestValidation {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

/// Non-fatal conditions surfaced alongside the command list.
///
/// A warning never blocks reconciliation of unrelated entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// A manifest entry references an interface absent from the identity
    /// map — commonly a not-yet-created fanout child or a typo. The entry
    /// is skipped.
    UnknownInterface {
        /// The compact label that failed to resolve.
        label: String,
    },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileWarning::UnknownInterface { label } => {
                write!(f, "interface '{}' does not exist on this device, skipping", label)
            }
        }
    }
}
