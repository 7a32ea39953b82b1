//! Error types for the IR crate.

use thiserror::Error;

/// Errors that can occur while building or resolving gates, circuits and
/// parameters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// A gate's qubit operands are malformed.
    #[error("Invalid gate '{gate}': {reason}")]
    InvalidGate {
        /// Name of the gate.
        gate: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A parameter name has no value in the resolver.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    /// A matrix or operand count has the wrong size.
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being checked.
        what: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// The operation has no meaning for this gate kind.
    #[error("Unsupported operation '{operation}' on gate '{gate}'")]
    UnsupportedOperation {
        /// The requested operation.
        operation: String,
        /// Name of the gate.
        gate: String,
    },

    /// Resolver arithmetic outside the first-order (linear) regime.
    #[error("Non-linear parameter arithmetic: {0}")]
    NonLinear(String),

    /// A channel's probabilities or Kraus operators are not a valid CPTP map.
    #[error("Invalid channel '{channel}': {reason}")]
    InvalidChannel {
        /// Name of the channel.
        channel: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl IrError {
    pub(crate) fn invalid_gate(gate: impl Into<String>, reason: impl Into<String>) -> Self {
        IrError::InvalidGate {
            gate: gate.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
