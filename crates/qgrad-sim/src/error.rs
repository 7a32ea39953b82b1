//! Error types for the sim crate.

use qgrad_ir::IrError;
use thiserror::Error;

/// Errors produced by simulation, expectation and gradient evaluation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SimError {
    /// Qubit index out of range, or malformed control/object overlap.
    #[error("Invalid gate '{gate}': {reason}")]
    InvalidGate {
        /// Name of the gate.
        gate: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A parameter is missing from the value resolver or from `p_map`.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),

    /// Qubit counts or buffer sizes disagree.
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        /// What was being checked.
        what: String,
        /// Expected size.
        expected: usize,
        /// Actual size.
        got: usize,
    },

    /// The gate, channel or entry point is not implemented for the target.
    #[error("Unsupported operation '{operation}' on {target}")]
    UnsupportedOperation {
        /// The requested operation.
        operation: String,
        /// Gate or backend it was requested on.
        target: String,
    },

    /// Unknown backend identifier.
    #[error("Unsupported backend '{0}' (expected one of: statevector, densitymatrix)")]
    UnsupportedBackend(String),

    /// A worker pool could not be created.
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Any other error from the circuit model.
    #[error("Circuit IR error: {0}")]
    Ir(IrError),
}

impl From<IrError> for SimError {
    fn from(err: IrError) -> Self {
        match err {
            IrError::InvalidGate { gate, reason } => SimError::InvalidGate { gate, reason },
            IrError::UnboundParameter(name) => SimError::UnboundParameter(name),
            IrError::DimensionMismatch {
                what,
                expected,
                got,
            } => SimError::DimensionMismatch {
                what,
                expected,
                got,
            },
            IrError::UnsupportedOperation { operation, gate } => SimError::UnsupportedOperation {
                operation,
                target: format!("gate '{gate}'"),
            },
            other => SimError::Ir(other),
        }
    }
}

/// Result type for simulation operations.
pub type SimResult<T> = Result<T, SimError>;
