//! Backend selection and simulator configuration.
//!
//! A backend is chosen by a string identifier, which is the only
//! configuration surface of the engine. Unknown identifiers fail with
//! [`SimError::UnsupportedBackend`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::error::{SimError, SimResult};
use crate::kernel::{DensityMatrixPolicy, KernelPolicy, StateVectorPolicy};
use crate::state::State;

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 42;

/// The closed set of simulation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pure state as a dense vector of `2ⁿ` amplitudes.
    StateVector,
    /// Mixed state as a dense `2ⁿ × 2ⁿ` density matrix.
    DensityMatrix,
}

impl BackendKind {
    /// Canonical identifier.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::StateVector => "statevector",
            BackendKind::DensityMatrix => "densitymatrix",
        }
    }

    /// The kernel policy implementing this backend.
    pub fn policy(&self) -> &'static dyn KernelPolicy {
        match self {
            BackendKind::StateVector => &StateVectorPolicy,
            BackendKind::DensityMatrix => &DensityMatrixPolicy,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "statevector" | "mqvector" => Ok(BackendKind::StateVector),
            "densitymatrix" | "mqmatrix" => Ok(BackendKind::DensityMatrix),
            _ => Err(SimError::UnsupportedBackend(s.to_string())),
        }
    }
}

/// Simulator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Backend to instantiate.
    pub backend: BackendKind,
    /// Number of qubits.
    pub n_qubits: usize,
    /// Seed of the container's random engine.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl SimulatorConfig {
    /// Create a configuration with the default seed.
    pub fn new(backend: BackendKind, n_qubits: usize) -> Self {
        Self {
            backend,
            n_qubits,
            seed: DEFAULT_SEED,
        }
    }

    /// Create a configuration from a backend identifier.
    pub fn from_name(name: &str, n_qubits: usize) -> SimResult<Self> {
        Ok(Self::new(name.parse()?, n_qubits))
    }

    /// Set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Allocate a state in |0…0⟩.
    pub fn build(&self) -> SimResult<State> {
        debug!(
            backend = %self.backend,
            n_qubits = self.n_qubits,
            seed = self.seed,
            "Creating simulator state"
        );
        State::new(self.backend, self.n_qubits, self.seed)
    }
}
