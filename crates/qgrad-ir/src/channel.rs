//! Noise channels.
//!
//! Every channel is described by its Kraus operators `{K_i}` with
//! `Σ K_i† K_i = I`. A state-vector simulation samples one branch with
//! probability `‖K_i ψ‖²`; a density-matrix simulation applies the full sum
//! `ρ → Σ K_i ρ K_i†`.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::matrix::{dagger, identity, kron, pauli_x, pauli_y, pauli_z};

const COMPLETENESS_TOL: f64 = 1e-8;

/// A noise channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Channel {
    /// Applies X, Y or Z with the given probabilities, identity otherwise.
    Pauli {
        /// Probability of X.
        px: f64,
        /// Probability of Y.
        py: f64,
        /// Probability of Z.
        pz: f64,
    },

    /// `ρ → (1 - p) ρ + p/4ⁿ Σ_P P ρ P` over all n-qubit Pauli strings.
    Depolarizing {
        /// Error probability.
        p: f64,
    },

    /// Energy relaxation (T1).
    AmplitudeDamping {
        /// Damping parameter.
        gamma: f64,
    },

    /// Dephasing without energy loss (T2).
    PhaseDamping {
        /// Damping parameter.
        gamma: f64,
    },

    /// User-supplied Kraus operators.
    Kraus {
        /// Descriptive name.
        name: String,
        /// The operators, each `2ⁿ × 2ⁿ`.
        operators: Vec<Array2<Complex64>>,
    },
}

impl Channel {
    /// Pauli channel.
    pub fn pauli(px: f64, py: f64, pz: f64) -> IrResult<Self> {
        let ch = Channel::Pauli { px, py, pz };
        ch.validate()?;
        Ok(ch)
    }

    /// Bit-flip channel: X with probability `p`.
    pub fn bit_flip(p: f64) -> IrResult<Self> {
        Self::pauli(p, 0.0, 0.0)
    }

    /// Phase-flip channel: Z with probability `p`.
    pub fn phase_flip(p: f64) -> IrResult<Self> {
        Self::pauli(0.0, 0.0, p)
    }

    /// Bit-phase-flip channel: Y with probability `p`.
    pub fn bit_phase_flip(p: f64) -> IrResult<Self> {
        Self::pauli(0.0, p, 0.0)
    }

    /// Depolarizing channel.
    pub fn depolarizing(p: f64) -> IrResult<Self> {
        let ch = Channel::Depolarizing { p };
        ch.validate()?;
        Ok(ch)
    }

    /// Amplitude-damping channel.
    pub fn amplitude_damping(gamma: f64) -> IrResult<Self> {
        let ch = Channel::AmplitudeDamping { gamma };
        ch.validate()?;
        Ok(ch)
    }

    /// Phase-damping channel.
    pub fn phase_damping(gamma: f64) -> IrResult<Self> {
        let ch = Channel::PhaseDamping { gamma };
        ch.validate()?;
        Ok(ch)
    }

    /// Custom Kraus channel; checks shape consistency and completeness.
    pub fn kraus(name: impl Into<String>, operators: Vec<Array2<Complex64>>) -> IrResult<Self> {
        let ch = Channel::Kraus {
            name: name.into(),
            operators,
        };
        ch.validate()?;
        Ok(ch)
    }

    /// Short name.
    pub fn name(&self) -> &str {
        match self {
            Channel::Pauli { .. } => "pauli_channel",
            Channel::Depolarizing { .. } => "depolarizing",
            Channel::AmplitudeDamping { .. } => "amplitude_damping",
            Channel::PhaseDamping { .. } => "phase_damping",
            Channel::Kraus { name, .. } => name,
        }
    }

    /// Number of object qubits, if fixed by the channel itself.
    ///
    /// `None` for depolarizing, which acts on however many qubits it is
    /// placed on.
    pub fn num_qubits(&self) -> Option<usize> {
        match self {
            Channel::Pauli { .. }
            | Channel::AmplitudeDamping { .. }
            | Channel::PhaseDamping { .. } => Some(1),
            Channel::Depolarizing { .. } => None,
            Channel::Kraus { operators, .. } => operators
                .first()
                .map(|k| k.nrows().trailing_zeros() as usize),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> IrError {
        IrError::InvalidChannel {
            channel: self.name().to_string(),
            reason: reason.into(),
        }
    }

    /// Check probabilities and Kraus completeness.
    pub fn validate(&self) -> IrResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        match self {
            Channel::Pauli { px, py, pz } => {
                if !(in_unit(*px) && in_unit(*py) && in_unit(*pz)) || px + py + pz > 1.0 {
                    return Err(self.invalid(format!(
                        "probabilities ({px}, {py}, {pz}) must lie in [0, 1] and sum to at most 1"
                    )));
                }
            }
            Channel::Depolarizing { p } => {
                if !in_unit(*p) {
                    return Err(self.invalid(format!("p = {p} outside [0, 1]")));
                }
            }
            Channel::AmplitudeDamping { gamma } | Channel::PhaseDamping { gamma } => {
                if !in_unit(*gamma) {
                    return Err(self.invalid(format!("gamma = {gamma} outside [0, 1]")));
                }
            }
            Channel::Kraus { operators, .. } => {
                let Some(first) = operators.first() else {
                    return Err(self.invalid("no Kraus operators"));
                };
                let dim = first.nrows();
                if !dim.is_power_of_two() || dim < 2 {
                    return Err(self.invalid(format!("dimension {dim} is not a power of two")));
                }
                if operators.iter().any(|k| k.dim() != (dim, dim)) {
                    return Err(self.invalid("operators have inconsistent shapes"));
                }
                let sum = operators
                    .iter()
                    .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, k| {
                        acc + dagger(k).dot(k)
                    });
                let complete = sum
                    .indexed_iter()
                    .all(|((r, c), v)| {
                        let expected = if r == c { 1.0 } else { 0.0 };
                        (v - Complex64::new(expected, 0.0)).norm() < COMPLETENESS_TOL
                    });
                if !complete {
                    return Err(self.invalid("Σ K†K ≠ I"));
                }
            }
        }
        Ok(())
    }

    /// Kraus operators for this channel acting on `n_qubits` object qubits.
    pub fn kraus_operators(&self, n_qubits: usize) -> Vec<Array2<Complex64>> {
        let scaled = |m: Array2<Complex64>, p: f64| m.mapv(|v| v * p.sqrt());
        match self {
            Channel::Pauli { px, py, pz } => vec![
                scaled(identity(2), (1.0 - (px + py + pz)).max(0.0)),
                scaled(pauli_x(), *px),
                scaled(pauli_y(), *py),
                scaled(pauli_z(), *pz),
            ],
            Channel::Depolarizing { p } => {
                let n_strings = 1usize << (2 * n_qubits);
                let each = p / n_strings as f64;
                pauli_strings(n_qubits)
                    .into_iter()
                    .enumerate()
                    .map(|(i, m)| {
                        if i == 0 {
                            scaled(m, (1.0 - p + each).max(0.0))
                        } else {
                            scaled(m, each)
                        }
                    })
                    .collect()
            }
            Channel::AmplitudeDamping { gamma } => {
                let mut k0 = identity(2);
                k0[[1, 1]] = Complex64::new((1.0 - gamma).sqrt(), 0.0);
                let mut k1 = Array2::zeros((2, 2));
                k1[[0, 1]] = Complex64::new(gamma.sqrt(), 0.0);
                vec![k0, k1]
            }
            Channel::PhaseDamping { gamma } => {
                let mut k0 = identity(2);
                k0[[1, 1]] = Complex64::new((1.0 - gamma).sqrt(), 0.0);
                let mut k1 = Array2::zeros((2, 2));
                k1[[1, 1]] = Complex64::new(gamma.sqrt(), 0.0);
                vec![k0, k1]
            }
            Channel::Kraus { operators, .. } => operators.clone(),
        }
    }
}

/// All `4ⁿ` Pauli strings on `n` qubits, identity first.
fn pauli_strings(n_qubits: usize) -> Vec<Array2<Complex64>> {
    let singles = [identity(2), pauli_x(), pauli_y(), pauli_z()];
    let mut out = vec![identity(1)];
    for _ in 0..n_qubits {
        out = out
            .iter()
            .flat_map(|m| singles.iter().map(move |s| kron(m, s)))
            .collect();
    }
    out
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Pauli { px, py, pz } => {
                write!(f, "pauli_channel(px={px:.4}, py={py:.4}, pz={pz:.4})")
            }
            Channel::Depolarizing { p } => write!(f, "depolarizing(p={p:.4})"),
            Channel::AmplitudeDamping { gamma } => write!(f, "amplitude_damping(γ={gamma:.4})"),
            Channel::PhaseDamping { gamma } => write!(f, "phase_damping(γ={gamma:.4})"),
            Channel::Kraus { name, operators } => {
                write!(f, "kraus({name}, {} operators)", operators.len())
            }
        }
    }
}
