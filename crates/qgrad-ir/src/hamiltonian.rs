//! Hamiltonian data structures.
//!
//! A Hamiltonian is a sum of weighted Pauli strings over a fixed number of
//! qubits:
//!
//!   H = Σ_k  c_k · P_k
//!
//! where each P_k is a tensor product of single-qubit Pauli operators
//! (I, X, Y, Z) and c_k ∈ ℂ. Real coefficients give a Hermitian observable;
//! complex ones are accepted for the non-Hermitian gradient path.
//!
//! # Example
//!
//! ```rust
//! use qgrad_ir::hamiltonian::{Hamiltonian, HamiltonianTerm, PauliOp, PauliString};
//!
//! // H = -1.0·Z₀Z₁  +  0.5·X₀
//! let h = Hamiltonian::new(2, vec![
//!     HamiltonianTerm::new(-1.0, PauliString::from_ops(vec![(0, PauliOp::Z), (1, PauliOp::Z)])),
//!     HamiltonianTerm::new(0.5, PauliString::from_ops(vec![(0, PauliOp::X)])),
//! ]).unwrap();
//! assert_eq!(h.n_terms(), 2);
//! assert!(h.is_hermitian());
//! ```

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};

/// Single-qubit Pauli operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauliOp {
    /// Identity.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
}

/// A tensor product of Pauli operators on indexed qubits.
///
/// Stored as a sorted `Vec<(qubit_index, PauliOp)>` with identity factors
/// omitted. Qubits not listed are implicitly I.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauliString {
    ops: Vec<(usize, PauliOp)>,
}

/// Bit masks of the qubits carrying X, Y and Z in a [`PauliString`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauliMasks {
    /// Qubits with X.
    pub x: u64,
    /// Qubits with Y.
    pub y: u64,
    /// Qubits with Z.
    pub z: u64,
}

impl PauliMasks {
    /// Bits flipped by the string (X and Y positions).
    pub fn flip(&self) -> u64 {
        self.x | self.y
    }

    /// Bits contributing a sign (Y and Z positions).
    pub fn sign(&self) -> u64 {
        self.y | self.z
    }

    /// Number of Y factors.
    pub fn n_y(&self) -> u32 {
        self.y.count_ones()
    }
}

impl PauliString {
    /// Construct a PauliString from `(qubit, op)` pairs.
    ///
    /// Identity operators are dropped and the rest are sorted by qubit.
    pub fn from_ops(ops: impl IntoIterator<Item = (usize, PauliOp)>) -> Self {
        let mut v: Vec<(usize, PauliOp)> = ops
            .into_iter()
            .filter(|(_, op)| *op != PauliOp::I)
            .collect();
        v.sort_by_key(|(q, _)| *q);
        Self { ops: v }
    }

    /// The identity string.
    pub fn identity() -> Self {
        Self { ops: vec![] }
    }

    /// Non-identity `(qubit, op)` pairs, sorted by qubit index.
    pub fn ops(&self) -> &[(usize, PauliOp)] {
        &self.ops
    }

    /// True if there are no non-identity operators.
    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// The highest qubit index referenced, or `None` for the identity.
    pub fn max_qubit(&self) -> Option<usize> {
        // Deserialized strings need not be sorted.
        self.ops.iter().map(|(q, _)| *q).max()
    }

    /// X/Y/Z bit masks, with qubit `q` mapped to bit `q`.
    pub fn masks(&self) -> PauliMasks {
        let mut m = PauliMasks::default();
        for &(q, op) in &self.ops {
            match op {
                PauliOp::X => m.x |= 1 << q,
                PauliOp::Y => m.y |= 1 << q,
                PauliOp::Z => m.z |= 1 << q,
                PauliOp::I => {}
            }
        }
        m
    }
}

impl std::fmt::Display for PauliString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "I");
        }
        for (i, (q, op)) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{op:?}{q}")?;
        }
        Ok(())
    }
}

/// A single weighted Pauli term: `coeff · pauli`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HamiltonianTerm {
    /// Coefficient.
    pub coeff: Complex64,
    /// The Pauli string.
    pub pauli: PauliString,
}

impl HamiltonianTerm {
    /// Create a term with a real coefficient.
    pub fn new(coeff: f64, pauli: PauliString) -> Self {
        Self::complex(Complex64::new(coeff, 0.0), pauli)
    }

    /// Create a term with a complex coefficient.
    pub fn complex(coeff: Complex64, pauli: PauliString) -> Self {
        Self { coeff, pauli }
    }

    /// Shorthand: single-qubit Z term.
    pub fn z(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::Z)]))
    }

    /// Shorthand: ZZ coupling term.
    pub fn zz(q0: usize, q1: usize, coeff: f64) -> Self {
        Self::new(
            coeff,
            PauliString::from_ops([(q0, PauliOp::Z), (q1, PauliOp::Z)]),
        )
    }

    /// Shorthand: single-qubit X term.
    pub fn x(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::X)]))
    }

    /// Shorthand: single-qubit Y term.
    pub fn y(qubit: usize, coeff: f64) -> Self {
        Self::new(coeff, PauliString::from_ops([(qubit, PauliOp::Y)]))
    }
}

/// A sum-of-Pauli-strings Hamiltonian on `n_qubits` qubits.
///
/// Deserialization goes through [`Hamiltonian::new`], so the qubit-range
/// checks hold for every instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HamiltonianData")]
pub struct Hamiltonian {
    n_qubits: usize,
    terms: Vec<HamiltonianTerm>,
}

#[derive(Deserialize)]
struct HamiltonianData {
    n_qubits: usize,
    terms: Vec<HamiltonianTerm>,
}

impl TryFrom<HamiltonianData> for Hamiltonian {
    type Error = IrError;

    fn try_from(data: HamiltonianData) -> IrResult<Self> {
        Self::new(data.n_qubits, data.terms)
    }
}

impl Hamiltonian {
    /// Create from a list of terms; every term must fit in `n_qubits`.
    pub fn new(n_qubits: usize, terms: Vec<HamiltonianTerm>) -> IrResult<Self> {
        if n_qubits > 63 {
            return Err(IrError::DimensionMismatch {
                what: "Hamiltonian qubit count (maximum 63)".into(),
                expected: 63,
                got: n_qubits,
            });
        }
        if let Some(q) = terms.iter().filter_map(|t| t.pauli.max_qubit()).max() {
            if q >= n_qubits {
                return Err(IrError::DimensionMismatch {
                    what: "Hamiltonian qubit count".into(),
                    expected: n_qubits,
                    got: q + 1,
                });
            }
        }
        Ok(Self { n_qubits, terms })
    }

    /// The identity observable `1.0 · I` on `n_qubits` qubits.
    pub fn identity(n_qubits: usize) -> IrResult<Self> {
        Self::new(
            n_qubits,
            vec![HamiltonianTerm::new(1.0, PauliString::identity())],
        )
    }

    /// Number of qubits the Hamiltonian acts on.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// All terms.
    pub fn terms(&self) -> &[HamiltonianTerm] {
        &self.terms
    }

    /// Number of terms.
    pub fn n_terms(&self) -> usize {
        self.terms.len()
    }

    /// Σ |c_k|, an upper bound on the spectral norm.
    pub fn lambda(&self) -> f64 {
        self.terms.iter().map(|t| t.coeff.norm()).sum()
    }

    /// True if every coefficient is real.
    pub fn is_hermitian(&self) -> bool {
        self.terms.iter().all(|t| t.coeff.im == 0.0)
    }

    /// `H†`: Pauli strings are Hermitian, so only coefficients conjugate.
    pub fn dagger(&self) -> Self {
        Self {
            n_qubits: self.n_qubits,
            terms: self
                .terms
                .iter()
                .map(|t| HamiltonianTerm::complex(t.coeff.conj(), t.pauli.clone()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks() {
        let p = PauliString::from_ops([(0, PauliOp::X), (2, PauliOp::Y), (3, PauliOp::Z), (1, PauliOp::I)]);
        let m = p.masks();
        assert_eq!(m.x, 0b0001);
        assert_eq!(m.y, 0b0100);
        assert_eq!(m.z, 0b1000);
        assert_eq!(m.flip(), 0b0101);
        assert_eq!(m.sign(), 0b1100);
        assert_eq!(m.n_y(), 1);
        assert_eq!(format!("{p}"), "X0 Y2 Z3");
    }

    #[test]
    fn test_term_out_of_range() {
        let err = Hamiltonian::new(2, vec![HamiltonianTerm::z(2, 1.0)]).unwrap_err();
        assert!(matches!(err, IrError::DimensionMismatch { expected: 2, got: 3, .. }));
    }

    #[test]
    fn test_dagger_conjugates() {
        let h = Hamiltonian::new(
            1,
            vec![HamiltonianTerm::complex(Complex64::new(0.5, 2.0), PauliString::identity())],
        )
        .unwrap();
        assert!(!h.is_hermitian());
        let hd = h.dagger();
        assert_eq!(hd.terms()[0].coeff, Complex64::new(0.5, -2.0));
        assert_eq!(hd.dagger(), h);
    }

    #[test]
    fn test_lambda() {
        let h = Hamiltonian::new(2, vec![HamiltonianTerm::zz(0, 1, -1.0), HamiltonianTerm::x(0, 0.5)])
            .unwrap();
        assert!((h.lambda() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_serialization() {
        let h = Hamiltonian::new(3, vec![HamiltonianTerm::y(2, 0.25)]).unwrap();
        let json = serde_json::to_string(&h).unwrap();
        let back: Hamiltonian = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    #[test]
    fn test_deserialization_checks_range() {
        let h = Hamiltonian::new(3, vec![HamiltonianTerm::y(2, 0.25)]).unwrap();
        let json = serde_json::to_string(&h)
            .unwrap()
            .replace("\"n_qubits\":3", "\"n_qubits\":1");
        let err = serde_json::from_str::<Hamiltonian>(&json).unwrap_err();
        assert!(err.to_string().contains("Hamiltonian qubit count"), "{err}");
    }
}
