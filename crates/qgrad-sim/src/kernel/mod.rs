//! Numeric kernel policies.
//!
//! A [`KernelPolicy`] implements the primitive operations on a state buffer
//! for one backend: gate application, derivative application, measurement
//! projection, Kraus channels, Hamiltonian application and inner products.
//! The [`State`](crate::state::State) container owns the buffer and
//! dispatches every operation through the policy selected at construction.
//!
//! Both policies share the gather/scatter kernel [`apply_matrix`]. The
//! density-matrix backend stores `ρ` as a vectorized `2n`-qubit buffer with
//! index `(row << n) | col`, so `U ρ U†` is `U` applied to the row qubits
//! (shifted by `n`) followed by `conj(U)` applied to the column qubits.

mod densitymatrix;
mod statevector;

pub use densitymatrix::DensityMatrixPolicy;
pub use statevector::StateVectorPolicy;

use ndarray::Array2;
use num_complex::Complex64;
use qgrad_ir::Hamiltonian;
use rand::rngs::StdRng;

use crate::backend::BackendKind;
use crate::error::SimResult;

pub(crate) const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub(crate) const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Per-backend primitive operations on a state buffer.
///
/// Every method takes the buffer by reference; policies hold no state and
/// are shared as `&'static dyn KernelPolicy`.
pub trait KernelPolicy: Send + Sync {
    /// The backend this policy implements.
    fn backend(&self) -> BackendKind;

    /// Buffer length for `n_qubits`.
    fn buffer_len(&self, n_qubits: usize) -> usize;

    /// Buffer holding |0…0⟩.
    fn init_state(&self, n_qubits: usize) -> Vec<Complex64> {
        let mut qs = vec![ZERO; self.buffer_len(n_qubits)];
        qs[0] = ONE;
        qs
    }

    /// Buffer from user-supplied amplitudes.
    fn from_amplitudes(&self, amps: Vec<Complex64>, n_qubits: usize) -> SimResult<Vec<Complex64>>;

    /// Apply the unitary `m` on `objs`, conditioned on every qubit in
    /// `ctrls` being |1⟩.
    fn apply_unitary(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    );

    /// Replace the buffer by the action of a gate's derivative `dm`.
    ///
    /// The uncontrolled subspace is zeroed, since the derivative of a
    /// controlled gate vanishes there. `m` is the gate matrix itself, which
    /// the density-matrix policy needs for the right factor `U†`.
    fn apply_derivative(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        dm: &Array2<Complex64>,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    );

    /// Probability of measuring |1⟩ on `qubit`.
    fn prob_one(&self, qs: &[Complex64], n_qubits: usize, qubit: usize) -> f64;

    /// Project `qubit` onto `outcome` and divide by the outcome probability.
    ///
    /// `prob` is not clamped: a zero probability yields NaN amplitudes.
    fn collapse(&self, qs: &mut [Complex64], n_qubits: usize, qubit: usize, outcome: u8, prob: f64);

    /// Apply the channel with Kraus operators `ops` on `objs`.
    fn apply_kraus(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        ops: &[Array2<Complex64>],
        objs: &[usize],
        rng: &mut StdRng,
    );

    /// `H` applied to the buffer from the left.
    fn apply_hamiltonian(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian)
    -> Vec<Complex64>;

    /// The buffer the adjoint sweep pairs with the forward state, such that
    /// `vdot(forward, observable)` is the expectation value.
    fn observable(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Vec<Complex64>;

    /// `⟨ψ|H|ψ⟩` or `tr(Hρ)`.
    fn expectation(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Complex64;

    /// `‖ψ‖` or `tr(ρ)`.
    fn norm(&self, qs: &[Complex64], n_qubits: usize) -> f64;

    /// `tr(ρ²)`; for a pure state, `‖ψ‖⁴`.
    fn purity(&self, qs: &[Complex64], n_qubits: usize) -> f64;
}

// =============================================================================
// Shared kernels
// =============================================================================

/// `Σ conj(a_i) · b_i`; for vectorized matrices this is `tr(A† B)`.
pub fn vdot(a: &[Complex64], b: &[Complex64]) -> Complex64 {
    a.iter().zip(b).map(|(x, y)| x.conj() * y).sum()
}

/// Apply `m` (or `conj(m)`) on the buffer bits `objs`, where bit `k` of the
/// matrix index is `objs[k]`.
///
/// Indices whose `ctrls` bits are not all set are left untouched, or set to
/// zero when `zero_uncontrolled` is true.
pub(crate) fn apply_matrix(
    qs: &mut [Complex64],
    m: &Array2<Complex64>,
    objs: &[usize],
    ctrls: &[usize],
    conj: bool,
    zero_uncontrolled: bool,
) {
    let dim = 1usize << objs.len();
    let obj_mask = objs.iter().fold(0usize, |acc, q| acc | 1 << q);
    let ctrl_mask = ctrls.iter().fold(0usize, |acc, q| acc | 1 << q);
    let offsets: Vec<usize> = (0..dim)
        .map(|k| {
            objs.iter()
                .enumerate()
                .filter(|(b, _)| (k >> b) & 1 == 1)
                .fold(0usize, |acc, (_, q)| acc | 1 << q)
        })
        .collect();
    let matrix = if conj { m.mapv(|v| v.conj()) } else { m.clone() };

    let mut local = vec![ZERO; dim];
    for base in (0..qs.len()).filter(|i| i & obj_mask == 0) {
        if base & ctrl_mask != ctrl_mask {
            if zero_uncontrolled {
                for off in &offsets {
                    qs[base | off] = ZERO;
                }
            }
            continue;
        }
        for (slot, off) in local.iter_mut().zip(&offsets) {
            *slot = qs[base | off];
        }
        for (r, off) in offsets.iter().enumerate() {
            qs[base | off] = matrix
                .row(r)
                .iter()
                .zip(&local)
                .map(|(a, b)| a * b)
                .sum();
        }
    }
}

/// `i^k`.
fn i_pow(k: u32) -> Complex64 {
    match k % 4 {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    }
}

/// `Σ_k c_k P_k · qs`, with Pauli qubit `q` mapped to buffer bit `q + shift`.
///
/// Uses `P|i⟩ = i^{#Y} · (-1)^{|i ∧ (Y ∨ Z)|} · |i ⊕ (X ∨ Y)⟩`.
pub(crate) fn apply_pauli_sum(qs: &[Complex64], ham: &Hamiltonian, shift: usize) -> Vec<Complex64> {
    let mut out = vec![ZERO; qs.len()];
    for term in ham.terms() {
        let masks = term.pauli.masks();
        let flip = (masks.flip() as usize) << shift;
        let sign = (masks.sign() as usize) << shift;
        let coeff = term.coeff * i_pow(masks.n_y());
        for (i, amp) in qs.iter().enumerate() {
            let phase = if (i & sign).count_ones() % 2 == 1 {
                -coeff
            } else {
                coeff
            };
            out[i ^ flip] += phase * amp;
        }
    }
    out
}
