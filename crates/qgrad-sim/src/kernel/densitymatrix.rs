//! Density-matrix kernels.
//!
//! `ρ` is stored row-major as a `2n`-qubit buffer, `qs[(row << n) | col]`.
//! Row qubit `q` is buffer bit `q + n` and column qubit `q` is bit `q`.

use ndarray::Array2;
use num_complex::Complex64;
use qgrad_ir::Hamiltonian;
use rand::rngs::StdRng;

use super::{KernelPolicy, ONE, ZERO, apply_matrix, apply_pauli_sum};
use crate::backend::BackendKind;
use crate::error::{SimError, SimResult};

/// Mixed-state kernels over a `2ⁿ × 2ⁿ` density matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct DensityMatrixPolicy;

fn shifted(qubits: &[usize], n_qubits: usize) -> Vec<usize> {
    qubits.iter().map(|q| q + n_qubits).collect()
}

fn trace(qs: &[Complex64], n_qubits: usize) -> Complex64 {
    let dim = 1usize << n_qubits;
    (0..dim).map(|i| qs[(i << n_qubits) | i]).sum()
}

impl DensityMatrixPolicy {
    /// `m ρ` on the row qubits.
    fn left(
        qs: &mut [Complex64],
        n_qubits: usize,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
        zero: bool,
    ) {
        apply_matrix(
            qs,
            m,
            &shifted(objs, n_qubits),
            &shifted(ctrls, n_qubits),
            false,
            zero,
        );
    }

    /// `ρ m†` on the column qubits.
    fn right_dagger(qs: &mut [Complex64], m: &Array2<Complex64>, objs: &[usize], ctrls: &[usize]) {
        apply_matrix(qs, m, objs, ctrls, true, false);
    }
}

impl KernelPolicy for DensityMatrixPolicy {
    fn backend(&self) -> BackendKind {
        BackendKind::DensityMatrix
    }

    fn buffer_len(&self, n_qubits: usize) -> usize {
        1 << (2 * n_qubits)
    }

    /// Accepts either a full density matrix or a pure state `|ψ⟩`, which is
    /// expanded to `|ψ⟩⟨ψ|`.
    fn from_amplitudes(&self, amps: Vec<Complex64>, n_qubits: usize) -> SimResult<Vec<Complex64>> {
        let dim = 1usize << n_qubits;
        if amps.len() == self.buffer_len(n_qubits) {
            return Ok(amps);
        }
        if amps.len() != dim {
            return Err(SimError::DimensionMismatch {
                what: "density-matrix entries".into(),
                expected: self.buffer_len(n_qubits),
                got: amps.len(),
            });
        }
        let mut qs = vec![ZERO; self.buffer_len(n_qubits)];
        for (r, a) in amps.iter().enumerate() {
            for (c, b) in amps.iter().enumerate() {
                qs[(r << n_qubits) | c] = a * b.conj();
            }
        }
        Ok(qs)
    }

    fn apply_unitary(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    ) {
        Self::left(qs, n_qubits, m, objs, ctrls, false);
        Self::right_dagger(qs, m, objs, ctrls);
    }

    /// `dU ρ U†`.
    fn apply_derivative(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        dm: &Array2<Complex64>,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    ) {
        Self::left(qs, n_qubits, dm, objs, ctrls, true);
        Self::right_dagger(qs, m, objs, ctrls);
    }

    fn prob_one(&self, qs: &[Complex64], n_qubits: usize, qubit: usize) -> f64 {
        let dim = 1usize << n_qubits;
        let mask = 1 << qubit;
        (0..dim)
            .filter(|i| i & mask != 0)
            .map(|i| qs[(i << n_qubits) | i].re)
            .sum()
    }

    fn collapse(&self, qs: &mut [Complex64], n_qubits: usize, qubit: usize, outcome: u8, prob: f64) {
        let row_mask = 1 << (qubit + n_qubits);
        let col_mask = 1 << qubit;
        let want_row = if outcome == 1 { row_mask } else { 0 };
        let want_col = if outcome == 1 { col_mask } else { 0 };
        for (i, v) in qs.iter_mut().enumerate() {
            if i & row_mask == want_row && i & col_mask == want_col {
                *v /= prob;
            } else {
                *v = ZERO;
            }
        }
    }

    /// Exact `Σ K ρ K†`; no branch is sampled.
    fn apply_kraus(
        &self,
        qs: &mut [Complex64],
        n_qubits: usize,
        ops: &[Array2<Complex64>],
        objs: &[usize],
        _rng: &mut StdRng,
    ) {
        let mut acc = vec![ZERO; qs.len()];
        for k in ops {
            let mut term = qs.to_vec();
            self.apply_unitary(&mut term, n_qubits, k, objs, &[]);
            for (a, t) in acc.iter_mut().zip(term) {
                *a += t;
            }
        }
        qs.copy_from_slice(&acc);
    }

    fn apply_hamiltonian(
        &self,
        qs: &[Complex64],
        n_qubits: usize,
        ham: &Hamiltonian,
    ) -> Vec<Complex64> {
        apply_pauli_sum(qs, ham, n_qubits)
    }

    /// The matrix of `H` itself, so that `vdot(ρ, H) = tr(ρ H)`.
    fn observable(&self, _qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Vec<Complex64> {
        let dim = 1usize << n_qubits;
        let mut identity = vec![ZERO; self.buffer_len(n_qubits)];
        for i in 0..dim {
            identity[(i << n_qubits) | i] = ONE;
        }
        self.apply_hamiltonian(&identity, n_qubits, ham)
    }

    fn expectation(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Complex64 {
        trace(&self.apply_hamiltonian(qs, n_qubits, ham), n_qubits)
    }

    fn norm(&self, qs: &[Complex64], n_qubits: usize) -> f64 {
        trace(qs, n_qubits).re
    }

    fn purity(&self, qs: &[Complex64], _n_qubits: usize) -> f64 {
        // tr(ρ²) = Σ |ρ_ij|² for Hermitian ρ
        qs.iter().map(Complex64::norm_sqr).sum()
    }
}
