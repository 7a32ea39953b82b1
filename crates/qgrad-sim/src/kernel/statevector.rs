//! State-vector kernels.

use ndarray::Array2;
use num_complex::Complex64;
use qgrad_ir::Hamiltonian;
use rand::Rng;
use rand::rngs::StdRng;

use super::{KernelPolicy, ZERO, apply_matrix, apply_pauli_sum, vdot};
use crate::backend::BackendKind;
use crate::error::{SimError, SimResult};

/// Pure-state kernels over `2ⁿ` amplitudes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateVectorPolicy;

impl KernelPolicy for StateVectorPolicy {
    fn backend(&self) -> BackendKind {
        BackendKind::StateVector
    }

    fn buffer_len(&self, n_qubits: usize) -> usize {
        1 << n_qubits
    }

    fn from_amplitudes(&self, amps: Vec<Complex64>, n_qubits: usize) -> SimResult<Vec<Complex64>> {
        let dim = self.buffer_len(n_qubits);
        if amps.len() != dim {
            return Err(SimError::DimensionMismatch {
                what: "state-vector amplitudes".into(),
                expected: dim,
                got: amps.len(),
            });
        }
        Ok(amps)
    }

    fn apply_unitary(
        &self,
        qs: &mut [Complex64],
        _n_qubits: usize,
        m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    ) {
        apply_matrix(qs, m, objs, ctrls, false, false);
    }

    fn apply_derivative(
        &self,
        qs: &mut [Complex64],
        _n_qubits: usize,
        dm: &Array2<Complex64>,
        _m: &Array2<Complex64>,
        objs: &[usize],
        ctrls: &[usize],
    ) {
        apply_matrix(qs, dm, objs, ctrls, false, true);
    }

    fn prob_one(&self, qs: &[Complex64], _n_qubits: usize, qubit: usize) -> f64 {
        let mask = 1 << qubit;
        qs.iter()
            .enumerate()
            .filter(|(i, _)| i & mask != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum()
    }

    fn collapse(&self, qs: &mut [Complex64], _n_qubits: usize, qubit: usize, outcome: u8, prob: f64) {
        let mask = 1 << qubit;
        let want = if outcome == 1 { mask } else { 0 };
        let scale = prob.sqrt();
        for (i, amp) in qs.iter_mut().enumerate() {
            if i & mask == want {
                *amp /= scale;
            } else {
                *amp = ZERO;
            }
        }
    }

    fn apply_kraus(
        &self,
        qs: &mut [Complex64],
        _n_qubits: usize,
        ops: &[Array2<Complex64>],
        objs: &[usize],
        rng: &mut StdRng,
    ) {
        // Each branch K|ψ⟩ is drawn with probability ‖K|ψ⟩‖².
        let branches: Vec<(Vec<Complex64>, f64)> = ops
            .iter()
            .map(|k| {
                let mut branch = qs.to_vec();
                apply_matrix(&mut branch, k, objs, &[], false, false);
                let p = branch.iter().map(Complex64::norm_sqr).sum();
                (branch, p)
            })
            .collect();

        let r: f64 = rng.r#gen();
        let mut cumulative = 0.0;
        let mut chosen = branches.iter().rposition(|(_, p)| *p > 0.0);
        for (k, (_, p)) in branches.iter().enumerate() {
            cumulative += p;
            if r < cumulative {
                chosen = Some(k);
                break;
            }
        }

        if let Some((branch, p)) = chosen.and_then(|k| branches.into_iter().nth(k)) {
            let scale = p.sqrt();
            for (dst, src) in qs.iter_mut().zip(branch) {
                *dst = src / scale;
            }
        }
    }

    fn apply_hamiltonian(
        &self,
        qs: &[Complex64],
        _n_qubits: usize,
        ham: &Hamiltonian,
    ) -> Vec<Complex64> {
        apply_pauli_sum(qs, ham, 0)
    }

    fn observable(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Vec<Complex64> {
        self.apply_hamiltonian(qs, n_qubits, ham)
    }

    fn expectation(&self, qs: &[Complex64], n_qubits: usize, ham: &Hamiltonian) -> Complex64 {
        vdot(qs, &self.apply_hamiltonian(qs, n_qubits, ham))
    }

    fn norm(&self, qs: &[Complex64], _n_qubits: usize) -> f64 {
        qs.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
    }

    fn purity(&self, qs: &[Complex64], n_qubits: usize) -> f64 {
        self.norm(qs, n_qubits).powi(4)
    }
}
