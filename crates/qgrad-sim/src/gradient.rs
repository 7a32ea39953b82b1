//! Expectation values and adjoint (reverse-mode) gradients.
//!
//! One forward pass prepares `|ψ⟩ = U|ψ₀⟩`; the observable buffer `H|ψ⟩`
//! (or the matrix `H` for a density matrix) is then swept backwards through
//! the Hermitian-conjugate circuit together with the forward state. Before
//! the adjoint of gate `k` is applied to the observable buffer, the overlap
//! with the forward state acted on by `dU_k` gives that gate's derivative
//! contribution. The cost is independent of the parameter count.
//!
//! For a Hermitian `H` each contribution is `2·⟨ψ|H dU ψ⟩` scaled by the
//! coefficient of the differentiated name; only its real part is the
//! physical gradient. The non-Hermitian entry point
//! ([`State::non_hermitian_one_multi`]) evaluates `⟨φ_L|H|φ_R⟩` with two
//! sweeps, one per circuit.

use num_complex::Complex64;
use qgrad_ir::{Circuit, Gate, Hamiltonian, ParameterResolver};
use rayon::ThreadPool;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::backend::BackendKind;
use crate::batch::{build_pool, clamp_threads, map_chunked};
use crate::error::{SimError, SimResult};
use crate::kernel::vdot;
use crate::state::State;

/// Caller-supplied mapping from parameter name to gradient slot.
pub type ParameterMap = FxHashMap<String, usize>;

/// Build a [`ParameterMap`] assigning slots in the given order.
pub fn parameter_map<S: AsRef<str>>(names: &[S]) -> ParameterMap {
    names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_ref().to_string(), i))
        .collect()
}

/// Number of gradient slots addressed by `p_map`.
pub(crate) fn grad_len(p_map: &ParameterMap) -> usize {
    p_map.values().copied().max().map_or(0, |m| m + 1)
}

/// An expectation value with its gradient, indexed by `p_map` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationWithGrad {
    /// The expectation value.
    pub expectation: Complex64,
    /// Derivative per parameter slot.
    pub gradient: Vec<Complex64>,
}

impl ExpectationWithGrad {
    /// Real parts of the gradient.
    pub fn real_gradient(&self) -> Vec<f64> {
        self.gradient.iter().map(|g| g.re).collect()
    }
}

/// A circuit together with its Hermitian conjugate.
///
/// `herm` must be `circuit` reversed with every gate daggered, as built by
/// [`Circuit::dagger`].
#[derive(Debug, Clone, Copy)]
pub struct CircuitPair<'a> {
    /// The forward circuit.
    pub circuit: &'a Circuit,
    /// Its Hermitian conjugate.
    pub herm: &'a Circuit,
}

impl<'a> CircuitPair<'a> {
    /// Pair a circuit with a precomputed Hermitian conjugate.
    pub fn new(circuit: &'a Circuit, herm: &'a Circuit) -> Self {
        Self { circuit, herm }
    }

    fn validate(&self, n_qubits: usize) -> SimResult<()> {
        if self.herm.len() != self.circuit.len() {
            return Err(SimError::DimensionMismatch {
                what: "Hermitian-conjugate circuit length".into(),
                expected: self.circuit.len(),
                got: self.herm.len(),
            });
        }
        if self.circuit.has_non_unitary() {
            return Err(SimError::UnsupportedOperation {
                operation: "adjoint gradient".into(),
                target: "a circuit with measurements or channels".into(),
            });
        }
        let used = self.circuit.num_qubits().max(self.herm.num_qubits());
        if used > n_qubits {
            return Err(SimError::DimensionMismatch {
                what: "circuit qubits".into(),
                expected: n_qubits,
                got: used,
            });
        }
        Ok(())
    }
}

/// The left side of a non-Hermitian expectation `⟨φ_L|H|φ_R⟩`: the initial
/// state and circuit preparing `|φ_L⟩`.
#[derive(Debug, Clone, Copy)]
pub struct LeftSide<'a> {
    /// Initial left state.
    pub state: &'a State,
    /// Circuit applied to it.
    pub circuits: CircuitPair<'a>,
}

// =============================================================================
// Sweep
// =============================================================================

/// Add `Σ_names coeff · ⟨r| dU_p |l⟩` for every differentiable gate
/// parameter `p` into `raw`.
fn accumulate_gate(
    l: &State,
    r: &State,
    gate: &Gate,
    pr: &ParameterResolver,
    p_map: &ParameterMap,
    raw: &mut [Complex64],
) -> SimResult<()> {
    let per_param: Vec<Vec<(&str, f64)>> = gate
        .params
        .iter()
        .map(|param| {
            param
                .iter()
                .filter(|(name, _)| param.is_requires_grad(name) && pr.is_requires_grad(name))
                .collect()
        })
        .collect();
    if per_param.iter().all(Vec::is_empty) {
        return Ok(());
    }

    let m = gate.matrix(pr)?;
    let diffs = gate.diff_matrices(pr)?;
    let policy = l.policy();
    for (names, dm) in per_param.iter().zip(&diffs) {
        if names.is_empty() {
            continue;
        }
        let mut tmp = l.buffer().to_vec();
        policy.apply_derivative(
            &mut tmp,
            l.n_qubits(),
            dm,
            &m,
            &gate.obj_qubits,
            &gate.ctrl_qubits,
        );
        let overlap = vdot(r.buffer(), &tmp);
        for (name, coeff) in names {
            let slot = *p_map
                .get(*name)
                .ok_or_else(|| SimError::UnboundParameter((*name).to_string()))?;
            raw[slot] += *coeff * overlap;
        }
    }
    Ok(())
}

/// Sweep `pair.herm` over the forward state `l` and the observable buffer
/// `r`, returning the raw (unscaled) derivative sums.
fn adjoint_sweep(
    mut l: State,
    mut r: State,
    pair: CircuitPair<'_>,
    pr: &ParameterResolver,
    p_map: &ParameterMap,
) -> SimResult<Vec<Complex64>> {
    let mut raw = vec![Complex64::new(0.0, 0.0); grad_len(p_map)];
    let gates = pair.circuit.gates();
    for (i, herm_gate) in pair.herm.iter().enumerate() {
        let gate = &gates[gates.len() - 1 - i];
        l.apply_gate(herm_gate, pr, false)?;
        accumulate_gate(&l, &r, gate, pr, p_map, &mut raw)?;
        r.apply_gate(herm_gate, pr, false)?;
    }
    Ok(raw)
}

impl State {
    /// A copy of this state with `circuit` applied.
    pub(crate) fn forward(&self, circuit: &Circuit, pr: &ParameterResolver) -> SimResult<State> {
        let mut ket = self.clone();
        for gate in circuit {
            ket.apply_gate(gate, pr, false)?;
        }
        Ok(ket)
    }

    fn observable_state(&self, ham: &Hamiltonian) -> SimResult<State> {
        self.check_hamiltonian(ham)?;
        let mut r = self.clone();
        r.replace_buffer(
            self.policy()
                .observable(self.buffer(), self.n_qubits(), ham),
        );
        Ok(r)
    }

    // =========================================================================
    // Hermitian entry points
    // =========================================================================

    /// Expectation of `ham` after `pair.circuit` and its gradient with respect
    /// to every name in `p_map`.
    pub fn get_expectation_with_grad(
        &self,
        ham: &Hamiltonian,
        pair: CircuitPair<'_>,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
    ) -> SimResult<ExpectationWithGrad> {
        let mut out = self.one_multi_in(std::slice::from_ref(ham), pair, pr, p_map, None)?;
        out.pop().ok_or_else(|| SimError::DimensionMismatch {
            what: "expectation results".into(),
            expected: 1,
            got: 0,
        })
    }

    /// Several Hamiltonians sharing one forward pass, the Hamiltonian axis
    /// split across up to `mea_threads` workers.
    #[instrument(skip_all, fields(n_hams = hams.len(), n_params = p_map.len(), mea_threads = mea_threads))]
    pub fn one_multi(
        &self,
        hams: &[Hamiltonian],
        pair: CircuitPair<'_>,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
        mea_threads: usize,
    ) -> SimResult<Vec<ExpectationWithGrad>> {
        let threads = clamp_threads(mea_threads, hams.len());
        let pool = if threads > 1 {
            Some(build_pool(threads)?)
        } else {
            None
        };
        self.one_multi_in(hams, pair, pr, p_map, pool.as_ref())
    }

    pub(crate) fn one_multi_in(
        &self,
        hams: &[Hamiltonian],
        pair: CircuitPair<'_>,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
        pool: Option<&ThreadPool>,
    ) -> SimResult<Vec<ExpectationWithGrad>> {
        pair.validate(self.n_qubits())?;
        for ham in hams {
            self.check_hamiltonian(ham)?;
        }
        let ket = self.forward(pair.circuit, pr)?;
        let results = map_chunked(hams, pool, |ham| {
            let r = ket.observable_state(ham)?;
            let expectation = vdot(ket.buffer(), r.buffer());
            let raw = adjoint_sweep(ket.clone(), r, pair, pr, p_map)?;
            Ok(ExpectationWithGrad {
                expectation,
                gradient: raw.into_iter().map(|g| 2.0 * g).collect(),
            })
        })?;
        debug!(n_hams = hams.len(), n_gates = pair.circuit.len(), "adjoint sweep done");
        Ok(results)
    }

    // =========================================================================
    // Non-Hermitian entry point
    // =========================================================================

    /// `⟨φ_L|H|φ_R⟩` for each Hamiltonian with its gradient, where `|φ_R⟩`
    /// is `right.circuit` applied to this state and `|φ_L⟩` is
    /// `left.circuits.circuit` applied to `left.state`.
    ///
    /// The gradient sums the right-circuit contributions `⟨H†φ_L| dU_R φ⟩`
    /// and the conjugated left-circuit contributions `⟨Hφ_R| dU_L φ⟩*`.
    /// Only the state-vector backend is supported.
    #[instrument(skip_all, fields(n_hams = hams.len(), n_params = p_map.len(), mea_threads = mea_threads))]
    pub fn non_hermitian_one_multi(
        &self,
        left: LeftSide<'_>,
        hams: &[Hamiltonian],
        right: CircuitPair<'_>,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
        mea_threads: usize,
    ) -> SimResult<Vec<ExpectationWithGrad>> {
        let threads = clamp_threads(mea_threads, hams.len());
        let pool = if threads > 1 {
            Some(build_pool(threads)?)
        } else {
            None
        };
        self.non_hermitian_in(left, hams, right, pr, p_map, pool.as_ref())
    }

    pub(crate) fn non_hermitian_in(
        &self,
        left: LeftSide<'_>,
        hams: &[Hamiltonian],
        right: CircuitPair<'_>,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
        pool: Option<&ThreadPool>,
    ) -> SimResult<Vec<ExpectationWithGrad>> {
        for backend in [self.backend(), left.state.backend()] {
            if backend != BackendKind::StateVector {
                return Err(SimError::UnsupportedOperation {
                    operation: "non-Hermitian gradient".into(),
                    target: format!("backend '{backend}'"),
                });
            }
        }
        if left.state.n_qubits() != self.n_qubits() {
            return Err(SimError::DimensionMismatch {
                what: "left state qubits".into(),
                expected: self.n_qubits(),
                got: left.state.n_qubits(),
            });
        }
        right.validate(self.n_qubits())?;
        left.circuits.validate(self.n_qubits())?;
        for ham in hams {
            self.check_hamiltonian(ham)?;
        }

        let ket_r = self.forward(right.circuit, pr)?;
        let ket_l = left.state.forward(left.circuits.circuit, pr)?;
        map_chunked(hams, pool, |ham| {
            let h_right = ket_r.apply_hamiltonian(ham)?;
            let hd_left = ket_l.apply_hamiltonian(&ham.dagger())?;
            let expectation = vdot(ket_l.buffer(), h_right.buffer());
            let right_raw = adjoint_sweep(ket_r.clone(), hd_left, right, pr, p_map)?;
            let left_raw = adjoint_sweep(ket_l.clone(), h_right, left.circuits, pr, p_map)?;
            Ok(ExpectationWithGrad {
                expectation,
                gradient: right_raw
                    .into_iter()
                    .zip(left_raw)
                    .map(|(r, l)| r + l.conj())
                    .collect(),
            })
        })
    }
}
