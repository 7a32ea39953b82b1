//! The state container.
//!
//! A [`State`] exclusively owns one state buffer and one random engine.
//! Cloning a state deep-copies both, which is how the gradient engine and
//! the batch scheduler obtain independent bra/ket and per-worker copies.

use ndarray::Array2;
use num_complex::Complex64;
use qgrad_ir::{Circuit, Gate, GateKind, Hamiltonian, ParameterResolver};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace};

use crate::backend::BackendKind;
use crate::error::{SimError, SimResult};
use crate::kernel::KernelPolicy;

/// Largest supported buffer, in qubits of the underlying vector.
const MAX_BUFFER_QUBITS: usize = 48;

/// A quantum state on a fixed number of qubits.
#[derive(Debug, Clone)]
pub struct State {
    backend: BackendKind,
    n_qubits: usize,
    qs: Vec<Complex64>,
    seed: u64,
    rng: StdRng,
    measurements: BTreeMap<String, u8>,
}

impl State {
    /// Allocate a state in |0…0⟩ with its random engine seeded by `seed`.
    pub fn new(backend: BackendKind, n_qubits: usize, seed: u64) -> SimResult<Self> {
        let factor = match backend {
            BackendKind::StateVector => 1,
            BackendKind::DensityMatrix => 2,
        };
        if n_qubits * factor > MAX_BUFFER_QUBITS {
            return Err(SimError::DimensionMismatch {
                what: format!("{backend} qubit count (upper bound)"),
                expected: MAX_BUFFER_QUBITS / factor,
                got: n_qubits,
            });
        }
        Ok(Self {
            backend,
            n_qubits,
            qs: backend.policy().init_state(n_qubits),
            seed,
            rng: StdRng::seed_from_u64(seed),
            measurements: BTreeMap::new(),
        })
    }

    /// The backend of this state.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Number of qubits.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Seed the random engine was last seeded with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn policy(&self) -> &'static dyn KernelPolicy {
        self.backend.policy()
    }

    pub(crate) fn buffer(&self) -> &[Complex64] {
        &self.qs
    }

    pub(crate) fn replace_buffer(&mut self, qs: Vec<Complex64>) {
        debug_assert_eq!(qs.len(), self.qs.len());
        self.qs = qs;
    }

    /// Collapse to |0…0⟩ and forget recorded measurement outcomes.
    pub fn reset(&mut self) {
        self.qs = self.policy().init_state(self.n_qubits);
        self.measurements.clear();
    }

    /// Re-seed the random engine.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Outcomes recorded by measurements since the last reset, by key.
    pub fn measurements(&self) -> &BTreeMap<String, u8> {
        &self.measurements
    }

    // =========================================================================
    // Buffer access
    // =========================================================================

    /// Copy of the buffer: amplitudes, or `ρ` flattened row-major.
    pub fn get_qs(&self) -> Vec<Complex64> {
        self.qs.clone()
    }

    /// Replace the buffer.
    ///
    /// The density-matrix backend also accepts a pure state of `2ⁿ`
    /// amplitudes and stores `|ψ⟩⟨ψ|`.
    pub fn set_qs(&mut self, qs: Vec<Complex64>) -> SimResult<()> {
        self.qs = self.policy().from_amplitudes(qs, self.n_qubits)?;
        Ok(())
    }

    /// `‖ψ‖`, or `tr(ρ)` for a density matrix.
    pub fn norm(&self) -> f64 {
        self.policy().norm(&self.qs, self.n_qubits)
    }

    /// `tr(ρ²)`.
    pub fn purity(&self) -> f64 {
        self.policy().purity(&self.qs, self.n_qubits)
    }

    // =========================================================================
    // Gate application
    // =========================================================================

    fn check_qubits(&self, gate: &Gate) -> SimResult<()> {
        gate.validate()?;
        match gate.max_qubit() {
            Some(q) if q >= self.n_qubits => Err(SimError::InvalidGate {
                gate: gate.name().to_string(),
                reason: format!("qubit {q} out of range for {} qubits", self.n_qubits),
            }),
            _ => Ok(()),
        }
    }

    /// Apply a gate, measurement or channel in place.
    ///
    /// With `diff` set, returns the index within `pr`'s differentiable set
    /// of the first parameter name the gate depends on, if any. The gate
    /// itself is applied normally either way.
    pub fn apply_gate(
        &mut self,
        gate: &Gate,
        pr: &ParameterResolver,
        diff: bool,
    ) -> SimResult<Option<usize>> {
        match &gate.kind {
            GateKind::Measure { .. } => {
                self.apply_measurement(gate)?;
                return Ok(None);
            }
            GateKind::Channel(_) => {
                self.apply_channel(gate)?;
                return Ok(None);
            }
            _ => {}
        }
        self.check_qubits(gate)?;
        let m = gate.matrix(pr)?;
        trace!(gate = %gate, "apply");
        self.policy().apply_unitary(
            &mut self.qs,
            self.n_qubits,
            &m,
            &gate.obj_qubits,
            &gate.ctrl_qubits,
        );

        if !diff {
            return Ok(None);
        }
        Ok(gate
            .params
            .iter()
            .flat_map(|p| p.names().filter(move |name| p.is_requires_grad(name)))
            .find_map(|name| pr.grad_index(name)))
    }

    /// Measure one qubit in the computational basis.
    ///
    /// Outcome 0 is drawn when a uniform sample in `[0, 1)` falls below the
    /// probability of 0. The state is projected and divided by the outcome
    /// probability without clamping.
    pub fn apply_measurement(&mut self, gate: &Gate) -> SimResult<u8> {
        let GateKind::Measure { key } = &gate.kind else {
            return Err(SimError::UnsupportedOperation {
                operation: "measure".into(),
                target: format!("gate '{}'", gate.name()),
            });
        };
        self.check_qubits(gate)?;
        let qubit = gate.obj_qubits[0];
        let policy = self.policy();
        let p1 = policy.prob_one(&self.qs, self.n_qubits, qubit);
        let p0 = 1.0 - p1;
        let r: f64 = self.rng.r#gen();
        let (outcome, prob) = if r < p0 { (0u8, p0) } else { (1u8, p1) };
        policy.collapse(&mut self.qs, self.n_qubits, qubit, outcome, prob);
        trace!(key = %key, qubit, outcome, prob, "measured");
        self.measurements.insert(key.clone(), outcome);
        Ok(outcome)
    }

    /// Apply a noise channel.
    ///
    /// The state-vector backend samples one Kraus branch and renormalizes;
    /// the density-matrix backend applies the exact Kraus sum.
    pub fn apply_channel(&mut self, gate: &Gate) -> SimResult<()> {
        let GateKind::Channel(channel) = &gate.kind else {
            return Err(SimError::UnsupportedOperation {
                operation: "channel".into(),
                target: format!("gate '{}'", gate.name()),
            });
        };
        self.check_qubits(gate)?;
        let ops = channel.kraus_operators(gate.obj_qubits.len());
        let policy = self.policy();
        policy.apply_kraus(
            &mut self.qs,
            self.n_qubits,
            &ops,
            &gate.obj_qubits,
            &mut self.rng,
        );
        Ok(())
    }

    /// Apply every gate in order.
    ///
    /// Returns the outcome of each measurement key encountered, the last one
    /// winning when a key repeats.
    #[instrument(skip(self, circuit, pr), fields(n_gates = circuit.len(), backend = %self.backend))]
    pub fn apply_circuit(
        &mut self,
        circuit: &Circuit,
        pr: &ParameterResolver,
    ) -> SimResult<BTreeMap<String, u8>> {
        let mut outcomes = BTreeMap::new();
        for gate in circuit {
            if let GateKind::Measure { key } = &gate.kind {
                let bit = self.apply_measurement(gate)?;
                outcomes.insert(key.clone(), bit);
            } else {
                self.apply_gate(gate, pr, false)?;
            }
        }
        debug!(measured = outcomes.len(), "circuit applied");
        Ok(outcomes)
    }

    // =========================================================================
    // Observables
    // =========================================================================

    pub(crate) fn check_hamiltonian(&self, ham: &Hamiltonian) -> SimResult<()> {
        if ham.n_qubits() != self.n_qubits {
            return Err(SimError::DimensionMismatch {
                what: "Hamiltonian qubits".into(),
                expected: self.n_qubits,
                got: ham.n_qubits(),
            });
        }
        Ok(())
    }

    /// `⟨ψ|H|ψ⟩` (or `tr(Hρ)`); the state is not modified.
    pub fn get_expectation(&self, ham: &Hamiltonian) -> SimResult<Complex64> {
        self.check_hamiltonian(ham)?;
        Ok(self.policy().expectation(&self.qs, self.n_qubits, ham))
    }

    /// A copy of this state with its buffer replaced by `H` applied from the
    /// left.
    pub fn apply_hamiltonian(&self, ham: &Hamiltonian) -> SimResult<State> {
        self.check_hamiltonian(ham)?;
        let mut out = self.clone();
        out.qs = self.policy().apply_hamiltonian(&self.qs, self.n_qubits, ham);
        Ok(out)
    }

    /// The unitary matrix of a circuit, column `k` being the image of `|k⟩`.
    pub fn circuit_matrix(
        &self,
        circuit: &Circuit,
        pr: &ParameterResolver,
    ) -> SimResult<Array2<Complex64>> {
        if self.backend != BackendKind::StateVector {
            return Err(SimError::UnsupportedOperation {
                operation: "circuit_matrix".into(),
                target: format!("backend '{}'", self.backend),
            });
        }
        if circuit.has_non_unitary() {
            return Err(SimError::UnsupportedOperation {
                operation: "circuit_matrix".into(),
                target: "a circuit with measurements or channels".into(),
            });
        }
        let dim = 1usize << self.n_qubits;
        let mut out = Array2::zeros((dim, dim));
        let mut basis = self.clone();
        for k in 0..dim {
            basis.qs.fill(Complex64::new(0.0, 0.0));
            basis.qs[k] = Complex64::new(1.0, 0.0);
            for gate in circuit {
                basis.apply_gate(gate, pr, false)?;
            }
            out.column_mut(k)
                .iter_mut()
                .zip(&basis.qs)
                .for_each(|(dst, src)| *dst = *src);
        }
        Ok(out)
    }
}
