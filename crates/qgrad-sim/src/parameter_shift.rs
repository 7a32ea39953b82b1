//! Parameter-shift gradients.
//!
//! For a gate parameter entering as `exp(-iθ/2 · G)` with `G` having two
//! eigenvalues one apart, `∂E/∂θ = (E(θ + π/2) − E(θ − π/2)) / 2`. Each
//! occurrence of a differentiable name is shifted separately and the results
//! are scaled by the name's coefficient. This costs two full simulations per
//! occurrence and serves as an independent check of the adjoint engine.

use num_complex::Complex64;
use qgrad_ir::{Circuit, Gate, GateKind, Hamiltonian, ParameterResolver};
use std::f64::consts::FRAC_PI_2;
use tracing::instrument;

use crate::backend::BackendKind;
use crate::error::{SimError, SimResult};
use crate::gradient::{ExpectationWithGrad, ParameterMap, grad_len};
use crate::state::State;

/// Whether parameter `p` of `gate` obeys the two-term shift rule.
///
/// Controls turn a `±1/2` generator into `{-1/2, 0, 1/2}`, so only the
/// phase-type parameters (generator `{0, 1}` up to sign) stay shiftable
/// under control.
fn shiftable(gate: &Gate, p: usize) -> bool {
    let controlled = !gate.ctrl_qubits.is_empty();
    match &gate.kind {
        // FSim θ mixes |01⟩ and |10⟩ with generator eigenvalues {-1, 0, 1}.
        GateKind::FSim => p == 1,
        GateKind::U3 => p > 0 || !controlled,
        GateKind::PhaseShift | GateKind::GlobalPhase => true,
        GateKind::Custom { .. } => false,
        _ => !controlled,
    }
}

impl State {
    fn shifted_expectation(
        &self,
        circuit: &Circuit,
        at: (usize, usize),
        shift: f64,
        pr: &ParameterResolver,
        ham: &Hamiltonian,
    ) -> SimResult<Complex64> {
        let (gate_index, param_index) = at;
        let mut gates = circuit.gates().to_vec();
        let param = &mut gates[gate_index].params[param_index];
        *param = param.clone() + shift;
        let ket = self.forward(&Circuit::from_gates(gates), pr)?;
        ket.get_expectation(ham)
    }

    /// Expectation and gradient by the parameter-shift rule.
    ///
    /// Measurements are rejected; channels are accepted only on the
    /// density-matrix backend, where they are applied exactly.
    #[instrument(skip_all, fields(n_gates = circuit.len(), n_params = p_map.len()))]
    pub fn parameter_shift_grad(
        &self,
        ham: &Hamiltonian,
        circuit: &Circuit,
        pr: &ParameterResolver,
        p_map: &ParameterMap,
    ) -> SimResult<ExpectationWithGrad> {
        self.check_hamiltonian(ham)?;
        let sampled = circuit.iter().any(|g| {
            g.kind.is_measure() || (g.kind.is_channel() && self.backend() == BackendKind::StateVector)
        });
        if sampled {
            return Err(SimError::UnsupportedOperation {
                operation: "parameter shift".into(),
                target: format!("a sampled circuit on backend '{}'", self.backend()),
            });
        }

        let expectation = self.forward(circuit, pr)?.get_expectation(ham)?;
        let mut gradient = vec![Complex64::new(0.0, 0.0); grad_len(p_map)];
        for (i, gate) in circuit.iter().enumerate() {
            for (p, param) in gate.params.iter().enumerate() {
                let names: Vec<(&str, f64)> = param
                    .iter()
                    .filter(|(name, _)| param.is_requires_grad(name) && pr.is_requires_grad(name))
                    .collect();
                if names.is_empty() {
                    continue;
                }
                if !shiftable(gate, p) {
                    return Err(SimError::UnsupportedOperation {
                        operation: format!("parameter shift of parameter {p}"),
                        target: format!("gate '{}'", gate.name()),
                    });
                }
                let plus = self.shifted_expectation(circuit, (i, p), FRAC_PI_2, pr, ham)?;
                let minus = self.shifted_expectation(circuit, (i, p), -FRAC_PI_2, pr, ham)?;
                let g = (plus - minus) / 2.0;
                for (name, coeff) in names {
                    let slot = *p_map
                        .get(name)
                        .ok_or_else(|| SimError::UnboundParameter(name.to_string()))?;
                    gradient[slot] += coeff * g;
                }
            }
        }
        Ok(ExpectationWithGrad {
            expectation,
            gradient,
        })
    }
}
