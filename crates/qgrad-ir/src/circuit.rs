//! Circuit builder API.

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::IrResult;
use crate::gate::{Gate, GateKind};
use crate::parameter::ParameterResolver;

/// An ordered sequence of gates.
///
/// Gates are applied in insertion order. The builder methods return
/// `IrResult<&mut Self>` so they can be chained with `?`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Circuit {
    gates: Vec<Gate>,
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a circuit from existing gates.
    pub fn from_gates(gates: Vec<Gate>) -> Self {
        Self { gates }
    }

    /// Append a gate.
    pub fn push(&mut self, gate: Gate) -> &mut Self {
        self.gates.push(gate);
        self
    }

    /// Append every gate of `other`.
    pub fn extend(&mut self, other: &Circuit) -> &mut Self {
        self.gates.extend(other.gates.iter().cloned());
        self
    }

    /// The gates in application order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Iterate over the gates.
    pub fn iter(&self) -> std::slice::Iter<'_, Gate> {
        self.gates.iter()
    }

    /// Number of gates.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// True if the circuit has no gates.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Number of qubits spanned: highest qubit index plus one.
    pub fn num_qubits(&self) -> usize {
        self.gates
            .iter()
            .filter_map(Gate::max_qubit)
            .max()
            .map_or(0, |q| q + 1)
    }

    /// Named parameters referenced by any gate, in ascending order.
    pub fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .gates
            .iter()
            .flat_map(|g| g.params.iter())
            .flat_map(|p| p.names().map(str::to_string))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// True if any gate is a measurement or channel.
    pub fn has_non_unitary(&self) -> bool {
        self.gates.iter().any(|g| !g.kind.is_unitary())
    }

    /// The inverse circuit: gates reversed and individually daggered.
    ///
    /// Fails on measurements and channels.
    pub fn dagger(&self) -> IrResult<Circuit> {
        let gates = self
            .gates
            .iter()
            .rev()
            .map(Gate::dagger)
            .collect::<IrResult<Vec<_>>>()?;
        Ok(Circuit { gates })
    }

    // =========================================================================
    // Fixed gates
    // =========================================================================

    /// Apply Hadamard gate.
    pub fn h(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::H, &[qubit])?);
        Ok(self)
    }

    /// Apply Pauli-X gate.
    pub fn x(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::X, &[qubit])?);
        Ok(self)
    }

    /// Apply Pauli-Y gate.
    pub fn y(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::Y, &[qubit])?);
        Ok(self)
    }

    /// Apply Pauli-Z gate.
    pub fn z(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::Z, &[qubit])?);
        Ok(self)
    }

    /// Apply S gate.
    pub fn s(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::S, &[qubit])?);
        Ok(self)
    }

    /// Apply T gate.
    pub fn t(&mut self, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::T, &[qubit])?);
        Ok(self)
    }

    /// Apply CNOT (controlled-X).
    pub fn cx(&mut self, control: usize, target: usize) -> IrResult<&mut Self> {
        self.gates
            .push(Gate::fixed(GateKind::X, &[target])?.with_ctrls(&[control])?);
        Ok(self)
    }

    /// Apply CZ.
    pub fn cz(&mut self, control: usize, target: usize) -> IrResult<&mut Self> {
        self.gates
            .push(Gate::fixed(GateKind::Z, &[target])?.with_ctrls(&[control])?);
        Ok(self)
    }

    /// Apply SWAP.
    pub fn swap(&mut self, q0: usize, q1: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::fixed(GateKind::Swap, &[q0, q1])?);
        Ok(self)
    }

    // =========================================================================
    // Parameterized gates
    // =========================================================================

    /// Apply RX rotation.
    pub fn rx(&mut self, theta: impl Into<ParameterResolver>, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::rotation(GateKind::Rx, theta, &[qubit])?);
        Ok(self)
    }

    /// Apply RY rotation.
    pub fn ry(&mut self, theta: impl Into<ParameterResolver>, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::rotation(GateKind::Ry, theta, &[qubit])?);
        Ok(self)
    }

    /// Apply RZ rotation.
    pub fn rz(&mut self, theta: impl Into<ParameterResolver>, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::rotation(GateKind::Rz, theta, &[qubit])?);
        Ok(self)
    }

    /// Apply phase shift `diag(1, e^{iθ})`.
    pub fn ps(&mut self, theta: impl Into<ParameterResolver>, qubit: usize) -> IrResult<&mut Self> {
        self.gates
            .push(Gate::rotation(GateKind::PhaseShift, theta, &[qubit])?);
        Ok(self)
    }

    /// Apply ZZ rotation.
    pub fn rzz(
        &mut self,
        theta: impl Into<ParameterResolver>,
        q0: usize,
        q1: usize,
    ) -> IrResult<&mut Self> {
        self.gates
            .push(Gate::rotation(GateKind::Rzz, theta, &[q0, q1])?);
        Ok(self)
    }

    /// Apply XX rotation.
    pub fn rxx(
        &mut self,
        theta: impl Into<ParameterResolver>,
        q0: usize,
        q1: usize,
    ) -> IrResult<&mut Self> {
        self.gates
            .push(Gate::rotation(GateKind::Rxx, theta, &[q0, q1])?);
        Ok(self)
    }

    /// Apply U3(θ, φ, λ).
    pub fn u3(
        &mut self,
        theta: impl Into<ParameterResolver>,
        phi: impl Into<ParameterResolver>,
        lambda: impl Into<ParameterResolver>,
        qubit: usize,
    ) -> IrResult<&mut Self> {
        self.gates.push(Gate::new(
            GateKind::U3,
            vec![qubit],
            vec![],
            vec![theta.into(), phi.into(), lambda.into()],
        )?);
        Ok(self)
    }

    /// Apply FSim(θ, φ).
    pub fn fsim(
        &mut self,
        theta: impl Into<ParameterResolver>,
        phi: impl Into<ParameterResolver>,
        q0: usize,
        q1: usize,
    ) -> IrResult<&mut Self> {
        self.gates.push(Gate::new(
            GateKind::FSim,
            vec![q0, q1],
            vec![],
            vec![theta.into(), phi.into()],
        )?);
        Ok(self)
    }

    // =========================================================================
    // Non-unitary operations
    // =========================================================================

    /// Measure `qubit`, recording the outcome under `key`.
    pub fn measure(&mut self, key: impl Into<String>, qubit: usize) -> IrResult<&mut Self> {
        self.gates.push(Gate::measure(key, qubit)?);
        Ok(self)
    }

    /// Append a noise channel.
    pub fn channel(&mut self, channel: Channel, qubits: &[usize]) -> IrResult<&mut Self> {
        self.gates.push(Gate::channel(channel, qubits)?);
        Ok(self)
    }
}

impl<'a> IntoIterator for &'a Circuit {
    type Item = &'a Gate;
    type IntoIter = std::slice::Iter<'a, Gate>;

    fn into_iter(self) -> Self::IntoIter {
        self.gates.iter()
    }
}

impl FromIterator<Gate> for Circuit {
    fn from_iter<T: IntoIterator<Item = Gate>>(iter: T) -> Self {
        Self {
            gates: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_count() {
        let mut circuit = Circuit::new();
        circuit.h(0).unwrap().cx(0, 3).unwrap().rx("a", 1).unwrap();
        assert_eq!(circuit.len(), 3);
        assert_eq!(circuit.num_qubits(), 4);
        assert_eq!(circuit.parameter_names(), vec!["a".to_string()]);
        assert!(!circuit.has_non_unitary());
    }

    #[test]
    fn test_empty_circuit() {
        let circuit = Circuit::new();
        assert!(circuit.is_empty());
        assert_eq!(circuit.num_qubits(), 0);
    }

    #[test]
    fn test_dagger_reverses_order() {
        let mut circuit = Circuit::new();
        circuit.s(0).unwrap().ry("b", 1).unwrap();
        let dag = circuit.dagger().unwrap();
        assert_eq!(dag.gates()[0].kind, GateKind::Ry);
        assert_eq!(dag.gates()[0].params[0].get("b"), Some(-1.0));
        assert_eq!(dag.gates()[1].kind, GateKind::Sdg);
    }

    #[test]
    fn test_dagger_rejects_measurement() {
        let mut circuit = Circuit::new();
        circuit.h(0).unwrap().measure("m0", 0).unwrap();
        assert!(circuit.has_non_unitary());
        assert!(circuit.dagger().is_err());
    }

    #[test]
    fn test_invalid_cx() {
        let mut circuit = Circuit::new();
        assert!(circuit.cx(1, 1).is_err());
        assert!(circuit.is_empty());
    }
}
