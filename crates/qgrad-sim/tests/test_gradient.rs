//! Tests for adjoint and parameter-shift gradients.

use ndarray::Array2;
use num_complex::Complex64;
use qgrad_ir::{
    Channel, Circuit, Gate, GateKind, Hamiltonian, HamiltonianTerm, ParameterResolver, PauliOp,
    PauliString,
};
use qgrad_sim::{BackendKind, CircuitPair, LeftSide, SimError, State, parameter_map};
use std::f64::consts::PI;
use tracing_subscriber::EnvFilter;

const BACKENDS: [BackendKind; 2] = [BackendKind::StateVector, BackendKind::DensityMatrix];
const FD_STEP: f64 = 1e-5;

/// Route engine logs to the test harness; `RUST_LOG=qgrad_sim=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn expectation(state: &State, circuit: &Circuit, ham: &Hamiltonian, pr: &ParameterResolver) -> Complex64 {
    let mut ket = state.clone();
    ket.apply_circuit(circuit, pr).unwrap();
    ket.get_expectation(ham).unwrap()
}

/// Central differences of `f` with respect to each name of `pr`.
fn finite_difference<F>(pr: &ParameterResolver, names: &[&str], f: F) -> Vec<Complex64>
where
    F: Fn(&ParameterResolver) -> Complex64,
{
    names
        .iter()
        .map(|name| {
            let v = pr.get(name).unwrap();
            let plus = pr.clone().with(*name, v + FD_STEP);
            let minus = pr.clone().with(*name, v - FD_STEP);
            (f(&plus) - f(&minus)) / (2.0 * FD_STEP)
        })
        .collect()
}

/// Two-qubit ansatz exercising shared names, coefficients, controls and
/// multi-parameter gates.
fn ansatz() -> Circuit {
    let a = ParameterResolver::symbol("a");
    let b = ParameterResolver::symbol("b");
    let mut circuit = Circuit::new();
    circuit
        .h(0)
        .unwrap()
        .rx("a", 0)
        .unwrap()
        .ry(a.clone() * 2.0 + 0.3, 1)
        .unwrap()
        .cx(0, 1)
        .unwrap()
        .rzz("b", 0, 1)
        .unwrap()
        .u3("a", b.clone() - a, "c", 1)
        .unwrap()
        .fsim(0.4, "c", 0, 1)
        .unwrap()
        .s(1)
        .unwrap();
    circuit.push(
        Gate::rotation(GateKind::PhaseShift, b * 0.5, &[0])
            .unwrap()
            .with_ctrls(&[1])
            .unwrap(),
    );
    circuit.push(Gate::rotation(GateKind::Rxy, "c", &[0, 1]).unwrap());
    circuit
}

fn ansatz_ham() -> Hamiltonian {
    Hamiltonian::new(
        2,
        vec![
            HamiltonianTerm::z(0, 1.0),
            HamiltonianTerm::new(0.5, PauliString::from_ops([(0, PauliOp::X), (1, PauliOp::X)])),
            HamiltonianTerm::y(1, -0.3),
        ],
    )
    .unwrap()
}

fn ansatz_pr() -> ParameterResolver {
    ParameterResolver::from_pairs([("a", 0.37), ("b", -1.1), ("c", 2.05)])
}

fn assert_close(actual: &[Complex64], expected: &[Complex64], tol: f64) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).norm() < tol, "slot {i}: {a} != {e}");
    }
}

// ---------------------------------------------------------------------------
// Closed forms
// ---------------------------------------------------------------------------

#[test]
fn rx_gradient_is_minus_sine() {
    let ham = Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap();
    let mut circuit = Circuit::new();
    circuit.rx("theta", 0).unwrap();
    let herm = circuit.dagger().unwrap();
    let p_map = parameter_map(&["theta"]);
    for backend in BACKENDS {
        let state = State::new(backend, 1, 42).unwrap();
        for theta in [0.0, PI / 4.0, PI / 2.0, PI] {
            let pr = ParameterResolver::from_pairs([("theta", theta)]);
            let out = state
                .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &p_map)
                .unwrap();
            assert!((out.expectation.re - theta.cos()).abs() < 1e-12, "{backend} at {theta}");
            assert!((out.gradient[0].re + theta.sin()).abs() < 1e-12, "{backend} at {theta}");
        }
    }
}

#[test]
fn controlled_rotation_gradient() {
    // |1⟩ on the control: ⟨Z₁⟩ = cos θ
    let ham = Hamiltonian::new(2, vec![HamiltonianTerm::z(1, 1.0)]).unwrap();
    let mut circuit = Circuit::new();
    circuit.x(0).unwrap();
    circuit.push(
        Gate::rotation(GateKind::Ry, "t", &[1])
            .unwrap()
            .with_ctrls(&[0])
            .unwrap(),
    );
    let herm = circuit.dagger().unwrap();
    let theta = 0.8;
    for backend in BACKENDS {
        let state = State::new(backend, 2, 42).unwrap();
        let out = state
            .get_expectation_with_grad(
                &ham,
                CircuitPair::new(&circuit, &herm),
                &ParameterResolver::from_pairs([("t", theta)]),
                &parameter_map(&["t"]),
            )
            .unwrap();
        assert!((out.expectation.re - theta.cos()).abs() < 1e-12);
        assert!((out.gradient[0].re + theta.sin()).abs() < 1e-12);
    }
}

#[test]
fn inactive_control_gives_zero_gradient() {
    let ham = Hamiltonian::new(2, vec![HamiltonianTerm::z(1, 1.0)]).unwrap();
    let circuit = Circuit::from_gates(vec![
        Gate::rotation(GateKind::Rx, "t", &[1])
            .unwrap()
            .with_ctrls(&[0])
            .unwrap(),
    ]);
    let herm = circuit.dagger().unwrap();
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let out = state
        .get_expectation_with_grad(
            &ham,
            CircuitPair::new(&circuit, &herm),
            &ParameterResolver::from_pairs([("t", 1.3)]),
            &parameter_map(&["t"]),
        )
        .unwrap();
    assert!((out.expectation.re - 1.0).abs() < 1e-12);
    assert!(out.gradient[0].norm() < 1e-12);
}

// ---------------------------------------------------------------------------
// Cross-checks
// ---------------------------------------------------------------------------

#[test]
fn adjoint_matches_finite_differences() {
    init_tracing();
    let circuit = ansatz();
    let herm = circuit.dagger().unwrap();
    let ham = ansatz_ham();
    let pr = ansatz_pr();
    let names = ["a", "b", "c"];
    for backend in BACKENDS {
        let state = State::new(backend, 2, 42).unwrap();
        let out = state
            .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &parameter_map(&names))
            .unwrap();
        assert!((out.expectation - expectation(&state, &circuit, &ham, &pr)).norm() < 1e-12);
        let fd = finite_difference(&pr, &names, |p| expectation(&state, &circuit, &ham, p));
        let adjoint: Vec<Complex64> = out.real_gradient().into_iter().map(|g| c(g, 0.0)).collect();
        assert_close(&adjoint, &fd, 1e-6);
    }
}

#[test]
fn adjoint_matches_parameter_shift() {
    init_tracing();
    // FSim θ and controlled rotations fall outside the two-term rule.
    let mut circuit = Circuit::new();
    circuit
        .h(0)
        .unwrap()
        .h(1)
        .unwrap()
        .rx("a", 0)
        .unwrap()
        .ry(ParameterResolver::symbol("a") * 2.0 - ParameterResolver::symbol("b"), 1)
        .unwrap()
        .cx(0, 1)
        .unwrap()
        .rxx("b", 0, 1)
        .unwrap()
        .u3("c", "a", "b", 0)
        .unwrap()
        .fsim(0.2, "c", 1, 0)
        .unwrap();
    circuit.push(
        Gate::rotation(GateKind::PhaseShift, "c", &[1])
            .unwrap()
            .with_ctrls(&[0])
            .unwrap(),
    );
    let herm = circuit.dagger().unwrap();
    let ham = ansatz_ham();
    let pr = ansatz_pr();
    let p_map = parameter_map(&["a", "b", "c"]);
    for backend in BACKENDS {
        let state = State::new(backend, 2, 42).unwrap();
        let adjoint = state
            .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &p_map)
            .unwrap();
        let shift = state.parameter_shift_grad(&ham, &circuit, &pr, &p_map).unwrap();
        assert!((adjoint.expectation - shift.expectation).norm() < 1e-12);
        let adjoint_re: Vec<Complex64> = adjoint.real_gradient().into_iter().map(|g| c(g, 0.0)).collect();
        let shift_re: Vec<Complex64> = shift.real_gradient().into_iter().map(|g| c(g, 0.0)).collect();
        assert_close(&adjoint_re, &shift_re, 1e-10);
    }
}

#[test]
fn parameter_shift_through_noise_on_density_matrix() {
    let mut circuit = Circuit::new();
    circuit
        .ry("a", 0)
        .unwrap()
        .channel(Channel::depolarizing(0.1).unwrap(), &[0])
        .unwrap()
        .rz("b", 0)
        .unwrap()
        .channel(Channel::amplitude_damping(0.2).unwrap(), &[0])
        .unwrap();
    let ham = Hamiltonian::new(
        1,
        vec![HamiltonianTerm::z(0, 1.0), HamiltonianTerm::x(0, 0.5)],
    )
    .unwrap();
    let pr = ParameterResolver::from_pairs([("a", 0.9), ("b", 0.4)]);
    let state = State::new(BackendKind::DensityMatrix, 1, 42).unwrap();
    let out = state
        .parameter_shift_grad(&ham, &circuit, &pr, &parameter_map(&["a", "b"]))
        .unwrap();
    let fd = finite_difference(&pr, &["a", "b"], |p| expectation(&state, &circuit, &ham, p));
    assert_close(&out.gradient, &fd, 1e-6);

    let sv = State::new(BackendKind::StateVector, 1, 42).unwrap();
    assert!(matches!(
        sv.parameter_shift_grad(&ham, &circuit, &pr, &parameter_map(&["a", "b"])),
        Err(SimError::UnsupportedOperation { .. })
    ));
}

#[test]
fn initial_state_is_respected() {
    let ham = Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap();
    let mut circuit = Circuit::new();
    circuit.ry("t", 0).unwrap();
    let herm = circuit.dagger().unwrap();
    let pr = ParameterResolver::from_pairs([("t", 0.6)]);
    let mut state = State::new(BackendKind::StateVector, 1, 42).unwrap();
    state.set_qs(vec![c(0.0, 0.0), c(1.0, 0.0)]).unwrap();
    let out = state
        .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &parameter_map(&["t"]))
        .unwrap();
    // RY(t)|1⟩: ⟨Z⟩ = -cos t
    assert!((out.expectation.re + 0.6f64.cos()).abs() < 1e-12);
    assert!((out.gradient[0].re - 0.6f64.sin()).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Parameter selection
// ---------------------------------------------------------------------------

#[test]
fn no_grad_names_get_no_gradient() {
    let circuit = ansatz();
    let herm = circuit.dagger().unwrap();
    let pr = ansatz_pr().no_grad_part(&["b"]);
    let p_map = parameter_map(&["a", "b", "c"]);
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let out = state
        .get_expectation_with_grad(&ansatz_ham(), CircuitPair::new(&circuit, &herm), &pr, &p_map)
        .unwrap();
    assert_eq!(out.gradient[1], c(0.0, 0.0));
    assert!(out.gradient[0].norm() > 1e-6);
}

#[test]
fn gradient_follows_p_map_slots() {
    let circuit = ansatz();
    let herm = circuit.dagger().unwrap();
    let pr = ansatz_pr();
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let forward = state
        .get_expectation_with_grad(&ansatz_ham(), CircuitPair::new(&circuit, &herm), &pr, &parameter_map(&["a", "b", "c"]))
        .unwrap();
    let reversed = state
        .get_expectation_with_grad(&ansatz_ham(), CircuitPair::new(&circuit, &herm), &pr, &parameter_map(&["c", "b", "a"]))
        .unwrap();
    assert_eq!(forward.gradient[0], reversed.gradient[2]);
    assert_eq!(forward.gradient[1], reversed.gradient[1]);
    assert_eq!(forward.gradient[2], reversed.gradient[0]);
}

#[test]
fn one_multi_matches_single_calls() {
    let circuit = ansatz();
    let herm = circuit.dagger().unwrap();
    let pr = ansatz_pr();
    let p_map = parameter_map(&["a", "b", "c"]);
    let hams = vec![
        ansatz_ham(),
        Hamiltonian::new(2, vec![HamiltonianTerm::zz(0, 1, 1.0)]).unwrap(),
        Hamiltonian::identity(2).unwrap(),
    ];
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let pair = CircuitPair::new(&circuit, &herm);
    let multi = state.one_multi(&hams, pair, &pr, &p_map, 3).unwrap();
    assert_eq!(multi.len(), 3);
    for (ham, out) in hams.iter().zip(&multi) {
        let single = state.get_expectation_with_grad(ham, pair, &pr, &p_map).unwrap();
        assert_eq!(&single, out);
    }
    // The identity observable has no gradient.
    assert!(multi[2].gradient.iter().all(|g| g.norm() < 1e-12));
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[test]
fn measurement_in_circuit_is_rejected() {
    let mut circuit = Circuit::new();
    circuit.rx("a", 0).unwrap().measure("m", 0).unwrap();
    let state = State::new(BackendKind::StateVector, 1, 42).unwrap();
    let herm = Circuit::from_gates(circuit.gates().to_vec());
    let err = state
        .get_expectation_with_grad(
            &Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap(),
            CircuitPair::new(&circuit, &herm),
            &ParameterResolver::from_pairs([("a", 0.1)]),
            &parameter_map(&["a"]),
        )
        .unwrap_err();
    assert!(matches!(err, SimError::UnsupportedOperation { .. }));
}

#[test]
fn gate_with_extra_parameters_is_rejected() {
    // Fields are public, so a gate can bypass validation.
    let m = Array2::from_elem((2, 2), c(0.5, 0.0));
    let mut gate = Gate::custom("blob", m, &[0]).unwrap();
    gate.params.push(ParameterResolver::symbol("a"));
    let circuit = Circuit::from_gates(vec![gate.clone()]);
    let herm = Circuit::from_gates(vec![gate]);
    let state = State::new(BackendKind::StateVector, 1, 42).unwrap();
    let err = state
        .get_expectation_with_grad(
            &Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap(),
            CircuitPair::new(&circuit, &herm),
            &ParameterResolver::from_pairs([("a", 0.1)]),
            &parameter_map(&["a"]),
        )
        .unwrap_err();
    assert!(matches!(err, SimError::DimensionMismatch { .. }));
}

#[test]
fn circuit_wider_than_state_is_rejected() {
    let mut circuit = Circuit::new();
    circuit.rx("a", 2).unwrap();
    let herm = circuit.dagger().unwrap();
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let err = state
        .get_expectation_with_grad(
            &Hamiltonian::identity(2).unwrap(),
            CircuitPair::new(&circuit, &herm),
            &ParameterResolver::from_pairs([("a", 0.1)]),
            &parameter_map(&["a"]),
        )
        .unwrap_err();
    assert!(matches!(err, SimError::DimensionMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Non-Hermitian
// ---------------------------------------------------------------------------

fn complex_ham() -> Hamiltonian {
    Hamiltonian::new(
        2,
        vec![
            HamiltonianTerm::complex(
                c(0.5, 0.3),
                PauliString::from_ops([(0, PauliOp::X), (1, PauliOp::Z)]),
            ),
            HamiltonianTerm::complex(c(0.0, -0.2), PauliString::from_ops([(1, PauliOp::Y)])),
            HamiltonianTerm::z(0, 0.7),
        ],
    )
    .unwrap()
}

#[test]
fn non_hermitian_reduces_to_hermitian() {
    let circuit = ansatz();
    let herm = circuit.dagger().unwrap();
    let pair = CircuitPair::new(&circuit, &herm);
    let pr = ansatz_pr();
    let p_map = parameter_map(&["a", "b", "c"]);
    let hams = vec![ansatz_ham()];
    let state = State::new(BackendKind::StateVector, 2, 42).unwrap();

    let hermitian = state.one_multi(&hams, pair, &pr, &p_map, 1).unwrap();
    let left = LeftSide {
        state: &state,
        circuits: pair,
    };
    let general = state
        .non_hermitian_one_multi(left, &hams, pair, &pr, &p_map, 1)
        .unwrap();
    assert!((hermitian[0].expectation - general[0].expectation).norm() < 1e-12);
    for (h, g) in hermitian[0].gradient.iter().zip(&general[0].gradient) {
        assert!((h.re - g.re).abs() < 1e-12);
        assert!(g.im.abs() < 1e-12);
    }
}

#[test]
fn non_hermitian_matches_finite_differences() {
    init_tracing();
    let mut right = Circuit::new();
    right
        .rx("a", 0)
        .unwrap()
        .ry("b", 1)
        .unwrap()
        .cx(0, 1)
        .unwrap()
        .rz(ParameterResolver::symbol("a") * 0.5, 1)
        .unwrap();
    let right_herm = right.dagger().unwrap();
    let mut left = Circuit::new();
    left.ry("a", 0).unwrap().rxx("b", 0, 1).unwrap().ps("c", 1).unwrap();
    let left_herm = left.dagger().unwrap();

    let mut left_state = State::new(BackendKind::StateVector, 2, 42).unwrap();
    let norm = (0.25f64 + 0.16 + 0.09 + 0.5).sqrt();
    left_state
        .set_qs(vec![
            c(0.5 / norm, 0.0),
            c(0.0, 0.4 / norm),
            c(-0.3 / norm, 0.0),
            c(0.5 / norm, 0.5 / norm),
        ])
        .unwrap();
    let right_state = State::new(BackendKind::StateVector, 2, 42).unwrap();

    let ham = complex_ham();
    let pr = ParameterResolver::from_pairs([("a", 0.3), ("b", -0.8), ("c", 1.4)]);
    let names = ["a", "b", "c"];
    let out = right_state
        .non_hermitian_one_multi(
            LeftSide {
                state: &left_state,
                circuits: CircuitPair::new(&left, &left_herm),
            },
            std::slice::from_ref(&ham),
            CircuitPair::new(&right, &right_herm),
            &pr,
            &parameter_map(&names),
            1,
        )
        .unwrap();

    let overlap = |p: &ParameterResolver| {
        let mut bra = left_state.clone();
        bra.apply_circuit(&left, p).unwrap();
        let mut ket = right_state.clone();
        ket.apply_circuit(&right, p).unwrap();
        let h_ket = ket.apply_hamiltonian(&ham).unwrap();
        bra.get_qs()
            .iter()
            .zip(h_ket.get_qs())
            .map(|(a, b)| a.conj() * b)
            .sum::<Complex64>()
    };
    assert!((out[0].expectation - overlap(&pr)).norm() < 1e-12);
    let fd = finite_difference(&pr, &names, overlap);
    assert_close(&out[0].gradient, &fd, 1e-6);
}

#[test]
fn non_hermitian_rejects_density_matrix() {
    let mut circuit = Circuit::new();
    circuit.rx("a", 0).unwrap();
    let herm = circuit.dagger().unwrap();
    let pair = CircuitPair::new(&circuit, &herm);
    let state = State::new(BackendKind::DensityMatrix, 1, 42).unwrap();
    let err = state
        .non_hermitian_one_multi(
            LeftSide {
                state: &state,
                circuits: pair,
            },
            &[Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap()],
            pair,
            &ParameterResolver::from_pairs([("a", 0.1)]),
            &parameter_map(&["a"]),
            1,
        )
        .unwrap_err();
    assert!(matches!(err, SimError::UnsupportedOperation { .. }));
}
