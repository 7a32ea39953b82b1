//! Benchmarks for qgrad expectation and gradient evaluation
//!
//! Run with: cargo bench -p qgrad-sim

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qgrad_ir::{Circuit, Hamiltonian, HamiltonianTerm, ParameterResolver};
use qgrad_sim::{BackendKind, BatchConfig, BatchInput, CircuitPair, State, parameter_map};

/// Hardware-efficient ansatz: RY/RZ layers joined by a CNOT ladder.
fn layered_ansatz(n: usize, layers: usize) -> (Circuit, Vec<String>) {
    let mut circuit = Circuit::new();
    let mut names = Vec::new();
    for l in 0..layers {
        for q in 0..n {
            let ry = format!("ry_{l}_{q}");
            let rz = format!("rz_{l}_{q}");
            circuit.ry(ry.as_str(), q).unwrap().rz(rz.as_str(), q).unwrap();
            names.push(ry);
            names.push(rz);
        }
        for q in 0..n - 1 {
            circuit.cx(q, q + 1).unwrap();
        }
    }
    (circuit, names)
}

fn ising(n: usize) -> Hamiltonian {
    let mut terms: Vec<HamiltonianTerm> = (0..n - 1)
        .map(|q| HamiltonianTerm::zz(q, q + 1, 1.0))
        .collect();
    terms.extend((0..n).map(|q| HamiltonianTerm::x(q, 0.5)));
    Hamiltonian::new(n, terms).unwrap()
}

fn resolver(names: &[String]) -> ParameterResolver {
    ParameterResolver::from_pairs(
        names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), 0.1 * i as f64)),
    )
}

/// Benchmark the adjoint gradient against qubit count
fn bench_adjoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjoint_gradient");

    for n in &[4, 8, 12] {
        let (circuit, names) = layered_ansatz(*n, 4);
        let herm = circuit.dagger().unwrap();
        let ham = ising(*n);
        let pr = resolver(&names);
        let p_map = parameter_map(&names);
        let state = State::new(BackendKind::StateVector, *n, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("statevector", n), n, |b, _| {
            b.iter(|| {
                state
                    .get_expectation_with_grad(
                        black_box(&ham),
                        CircuitPair::new(&circuit, &herm),
                        black_box(&pr),
                        &p_map,
                    )
                    .unwrap()
            });
        });
    }

    for n in &[2, 4, 6] {
        let (circuit, names) = layered_ansatz(*n, 2);
        let herm = circuit.dagger().unwrap();
        let ham = ising(*n);
        let pr = resolver(&names);
        let p_map = parameter_map(&names);
        let state = State::new(BackendKind::DensityMatrix, *n, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("densitymatrix", n), n, |b, _| {
            b.iter(|| {
                state
                    .get_expectation_with_grad(
                        black_box(&ham),
                        CircuitPair::new(&circuit, &herm),
                        black_box(&pr),
                        &p_map,
                    )
                    .unwrap()
            });
        });
    }

    group.finish();
}

/// Benchmark adjoint against parameter shift on the same circuit
fn bench_adjoint_vs_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjoint_vs_shift");
    let n = 6;
    let (circuit, names) = layered_ansatz(n, 3);
    let herm = circuit.dagger().unwrap();
    let ham = ising(n);
    let pr = resolver(&names);
    let p_map = parameter_map(&names);
    let state = State::new(BackendKind::StateVector, n, 42).unwrap();

    group.bench_function("adjoint", |b| {
        b.iter(|| {
            state
                .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &p_map)
                .unwrap()
        });
    });

    group.bench_function("parameter_shift", |b| {
        b.iter(|| state.parameter_shift_grad(&ham, &circuit, &pr, &p_map).unwrap());
    });

    group.finish();
}

/// Benchmark batched evaluation against worker count
fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    group.sample_size(20);

    let n = 8;
    let (ansatz, ansatz_names) = layered_ansatz(n, 2);
    let mut circuit = Circuit::new();
    let encoder_names: Vec<String> = (0..n).map(|q| format!("x{q}")).collect();
    for (q, name) in encoder_names.iter().enumerate() {
        circuit.rx(name.as_str(), q).unwrap();
    }
    circuit.extend(&ansatz);
    let herm = circuit.dagger().unwrap();
    let hams: Vec<Hamiltonian> = (0..4).map(|_| ising(n)).collect();
    let rows: Vec<Vec<f64>> = (0..16)
        .map(|s| (0..n).map(|q| 0.05 * (s * n + q) as f64).collect())
        .collect();
    let ansatz_data = vec![0.3; ansatz_names.len()];
    let input = BatchInput::new(encoder_names, rows, ansatz_names, ansatz_data).unwrap();
    let state = State::new(BackendKind::StateVector, n, 42).unwrap();

    for threads in &[1, 2, 4] {
        group.bench_with_input(BenchmarkId::new("multi_multi", threads), threads, |b, &t| {
            b.iter(|| {
                state
                    .multi_multi(
                        &hams,
                        CircuitPair::new(&circuit, &herm),
                        &input,
                        BatchConfig::new(t, 1),
                    )
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_adjoint, bench_adjoint_vs_shift, bench_batch);
criterion_main!(benches);
