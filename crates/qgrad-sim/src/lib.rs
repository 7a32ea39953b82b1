//! `qgrad-sim` — quantum-state simulation and gradient engine.
//!
//! Evolves a state-vector or density-matrix [`State`] through the gates and
//! noise channels of a `qgrad_ir::Circuit`, evaluates Pauli-sum
//! Hamiltonians and differentiates expectation values with respect to the
//! circuit parameters:
//!
//! - **Adjoint** gradients: one forward pass and one reverse sweep, for one
//!   or many Hamiltonians, Hermitian or not
//! - **Parameter-shift** gradients as an independent cross-check
//! - **Batches** of (encoder sample × Hamiltonian) on two worker pools, with
//!   results in a fixed order
//! - **Sampling** of measurement bitstrings from a seeded engine
//!
//! # Quick start
//!
//! ```rust
//! use qgrad_ir::{Circuit, Hamiltonian, HamiltonianTerm, ParameterResolver};
//! use qgrad_sim::{BackendKind, CircuitPair, SimulatorConfig, parameter_map};
//!
//! let state = SimulatorConfig::from_name("statevector", 1).unwrap().build().unwrap();
//!
//! let mut circuit = Circuit::new();
//! circuit.rx("theta", 0).unwrap();
//! let herm = circuit.dagger().unwrap();
//!
//! let ham = Hamiltonian::new(1, vec![HamiltonianTerm::z(0, 1.0)]).unwrap();
//! let pr = ParameterResolver::from_pairs([("theta", 0.5)]);
//! let out = state
//!     .get_expectation_with_grad(&ham, CircuitPair::new(&circuit, &herm), &pr, &parameter_map(&["theta"]))
//!     .unwrap();
//!
//! assert!((out.expectation.re - 0.5f64.cos()).abs() < 1e-12);
//! assert!((out.gradient[0].re + 0.5f64.sin()).abs() < 1e-12);
//! assert_eq!(state.backend(), BackendKind::StateVector);
//! ```

pub mod backend;
pub mod batch;
pub mod error;
pub mod gradient;
pub mod kernel;
pub mod parameter_shift;
pub mod sampler;
pub mod state;

pub use backend::{BackendKind, DEFAULT_SEED, SimulatorConfig};
pub use batch::{BatchConfig, BatchInput, clamp_threads};
pub use error::{SimError, SimResult};
pub use gradient::{CircuitPair, ExpectationWithGrad, LeftSide, ParameterMap, parameter_map};
pub use kernel::{DensityMatrixPolicy, KernelPolicy, StateVectorPolicy, vdot};
pub use sampler::Samples;
pub use state::State;
