//! qgrad circuit model
//!
//! This crate provides the read-only inputs consumed by the `qgrad-sim`
//! engine: gates and noise channels, first-order parameter expressions,
//! circuits and Pauli-sum Hamiltonians.
//!
//! # Core Components
//!
//! - **Parameters**: [`ParameterResolver`] is both a value map and a linear
//!   gate-parameter expression, with no-grad and encoder marking
//! - **Gates**: [`Gate`] combines a [`GateKind`] with object/control qubits
//!   and parameters, and exposes its matrix, derivative matrices and dagger
//! - **Channels**: [`Channel`] describes a noise process by its Kraus operators
//! - **Circuit**: [`Circuit`] ordered gate list with a builder API
//! - **Hamiltonian**: [`Hamiltonian`] weighted Pauli-string sum
//!
//! # Example: Parameterized Circuit
//!
//! ```rust
//! use qgrad_ir::{Circuit, ParameterResolver};
//!
//! let mut circuit = Circuit::new();
//! circuit.h(0).unwrap();
//! circuit.rx(ParameterResolver::symbol("theta") * 2.0, 0).unwrap();
//! circuit.cx(0, 1).unwrap();
//!
//! assert_eq!(circuit.num_qubits(), 2);
//! assert_eq!(circuit.parameter_names(), vec!["theta".to_string()]);
//!
//! let inverse = circuit.dagger().unwrap();
//! assert_eq!(inverse.len(), 3);
//! ```
//!
//! # Supported Gates
//!
//! | Gate | Qubits | Parameters |
//! |------|--------|------------|
//! | `I`, `X`, `Y`, `Z`, `H` | 1 | - |
//! | `S`, `Sdg`, `T`, `Tdg` | 1 | - |
//! | `Swap`, `ISwap` | 2 | - |
//! | `Rx`, `Ry`, `Rz` | 1 | θ |
//! | `Rxx`, `Ryy`, `Rzz`, `Rxy`, `Rxz`, `Ryz` | 2 | θ |
//! | `GlobalPhase`, `PhaseShift` | 1 | θ |
//! | `U3` | 1 | θ, φ, λ |
//! | `FSim` | 2 | θ, φ |
//! | `Custom` | any | - |
//!
//! Any unitary gate accepts control qubits; CNOT, CZ and Toffoli are `X`/`Z`
//! with controls.

pub mod channel;
pub mod circuit;
pub mod error;
pub mod gate;
pub mod hamiltonian;
pub mod matrix;
pub mod parameter;

pub use channel::Channel;
pub use circuit::Circuit;
pub use error::{IrError, IrResult};
pub use gate::{Gate, GateKind};
pub use hamiltonian::{Hamiltonian, HamiltonianTerm, PauliMasks, PauliOp, PauliString};
pub use parameter::ParameterResolver;
