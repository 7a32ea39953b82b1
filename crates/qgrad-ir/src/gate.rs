//! Quantum gate types.

use ndarray::Array2;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::{IrError, IrResult};
use crate::matrix;
use crate::parameter::ParameterResolver;

/// The operation a [`Gate`] performs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum GateKind {
    // Fixed single-qubit gates
    /// Identity gate.
    I,
    /// Pauli-X gate (CNOT / Toffoli with controls).
    X,
    /// Pauli-Y gate.
    Y,
    /// Pauli-Z gate (CZ with a control).
    Z,
    /// Hadamard gate.
    H,
    /// S gate (sqrt(Z)).
    S,
    /// S-dagger gate.
    Sdg,
    /// T gate (fourth root of Z).
    T,
    /// T-dagger gate.
    Tdg,

    // Fixed two-qubit gates
    /// SWAP gate.
    Swap,
    /// iSWAP gate.
    ISwap,

    // Parameterized gates
    /// Rotation around X.
    Rx,
    /// Rotation around Y.
    Ry,
    /// Rotation around Z.
    Rz,
    /// `exp(-iθ/2 X⊗X)`.
    Rxx,
    /// `exp(-iθ/2 Y⊗Y)`.
    Ryy,
    /// `exp(-iθ/2 Z⊗Z)`.
    Rzz,
    /// `exp(-iθ/2 X⊗Y)` with X on the first object qubit.
    Rxy,
    /// `exp(-iθ/2 X⊗Z)` with X on the first object qubit.
    Rxz,
    /// `exp(-iθ/2 Y⊗Z)` with Y on the first object qubit.
    Ryz,
    /// Global phase `e^{-iθ}`.
    GlobalPhase,
    /// Phase shift `diag(1, e^{iθ})`.
    PhaseShift,
    /// Universal single-qubit gate U3(θ, φ, λ).
    U3,
    /// Fermionic simulation gate FSim(θ, φ).
    FSim,

    /// A gate given by an explicit matrix. Without a matrix the gate is
    /// opaque and no backend can apply it.
    Custom {
        /// Gate name.
        name: String,
        /// Unitary matrix on the object qubits.
        #[serde(skip_serializing_if = "Option::is_none")]
        matrix: Option<Array2<Complex64>>,
    },

    /// Computational-basis measurement recorded under `key`.
    Measure {
        /// Measurement name.
        key: String,
    },

    /// A noise channel.
    Channel(Channel),
}

impl GateKind {
    /// Get the name of this gate.
    pub fn name(&self) -> &str {
        match self {
            GateKind::I => "I",
            GateKind::X => "X",
            GateKind::Y => "Y",
            GateKind::Z => "Z",
            GateKind::H => "H",
            GateKind::S => "S",
            GateKind::Sdg => "Sdag",
            GateKind::T => "T",
            GateKind::Tdg => "Tdag",
            GateKind::Swap => "SWAP",
            GateKind::ISwap => "ISWAP",
            GateKind::Rx => "RX",
            GateKind::Ry => "RY",
            GateKind::Rz => "RZ",
            GateKind::Rxx => "Rxx",
            GateKind::Ryy => "Ryy",
            GateKind::Rzz => "Rzz",
            GateKind::Rxy => "Rxy",
            GateKind::Rxz => "Rxz",
            GateKind::Ryz => "Ryz",
            GateKind::GlobalPhase => "GP",
            GateKind::PhaseShift => "PS",
            GateKind::U3 => "U3",
            GateKind::FSim => "FSim",
            GateKind::Custom { name, .. } => name,
            GateKind::Measure { .. } => "M",
            GateKind::Channel(ch) => ch.name(),
        }
    }

    /// Number of object qubits, or `None` when it depends on the operands.
    pub fn num_obj_qubits(&self) -> Option<usize> {
        match self {
            GateKind::I
            | GateKind::X
            | GateKind::Y
            | GateKind::Z
            | GateKind::H
            | GateKind::S
            | GateKind::Sdg
            | GateKind::T
            | GateKind::Tdg
            | GateKind::Rx
            | GateKind::Ry
            | GateKind::Rz
            | GateKind::GlobalPhase
            | GateKind::PhaseShift
            | GateKind::U3
            | GateKind::Measure { .. } => Some(1),

            GateKind::Swap
            | GateKind::ISwap
            | GateKind::Rxx
            | GateKind::Ryy
            | GateKind::Rzz
            | GateKind::Rxy
            | GateKind::Rxz
            | GateKind::Ryz
            | GateKind::FSim => Some(2),

            GateKind::Custom { matrix, .. } => {
                matrix.as_ref().map(|m| m.nrows().trailing_zeros() as usize)
            }
            GateKind::Channel(ch) => ch.num_qubits(),
        }
    }

    /// Number of numeric parameters the gate takes.
    pub fn num_params(&self) -> usize {
        match self {
            GateKind::Rx
            | GateKind::Ry
            | GateKind::Rz
            | GateKind::Rxx
            | GateKind::Ryy
            | GateKind::Rzz
            | GateKind::Rxy
            | GateKind::Rxz
            | GateKind::Ryz
            | GateKind::GlobalPhase
            | GateKind::PhaseShift => 1,
            GateKind::FSim => 2,
            GateKind::U3 => 3,
            _ => 0,
        }
    }

    /// True for measurements.
    pub fn is_measure(&self) -> bool {
        matches!(self, GateKind::Measure { .. })
    }

    /// True for noise channels.
    pub fn is_channel(&self) -> bool {
        matches!(self, GateKind::Channel(_))
    }

    /// True for gates with a unitary action.
    pub fn is_unitary(&self) -> bool {
        !self.is_measure() && !self.is_channel()
    }
}

/// A gate placed on concrete qubits with its parameter bindings.
///
/// Each entry of `params` is a first-order expression over named
/// parameters; see [`ParameterResolver`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// The operation.
    pub kind: GateKind,
    /// Object (target) qubits, little-endian within the gate matrix.
    pub obj_qubits: Vec<usize>,
    /// Control qubits; the action applies where all are |1⟩.
    #[serde(default)]
    pub ctrl_qubits: Vec<usize>,
    /// One expression per gate parameter.
    #[serde(default)]
    pub params: Vec<ParameterResolver>,
}

impl Gate {
    /// Create a gate, validating operand and parameter counts.
    pub fn new(
        kind: GateKind,
        obj_qubits: Vec<usize>,
        ctrl_qubits: Vec<usize>,
        params: Vec<ParameterResolver>,
    ) -> IrResult<Self> {
        let gate = Self {
            kind,
            obj_qubits,
            ctrl_qubits,
            params,
        };
        gate.validate()?;
        Ok(gate)
    }

    /// Fixed (non-parameterized) gate on `objs`.
    pub fn fixed(kind: GateKind, objs: &[usize]) -> IrResult<Self> {
        Self::new(kind, objs.to_vec(), vec![], vec![])
    }

    /// Single-parameter gate on `objs`.
    pub fn rotation(
        kind: GateKind,
        param: impl Into<ParameterResolver>,
        objs: &[usize],
    ) -> IrResult<Self> {
        Self::new(kind, objs.to_vec(), vec![], vec![param.into()])
    }

    /// Measurement of `qubit` recorded under `key`.
    pub fn measure(key: impl Into<String>, qubit: usize) -> IrResult<Self> {
        Self::new(
            GateKind::Measure { key: key.into() },
            vec![qubit],
            vec![],
            vec![],
        )
    }

    /// Noise channel on `objs`.
    pub fn channel(channel: Channel, objs: &[usize]) -> IrResult<Self> {
        Self::new(GateKind::Channel(channel), objs.to_vec(), vec![], vec![])
    }

    /// Custom unitary on `objs`.
    pub fn custom(
        name: impl Into<String>,
        matrix: Array2<Complex64>,
        objs: &[usize],
    ) -> IrResult<Self> {
        Self::new(
            GateKind::Custom {
                name: name.into(),
                matrix: Some(matrix),
            },
            objs.to_vec(),
            vec![],
            vec![],
        )
    }

    /// Add control qubits.
    pub fn with_ctrls(mut self, ctrls: &[usize]) -> IrResult<Self> {
        self.ctrl_qubits.extend_from_slice(ctrls);
        self.validate()?;
        Ok(self)
    }

    /// Get the name of this gate.
    pub fn name(&self) -> &str {
        self.kind.name()
    }

    /// Highest qubit index touched, or `None` for a gate without operands.
    pub fn max_qubit(&self) -> Option<usize> {
        self.obj_qubits
            .iter()
            .chain(&self.ctrl_qubits)
            .copied()
            .max()
    }

    /// True if any parameter depends on a named parameter.
    pub fn is_parameterized(&self) -> bool {
        self.params.iter().any(|p| !p.is_const())
    }

    /// Check operand counts, distinct qubits, parameter arity and any
    /// embedded matrix or channel.
    ///
    /// Constructors call this; gates built from public fields or
    /// deserialized should be checked before use.
    pub fn validate(&self) -> IrResult<()> {
        let name = self.name();
        if self.obj_qubits.is_empty() {
            return Err(IrError::invalid_gate(name, "no object qubits"));
        }
        if let Some(expected) = self.kind.num_obj_qubits() {
            if expected != self.obj_qubits.len() {
                return Err(IrError::invalid_gate(
                    name,
                    format!(
                        "requires {expected} object qubits, got {}",
                        self.obj_qubits.len()
                    ),
                ));
            }
        }
        let mut seen = self.obj_qubits.clone();
        seen.extend_from_slice(&self.ctrl_qubits);
        seen.sort_unstable();
        if let Some(w) = seen.windows(2).find(|w| w[0] == w[1]) {
            return Err(IrError::invalid_gate(
                name,
                format!("qubit {} used more than once", w[0]),
            ));
        }
        if !self.kind.is_unitary() && !self.ctrl_qubits.is_empty() {
            return Err(IrError::invalid_gate(name, "cannot be controlled"));
        }
        if self.params.len() != self.kind.num_params() {
            return Err(IrError::DimensionMismatch {
                what: format!("parameters of gate '{name}'"),
                expected: self.kind.num_params(),
                got: self.params.len(),
            });
        }
        if let GateKind::Custom {
            matrix: Some(m), ..
        } = &self.kind
        {
            if !m.nrows().is_power_of_two() || m.nrows() != m.ncols() {
                return Err(IrError::invalid_gate(
                    name,
                    format!("matrix shape {:?} is not 2ⁿ × 2ⁿ", m.dim()),
                ));
            }
        }
        if let GateKind::Channel(channel) = &self.kind {
            channel.validate()?;
        }
        Ok(())
    }

    /// Evaluate every parameter against `values`.
    pub fn angles(&self, values: &ParameterResolver) -> IrResult<Vec<f64>> {
        // Fields are public and deserialized gates skip `new`.
        if self.params.len() != self.kind.num_params() {
            return Err(IrError::DimensionMismatch {
                what: format!("parameters of gate '{}'", self.name()),
                expected: self.kind.num_params(),
                got: self.params.len(),
            });
        }
        self.params.iter().map(|p| p.combination(values)).collect()
    }

    fn unsupported(&self, operation: &str) -> IrError {
        IrError::UnsupportedOperation {
            operation: operation.into(),
            gate: self.name().to_string(),
        }
    }

    /// The unitary on the object qubits (controls not included).
    pub fn matrix(&self, values: &ParameterResolver) -> IrResult<Array2<Complex64>> {
        let a = self.angles(values)?;
        let m = match &self.kind {
            GateKind::I => matrix::identity(2),
            GateKind::X => matrix::pauli_x(),
            GateKind::Y => matrix::pauli_y(),
            GateKind::Z => matrix::pauli_z(),
            GateKind::H => matrix::hadamard(),
            GateKind::S => matrix::phase(std::f64::consts::FRAC_PI_2),
            GateKind::Sdg => matrix::phase(-std::f64::consts::FRAC_PI_2),
            GateKind::T => matrix::phase(std::f64::consts::FRAC_PI_4),
            GateKind::Tdg => matrix::phase(-std::f64::consts::FRAC_PI_4),
            GateKind::Swap => matrix::swap(),
            GateKind::ISwap => matrix::iswap(),
            GateKind::Rz => matrix::rz(a[0]),
            GateKind::PhaseShift => matrix::phase(a[0]),
            GateKind::GlobalPhase => {
                matrix::identity(2).mapv(|v| v * Complex64::from_polar(1.0, -a[0]))
            }
            GateKind::U3 => matrix::u3(a[0], a[1], a[2]),
            GateKind::FSim => matrix::fsim(a[0], a[1]),
            GateKind::Custom { matrix: Some(m), .. } => m.clone(),
            GateKind::Custom { matrix: None, .. } => return Err(self.unsupported("matrix")),
            GateKind::Measure { .. } | GateKind::Channel(_) => {
                return Err(self.unsupported("matrix"));
            }
            kind => {
                let generator = pauli_generator(kind).ok_or_else(|| self.unsupported("matrix"))?;
                matrix::pauli_rotation(&generator, a[0])
            }
        };
        Ok(m)
    }

    /// Derivative of [`matrix`](Self::matrix) with respect to each gate
    /// parameter, in parameter order. Empty for fixed gates.
    pub fn diff_matrices(&self, values: &ParameterResolver) -> IrResult<Vec<Array2<Complex64>>> {
        let a = self.angles(values)?;
        let diffs = match &self.kind {
            GateKind::Rz => {
                let e0 = Complex64::from_polar(0.5, -a[0] / 2.0);
                let e1 = Complex64::from_polar(0.5, a[0] / 2.0);
                let mut d = Array2::zeros((2, 2));
                d[[0, 0]] = Complex64::new(0.0, -1.0) * e0;
                d[[1, 1]] = Complex64::new(0.0, 1.0) * e1;
                vec![d]
            }
            GateKind::PhaseShift => {
                let mut d = Array2::zeros((2, 2));
                d[[1, 1]] = Complex64::new(0.0, 1.0) * Complex64::from_polar(1.0, a[0]);
                vec![d]
            }
            GateKind::GlobalPhase => {
                let factor = Complex64::new(0.0, -1.0) * Complex64::from_polar(1.0, -a[0]);
                vec![matrix::identity(2).mapv(|v| v * factor)]
            }
            GateKind::U3 => matrix::u3_diff(a[0], a[1], a[2]).to_vec(),
            GateKind::FSim => matrix::fsim_diff(a[0], a[1]).to_vec(),
            GateKind::Custom { .. } | GateKind::Measure { .. } | GateKind::Channel(_) => {
                return Err(self.unsupported("derivative"));
            }
            kind => match pauli_generator(kind) {
                Some(generator) => vec![matrix::pauli_rotation_diff(&generator, a[0])],
                None => vec![],
            },
        };
        Ok(diffs)
    }

    /// The Hermitian conjugate gate.
    ///
    /// Rotations negate their parameters; measurements and channels have no
    /// inverse.
    pub fn dagger(&self) -> IrResult<Gate> {
        let neg = |p: &ParameterResolver| -p.clone();
        let (kind, params) = match &self.kind {
            GateKind::S => (GateKind::Sdg, vec![]),
            GateKind::Sdg => (GateKind::S, vec![]),
            GateKind::T => (GateKind::Tdg, vec![]),
            GateKind::Tdg => (GateKind::T, vec![]),
            GateKind::ISwap => (
                GateKind::Custom {
                    name: "ISWAPdag".into(),
                    matrix: Some(matrix::dagger(&matrix::iswap())),
                },
                vec![],
            ),
            GateKind::Custom { name, matrix: m } => (
                GateKind::Custom {
                    name: format!("{name}dag"),
                    matrix: m.as_ref().map(matrix::dagger),
                },
                vec![],
            ),
            // U3(θ, φ, λ)† = U3(-θ, -λ, -φ)
            GateKind::U3 => (
                GateKind::U3,
                vec![
                    neg(&self.params[0]),
                    neg(&self.params[2]),
                    neg(&self.params[1]),
                ],
            ),
            GateKind::Measure { .. } | GateKind::Channel(_) => {
                return Err(self.unsupported("dagger"));
            }
            kind => (kind.clone(), self.params.iter().map(neg).collect()),
        };
        Ok(Gate {
            kind,
            obj_qubits: self.obj_qubits.clone(),
            ctrl_qubits: self.ctrl_qubits.clone(),
            params,
        })
    }
}

/// Involutory generator `P` for gates of the form `exp(-iθ/2 · P)`.
fn pauli_generator(kind: &GateKind) -> Option<Array2<Complex64>> {
    use matrix::{pauli_pair, pauli_x, pauli_y, pauli_z};
    let g = match kind {
        GateKind::Rx => pauli_x(),
        GateKind::Ry => pauli_y(),
        GateKind::Rxx => pauli_pair(&pauli_x(), &pauli_x()),
        GateKind::Ryy => pauli_pair(&pauli_y(), &pauli_y()),
        GateKind::Rzz => pauli_pair(&pauli_z(), &pauli_z()),
        GateKind::Rxy => pauli_pair(&pauli_x(), &pauli_y()),
        GateKind::Rxz => pauli_pair(&pauli_x(), &pauli_z()),
        GateKind::Ryz => pauli_pair(&pauli_y(), &pauli_z()),
        _ => return None,
    };
    Some(g)
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, "({})", params.join(", "))?;
        }
        write!(f, "{:?}", self.obj_qubits)?;
        if !self.ctrl_qubits.is_empty() {
            write!(f, " <- {:?}", self.ctrl_qubits)?;
        }
        Ok(())
    }
}
