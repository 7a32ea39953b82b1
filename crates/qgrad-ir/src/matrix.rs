//! Dense matrices for gates and their parameter derivatives.
//!
//! Matrices act on the gate's object qubits in little-endian order: object
//! qubit `k` is bit `k` of the row/column index, so a two-qubit matrix
//! `A ⊗ B` written with [`kron`] puts `B` on the first object qubit.

use ndarray::{Array2, array};
use num_complex::Complex64;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);
const I: Complex64 = Complex64::new(0.0, 1.0);

/// Kronecker product `a ⊗ b` (`a` on the high bits).
pub fn kron(a: &Array2<Complex64>, b: &Array2<Complex64>) -> Array2<Complex64> {
    let (ar, ac) = a.dim();
    let (br, bc) = b.dim();
    Array2::from_shape_fn((ar * br, ac * bc), |(r, c)| {
        a[[r / br, c / bc]] * b[[r % br, c % bc]]
    })
}

/// Conjugate transpose.
pub fn dagger(m: &Array2<Complex64>) -> Array2<Complex64> {
    m.t().mapv(|v| v.conj())
}

/// True if `m` is unitary within `tol`.
pub fn is_unitary(m: &Array2<Complex64>, tol: f64) -> bool {
    let (rows, cols) = m.dim();
    if rows != cols {
        return false;
    }
    let product = dagger(m).dot(m);
    product
        .indexed_iter()
        .all(|((r, c), v)| (v - if r == c { ONE } else { ZERO }).norm() < tol)
}

/// Identity of dimension `dim`.
pub fn identity(dim: usize) -> Array2<Complex64> {
    Array2::from_shape_fn((dim, dim), |(r, c)| if r == c { ONE } else { ZERO })
}

/// Pauli-X.
pub fn pauli_x() -> Array2<Complex64> {
    array![[ZERO, ONE], [ONE, ZERO]]
}

/// Pauli-Y.
pub fn pauli_y() -> Array2<Complex64> {
    array![[ZERO, -I], [I, ZERO]]
}

/// Pauli-Z.
pub fn pauli_z() -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, -ONE]]
}

/// Hadamard.
pub fn hadamard() -> Array2<Complex64> {
    let h = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
    array![[h, h], [h, -h]]
}

/// `diag(1, e^{iθ})`.
pub fn phase(theta: f64) -> Array2<Complex64> {
    array![[ONE, ZERO], [ZERO, Complex64::from_polar(1.0, theta)]]
}

/// SWAP.
pub fn swap() -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ZERO, ONE, ZERO],
        [ZERO, ONE, ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE],
    ]
}

/// iSWAP.
pub fn iswap() -> Array2<Complex64> {
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, ZERO, I, ZERO],
        [ZERO, I, ZERO, ZERO],
        [ZERO, ZERO, ZERO, ONE],
    ]
}

/// Two-qubit Pauli product with `first` on object qubit 0.
pub fn pauli_pair(first: &Array2<Complex64>, second: &Array2<Complex64>) -> Array2<Complex64> {
    kron(second, first)
}

/// `exp(-iθ/2 · P)` for an involutory `P` (`P² = I`).
pub fn pauli_rotation(generator: &Array2<Complex64>, theta: f64) -> Array2<Complex64> {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    identity(generator.nrows()).mapv(|v| v * c) + generator.mapv(|v| v * (-I * s))
}

/// `d/dθ exp(-iθ/2 · P)` for an involutory `P`.
pub fn pauli_rotation_diff(generator: &Array2<Complex64>, theta: f64) -> Array2<Complex64> {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    identity(generator.nrows()).mapv(|v| v * (-s / 2.0)) + generator.mapv(|v| v * (-I * c / 2.0))
}

/// RZ(θ) = diag(e^{-iθ/2}, e^{iθ/2}).
pub fn rz(theta: f64) -> Array2<Complex64> {
    array![
        [Complex64::from_polar(1.0, -theta / 2.0), ZERO],
        [ZERO, Complex64::from_polar(1.0, theta / 2.0)],
    ]
}

/// U3(θ, φ, λ).
pub fn u3(theta: f64, phi: f64, lambda: f64) -> Array2<Complex64> {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    array![
        [Complex64::new(c, 0.0), -Complex64::from_polar(s, lambda)],
        [
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda)
        ],
    ]
}

/// Derivatives of U3 with respect to θ, φ and λ.
pub fn u3_diff(theta: f64, phi: f64, lambda: f64) -> [Array2<Complex64>; 3] {
    let (c, s) = ((theta / 2.0).cos(), (theta / 2.0).sin());
    let d_theta = array![
        [
            Complex64::new(-s / 2.0, 0.0),
            -Complex64::from_polar(c / 2.0, lambda)
        ],
        [
            Complex64::from_polar(c / 2.0, phi),
            -Complex64::from_polar(s / 2.0, phi + lambda)
        ],
    ];
    let d_phi = array![
        [ZERO, ZERO],
        [
            I * Complex64::from_polar(s, phi),
            I * Complex64::from_polar(c, phi + lambda)
        ],
    ];
    let d_lambda = array![
        [ZERO, -I * Complex64::from_polar(s, lambda)],
        [ZERO, I * Complex64::from_polar(c, phi + lambda)],
    ];
    [d_theta, d_phi, d_lambda]
}

/// FSim(θ, φ).
pub fn fsim(theta: f64, phi: f64) -> Array2<Complex64> {
    let (c, s) = (theta.cos(), theta.sin());
    let a = Complex64::new(c, 0.0);
    let b = Complex64::new(0.0, -s);
    array![
        [ONE, ZERO, ZERO, ZERO],
        [ZERO, a, b, ZERO],
        [ZERO, b, a, ZERO],
        [ZERO, ZERO, ZERO, Complex64::from_polar(1.0, -phi)],
    ]
}

/// Derivatives of FSim with respect to θ and φ.
pub fn fsim_diff(theta: f64, phi: f64) -> [Array2<Complex64>; 2] {
    let (c, s) = (theta.cos(), theta.sin());
    let a = Complex64::new(-s, 0.0);
    let b = Complex64::new(0.0, -c);
    let d_theta = array![
        [ZERO, ZERO, ZERO, ZERO],
        [ZERO, a, b, ZERO],
        [ZERO, b, a, ZERO],
        [ZERO, ZERO, ZERO, ZERO],
    ];
    let mut d_phi = Array2::zeros((4, 4));
    d_phi[[3, 3]] = -I * Complex64::from_polar(1.0, -phi);
    [d_theta, d_phi]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn close(a: &Array2<Complex64>, b: &Array2<Complex64>) -> bool {
        a.dim() == b.dim() && a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < 1e-10)
    }

    fn numeric_diff(f: impl Fn(f64) -> Array2<Complex64>, x: f64) -> Array2<Complex64> {
        let h = 1e-6;
        (f(x + h) - f(x - h)).mapv(|v| v / (2.0 * h))
    }

    fn close_loose(a: &Array2<Complex64>, b: &Array2<Complex64>) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < 1e-6)
    }

    #[test]
    fn test_standard_matrices_are_unitary() {
        for m in [
            pauli_x(),
            pauli_y(),
            pauli_z(),
            hadamard(),
            phase(0.3),
            swap(),
            iswap(),
            rz(1.1),
            u3(0.4, 1.2, -0.7),
            fsim(0.9, 0.2),
            pauli_rotation(&pauli_pair(&pauli_x(), &pauli_y()), 0.8),
        ] {
            assert!(is_unitary(&m, 1e-12));
        }
    }

    #[test]
    fn test_rx_from_pauli_rotation() {
        let rx = pauli_rotation(&pauli_x(), PI);
        // RX(π) = -iX
        assert!(close(&rx, &pauli_x().mapv(|v| v * -I)));
    }

    #[test]
    fn test_kron_places_first_factor_high() {
        // Z on object qubit 1, identity on object qubit 0.
        let m = pauli_pair(&identity(2), &pauli_z());
        assert_eq!(m[[2, 2]], -ONE);
        assert_eq!(m[[1, 1]], ONE);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let p = pauli_pair(&pauli_z(), &pauli_x());
        assert!(close_loose(
            &pauli_rotation_diff(&p, 0.7),
            &numeric_diff(|t| pauli_rotation(&p, t), 0.7)
        ));

        let [dt, dp, dl] = u3_diff(0.4, 1.2, -0.7);
        assert!(close_loose(&dt, &numeric_diff(|t| u3(t, 1.2, -0.7), 0.4)));
        assert!(close_loose(&dp, &numeric_diff(|t| u3(0.4, t, -0.7), 1.2)));
        assert!(close_loose(&dl, &numeric_diff(|t| u3(0.4, 1.2, t), -0.7)));

        let [ft, fp] = fsim_diff(0.9, 0.2);
        assert!(close_loose(&ft, &numeric_diff(|t| fsim(t, 0.2), 0.9)));
        assert!(close_loose(&fp, &numeric_diff(|t| fsim(0.9, t), 0.2)));
    }
}
