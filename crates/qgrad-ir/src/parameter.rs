//! Parameter resolvers.
//!
//! A [`ParameterResolver`] plays two roles:
//!
//! - As a **value map** it binds parameter names to numbers for one
//!   evaluation (`{"theta": 0.3, "phi": 1.2}`).
//! - As a **gate parameter** it is a first-order expression
//!   `constant + Σ coeff_k · name_k`; the gate angle is its
//!   [`combination`](ParameterResolver::combination) against a value map,
//!   and the derivative with respect to `name_k` scales by `coeff_k`.
//!
//! Names may be marked no-grad (excluded from differentiation) and encoder
//! (data-dependent, varying per batch sample) independently.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{IrError, IrResult};

/// A named-value mapping with first-order algebra.
///
/// Equality compares the constant and the name/value pairs; no-grad and
/// encoder marks are not part of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterResolver {
    constant: f64,
    data: BTreeMap<String, f64>,
    #[serde(default)]
    no_grad: BTreeSet<String>,
    #[serde(default)]
    encoder: BTreeSet<String>,
}

impl ParameterResolver {
    /// Create an empty resolver (constant zero, no names).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pure constant.
    pub fn constant(value: f64) -> Self {
        Self {
            constant: value,
            ..Self::default()
        }
    }

    /// Create the expression `1.0 · name`.
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new().with(name, 1.0)
    }

    /// Build a resolver from `(name, value)` pairs.
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, f64)>) -> Self {
        let mut pr = Self::new();
        for (name, value) in pairs {
            pr.set(name, value);
        }
        pr
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Set the value (or coefficient) of `name`, overwriting any previous one.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.data.insert(name.into(), value);
    }

    /// Set several names at once.
    pub fn set_items(&mut self, names: &[String], values: &[f64]) -> IrResult<()> {
        if names.len() != values.len() {
            return Err(IrError::DimensionMismatch {
                what: "parameter names and values".into(),
                expected: names.len(),
                got: values.len(),
            });
        }
        for (name, value) in names.iter().zip(values) {
            self.data.insert(name.clone(), *value);
        }
        Ok(())
    }

    /// Value (or coefficient) bound to `name`.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.data.get(name).copied()
    }

    /// Whether `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// The constant term.
    pub fn const_value(&self) -> f64 {
        self.constant
    }

    /// Replace the constant term.
    pub fn set_const(&mut self, value: f64) {
        self.constant = value;
    }

    /// True if the resolver has no named parameters.
    pub fn is_const(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of named parameters.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if there are no named parameters.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Named parameters in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.data.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Parameter names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    // =========================================================================
    // Gradient and role marking
    // =========================================================================

    /// Mark every current name as excluded from differentiation.
    #[must_use]
    pub fn no_grad(mut self) -> Self {
        self.no_grad = self.data.keys().cloned().collect();
        self
    }

    /// Mark the given names as excluded from differentiation.
    #[must_use]
    pub fn no_grad_part<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            self.no_grad.insert(name.as_ref().to_string());
        }
        self
    }

    /// Clear every no-grad mark.
    #[must_use]
    pub fn requires_grad(mut self) -> Self {
        self.no_grad.clear();
        self
    }

    /// Re-enable differentiation for the given names.
    #[must_use]
    pub fn requires_grad_part<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            self.no_grad.remove(name.as_ref());
        }
        self
    }

    /// Whether `name` is present and not marked no-grad.
    pub fn is_requires_grad(&self, name: &str) -> bool {
        self.data.contains_key(name) && !self.no_grad.contains(name)
    }

    /// The differentiable names, in ascending order.
    ///
    /// The position of a name in this list is its index within the
    /// resolver's differentiable set.
    pub fn requires_grad_parameters(&self) -> Vec<&str> {
        self.names().filter(|n| !self.no_grad.contains(*n)).collect()
    }

    /// Position of `name` within [`requires_grad_parameters`](Self::requires_grad_parameters).
    pub fn grad_index(&self, name: &str) -> Option<usize> {
        if !self.is_requires_grad(name) {
            return None;
        }
        self.names()
            .filter(|n| !self.no_grad.contains(*n))
            .position(|n| n == name)
    }

    /// Mark every current name as an encoder parameter.
    #[must_use]
    pub fn as_encoder(mut self) -> Self {
        self.encoder = self.data.keys().cloned().collect();
        self
    }

    /// Mark every current name as an ansatz parameter.
    #[must_use]
    pub fn as_ansatz(mut self) -> Self {
        self.encoder.clear();
        self
    }

    /// Mark the given names as encoder parameters.
    #[must_use]
    pub fn encoder_part<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            self.encoder.insert(name.as_ref().to_string());
        }
        self
    }

    /// Whether `name` is an encoder parameter.
    pub fn is_encoder(&self, name: &str) -> bool {
        self.encoder.contains(name)
    }

    /// Encoder names, in ascending order.
    pub fn encoder_parameters(&self) -> Vec<&str> {
        self.names().filter(|n| self.encoder.contains(*n)).collect()
    }

    /// Ansatz (non-encoder) names, in ascending order.
    pub fn ansatz_parameters(&self) -> Vec<&str> {
        self.names().filter(|n| !self.encoder.contains(*n)).collect()
    }

    // =========================================================================
    // Evaluation
    // =========================================================================

    /// Evaluate `constant + Σ coeff_k · values[name_k]`.
    pub fn combination(&self, values: &ParameterResolver) -> IrResult<f64> {
        let mut out = self.constant;
        for (name, coeff) in &self.data {
            let value = values
                .get(name)
                .ok_or_else(|| IrError::UnboundParameter(name.clone()))?;
            out += coeff * value;
        }
        Ok(out)
    }

    /// Multiply by another resolver; one side must be constant.
    pub fn checked_mul(&self, other: &ParameterResolver) -> IrResult<Self> {
        if other.is_const() {
            Ok(self.clone() * other.constant)
        } else if self.is_const() {
            Ok(other.clone() * self.constant)
        } else {
            Err(IrError::NonLinear(format!("({self}) * ({other})")))
        }
    }

    /// Divide by another resolver; the divisor must be constant.
    pub fn checked_div(&self, other: &ParameterResolver) -> IrResult<Self> {
        if other.is_const() {
            Ok(self.clone() / other.constant)
        } else {
            Err(IrError::NonLinear(format!("({self}) / ({other})")))
        }
    }

    fn merge_roles(&mut self, other: &ParameterResolver) {
        self.no_grad.extend(other.no_grad.iter().cloned());
        self.encoder.extend(other.encoder.iter().cloned());
    }
}

impl PartialEq for ParameterResolver {
    fn eq(&self, other: &Self) -> bool {
        self.constant == other.constant && self.data == other.data
    }
}

impl fmt::Display for ParameterResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, coeff) in &self.data {
            if !first {
                write!(f, " + ")?;
            }
            write!(f, "{coeff}*{name}")?;
            first = false;
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant != 0.0 {
            write!(f, " + {}", self.constant)
        } else {
            Ok(())
        }
    }
}

impl From<f64> for ParameterResolver {
    fn from(value: f64) -> Self {
        ParameterResolver::constant(value)
    }
}

impl From<&str> for ParameterResolver {
    fn from(name: &str) -> Self {
        ParameterResolver::symbol(name)
    }
}

impl std::ops::Add for ParameterResolver {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self.constant += rhs.constant;
        for (name, value) in &rhs.data {
            let entry = self.data.entry(name.clone()).or_insert(0.0);
            let cancelled = *value != 0.0 && *entry == -value;
            *entry += value;
            // Cancelled terms no longer depend on the name.
            if cancelled {
                self.data.remove(name);
            }
        }
        self.merge_roles(&rhs);
        self
    }
}

impl std::ops::Sub for ParameterResolver {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl std::ops::Neg for ParameterResolver {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

impl std::ops::Add<f64> for ParameterResolver {
    type Output = Self;

    fn add(mut self, rhs: f64) -> Self::Output {
        self.constant += rhs;
        self
    }
}

impl std::ops::Sub<f64> for ParameterResolver {
    type Output = Self;

    fn sub(mut self, rhs: f64) -> Self::Output {
        self.constant -= rhs;
        self
    }
}

impl std::ops::Mul<f64> for ParameterResolver {
    type Output = Self;

    fn mul(mut self, rhs: f64) -> Self::Output {
        self.constant *= rhs;
        if rhs == 0.0 {
            self.data.clear();
        }
        for value in self.data.values_mut() {
            *value *= rhs;
        }
        self
    }
}

impl std::ops::Div<f64> for ParameterResolver {
    type Output = Self;

    fn div(mut self, rhs: f64) -> Self::Output {
        self.constant /= rhs;
        for value in self.data.values_mut() {
            *value /= rhs;
        }
        self
    }
}
