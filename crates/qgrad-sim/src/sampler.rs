//! Shot sampling.

use qgrad_ir::{Circuit, GateKind, ParameterResolver};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::error::SimResult;
use crate::state::State;

/// Measurement outcomes of repeated shots.
///
/// Key `k` of [`keys`](Samples::keys) is bit `k` of every shot and the
/// `k`-th character (from the left) of every bitstring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Samples {
    keys: Vec<String>,
    shots: Vec<Vec<u8>>,
}

impl Samples {
    /// Measurement keys in order of first appearance in the circuit.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Bit position of `key`.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// One row of bits per shot.
    pub fn shots(&self) -> &[Vec<u8>] {
        &self.shots
    }

    /// Number of shots.
    pub fn n_shots(&self) -> usize {
        self.shots.len()
    }

    /// Every shot as a fixed-width bitstring.
    pub fn bitstrings(&self) -> Vec<String> {
        self.shots
            .iter()
            .map(|bits| bits.iter().map(|b| if *b == 1 { '1' } else { '0' }).collect())
            .collect()
    }

    /// Number of shots per distinct bitstring.
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for s in self.bitstrings() {
            *counts.entry(s).or_insert(0) += 1;
        }
        counts
    }
}

fn measurement_keys(circuit: &Circuit) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for gate in circuit {
        if let GateKind::Measure { key } = &gate.kind {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

impl State {
    /// Run `circuit` `shots` times from this state and record every
    /// measurement.
    ///
    /// A master engine seeded with `seed` draws one seed per shot for that
    /// shot's copy of the state, so the same seed reproduces the same
    /// outcome sequence. This state is not modified.
    #[instrument(skip(self, circuit, pr))]
    pub fn sampling(
        &self,
        circuit: &Circuit,
        pr: &ParameterResolver,
        shots: usize,
        seed: u64,
    ) -> SimResult<Samples> {
        let keys = measurement_keys(circuit);
        let key_map: FxHashMap<&str, usize> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect();
        debug!(n_keys = keys.len(), "Starting sampling");

        let mut master = StdRng::seed_from_u64(seed);
        let mut out = Vec::with_capacity(shots);
        for shot in 0..shots {
            let mut sim = self.clone();
            sim.reseed(master.r#gen());
            let outcomes = sim.apply_circuit(circuit, pr)?;
            let mut bits = vec![0u8; keys.len()];
            for (key, bit) in &outcomes {
                if let Some(&pos) = key_map.get(key.as_str()) {
                    bits[pos] = *bit;
                }
            }
            out.push(bits);

            if shot > 0 && shot % 1000 == 0 {
                debug!("Completed {} shots", shot);
            }
        }

        Ok(Samples { keys, shots: out })
    }
}
