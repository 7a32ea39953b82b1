//! Batch scheduling over (sample × Hamiltonian).
//!
//! The sample axis is split into contiguous chunks on a pool of
//! `batch_threads` workers; inside each sample the Hamiltonian axis is split
//! the same way on a shared pool of `mea_threads` workers. Every unit clones
//! its own state, so workers share only read-only inputs, and results are
//! collected by index so their order never depends on scheduling.

use qgrad_ir::{Hamiltonian, ParameterResolver};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use crate::error::{SimError, SimResult};
use crate::gradient::{CircuitPair, ExpectationWithGrad, LeftSide, ParameterMap};
use crate::state::State;

/// Thread budgets for the two batch axes.
///
/// Both are advisory upper bounds: at run time each is clamped to
/// `[1, axis length]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Workers over samples.
    pub batch_threads: usize,
    /// Workers over Hamiltonians within one sample.
    pub mea_threads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_threads: 1,
            mea_threads: 1,
        }
    }
}

impl BatchConfig {
    /// Create a configuration.
    pub fn new(batch_threads: usize, mea_threads: usize) -> Self {
        Self {
            batch_threads,
            mea_threads,
        }
    }
}

/// Clamp a requested thread count to `[1, axis_len]`.
pub fn clamp_threads(requested: usize, axis_len: usize) -> usize {
    requested.clamp(1, axis_len.max(1))
}

pub(crate) fn build_pool(threads: usize) -> SimResult<ThreadPool> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("qgrad-worker-{i}"))
        .build()?)
}

/// Map `f` over `items`, in contiguous chunks on `pool` when given.
///
/// Every item is evaluated; the first error in item order is returned.
pub(crate) fn map_chunked<I, T, F>(items: &[I], pool: Option<&ThreadPool>, f: F) -> SimResult<Vec<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> SimResult<T> + Sync,
{
    let results: Vec<SimResult<T>> = match pool {
        None => items.iter().map(&f).collect(),
        Some(pool) => {
            let chunk = items.len().div_ceil(pool.current_num_threads()).max(1);
            pool.install(|| {
                items
                    .par_chunks(chunk)
                    .map(|c| c.iter().map(&f).collect::<Vec<_>>())
                    .collect::<Vec<_>>()
            })
            .into_iter()
            .flatten()
            .collect()
        }
    };
    results.into_iter().collect()
}

/// Encoder data (one row per sample) and shared ansatz values.
///
/// Gradient slots are assigned encoder names first, then ansatz names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchInput {
    encoder_names: Vec<String>,
    encoder_data: Vec<Vec<f64>>,
    ansatz_names: Vec<String>,
    ansatz_data: Vec<f64>,
}

impl BatchInput {
    /// Create a batch; every encoder row must match `encoder_names` and
    /// names must be distinct across both roles.
    pub fn new(
        encoder_names: Vec<String>,
        encoder_data: Vec<Vec<f64>>,
        ansatz_names: Vec<String>,
        ansatz_data: Vec<f64>,
    ) -> SimResult<Self> {
        if let Some(row) = encoder_data.iter().find(|r| r.len() != encoder_names.len()) {
            return Err(SimError::DimensionMismatch {
                what: "encoder values per sample".into(),
                expected: encoder_names.len(),
                got: row.len(),
            });
        }
        if ansatz_data.len() != ansatz_names.len() {
            return Err(SimError::DimensionMismatch {
                what: "ansatz values".into(),
                expected: ansatz_names.len(),
                got: ansatz_data.len(),
            });
        }
        let distinct: BTreeSet<&String> = encoder_names.iter().chain(&ansatz_names).collect();
        if distinct.len() != encoder_names.len() + ansatz_names.len() {
            return Err(SimError::DimensionMismatch {
                what: "distinct parameter names".into(),
                expected: encoder_names.len() + ansatz_names.len(),
                got: distinct.len(),
            });
        }
        Ok(Self {
            encoder_names,
            encoder_data,
            ansatz_names,
            ansatz_data,
        })
    }

    /// A single sample with ansatz parameters only.
    pub fn ansatz_only(ansatz_names: Vec<String>, ansatz_data: Vec<f64>) -> SimResult<Self> {
        Self::new(vec![], vec![vec![]], ansatz_names, ansatz_data)
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.encoder_data.len()
    }

    /// Slots: encoder names `0..ne`, ansatz names `ne..ne + na`.
    pub fn parameter_map(&self) -> ParameterMap {
        self.encoder_names
            .iter()
            .chain(&self.ansatz_names)
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect()
    }

    /// Value resolver for one sample, encoder names marked as such.
    pub fn resolver(&self, sample: usize) -> SimResult<ParameterResolver> {
        let row = self
            .encoder_data
            .get(sample)
            .ok_or_else(|| SimError::DimensionMismatch {
                what: "sample index".into(),
                expected: self.n_samples(),
                got: sample,
            })?;
        let mut pr = ParameterResolver::new();
        pr.set_items(&self.encoder_names, row)?;
        let mut pr = pr.as_encoder();
        pr.set_items(&self.ansatz_names, &self.ansatz_data)?;
        Ok(pr)
    }
}

struct Pools {
    batch: Option<ThreadPool>,
    mea: Option<ThreadPool>,
}

fn pools(config: BatchConfig, n_samples: usize, n_hams: usize) -> SimResult<Pools> {
    let batch_threads = clamp_threads(config.batch_threads, n_samples);
    let mea_threads = clamp_threads(config.mea_threads, n_hams);
    debug!(batch_threads, mea_threads, "Creating batch pools");
    let optional = |threads: usize| -> SimResult<Option<ThreadPool>> {
        if threads > 1 {
            build_pool(threads).map(Some)
        } else {
            Ok(None)
        }
    };
    Ok(Pools {
        batch: optional(batch_threads)?,
        mea: optional(mea_threads)?,
    })
}

impl State {
    /// Expectations and gradients for every (sample, Hamiltonian) pair.
    ///
    /// `result[s][h]` belongs to sample `s` and Hamiltonian `h`; gradients
    /// follow [`BatchInput::parameter_map`].
    #[instrument(skip_all, fields(n_samples = input.n_samples(), n_hams = hams.len()))]
    pub fn multi_multi(
        &self,
        hams: &[Hamiltonian],
        pair: CircuitPair<'_>,
        input: &BatchInput,
        config: BatchConfig,
    ) -> SimResult<Vec<Vec<ExpectationWithGrad>>> {
        let pools = pools(config, input.n_samples(), hams.len())?;
        let p_map = input.parameter_map();
        let samples: Vec<usize> = (0..input.n_samples()).collect();
        map_chunked(&samples, pools.batch.as_ref(), |&s| {
            let pr = input.resolver(s)?;
            self.one_multi_in(hams, pair, &pr, &p_map, pools.mea.as_ref())
        })
    }

    /// Batch form of
    /// [`non_hermitian_one_multi`](State::non_hermitian_one_multi).
    #[instrument(skip_all, fields(n_samples = input.n_samples(), n_hams = hams.len()))]
    pub fn non_hermitian_multi_multi(
        &self,
        left: LeftSide<'_>,
        hams: &[Hamiltonian],
        right: CircuitPair<'_>,
        input: &BatchInput,
        config: BatchConfig,
    ) -> SimResult<Vec<Vec<ExpectationWithGrad>>> {
        let pools = pools(config, input.n_samples(), hams.len())?;
        let p_map = input.parameter_map();
        let samples: Vec<usize> = (0..input.n_samples()).collect();
        map_chunked(&samples, pools.batch.as_ref(), |&s| {
            let pr = input.resolver(s)?;
            self.non_hermitian_in(left, hams, right, &pr, &p_map, pools.mea.as_ref())
        })
    }
}
