//! Sample selection and per-bin driving of the mixture estimator.
//!
//! Training pools are drawn from the strictly-positive pixels of a count
//! array — optionally restricted to local intensity peaks, optionally
//! partitioned by a bin-label array — then downsampled and handed to
//! [`nbn_em`](crate::em::nbn_em).

use crate::em::{nbn_em, MixtureFit};
use crate::error::SegmentError;
use log::debug;
use ndarray::{Array1, ArrayView2};
use rand::rngs::SmallRng;
use rand::seq::index;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};

/// Downsampling budget for the EM training pools.
#[derive(Clone, Copy, Debug)]
pub enum Downsample {
    /// Absolute sample cap, split across pools by their share of the total.
    Count(usize),
    /// Keep this fraction of every pool.
    Fraction(f64),
}

/// Configuration for [`fit_mixture`].
#[derive(Clone, Debug)]
pub struct EmConfig {
    /// Restrict training samples to local intensity peaks.
    pub use_peaks: bool,
    /// Minimum separation between peaks, in pixels.
    pub min_distance: usize,
    /// Downsampling budget applied to every sample pool.
    pub downsample: Downsample,
    /// Initial component weights.
    pub w: [f64; 2],
    /// Initial component means.
    pub mu: [f64; 2],
    /// Initial component variances.
    pub var: [f64; 2],
    /// EM iteration cap.
    pub max_iter: usize,
    /// EM convergence threshold.
    pub precision: f64,
    /// Seed for the sampling RNG; `None` draws one from the OS. Fixing the
    /// seed makes the whole fit reproducible.
    pub seed: Option<u64>,
}

impl Default for EmConfig {
    fn default() -> Self {
        EmConfig {
            use_peaks: false,
            min_distance: 21,
            downsample: Downsample::Count(1_000_000),
            w: [0.5, 0.5],
            mu: [10.0, 300.0],
            var: [20.0, 400.0],
            max_iter: 2000,
            precision: 1e-6,
            seed: None,
        }
    }
}

/// Build training pools from `x` and fit mixture parameters: one set per
/// nonzero bin label when `bins` is given, otherwise a single global set.
///
/// Pool values are strictly positive by construction (zero-count pixels
/// are excluded up front) and the log-weighted downsampling relies on
/// that. Bins are visited in ascending label order with a single RNG
/// threaded through, so a fixed seed reproduces the fit exactly.
pub fn fit_mixture(
    x: ArrayView2<'_, u32>,
    bins: Option<ArrayView2<'_, u32>>,
    config: &EmConfig,
) -> Result<MixtureFit, SegmentError> {
    if let Some(bins) = bins {
        if bins.dim() != x.dim() {
            return Err(SegmentError::ShapeMismatch {
                expected: x.dim(),
                actual: bins.dim(),
            });
        }
    }

    let mut pools: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    if config.use_peaks {
        let intensity = x.mapv(f64::from);
        let peaks = morphology::peak_local_max(intensity.view(), config.min_distance, bins);
        let peak_labels = morphology::connected_components(peaks.view());
        // One representative sample per connected run of peaks, taken at
        // the first pixel of the run in row-major order.
        let mut seen = HashSet::new();
        for ((r, c), &peak) in peak_labels.indexed_iter() {
            if peak > 0 && seen.insert(peak) {
                let key = bins.map_or(0, |b| b[[r, c]]);
                pools.entry(key).or_default().push(x[[r, c]]);
            }
        }
    } else if let Some(bins) = bins {
        for ((r, c), &label) in bins.indexed_iter() {
            if label > 0 {
                let pool = pools.entry(label).or_default();
                let value = x[[r, c]];
                if value > 0 {
                    pool.push(value);
                }
            }
        }
    } else {
        pools.insert(0, x.iter().copied().filter(|&v| v > 0).collect());
    }

    let mut rng = match config.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };
    let total: usize = pools.values().map(Vec::len).sum();
    let mut fits = BTreeMap::new();
    for (label, pool) in pools {
        let target = match config.downsample {
            Downsample::Fraction(fraction) => (pool.len() as f64 * fraction) as usize,
            Downsample::Count(cap) => (cap as f64 * (pool.len() as f64 / total as f64)) as usize,
        };
        let pool = if pool.len() > target {
            debug!(
                "downsampling pool {label} from {} to {target} samples",
                pool.len()
            );
            let picked =
                index::sample_weighted(&mut rng, pool.len(), |i| f64::from(pool[i]).ln(), target)
                    .unwrap_or_else(|_| index::sample(&mut rng, pool.len(), target));
            picked.into_iter().map(|i| pool[i]).collect()
        } else {
            pool
        };
        let sample = Array1::from_vec(pool);
        fits.insert(
            label,
            nbn_em(
                sample.view(),
                config.w,
                config.mu,
                config.var,
                config.max_iter,
                config.precision,
            ),
        );
    }

    if bins.is_some() {
        Ok(MixtureFit::PerBin(fits))
    } else {
        let (_, params) = fits.pop_first().expect("the global pool always exists");
        Ok(MixtureFit::Global(params))
    }
}
