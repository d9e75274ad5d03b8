//! Posterior scoring of pixels against fitted mixture parameters.

use crate::em::{nb_pmf, MixtureFit, MixtureParams};
use crate::error::SegmentError;
use ndarray::{Array2, ArrayView2};

fn check_bins<'a>(
    x: ArrayView2<'_, u32>,
    bins: Option<ArrayView2<'a, u32>>,
) -> Result<ArrayView2<'a, u32>, SegmentError> {
    let bins = bins.ok_or(SegmentError::BinsRequired)?;
    if bins.dim() != x.dim() {
        return Err(SegmentError::ShapeMismatch {
            expected: x.dim(),
            actual: bins.dim(),
        });
    }
    Ok(bins)
}

/// Conditional likelihoods of every pixel's count under the background and
/// cell components, in that order.
///
/// A per-bin fit requires the bin array it was fit with; pixels whose bin
/// has no fitted parameters (label 0 included) score zero under both
/// components.
pub fn conditionals(
    x: ArrayView2<'_, u32>,
    fit: &MixtureFit,
    bins: Option<ArrayView2<'_, u32>>,
) -> Result<(Array2<f64>, Array2<f64>), SegmentError> {
    match fit {
        MixtureFit::Global(params) => Ok((
            x.mapv(|v| nb_pmf(params.r[0], params.p[0], v)),
            x.mapv(|v| nb_pmf(params.r[1], params.p[1], v)),
        )),
        MixtureFit::PerBin(fits) => {
            let bins = check_bins(x, bins)?;
            let mut background = Array2::zeros(x.dim());
            let mut cell = Array2::zeros(x.dim());
            for (index, &label) in bins.indexed_iter() {
                if let Some(params) = fits.get(&label) {
                    background[index] = nb_pmf(params.r[0], params.p[0], x[index]);
                    cell[index] = nb_pmf(params.r[1], params.p[1], x[index]);
                }
            }
            Ok((background, cell))
        }
    }
}

/// Posterior weight of the cell component for one pixel; zero when both
/// weighted likelihoods vanish (or degenerate to NaN), keeping the output
/// inside `[0, 1]`.
fn posterior(params: &MixtureParams, background: f64, cell: f64) -> f64 {
    let tau0 = params.w[0] * background;
    let tau1 = params.w[1] * cell;
    let total = tau0 + tau1;
    if total > 0.0 {
        tau1 / total
    } else {
        0.0
    }
}

/// Per-pixel confidence that the observed count came from a cell, in
/// `[0, 1]`.
pub fn confidence(
    x: ArrayView2<'_, u32>,
    fit: &MixtureFit,
    bins: Option<ArrayView2<'_, u32>>,
) -> Result<Array2<f64>, SegmentError> {
    let (background, cell) = conditionals(x, fit, bins)?;
    match fit {
        MixtureFit::Global(params) => {
            let mut scores = Array2::zeros(x.dim());
            for (index, score) in scores.indexed_iter_mut() {
                *score = posterior(params, background[index], cell[index]);
            }
            Ok(scores)
        }
        MixtureFit::PerBin(fits) => {
            let bins = check_bins(x, bins)?;
            let mut scores = Array2::zeros(x.dim());
            for (index, score) in scores.indexed_iter_mut() {
                if let Some(params) = fits.get(&bins[index]) {
                    *score = posterior(params, background[index], cell[index]);
                }
            }
            Ok(scores)
        }
    }
}
