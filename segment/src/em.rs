//! Two-component Negative-Binomial mixture estimation.
//!
//! Pixel counts are modeled as a mixture of a low-mean background component
//! and a high-mean cell component. Parameters are fit by EM over an
//! auxiliary `(lambda, theta)` pair that linearizes the moment updates;
//! `r = -lambda / ln(theta)` recovers the NB shape and `theta` doubles as
//! the NB probability.

use log::debug;
use ndarray::{Array2, ArrayView1};
use statrs::distribution::{Discrete, NegativeBinomial};
use statrs::function::gamma::digamma;
use std::collections::BTreeMap;

/// Responsibility floor below which a pixel is assigned outright.
const RESPONSIBILITY_FLOOR: f64 = 1e-9;

/// Upper bound on `theta` before the background component is considered
/// collapsed onto its mean (the NB degenerates toward a point mass and the
/// `1/(1-theta)` and `1/ln(theta)` terms cancel catastrophically).
const THETA_CEILING: f64 = 1.0 - 1e-12;

/// Fitted parameters of the two-component mixture; index 0 is the
/// background component, index 1 the cell component.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixtureParams {
    /// Mixing weights, summing to one.
    pub w: [f64; 2],
    /// Negative-Binomial shape parameters.
    pub r: [f64; 2],
    /// Negative-Binomial probability parameters.
    pub p: [f64; 2],
}

impl MixtureParams {
    /// Component means `r * (1 - p) / p`.
    pub fn means(&self) -> [f64; 2] {
        [
            self.r[0] / self.p[0] - self.r[0],
            self.r[1] / self.p[1] - self.r[1],
        ]
    }
}

/// Mixture parameters fit globally or independently per spatial bin.
#[derive(Clone, Debug)]
pub enum MixtureFit {
    /// One parameter set for the whole array.
    Global(MixtureParams),
    /// One parameter set per nonzero bin label.
    PerBin(BTreeMap<u32, MixtureParams>),
}

fn lamtheta_to_r(lam: f64, theta: f64) -> f64 {
    -lam / theta.ln()
}

fn muvar_to_lamtheta(mu: f64, var: f64) -> (f64, f64) {
    let r = mu * mu / (var - mu);
    let theta = mu / var;
    (-r * theta.ln(), theta)
}

fn lamtheta_to_mu(lam: f64, theta: f64) -> f64 {
    let r = lamtheta_to_r(lam, theta);
    r / theta - r
}

/// `NB(r, p)` PMF at `x`; NaN when the parameters are outside the valid
/// domain, which feeds the snapshot-recovery path of the EM loop.
pub(crate) fn nb_pmf(r: f64, p: f64, x: u32) -> f64 {
    NegativeBinomial::new(r, p).map_or(f64::NAN, |nb| nb.pmf(u64::from(x)))
}

/// Fit the mixture to a 1-D sample of counts by EM.
///
/// `w`, `mu` and `var` are initial weights, means and variances of the two
/// components; component variances must exceed their means for the initial
/// moment conversion to be valid. Iteration stops when the largest absolute
/// change across the weights and auxiliary parameters drops below
/// `precision`, when `max_iter` is exhausted (not an error; the last
/// parameters are returned as-is), or when the parameters degenerate — in
/// that case the last finite snapshot is returned. Never panics or errors.
pub fn nbn_em(
    x: ArrayView1<'_, u32>,
    w: [f64; 2],
    mu: [f64; 2],
    var: [f64; 2],
    max_iter: usize,
    precision: f64,
) -> MixtureParams {
    let n = x.len();
    let mut w = w;
    let (lam0, theta0) = muvar_to_lamtheta(mu[0], var[0]);
    let (lam1, theta1) = muvar_to_lamtheta(mu[1], var[1]);
    let mut lam = [lam0, lam1];
    let mut theta = [theta0, theta1];

    let mut prev_w = w;
    let mut prev_lam = lam;
    let mut prev_theta = theta;
    let mut tau = Array2::<f64>::zeros((2, n));
    let mut nan = false;

    for iteration in 0..max_iter {
        // A theta pinned at the unit-interval boundary poisons every later
        // update; keep the last published snapshot instead.
        if theta.iter().any(|&t| !(t > 0.0 && t < THETA_CEILING)) {
            debug!("mixture collapsed at iteration {iteration}; keeping current snapshot");
            break;
        }

        // E step
        let r = [
            lamtheta_to_r(lam[0], theta[0]),
            lamtheta_to_r(lam[1], theta[1]),
        ];
        for (i, &xi) in x.iter().enumerate() {
            tau[[0, i]] = w[0] * nb_pmf(r[0], theta[0], xi);
            tau[[1, i]] = w[1] * nb_pmf(r[1], theta[1], xi);
        }
        // Pixels where both responsibilities vanish are assigned outright:
        // background when the count is under twice the background mean,
        // cell otherwise.
        let background_mu = lamtheta_to_mu(lam[0], theta[0]);
        for (i, &xi) in x.iter().enumerate() {
            if tau[[0, i]] + tau[[1, i]] <= RESPONSIBILITY_FLOOR {
                if f64::from(xi) < 2.0 * background_mu {
                    tau[[0, i]] = 1.0;
                } else {
                    tau[[1, i]] = 1.0;
                }
            }
            let total = tau[[0, i]] + tau[[1, i]];
            tau[[0, i]] /= total;
            tau[[1, i]] /= total;
        }

        // M step
        let mut tau_sum = [0.0f64; 2];
        for k in 0..2 {
            let beta = 1.0 - 1.0 / (1.0 - theta[k]) - 1.0 / theta[k].ln();
            let digamma_r = digamma(r[k]);
            let mut tau_delta = 0.0f64;
            let mut tau_residual = 0.0f64;
            for (i, &xi) in x.iter().enumerate() {
                let delta = r[k] * (digamma(r[k] + f64::from(xi)) - digamma_r);
                tau_sum[k] += tau[[k, i]];
                tau_delta += tau[[k, i]] * delta;
                tau_residual += tau[[k, i]] * (f64::from(xi) - (1.0 - beta) * delta);
            }
            lam[k] = tau_delta / tau_sum[k];
            theta[k] = beta * tau_delta / tau_residual;
        }
        let total = tau_sum[0] + tau_sum[1];
        w = [tau_sum[0] / total, tau_sum[1] / total];

        nan = w
            .iter()
            .chain(&lam)
            .chain(&theta)
            .any(|v| v.is_nan());
        if nan {
            debug!("mixture EM hit NaN at iteration {iteration}; keeping previous snapshot");
            break;
        }
        let diff = (0..2)
            .map(|k| {
                (w[k] - prev_w[k])
                    .abs()
                    .max((lam[k] - prev_lam[k]).abs())
                    .max((theta[k] - prev_theta[k]).abs())
            })
            .fold(0.0f64, f64::max);
        if diff < precision {
            debug!("mixture EM converged after {} iterations", iteration + 1);
            break;
        }
        prev_w = w;
        prev_lam = lam;
        prev_theta = theta;
    }

    let (w, lam, theta) = if nan {
        (prev_w, prev_lam, prev_theta)
    } else {
        (w, lam, theta)
    };
    // A collapsed component can leave theta at or past 1, where ln(theta)
    // zeroes out and the recovered r blows up; reporting theta at the
    // ceiling keeps r finite and the implied mean at lambda, the limit
    // value.
    let theta = [theta[0].min(THETA_CEILING), theta[1].min(THETA_CEILING)];
    MixtureParams {
        w,
        r: [
            lamtheta_to_r(lam[0], theta[0]),
            lamtheta_to_r(lam[1], theta[1]),
        ],
        p: theta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    // Overdispersed counts: ten background-like values around 2.5 and ten
    // cell-like values around 55.
    fn mixed_counts() -> ndarray::Array1<u32> {
        arr1(&[1, 1, 2, 5, 1, 1, 3, 8, 1, 2, 30, 45, 60, 80, 35, 50, 70, 90, 40, 55])
    }

    #[test]
    fn test_parameter_invariants_on_valid_mixture() {
        let x = mixed_counts();
        let params = nbn_em(
            x.view(),
            [0.5, 0.5],
            [3.0, 50.0],
            [6.0, 400.0],
            2000,
            1e-6,
        );
        assert!((params.w[0] + params.w[1] - 1.0).abs() < 1e-9);
        for k in 0..2 {
            assert!(params.r[k] > 0.0, "r[{k}] = {}", params.r[k]);
            assert!(
                params.p[k] > 0.0 && params.p[k] < 1.0,
                "p[{k}] = {}",
                params.p[k]
            );
        }
        let [background_mu, cell_mu] = params.means();
        assert!(background_mu > 1.5 && background_mu < 4.0);
        assert!(cell_mu > 45.0 && cell_mu < 65.0);
        assert!((params.w[0] - 0.5).abs() < 0.05);
    }

    #[test]
    fn test_deterministic_without_randomness() {
        let x = mixed_counts();
        let first = nbn_em(x.view(), [0.5, 0.5], [3.0, 50.0], [6.0, 400.0], 2000, 1e-6);
        let second = nbn_em(x.view(), [0.5, 0.5], [3.0, 50.0], [6.0, 400.0], 2000, 1e-6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_degenerate_background_recovers_snapshot() {
        // The background points are all ones, so its variance collapses
        // under its mean and theta runs into the boundary; the estimator
        // must hand back the last snapshot, which still separates the two
        // populations cleanly.
        let x = arr1(&[1, 1, 1, 50, 52, 49, 1, 1, 1]);
        let params = nbn_em(
            x.view(),
            [0.99, 0.01],
            [2.0, 50.0],
            [3.0, 60.0],
            2000,
            1e-6,
        );
        assert!((params.w[0] - 2.0 / 3.0).abs() < 0.01);
        assert!((params.w[1] - 1.0 / 3.0).abs() < 0.01);
        let [background_mu, cell_mu] = params.means();
        assert!((background_mu - 1.0).abs() < 0.5);
        assert!((cell_mu - 50.0).abs() < 5.0);
    }

    #[test]
    fn test_empty_sample_returns_initial_conversion() {
        let x = ndarray::Array1::<u32>::zeros(0);
        let params = nbn_em(x.view(), [0.5, 0.5], [10.0, 300.0], [20.0, 400.0], 100, 1e-6);
        // No data: the weighted sums are 0/0 on the first round and the
        // pre-loop conversion comes back.
        assert_eq!(params.w, [0.5, 0.5]);
        assert!((params.p[0] - 0.5).abs() < 1e-12);
        assert!((params.p[1] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_iterations_returns_initial_conversion() {
        let x = arr1(&[1, 2, 3]);
        let params = nbn_em(x.view(), [0.7, 0.3], [10.0, 300.0], [20.0, 400.0], 0, 1e-6);
        assert_eq!(params.w, [0.7, 0.3]);
        assert!((params.p[0] - 0.5).abs() < 1e-12);
    }
}
