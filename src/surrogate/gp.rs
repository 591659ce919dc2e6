//! Exact Gaussian-process regression.
//!
//! Targets are modelled with a constant mean (their average) plus a
//! zero-mean GP. Kernel hyperparameters are fit by maximizing the exact log
//! marginal likelihood
//!
//! `log p(y | X, θ) = -½ yᵀ K⁻¹ y - Σ log L_ii - n/2 log 2π`
//!
//! with a multi-start pattern search in log space. Cholesky failures are
//! retried with growing diagonal jitter before giving up.

use core::time::Duration;
use std::time::Instant;

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use super::kernel::{Kernel, KernelKind, KernelLayout, heuristic_lengthscales};
use super::{Prediction, RegressionModel};
use crate::error::{Error, Result};
use crate::rng_util;

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Smallest jitter of the retry ladder.
pub(crate) const MIN_JITTER: f64 = 1e-6;

/// Default number of random restarts of the hyperparameter search.
const DEFAULT_N_RESTARTS: usize = 3;
/// Default budget of likelihood evaluations per restart.
const DEFAULT_MAX_EVALS: usize = 120;

/// Factorizes `k`, adding diagonal jitter `1e-6, 1e-5, …` up to `max_jitter`
/// when the plain factorization fails.
///
/// Returns the factor and the jitter that was needed (0 if none).
///
/// # Errors
///
/// Returns [`Error::NumericalInstability`] if even `max_jitter` fails.
pub(crate) fn cholesky_with_jitter(
    k: &DMatrix<f64>,
    max_jitter: f64,
) -> Result<(Cholesky<f64, Dyn>, f64)> {
    if let Some(chol) = Cholesky::new(k.clone()) {
        return Ok((chol, 0.0));
    }
    let mut jitter = MIN_JITTER;
    loop {
        let step = jitter.min(max_jitter);
        let mut jittered = k.clone();
        for i in 0..jittered.nrows() {
            jittered[(i, i)] += step;
        }
        if let Some(chol) = Cholesky::new(jittered) {
            return Ok((chol, step));
        }
        if step >= max_jitter {
            return Err(Error::NumericalInstability { jitter: max_jitter });
        }
        jitter *= 10.0;
    }
}

/// Log marginal likelihood of centered targets `y` under covariance `k`.
pub(crate) fn log_marginal_likelihood(k: DMatrix<f64>, y: &DVector<f64>) -> Option<f64> {
    let chol = Cholesky::new(k)?;
    let alpha = chol.solve(y);
    let log_det: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    #[allow(clippy::cast_precision_loss)]
    let n = y.len() as f64;
    Some(-0.5 * y.dot(&alpha) - log_det - 0.5 * n * LN_2PI)
}

/// Maximizes `objective` over a box in log space with a multi-start
/// coordinate pattern search.
///
/// Each start moves one coordinate at a time by `±step`, halving the step
/// whenever no move improves, until the step drops below `0.02` or the
/// evaluation budget is spent. Returns the best point and its value.
pub(crate) fn maximize_log_params<F>(
    mut objective: F,
    starts: &[Vec<f64>],
    bounds: &[(f64, f64)],
    max_evals: usize,
) -> (Vec<f64>, f64)
where
    F: FnMut(&[f64]) -> f64,
{
    let mut best_theta = starts.first().cloned().unwrap_or_default();
    let mut best_value = f64::NEG_INFINITY;

    for start in starts {
        let mut theta: Vec<f64> = start
            .iter()
            .zip(bounds)
            .map(|(t, (lo, hi))| t.clamp(*lo, *hi))
            .collect();
        let mut value = objective(&theta);
        let mut evals = 1;
        let mut step = 1.0;

        while step > 0.02 && evals < max_evals {
            let mut improved = false;
            for d in 0..theta.len() {
                for dir in [1.0, -1.0] {
                    if evals >= max_evals {
                        break;
                    }
                    let (lo, hi) = bounds[d];
                    let candidate = (theta[d] + dir * step).clamp(lo, hi);
                    if (candidate - theta[d]).abs() < 1e-12 {
                        continue;
                    }
                    let old = theta[d];
                    theta[d] = candidate;
                    let v = objective(&theta);
                    evals += 1;
                    if v > value {
                        value = v;
                        improved = true;
                        break;
                    }
                    theta[d] = old;
                }
            }
            if !improved {
                step *= 0.5;
            }
        }

        if value > best_value {
            best_value = value;
            best_theta = theta;
        }
    }

    (best_theta, best_value)
}

/// Configuration for fitting a [`GpPosterior`].
#[derive(Clone, Debug)]
pub struct GpRegressor {
    kind: KernelKind,
    layout: KernelLayout,
    max_jitter: f64,
    n_restarts: usize,
    max_evals: usize,
}

impl GpRegressor {
    /// Creates a regressor for the given kernel family and column layout.
    #[must_use]
    pub fn new(kind: KernelKind, layout: KernelLayout, max_jitter: f64) -> Self {
        Self {
            kind,
            layout,
            max_jitter,
            n_restarts: DEFAULT_N_RESTARTS,
            max_evals: DEFAULT_MAX_EVALS,
        }
    }

    /// Sets the number of random restarts of the hyperparameter search.
    #[must_use]
    pub fn n_restarts(mut self, n: usize) -> Self {
        self.n_restarts = n;
        self
    }

    /// Fits hyperparameters and conditions the GP on `(x, y)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHistory`] without data,
    /// [`Error::DimensionMismatch`] for ragged inputs and
    /// [`Error::NumericalInstability`] when the final factorization fails
    /// even with `max_jitter`.
    pub fn fit(&self, x: &[Vec<f64>], y: &[f64], rng: &mut fastrand::Rng) -> Result<GpPosterior> {
        let start = Instant::now();
        check_inputs(x, y)?;

        let mut kernel = Kernel::new(self.kind, self.layout.clone());
        let mut initial = kernel.params().clone();
        initial.lengthscales = heuristic_lengthscales(x, &self.layout.numeric)
            .into_iter()
            .take(initial.lengthscales.len())
            .collect();
        kernel.set_params(initial);

        let bounds = kernel.log_bounds();
        let mut starts = vec![kernel.to_log_vector()];
        for _ in 0..self.n_restarts {
            starts.push(
                bounds
                    .iter()
                    .map(|(lo, hi)| rng_util::f64_range(rng, *lo, *hi))
                    .collect(),
            );
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let centered = DVector::from_iterator(y.len(), y.iter().map(|v| v - mean));

        let mut probe = kernel.clone();
        let (theta, _) = maximize_log_params(
            |theta| {
                probe.set_log_vector(theta);
                log_marginal_likelihood(probe.matrix(x, MIN_JITTER), &centered)
                    .unwrap_or(f64::NEG_INFINITY)
            },
            &starts,
            &bounds,
            self.max_evals,
        );
        kernel.set_log_vector(&theta);

        let mut posterior = GpPosterior::condition_kernel(kernel, x, y, self.max_jitter)?;
        posterior.fit_duration = start.elapsed();
        trace_debug!(
            n = y.len(),
            lml = posterior.log_marginal_likelihood,
            jitter = posterior.jitter,
            "regression surrogate fitted"
        );
        Ok(posterior)
    }
}

fn check_inputs(x: &[Vec<f64>], y: &[f64]) -> Result<()> {
    if x.is_empty() || y.is_empty() {
        return Err(Error::EmptyHistory);
    }
    if x.len() != y.len() {
        return Err(Error::DimensionMismatch {
            expected: x.len(),
            got: y.len(),
        });
    }
    let dim = x[0].len();
    if let Some(bad) = x.iter().find(|row| row.len() != dim) {
        return Err(Error::DimensionMismatch {
            expected: dim,
            got: bad.len(),
        });
    }
    Ok(())
}

/// A GP conditioned on training data.
#[derive(Clone, Debug)]
pub struct GpPosterior {
    kernel: Kernel,
    x_train: Vec<Vec<f64>>,
    /// Cholesky factor of `K + (σ² + jitter) I`.
    cholesky: Cholesky<f64, Dyn>,
    /// `(K + σ²I)⁻¹ (y - mean)`.
    alpha: DVector<f64>,
    mean: f64,
    jitter: f64,
    log_marginal_likelihood: f64,
    fit_duration: Duration,
}

impl GpPosterior {
    /// Conditions a GP with fixed hyperparameters on `(x, y)`.
    ///
    /// # Errors
    ///
    /// See [`GpRegressor::fit`].
    pub fn condition_kernel(
        kernel: Kernel,
        x: &[Vec<f64>],
        y: &[f64],
        max_jitter: f64,
    ) -> Result<Self> {
        check_inputs(x, y)?;
        #[allow(clippy::cast_precision_loss)]
        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let centered = DVector::from_iterator(y.len(), y.iter().map(|v| v - mean));

        let (cholesky, jitter) = cholesky_with_jitter(&kernel.matrix(x, 0.0), max_jitter)?;
        let alpha = cholesky.solve(&centered);
        let log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        #[allow(clippy::cast_precision_loss)]
        let lml = -0.5 * centered.dot(&alpha) - log_det - 0.5 * y.len() as f64 * LN_2PI;

        Ok(Self {
            kernel,
            x_train: x.to_vec(),
            cholesky,
            alpha,
            mean,
            jitter,
            log_marginal_likelihood: lml,
            fit_duration: Duration::ZERO,
        })
    }

    /// Conditions the same kernel on new data.
    ///
    /// # Errors
    ///
    /// See [`GpRegressor::fit`].
    pub fn condition(&self, x: &[Vec<f64>], y: &[f64], max_jitter: f64) -> Result<Self> {
        Self::condition_kernel(self.kernel.clone(), x, y, max_jitter)
    }

    /// The fitted kernel.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Jitter that was needed to factorize the training covariance.
    #[must_use]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Wall-clock time spent fitting.
    #[must_use]
    pub fn fit_duration(&self) -> Duration {
        self.fit_duration
    }

    /// Log marginal likelihood of the training data.
    #[must_use]
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    /// Number of training rows.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.x_train.len()
    }
}

impl RegressionModel for GpPosterior {
    fn predict(&self, x: &[f64]) -> Prediction {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            self.kernel.eval(x, &self.x_train[i])
        });
        let mean = self.mean + k_star.dot(&self.alpha);
        let v = self.cholesky.solve(&k_star);
        let variance = (self.kernel.diag() - k_star.dot(&v)).max(0.0);
        Prediction { mean, variance }
    }

    fn predict_joint(&self, xs: &[Vec<f64>]) -> Result<(Vec<f64>, DMatrix<f64>)> {
        if let Some(bad) = xs.iter().find(|row| row.len() != self.n_features()) {
            return Err(Error::DimensionMismatch {
                expected: self.n_features(),
                got: bad.len(),
            });
        }
        let k_star = self.kernel.cross(&self.x_train, xs);
        let means = (k_star.transpose() * &self.alpha)
            .iter()
            .map(|m| m + self.mean)
            .collect();
        let v = self.cholesky.solve(&k_star);
        let prior = self.kernel.cross(xs, xs);
        let mut cov = prior - k_star.transpose() * v;
        cov = (&cov + cov.transpose()) * 0.5;
        Ok((means, cov))
    }

    fn n_features(&self) -> usize {
        self.x_train.first().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..8).map(|i| vec![f64::from(i) / 7.0]).collect();
        let y = x.iter().map(|r| (6.0 * r[0]).sin()).collect();
        (x, y)
    }

    #[test]
    fn interpolates_training_points() {
        let (x, y) = line_data();
        let mut rng = fastrand::Rng::with_seed(1);
        let gp = GpRegressor::new(KernelKind::Matern52, KernelLayout::all_numeric(1), 0.1)
            .fit(&x, &y, &mut rng)
            .unwrap();
        for (xi, yi) in x.iter().zip(&y) {
            let p = gp.predict(xi);
            assert!((p.mean - yi).abs() < 0.3, "mean {} vs {}", p.mean, yi);
        }
    }

    #[test]
    fn variance_grows_away_from_data() {
        let x = vec![vec![0.0], vec![0.1]];
        let y = vec![0.0, 0.1];
        let kernel = Kernel::new(KernelKind::Matern52, KernelLayout::all_numeric(1));
        let gp = GpPosterior::condition_kernel(kernel, &x, &y, 0.1).unwrap();
        assert!(gp.predict(&[1.0]).variance > gp.predict(&[0.05]).variance);
    }

    #[test]
    fn joint_diagonal_matches_marginals() {
        let (x, y) = line_data();
        let kernel = Kernel::new(KernelKind::Matern52, KernelLayout::all_numeric(1));
        let gp = GpPosterior::condition_kernel(kernel, &x, &y, 0.1).unwrap();
        let xs = vec![vec![0.33], vec![0.9]];
        let (means, cov) = gp.predict_joint(&xs).unwrap();
        for (i, row) in xs.iter().enumerate() {
            let p = gp.predict(row);
            assert!((means[i] - p.mean).abs() < 1e-9);
            assert!((cov[(i, i)] - p.variance).abs() < 1e-9);
        }
    }

    #[test]
    fn duplicate_rows_are_rescued_by_jitter() {
        let x = vec![vec![0.5]; 4];
        let y = vec![1.0, 1.0, 1.0, 1.0];
        let mut kernel = Kernel::new(KernelKind::Matern52, KernelLayout::all_numeric(1));
        let mut params = kernel.params().clone();
        params.noise_var = 0.0;
        kernel.set_params(params);
        let gp = GpPosterior::condition_kernel(kernel, &x, &y, 0.1).unwrap();
        assert!(gp.jitter() > 0.0);
    }

    #[test]
    fn empty_data_is_rejected() {
        let mut rng = fastrand::Rng::with_seed(0);
        let err = GpRegressor::new(KernelKind::Matern52, KernelLayout::all_numeric(1), 0.1)
            .fit(&[], &[], &mut rng)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyHistory));
    }

    #[test]
    fn pattern_search_finds_quadratic_peak() {
        let (theta, value) = maximize_log_params(
            |t| -(t[0] - 0.3).powi(2) - (t[1] + 0.6).powi(2),
            &[vec![0.0, 0.0]],
            &[(-2.0, 2.0), (-2.0, 2.0)],
            500,
        );
        assert!((theta[0] - 0.3).abs() < 0.05);
        assert!((theta[1] + 0.6).abs() < 0.05);
        assert!(value > -0.01);
    }
}
