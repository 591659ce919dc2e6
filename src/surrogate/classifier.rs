//! Gaussian-process feasibility classifier.
//!
//! Binary GP classification with a probit likelihood and a Laplace
//! approximation of the latent posterior (Rasmussen & Williams, algorithms
//! 3.1 and 3.2). Labels are `1.0` for infeasible and `0.0` for feasible
//! observations; the classifier predicts the probability of infeasibility.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

use super::kernel::{Kernel, KernelKind, KernelLayout, KernelParams, heuristic_lengthscales};
use crate::error::{Error, Result};
use crate::normal::{norm_cdf, norm_pdf};

/// Prior latent variance; larger values allow more confident predictions.
const SIGNAL_VAR: f64 = 2.0;
/// Jitter on the latent prior covariance.
const LATENT_JITTER: f64 = 1e-6;

/// `φ(z) / Φ(z)`, with an asymptotic expansion far in the lower tail.
fn inverse_mills(z: f64) -> f64 {
    if z < -5.0 {
        let z2 = z * z;
        -z / (1.0 - 1.0 / z2 + 3.0 / (z2 * z2))
    } else {
        norm_pdf(z) / norm_cdf(z).max(f64::MIN_POSITIVE)
    }
}

/// Builder for a [`ClassifierPosterior`].
#[derive(Clone, Debug)]
pub struct GpClassifier {
    max_iters: usize,
    max_jitter: f64,
}

impl GpClassifier {
    /// Creates a classifier running at most `max_iters` Newton steps.
    #[must_use]
    pub fn new(max_iters: usize, max_jitter: f64) -> Self {
        Self {
            max_iters: max_iters.max(1),
            max_jitter,
        }
    }

    /// Finds the Laplace mode of the latent function for labels `t`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyHistory`] without data,
    /// [`Error::DimensionMismatch`] when `x` and `t` differ in length and
    /// [`Error::NumericalInstability`] if a Newton system cannot be factorized.
    pub fn fit(&self, x: &[Vec<f64>], t: &[f64]) -> Result<ClassifierPosterior> {
        if x.is_empty() {
            return Err(Error::EmptyHistory);
        }
        if x.len() != t.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len(),
                got: t.len(),
            });
        }
        let dim = x[0].len();
        let layout = KernelLayout::all_numeric(dim);
        let mut kernel = Kernel::new(KernelKind::Matern52, layout);
        kernel.set_params(KernelParams {
            lengthscales: heuristic_lengthscales(x, &kernel.layout().numeric)
                .into_iter()
                .map(|l| l.max(0.1))
                .collect(),
            cat_lengthscales: Vec::new(),
            signal_var: SIGNAL_VAR,
            noise_var: LATENT_JITTER,
        });

        let n = x.len();
        let k = kernel.matrix(x, 0.0);
        let y = DVector::from_iterator(n, t.iter().map(|&ti| if ti > 0.5 { 1.0 } else { -1.0 }));

        let mut f = DVector::<f64>::zeros(n);
        let mut state = NewtonState::at(&f, &y, &k, self.max_jitter)?;
        for _ in 0..self.max_iters {
            let b = state.w.component_mul(&f) + &state.grad;
            let kb = &k * &b;
            let inner = state.chol.solve(&state.sqrt_w.component_mul(&kb));
            let a = b - state.sqrt_w.component_mul(&inner);
            let f_new = &k * a;
            let delta = (&f_new - &f).amax();
            f = f_new;
            state = NewtonState::at(&f, &y, &k, self.max_jitter)?;
            if delta < 1e-6 {
                trace_debug!(n = n, "feasibility classifier converged");
                break;
            }
        }

        Ok(ClassifierPosterior {
            kernel,
            x_train: x.to_vec(),
            grad: state.grad,
            sqrt_w: state.sqrt_w,
            chol: state.chol,
        })
    }
}

/// Quantities of one Newton step at latent values `f`.
struct NewtonState {
    grad: DVector<f64>,
    w: DVector<f64>,
    sqrt_w: DVector<f64>,
    /// Cholesky factor of `B = I + W^½ K W^½`.
    chol: Cholesky<f64, Dyn>,
}

impl NewtonState {
    fn at(f: &DVector<f64>, y: &DVector<f64>, k: &DMatrix<f64>, max_jitter: f64) -> Result<Self> {
        let n = f.len();
        let mut grad = DVector::zeros(n);
        let mut w = DVector::zeros(n);
        for i in 0..n {
            let z = y[i] * f[i];
            let r = inverse_mills(z);
            grad[i] = y[i] * r;
            w[i] = (r * r + z * r).max(0.0);
        }
        let sqrt_w = w.map(f64::sqrt);
        let b = DMatrix::from_fn(n, n, |i, j| {
            let v = sqrt_w[i] * k[(i, j)] * sqrt_w[j];
            if i == j { v + 1.0 } else { v }
        });
        let (chol, _) = super::gp::cholesky_with_jitter(&b, max_jitter)?;
        Ok(Self {
            grad,
            w,
            sqrt_w,
            chol,
        })
    }
}

/// A fitted classifier; immutable, so it is always in evaluation mode.
#[derive(Clone, Debug)]
pub struct ClassifierPosterior {
    kernel: Kernel,
    x_train: Vec<Vec<f64>>,
    /// `∇ log p(y | f̂)` at the Laplace mode.
    grad: DVector<f64>,
    sqrt_w: DVector<f64>,
    chol: Cholesky<f64, Dyn>,
}

impl ClassifierPosterior {
    /// Predictive probability that `x` is infeasible.
    #[must_use]
    pub fn prob_infeasible(&self, x: &[f64]) -> f64 {
        let k_star = DVector::from_fn(self.x_train.len(), |i, _| {
            self.kernel.eval(x, &self.x_train[i])
        });
        let mean = k_star.dot(&self.grad);
        let s = self.sqrt_w.component_mul(&k_star);
        let var = (self.kernel.diag() - s.dot(&self.chol.solve(&s))).max(0.0);
        norm_cdf(mean / (1.0 + var).sqrt())
    }

    /// Predictive probability that `x` is feasible.
    #[must_use]
    pub fn prob_feasible(&self, x: &[f64]) -> f64 {
        1.0 - self.prob_infeasible(x)
    }

    /// Number of training rows.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.x_train.len()
    }
}
