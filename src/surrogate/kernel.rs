//! Covariance functions over encoded feature rows.
//!
//! - **Matérn 5/2** with ARD lengthscales over the numeric feature columns:
//!   `k(x1, x2) = (1 + √5 r + 5/3 r²) exp(-√5 r)` where
//!   `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`.
//! - **Hamming** over one-hot groups: `k = exp(-mean_g(δ_g / l_g))` with
//!   `δ_g ∈ {0, 1}` telling whether the two rows pick different options in
//!   group `g`.
//! - **Mixed**: `(k_m + k_h + k_m · k_h) / 3` combining both.
//!
//! Every kernel is scaled by the signal variance; the noise variance is
//! added on the diagonal of training covariance matrices only.

use nalgebra::DMatrix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Bounds of the log-space hyperparameters.
pub(crate) const LOG_LENGTHSCALE_BOUNDS: (f64, f64) = (-4.605_170_185_988_091, 2.995_732_273_553_991);
pub(crate) const LOG_SIGNAL_BOUNDS: (f64, f64) = (-2.995_732_273_553_991, 2.995_732_273_553_991);
pub(crate) const LOG_NOISE_BOUNDS: (f64, f64) = (-13.815_510_557_964_274, -0.693_147_180_559_945_3);

/// Kernel family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum KernelKind {
    /// Matérn 5/2 over every feature column.
    Matern52,
    /// Hamming kernel over one-hot groups.
    Hamming,
    /// Matérn 5/2 over numeric columns combined with Hamming over groups.
    Mixed,
}

/// Which feature columns each kernel component reads.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KernelLayout {
    /// Feature columns handled by the Matérn component.
    pub numeric: Vec<usize>,
    /// `(offset, width)` of each one-hot group handled by the Hamming component.
    pub groups: Vec<(usize, usize)>,
}

impl KernelLayout {
    /// A layout treating every one of `dim` features as numeric.
    #[must_use]
    pub fn all_numeric(dim: usize) -> Self {
        Self {
            numeric: (0..dim).collect(),
            groups: Vec::new(),
        }
    }
}

/// Kernel hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KernelParams {
    /// One lengthscale per numeric column.
    pub lengthscales: Vec<f64>,
    /// One lengthscale per categorical group.
    pub cat_lengthscales: Vec<f64>,
    /// Output scale.
    pub signal_var: f64,
    /// Observation noise variance.
    pub noise_var: f64,
}

/// A kernel with fixed hyperparameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Kernel {
    kind: KernelKind,
    layout: KernelLayout,
    params: KernelParams,
}

impl Kernel {
    /// Creates a kernel with unit lengthscales.
    #[must_use]
    pub fn new(kind: KernelKind, layout: KernelLayout) -> Self {
        let (n_num, n_cat) = component_sizes(kind, &layout);
        let params = KernelParams {
            lengthscales: vec![1.0; n_num],
            cat_lengthscales: vec![1.0; n_cat],
            signal_var: 1.0,
            noise_var: 1e-4,
        };
        Self {
            kind,
            layout,
            params,
        }
    }

    /// Kernel family.
    #[must_use]
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Column layout.
    #[must_use]
    pub fn layout(&self) -> &KernelLayout {
        &self.layout
    }

    /// Current hyperparameters.
    #[must_use]
    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    /// Replaces the hyperparameters.
    pub fn set_params(&mut self, params: KernelParams) {
        self.params = params;
    }

    /// Checks that the hyperparameters match the layout.
    ///
    /// Kernels built by [`new`](Self::new) always pass; kernels read from
    /// disk may not.
    pub(crate) fn check_consistent(&self) -> core::result::Result<(), String> {
        let (n_num, n_cat) = component_sizes(self.kind, &self.layout);
        if self.params.lengthscales.len() != n_num {
            return Err(format!(
                "expected {n_num} lengthscales, found {}",
                self.params.lengthscales.len()
            ));
        }
        if self.params.cat_lengthscales.len() != n_cat {
            return Err(format!(
                "expected {n_cat} categorical lengthscales, found {}",
                self.params.cat_lengthscales.len()
            ));
        }
        let positive = |v: &f64| v.is_finite() && *v > 0.0;
        if !(self.params.lengthscales.iter().all(positive)
            && self.params.cat_lengthscales.iter().all(positive)
            && positive(&self.params.signal_var)
            && positive(&self.params.noise_var))
        {
            return Err("hyperparameters must be finite and positive".to_string());
        }
        if self.layout.groups.iter().any(|&(_, width)| width == 0) {
            return Err("categorical groups must not be empty".to_string());
        }
        Ok(())
    }

    /// Number of feature columns the layout reads.
    #[must_use]
    pub fn min_feature_dim(&self) -> usize {
        let numeric = self.layout.numeric.iter().map(|&c| c + 1).max().unwrap_or(0);
        let groups = self
            .layout
            .groups
            .iter()
            .map(|&(offset, width)| offset + width)
            .max()
            .unwrap_or(0);
        numeric.max(groups)
    }

    /// Number of log-space hyperparameters.
    #[must_use]
    pub fn n_log_params(&self) -> usize {
        self.params.lengthscales.len() + self.params.cat_lengthscales.len() + 2
    }

    /// Hyperparameters as `[ln l.., ln l_cat.., ln σ², ln noise]`.
    #[must_use]
    pub fn to_log_vector(&self) -> Vec<f64> {
        self.params
            .lengthscales
            .iter()
            .chain(&self.params.cat_lengthscales)
            .map(|l| l.ln())
            .chain([self.params.signal_var.ln(), self.params.noise_var.ln()])
            .collect()
    }

    /// Sets the hyperparameters from a log vector, clamping to the bounds.
    pub fn set_log_vector(&mut self, theta: &[f64]) {
        let n_num = self.params.lengthscales.len();
        let n_cat = self.params.cat_lengthscales.len();
        let clamp = |v: f64, (lo, hi): (f64, f64)| v.clamp(lo, hi).exp();
        for (l, &t) in self.params.lengthscales.iter_mut().zip(theta) {
            *l = clamp(t, LOG_LENGTHSCALE_BOUNDS);
        }
        for (l, &t) in self
            .params
            .cat_lengthscales
            .iter_mut()
            .zip(&theta[n_num..])
        {
            *l = clamp(t, LOG_LENGTHSCALE_BOUNDS);
        }
        self.params.signal_var = clamp(theta[n_num + n_cat], LOG_SIGNAL_BOUNDS);
        self.params.noise_var = clamp(theta[n_num + n_cat + 1], LOG_NOISE_BOUNDS);
    }

    /// Bounds matching [`to_log_vector`](Self::to_log_vector).
    #[must_use]
    pub fn log_bounds(&self) -> Vec<(f64, f64)> {
        let n_len = self.params.lengthscales.len() + self.params.cat_lengthscales.len();
        let mut bounds = vec![LOG_LENGTHSCALE_BOUNDS; n_len];
        bounds.push(LOG_SIGNAL_BOUNDS);
        bounds.push(LOG_NOISE_BOUNDS);
        bounds
    }

    /// Covariance between two feature rows (without noise).
    #[must_use]
    pub fn eval(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let unit = match self.kind {
            KernelKind::Matern52 => self.matern(x1, x2),
            KernelKind::Hamming => self.hamming(x1, x2),
            KernelKind::Mixed => {
                let km = self.matern(x1, x2);
                let kh = self.hamming(x1, x2);
                (km + kh + km * kh) / 3.0
            }
        };
        self.params.signal_var * unit
    }

    /// Prior variance at any point.
    #[must_use]
    pub fn diag(&self) -> f64 {
        self.params.signal_var
    }

    /// Training covariance `K + (noise + jitter) I`.
    #[must_use]
    pub fn matrix(&self, x: &[Vec<f64>], jitter: f64) -> DMatrix<f64> {
        let n = x.len();
        let extra = self.params.noise_var + jitter;
        DMatrix::from_fn(n, n, |i, j| {
            let k = self.eval(&x[i], &x[j]);
            if i == j { k + extra } else { k }
        })
    }

    /// Cross covariance `K(a, b)` with shape `a.len() × b.len()`.
    #[must_use]
    pub fn cross(&self, a: &[Vec<f64>], b: &[Vec<f64>]) -> DMatrix<f64> {
        DMatrix::from_fn(a.len(), b.len(), |i, j| self.eval(&a[i], &b[j]))
    }

    fn matern(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let mut r_sq = 0.0;
        for (&col, l) in self.layout.numeric.iter().zip(&self.params.lengthscales) {
            let diff = (x1[col] - x2[col]) / l;
            r_sq += diff * diff;
        }
        let r = f64::sqrt(r_sq);
        let sqrt5_r = SQRT_5 * r;
        (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
    }

    #[allow(clippy::cast_precision_loss)]
    fn hamming(&self, x1: &[f64], x2: &[f64]) -> f64 {
        if self.layout.groups.is_empty() {
            return 1.0;
        }
        let mut total = 0.0;
        for (&(offset, width), l) in self
            .layout
            .groups
            .iter()
            .zip(&self.params.cat_lengthscales)
        {
            let delta: f64 = 0.5
                * x1[offset..offset + width]
                    .iter()
                    .zip(&x2[offset..offset + width])
                    .map(|(a, b)| (a - b).abs())
                    .sum::<f64>();
            total += delta.min(1.0) / l;
        }
        (-total / self.layout.groups.len() as f64).exp()
    }
}

fn component_sizes(kind: KernelKind, layout: &KernelLayout) -> (usize, usize) {
    match kind {
        KernelKind::Matern52 => (layout.numeric.len(), 0),
        KernelKind::Hamming => (0, layout.groups.len()),
        KernelKind::Mixed => (layout.numeric.len(), layout.groups.len()),
    }
}

/// Per-column standard deviation of the numeric columns, clamped to `>= 0.01`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn heuristic_lengthscales(x: &[Vec<f64>], columns: &[usize]) -> Vec<f64> {
    let n = x.len().max(1) as f64;
    columns
        .iter()
        .map(|&j| {
            let mean = x.iter().map(|row| row[j]).sum::<f64>() / n;
            let var = x.iter().map(|row| (row[j] - mean).powi(2)).sum::<f64>() / n;
            var.sqrt().max(0.01)
        })
        .collect()
}
