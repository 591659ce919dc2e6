//! Surrogate models: GP regression over objective values and GP
//! classification over feasibility labels.
//!
//! The regression kernel depends on the problem type:
//!
//! | Problem type | Kernel |
//! |--------------|--------|
//! | fully continuous, fully discrete, mixed discrete/continuous | Matérn 5/2 |
//! | fully categorical | Matérn 5/2 with descriptors, else Hamming |
//! | mixed categorical/continuous, mixed categorical/discrete | Matérn 5/2 with descriptors, else mixed |
//! | fully mixed | unsupported |

pub mod classifier;
pub mod gp;
pub mod kernel;
pub mod meta;

use nalgebra::DMatrix;

pub use self::classifier::{ClassifierPosterior, GpClassifier};
pub use self::gp::{GpPosterior, GpRegressor};
pub use self::kernel::{Kernel, KernelKind, KernelLayout, KernelParams};
pub use self::meta::MetaGp;
use crate::encoding::{Encoder, GroupKind};
use crate::error::{Error, Result};
use crate::problem::ProblemType;
use crate::training::TrainingSets;

/// Posterior mean and variance at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior variance.
    pub variance: f64,
}

impl Prediction {
    /// Posterior standard deviation.
    #[must_use]
    pub fn std(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }
}

/// A fitted regression model over encoded feature rows.
pub trait RegressionModel {
    /// Posterior at one feature row.
    fn predict(&self, x: &[f64]) -> Prediction;

    /// Number of feature columns the model expects.
    fn n_features(&self) -> usize;

    /// Posteriors at many feature rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for rows of the wrong width.
    fn predict_many(&self, xs: &[Vec<f64>]) -> Result<Vec<Prediction>> {
        xs.iter()
            .map(|x| {
                if x.len() == self.n_features() {
                    Ok(self.predict(x))
                } else {
                    Err(Error::DimensionMismatch {
                        expected: self.n_features(),
                        got: x.len(),
                    })
                }
            })
            .collect()
    }

    /// Joint posterior mean and covariance at several rows.
    ///
    /// The default treats the rows as independent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for rows of the wrong width.
    fn predict_joint(&self, xs: &[Vec<f64>]) -> Result<(Vec<f64>, DMatrix<f64>)> {
        let preds = self.predict_many(xs)?;
        let means = preds.iter().map(|p| p.mean).collect();
        let cov = DMatrix::from_fn(xs.len(), xs.len(), |i, j| {
            if i == j { preds[i].variance } else { 0.0 }
        });
        Ok((means, cov))
    }
}

/// The surrogates of one planning step.
#[derive(Clone, Debug)]
pub struct SurrogatePair {
    /// Regression posterior over the (possibly substituted) targets.
    pub regression: GpPosterior,
    /// Feasibility classifier; `None` for naive strategies.
    pub classifier: Option<ClassifierPosterior>,
}

/// Picks the regression kernel for a problem type.
///
/// # Errors
///
/// Returns [`Error::UnsupportedProblemType`] for fully mixed spaces.
pub fn select_kernel(
    problem_type: ProblemType,
    has_descriptors: bool,
    encoder: &Encoder,
) -> Result<(KernelKind, KernelLayout)> {
    let all = KernelLayout::all_numeric(encoder.feature_dim());
    let split = || {
        let mut layout = KernelLayout::default();
        for g in encoder.groups() {
            match g.kind {
                GroupKind::OneHot => layout.groups.push((g.offset, g.width)),
                GroupKind::Numeric | GroupKind::Descriptor => {
                    layout.numeric.extend(g.offset..g.offset + g.width);
                }
            }
        }
        layout
    };
    match problem_type {
        ProblemType::FullyContinuous | ProblemType::FullyDiscrete | ProblemType::MixedDiscCont => {
            Ok((KernelKind::Matern52, all))
        }
        ProblemType::FullyCategorical if has_descriptors => Ok((KernelKind::Matern52, all)),
        ProblemType::FullyCategorical => Ok((KernelKind::Hamming, split())),
        ProblemType::MixedCatCont | ProblemType::MixedCatDisc if has_descriptors => {
            Ok((KernelKind::Matern52, all))
        }
        ProblemType::MixedCatCont | ProblemType::MixedCatDisc => Ok((KernelKind::Mixed, split())),
        ProblemType::FullyMixed => Err(Error::UnsupportedProblemType(problem_type)),
    }
}

/// Fits the regression surrogate on the regression set.
///
/// # Errors
///
/// See [`select_kernel`] and [`GpRegressor::fit`].
pub fn build_regression(
    sets: &TrainingSets,
    problem_type: ProblemType,
    has_descriptors: bool,
    encoder: &Encoder,
    max_jitter: f64,
    rng: &mut fastrand::Rng,
) -> Result<GpPosterior> {
    let (kind, layout) = select_kernel(problem_type, has_descriptors, encoder)?;
    let posterior = GpRegressor::new(kind, layout, max_jitter).fit(&sets.x_reg, &sets.y_reg, rng)?;
    trace_info!(
        kernel = ?kind,
        n_train = posterior.n_train(),
        fit_ms = posterior.fit_duration().as_secs_f64() * 1e3,
        "regression surrogate trained"
    );
    Ok(posterior)
}

/// Fits the feasibility classifier on the classification set.
///
/// # Errors
///
/// See [`GpClassifier::fit`].
pub fn build_classifier(
    sets: &TrainingSets,
    max_iters: usize,
    max_jitter: f64,
) -> Result<ClassifierPosterior> {
    let classifier = GpClassifier::new(max_iters, max_jitter).fit(&sets.x_cla, &sets.y_cla)?;
    trace_info!(
        n_train = classifier.n_train(),
        infeasible_ratio = sets.infeasible_ratio(),
        "feasibility classifier trained"
    );
    Ok(classifier)
}
