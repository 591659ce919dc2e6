//! Feasibility-aware acquisition functions.
//!
//! A [`FeasibilityAwareAcquisition`] combines a base acquisition over the
//! regression surrogate with the classifier's probability of feasibility
//! according to a [`FeasibilityStrategy`]. The base value is first
//! normalized with the range returned by [`range::estimate_range`].
//!
//! # Families
//!
//! | Kind | Base value (minimization) |
//! |------|---------------------------|
//! | `ei` | expected improvement over the incumbent; `qEI` for batches on fully continuous problems |
//! | `ucb` | `-μ + √β σ` with `β = 0.2` |
//! | `variance` | posterior variance `σ²` |
//! | `general` | expected improvement averaged over every option of the general parameters |

pub mod range;

use core::fmt;
use core::str::FromStr;

use nalgebra::DMatrix;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::encoding::Encoder;
use crate::error::{Error, Result};
use crate::feasibility::FeasibilityStrategy;
use crate::normal::expected_improvement;
use crate::param::ParamValue;
use crate::parameter::ParameterKind;
use crate::problem::ProblemType;
use crate::rng_util;
use crate::surrogate::{ClassifierPosterior, RegressionModel};

/// Exploration weight of the upper confidence bound.
pub const UCB_BETA: f64 = 0.2;
/// Number of Monte-Carlo base samples for batch expected improvement.
pub const QEI_SAMPLES: usize = 128;
/// Largest number of option combinations averaged by the general family.
const MAX_GENERAL_VARIANTS: usize = 256;

/// Acquisition family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AcquisitionKind {
    /// Expected improvement.
    #[default]
    Ei,
    /// Upper confidence bound.
    Ucb,
    /// Posterior variance.
    Variance,
    /// Expected improvement averaged over general parameters.
    General,
}

impl FromStr for AcquisitionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ei" => Ok(Self::Ei),
            "ucb" => Ok(Self::Ucb),
            "variance" => Ok(Self::Variance),
            "general" => Ok(Self::General),
            other => Err(Error::UnknownAcquisition(other.to_string())),
        }
    }
}

impl fmt::Display for AcquisitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ei => "ei",
            Self::Ucb => "ucb",
            Self::Variance => "variance",
            Self::General => "general",
        })
    }
}

/// Feature columns to overwrite for one option combination of the general
/// parameters.
pub type FeatureOverride = Vec<(usize, f64)>;

/// The base acquisition, before normalization and feasibility weighting.
#[derive(Clone, Debug, PartialEq)]
pub enum BaseAcquisition {
    /// Analytic expected improvement.
    ExpectedImprovement {
        /// Incumbent (lowest scaled target).
        f_best: f64,
    },
    /// Monte-Carlo expected improvement of a whole batch.
    QExpectedImprovement {
        /// Incumbent (lowest scaled target).
        f_best: f64,
        /// Fixed standard-normal draws, one row of `q` values per sample.
        base_samples: Vec<Vec<f64>>,
    },
    /// Upper confidence bound for minimization.
    UpperConfidenceBound {
        /// Exploration weight.
        beta: f64,
    },
    /// Posterior variance.
    Variance,
    /// Expected improvement averaged over option combinations.
    General {
        /// Incumbent (lowest scaled target).
        f_best: f64,
        /// One override list per option combination.
        variants: Vec<FeatureOverride>,
    },
}

impl BaseAcquisition {
    /// Value at a single feature row.
    ///
    /// Batch expected improvement reduces to analytic expected improvement
    /// for a single row.
    #[must_use]
    pub fn single_value(&self, model: &dyn RegressionModel, x: &[f64]) -> f64 {
        match self {
            Self::ExpectedImprovement { f_best } | Self::QExpectedImprovement { f_best, .. } => {
                let p = model.predict(x);
                expected_improvement(p.mean, p.std(), *f_best)
            }
            Self::UpperConfidenceBound { beta } => {
                let p = model.predict(x);
                -p.mean + beta.sqrt() * p.std()
            }
            Self::Variance => model.predict(x).variance,
            Self::General { f_best, variants } => {
                if variants.is_empty() {
                    let p = model.predict(x);
                    return expected_improvement(p.mean, p.std(), *f_best);
                }
                let mut row = x.to_vec();
                let mut total = 0.0;
                for variant in variants {
                    row.copy_from_slice(x);
                    for &(col, v) in variant {
                        row[col] = v;
                    }
                    let p = model.predict(&row);
                    total += expected_improvement(p.mean, p.std(), *f_best);
                }
                #[allow(clippy::cast_precision_loss)]
                let n = variants.len() as f64;
                total / n
            }
        }
    }

    /// Joint value of a batch; only meaningful for batch expected improvement.
    ///
    /// Other families return the mean of their single values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NumericalInstability`] if the joint covariance cannot
    /// be factorized.
    pub fn batch_value(&self, model: &dyn RegressionModel, xs: &[Vec<f64>]) -> Result<f64> {
        if xs.is_empty() {
            return Ok(0.0);
        }
        let Self::QExpectedImprovement {
            f_best,
            base_samples,
        } = self
        else {
            #[allow(clippy::cast_precision_loss)]
            let n = xs.len() as f64;
            return Ok(xs.iter().map(|x| self.single_value(model, x)).sum::<f64>() / n);
        };

        let (means, cov) = model.predict_joint(xs)?;
        let q = xs.len();
        let (chol, _) = crate::surrogate::gp::cholesky_with_jitter(&cov, 1e-2)?;
        let l: DMatrix<f64> = chol.l();
        let mut total = 0.0;
        for z in base_samples {
            let mut best = f64::INFINITY;
            for i in 0..q {
                let mut f = means[i];
                for j in 0..=i {
                    f += l[(i, j)] * z.get(j).copied().unwrap_or(0.0);
                }
                best = best.min(f);
            }
            total += (f_best - best).max(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = base_samples.len().max(1) as f64;
        Ok(total / n)
    }

    /// Returns `true` for the joint batch family.
    #[must_use]
    pub fn is_joint(&self) -> bool {
        matches!(self, Self::QExpectedImprovement { .. })
    }
}

/// Builds the override lists for the general family from parameter indices.
///
/// Only discrete and categorical parameters can be averaged over; other
/// indices are rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] for out-of-range or continuous
/// parameters, or when the combinations exceed a fixed limit.
pub fn general_variants(encoder: &Encoder, general_parameters: &[usize]) -> Result<Vec<FeatureOverride>> {
    let mut variants: Vec<FeatureOverride> = vec![Vec::new()];
    for &index in general_parameters {
        let param = encoder.space().parameters().get(index).ok_or_else(|| {
            Error::InvalidConfig(format!("general parameter index {index} out of range"))
        })?;
        let options: Vec<ParamValue> = match &param.kind {
            ParameterKind::Continuous { .. } => {
                return Err(Error::InvalidConfig(format!(
                    "general parameter '{}' must be discrete or categorical",
                    param.name
                )));
            }
            ParameterKind::Discrete { options } => {
                options.iter().map(|&v| ParamValue::Float(v)).collect()
            }
            ParameterKind::Categorical { options, .. } => {
                (0..options.len()).map(ParamValue::Categorical).collect()
            }
        };
        if variants.len() * options.len() > MAX_GENERAL_VARIANTS {
            return Err(Error::InvalidConfig(format!(
                "general parameters span more than {MAX_GENERAL_VARIANTS} combinations"
            )));
        }

        let offset = encoder.groups()[index].offset;
        let mut next = Vec::with_capacity(variants.len() * options.len());
        for variant in &variants {
            for option in &options {
                let block = encoder.encode_value(index, option)?;
                let mut v = variant.clone();
                v.extend(block.into_iter().enumerate().map(|(c, x)| (offset + c, x)));
                next.push(v);
            }
        }
        variants = next;
    }
    Ok(variants)
}

/// Draws the fixed base samples of batch expected improvement.
pub(crate) fn qei_base_samples(q: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    (0..QEI_SAMPLES)
        .map(|_| (0..q).map(|_| rng_util::standard_normal(rng)).collect())
        .collect()
}

/// Chooses the base acquisition for a family and batch regime.
///
/// Batches of expected improvement on fully continuous problems use the
/// joint Monte-Carlo variant; every other combination evaluates the
/// single-point family per slot.
#[must_use]
pub fn select_base(
    kind: AcquisitionKind,
    batch_size: usize,
    problem_type: ProblemType,
    f_best: f64,
    general: Vec<FeatureOverride>,
    rng: &mut fastrand::Rng,
) -> BaseAcquisition {
    let joint = batch_size > 1 && problem_type == ProblemType::FullyContinuous;
    match (kind, joint) {
        (AcquisitionKind::Ei, true) => BaseAcquisition::QExpectedImprovement {
            f_best,
            base_samples: qei_base_samples(batch_size, rng),
        },
        (AcquisitionKind::Ei, false) => BaseAcquisition::ExpectedImprovement { f_best },
        (AcquisitionKind::Ucb, _) => BaseAcquisition::UpperConfidenceBound { beta: UCB_BETA },
        (AcquisitionKind::Variance, _) => BaseAcquisition::Variance,
        (AcquisitionKind::General, _) => BaseAcquisition::General {
            f_best,
            variants: general,
        },
    }
}

/// The composite acquisition of one planning step.
///
/// Borrows the step's surrogates; evaluation is deterministic.
pub struct FeasibilityAwareAcquisition<'a> {
    regression: &'a dyn RegressionModel,
    classifier: Option<&'a ClassifierPosterior>,
    base: BaseAcquisition,
    strategy: FeasibilityStrategy,
    feas_param: f64,
    infeasible_ratio: f64,
    range: (f64, f64),
    feasibility_only: bool,
}

impl fmt::Debug for FeasibilityAwareAcquisition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeasibilityAwareAcquisition")
            .field("base", &self.base)
            .field("strategy", &self.strategy)
            .field("feas_param", &self.feas_param)
            .field("infeasible_ratio", &self.infeasible_ratio)
            .field("range", &self.range)
            .field("feasibility_only", &self.feasibility_only)
            .field("has_classifier", &self.classifier.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> FeasibilityAwareAcquisition<'a> {
    /// Assembles the composite acquisition.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        regression: &'a dyn RegressionModel,
        classifier: Option<&'a ClassifierPosterior>,
        base: BaseAcquisition,
        strategy: FeasibilityStrategy,
        feas_param: f64,
        infeasible_ratio: f64,
        range: (f64, f64),
        feasibility_only: bool,
    ) -> Self {
        Self {
            regression,
            classifier,
            base,
            strategy,
            feas_param,
            infeasible_ratio,
            range,
            feasibility_only,
        }
    }

    /// The base acquisition.
    #[must_use]
    pub fn base(&self) -> &BaseAcquisition {
        &self.base
    }

    /// The feasibility strategy.
    #[must_use]
    pub fn strategy(&self) -> FeasibilityStrategy {
        self.strategy
    }

    /// The normalization range.
    #[must_use]
    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Returns `true` if batches must be scored jointly.
    #[must_use]
    pub fn is_joint_batch(&self) -> bool {
        self.base.is_joint()
    }

    /// Probability that `x` is feasible; 1 without a classifier.
    #[must_use]
    pub fn prob_feasible(&self, x: &[f64]) -> f64 {
        self.classifier.map_or(1.0, |c| c.prob_feasible(x))
    }

    /// Returns `true` if `x` meets the strategy's feasibility constraint.
    #[must_use]
    pub fn satisfies_constraint(&self, x: &[f64]) -> bool {
        self.strategy.satisfies(self.prob_feasible(x), self.feas_param)
    }

    fn normalize(&self, a: f64) -> f64 {
        let (lo, hi) = self.range;
        (a - lo) / (hi - lo)
    }

    /// Composite value at one feature row.
    #[must_use]
    pub fn evaluate(&self, x: &[f64]) -> f64 {
        let p_feas = self.prob_feasible(x);
        let a = if self.strategy.is_naive() && self.feasibility_only {
            0.0
        } else {
            self.normalize(self.base.single_value(self.regression, x))
        };
        self.strategy.combine(
            a,
            p_feas,
            self.feas_param,
            self.infeasible_ratio,
            self.feasibility_only,
        )
    }

    /// Composite value of a whole batch.
    ///
    /// The joint family scores the batch with batch expected improvement
    /// and the mean probability of feasibility; other families average the
    /// per-row composite values. For the joint family the range comes from
    /// whole random batches (see [`range::estimate_range`]), so the
    /// normalized value stays comparable with `p_feas`.
    ///
    /// # Errors
    ///
    /// See [`BaseAcquisition::batch_value`].
    pub fn evaluate_batch(&self, xs: &[Vec<f64>]) -> Result<f64> {
        if xs.is_empty() {
            return Ok(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let n = xs.len() as f64;
        if !self.is_joint_batch() {
            return Ok(xs.iter().map(|x| self.evaluate(x)).sum::<f64>() / n);
        }
        let p_feas = xs.iter().map(|x| self.prob_feasible(x)).sum::<f64>() / n;
        let a = self.normalize(self.base.batch_value(self.regression, xs)?);
        Ok(self.strategy.combine(
            a,
            p_feas,
            self.feas_param,
            self.infeasible_ratio,
            self.feasibility_only,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::NaiveStrategy;
    use crate::parameter::{Parameter, ParameterSpace};
    use crate::surrogate::Prediction;

    struct Bowl;

    impl RegressionModel for Bowl {
        fn predict(&self, x: &[f64]) -> Prediction {
            Prediction {
                mean: (x[0] - 0.5).powi(2),
                variance: 0.01,
            }
        }

        fn n_features(&self) -> usize {
            1
        }
    }

    #[test]
    fn parses_kinds() {
        assert_eq!("ucb".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::Ucb);
        assert!(matches!(
            "pi".parse::<AcquisitionKind>(),
            Err(Error::UnknownAcquisition(_))
        ));
    }

    #[test]
    fn batch_ei_only_for_continuous_batches() {
        let mut rng = fastrand::Rng::with_seed(1);
        let joint = select_base(
            AcquisitionKind::Ei,
            2,
            ProblemType::FullyContinuous,
            0.0,
            Vec::new(),
            &mut rng,
        );
        assert!(joint.is_joint());
        let single = select_base(
            AcquisitionKind::Ei,
            2,
            ProblemType::FullyCategorical,
            0.0,
            Vec::new(),
            &mut rng,
        );
        assert!(!single.is_joint());
        if let BaseAcquisition::QExpectedImprovement { base_samples, .. } = joint {
            assert_eq!(base_samples.len(), QEI_SAMPLES);
            assert!(base_samples.iter().all(|s| s.len() == 2));
        }
    }

    #[test]
    fn ei_peaks_at_bowl_minimum() {
        let base = BaseAcquisition::ExpectedImprovement { f_best: 0.05 };
        let acq = FeasibilityAwareAcquisition::new(
            &Bowl,
            None,
            base,
            FeasibilityStrategy::Naive(NaiveStrategy::Zero),
            0.0,
            0.0,
            (0.0, 1.0),
            false,
        );
        assert!(acq.evaluate(&[0.5]) > acq.evaluate(&[0.1]));
    }

    #[test]
    fn feasibility_only_without_classifier_is_flat() {
        let acq = FeasibilityAwareAcquisition::new(
            &Bowl,
            None,
            BaseAcquisition::Variance,
            FeasibilityStrategy::Naive(NaiveStrategy::Replace),
            0.0,
            0.5,
            (0.0, 1.0),
            true,
        );
        assert!((acq.evaluate(&[0.1]) - 1.0).abs() < 1e-12);
        assert!((acq.evaluate(&[0.9]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn qei_of_batch_is_at_least_best_single() {
        let mut rng = fastrand::Rng::with_seed(9);
        let base = BaseAcquisition::QExpectedImprovement {
            f_best: 0.05,
            base_samples: qei_base_samples(2, &mut rng),
        };
        let single = base.batch_value(&Bowl, &[vec![0.5]]).unwrap();
        let pair = base.batch_value(&Bowl, &[vec![0.5], vec![0.45]]).unwrap();
        assert!(pair + 1e-9 >= single * 0.9);
        assert!(pair > 0.0);
    }

    #[test]
    fn general_variants_enumerate_options() {
        let space = ParameterSpace::new(vec![
            Parameter::continuous("x", 0.0, 1.0),
            Parameter::categorical("k", ["a", "b", "c"]),
        ])
        .unwrap();
        let enc = Encoder::new(&space, false);
        let variants = general_variants(&enc, &[1]).unwrap();
        assert_eq!(variants.len(), 3);
        assert_eq!(variants[2], vec![(1, 0.0), (2, 0.0), (3, 1.0)]);
        assert!(general_variants(&enc, &[0]).is_err());
        assert!(general_variants(&enc, &[5]).is_err());
    }
}
