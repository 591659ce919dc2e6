//! Training-set construction from the observation history.
//!
//! Every planning step rebuilds two aligned data sets from scratch:
//!
//! - the **classification set** `(x_cla, y_cla)` covering every observation,
//!   labelled `1.0` when the measurement is missing and `0.0` otherwise;
//! - the **regression set** `(x_reg, y_reg)` covering only feasible
//!   observations, in history order, with targets reduced to one value
//!   (scalarized when multi-objective), sign-flipped when maximizing and
//!   standardized.

use crate::encoding::Encoder;
use crate::error::{Error, Result};
use crate::history::History;
use crate::scalarizer::Scalarizer;
use crate::scaler::standardize;
use crate::types::Direction;

/// Maps raw objective rows onto minimization-oriented scalars.
#[derive(Clone, Copy)]
pub struct ValueTransform<'a> {
    /// Optimization direction of the (scalarized) objective.
    pub goal: Direction,
    /// Scalarizer for multi-objective rows; `None` for a single objective.
    pub scalarizer: Option<&'a dyn Scalarizer>,
}

impl core::fmt::Debug for ValueTransform<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValueTransform")
            .field("goal", &self.goal)
            .field("multi_objective", &self.scalarizer.is_some())
            .finish()
    }
}

impl ValueTransform<'_> {
    /// A single-objective transform.
    #[must_use]
    pub fn single(goal: Direction) -> Self {
        Self {
            goal,
            scalarizer: None,
        }
    }

    /// Number of objective values expected per row.
    #[must_use]
    pub fn n_objectives(&self) -> usize {
        self.scalarizer.map_or(1, Scalarizer::n_objectives)
    }

    /// Scalarizes (if configured) and then orients the rows for minimization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectiveDimensionMismatch`] for rows of the wrong width.
    pub fn reduce(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let scalars = match self.scalarizer {
            Some(s) => s.scalarize(rows)?,
            None => rows
                .iter()
                .map(|r| match r.as_slice() {
                    [v] => Ok(*v),
                    other => Err(Error::ObjectiveDimensionMismatch {
                        expected: 1,
                        got: other.len(),
                    }),
                })
                .collect::<Result<Vec<_>>>()?,
        };
        let sign = self.goal.sign();
        Ok(scalars.into_iter().map(|v| v * sign).collect())
    }
}

/// The classification and regression data of one planning step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSets {
    /// Encoded features of every observation.
    pub x_cla: Vec<Vec<f64>>,
    /// `1.0` for infeasible, `0.0` for feasible observations.
    pub y_cla: Vec<f64>,
    /// Encoded features of the regression rows.
    pub x_reg: Vec<Vec<f64>>,
    /// Standardized, minimization-oriented regression targets.
    pub y_reg: Vec<f64>,
    /// Mean used to standardize the feasible targets.
    pub y_mean: f64,
    /// Standard deviation used to standardize the feasible targets.
    pub y_std: f64,
}

impl TrainingSets {
    /// History indices of infeasible observations.
    #[must_use]
    pub fn infeasible_indices(&self) -> Vec<usize> {
        self.y_cla
            .iter()
            .enumerate()
            .filter(|(_, y)| **y > 0.5)
            .map(|(i, _)| i)
            .collect()
    }

    /// History indices of feasible observations.
    #[must_use]
    pub fn feasible_indices(&self) -> Vec<usize> {
        self.y_cla
            .iter()
            .enumerate()
            .filter(|(_, y)| **y <= 0.5)
            .map(|(i, _)| i)
            .collect()
    }

    /// Fraction of infeasible observations.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn infeasible_ratio(&self) -> f64 {
        if self.y_cla.is_empty() {
            return 0.0;
        }
        self.y_cla.iter().sum::<f64>() / self.y_cla.len() as f64
    }

    /// Best (lowest) regression target, or `None` without regression rows.
    #[must_use]
    pub fn incumbent(&self) -> Option<f64> {
        self.y_reg.iter().copied().reduce(f64::min)
    }

    /// Returns `true` if there is at least one feasible and one infeasible row.
    #[must_use]
    pub fn has_both_classes(&self) -> bool {
        let n_infeasible = self.infeasible_indices().len();
        n_infeasible > 0 && n_infeasible < self.y_cla.len()
    }
}

/// Builds the classification and regression sets from `history`.
///
/// # Errors
///
/// Returns [`Error::EmptyHistory`] for an empty history,
/// [`Error::DimensionMismatch`] when a parameter vector does not fit the
/// encoder's space and [`Error::ObjectiveDimensionMismatch`] when a feasible
/// observation holds the wrong number of objectives.
pub fn build_training_sets(
    history: &History,
    encoder: &Encoder,
    transform: &ValueTransform<'_>,
) -> Result<TrainingSets> {
    if history.is_empty() {
        return Err(Error::EmptyHistory);
    }

    let x_cla = encoder.encode_all(history.params())?;
    let y_cla: Vec<f64> = history
        .iter()
        .map(|o| if o.is_missing() { 1.0 } else { 0.0 })
        .collect();

    let mut x_reg = Vec::new();
    let mut raw = Vec::new();
    for (obs, x) in history.iter().zip(&x_cla) {
        if !obs.is_missing() {
            x_reg.push(x.clone());
            raw.push(obs.values.clone());
        }
    }

    let mut y_reg = transform.reduce(&raw)?;
    let (y_mean, y_std) = standardize(&mut y_reg);

    Ok(TrainingSets {
        x_cla,
        y_cla,
        x_reg,
        y_reg,
        y_mean,
        y_std,
    })
}
