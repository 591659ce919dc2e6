//! Observation history.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::param::ParamVector;

/// One evaluated experiment.
///
/// `values` holds one entry per objective. Any `NaN` entry marks the
/// experiment as infeasible (its measurement is missing).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Observation {
    /// The evaluated parameters.
    pub params: ParamVector,
    /// Objective values, or `NaN` for a failed measurement.
    pub values: Vec<f64>,
}

impl Observation {
    /// Creates a single-objective observation.
    #[must_use]
    pub fn new(params: ParamVector, value: f64) -> Self {
        Self {
            params,
            values: vec![value],
        }
    }

    /// Creates a multi-objective observation.
    #[must_use]
    pub fn multi(params: ParamVector, values: Vec<f64>) -> Self {
        Self { params, values }
    }

    /// Creates an observation of an infeasible experiment.
    #[must_use]
    pub fn missing(params: ParamVector) -> Self {
        Self::new(params, f64::NAN)
    }

    /// Returns `true` if the measurement is missing.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.values.is_empty() || self.values.iter().any(|v| v.is_nan())
    }
}

/// Ordered, append-only record of observations.
///
/// # Examples
///
/// ```
/// use bayes_planner::history::History;
/// use bayes_planner::{ParamValue, ParamVector};
///
/// let mut history = History::new();
/// history.push(ParamVector::new(vec![ParamValue::Float(0.5)]), 1.25);
/// history.push(ParamVector::new(vec![ParamValue::Float(0.9)]), f64::NAN);
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.n_missing(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct History {
    observations: Vec<Observation>,
}

impl History {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a single-objective measurement.
    pub fn push(&mut self, params: ParamVector, value: f64) {
        self.observations.push(Observation::new(params, value));
    }

    /// Appends an observation.
    pub fn add_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Observations in insertion order.
    #[must_use]
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Iterates over the observations.
    pub fn iter(&self) -> core::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns `true` if nothing has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Evaluated parameter vectors in order.
    pub fn params(&self) -> impl Iterator<Item = &ParamVector> {
        self.observations.iter().map(|o| &o.params)
    }

    /// Objective values in order.
    pub fn values(&self) -> impl Iterator<Item = &[f64]> {
        self.observations.iter().map(|o| o.values.as_slice())
    }

    /// Number of missing measurements.
    #[must_use]
    pub fn n_missing(&self) -> usize {
        self.observations.iter().filter(|o| o.is_missing()).count()
    }

    /// Returns `true` if no measurement is usable; an empty history counts.
    #[must_use]
    pub fn all_missing(&self) -> bool {
        self.observations.iter().all(Observation::is_missing)
    }
}

impl Extend<Observation> for History {
    fn extend<T: IntoIterator<Item = Observation>>(&mut self, iter: T) {
        self.observations.extend(iter);
    }
}

impl FromIterator<Observation> for History {
    fn from_iter<T: IntoIterator<Item = Observation>>(iter: T) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Observation;
    type IntoIter = core::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}
