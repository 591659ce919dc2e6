//! Normalization and standardization of parameter and value arrays.
//!
//! Two transforms are supported per axis: min-max normalization onto
//! `[0, 1]` and standardization to zero mean and unit variance. A
//! [`Scaler`] is fitted on one array (or on a set of source tasks) and then
//! applied to others with the same column layout.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Map `value` from `[lo, hi]` onto `[0, 1]`. A collapsed span maps to 0.5.
#[must_use]
pub fn forward_normalize(value: f64, lo: f64, hi: f64) -> f64 {
    if (hi - lo).abs() < 1e-15 {
        0.5
    } else {
        (value - lo) / (hi - lo)
    }
}

/// Map a `[0, 1]` value back onto `[lo, hi]`.
#[must_use]
pub fn reverse_normalize(value: f64, lo: f64, hi: f64) -> f64 {
    lo + value * (hi - lo)
}

/// Mean and sample standard deviation of `values`.
///
/// The standard deviation is floored at `1e-10`; a single value has a
/// standard deviation of 1.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 1.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n == 1 {
        return (mean, 1.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt().max(1e-10))
}

/// Standardize `values` in place, returning the `(mean, std)` used.
pub fn standardize(values: &mut [f64]) -> (f64, f64) {
    let (mean, std) = mean_std(values);
    for v in values.iter_mut() {
        *v = (*v - mean) / std;
    }
    (mean, std)
}

/// Which transform a [`Scaler`] applies along one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScaleKind {
    /// Leave values untouched.
    Identity,
    /// Min-max normalize each column onto `[0, 1]`.
    #[default]
    Normalize,
    /// Standardize each column to zero mean and unit variance.
    Standardize,
}

/// Per-column statistics captured when the scaler is fitted.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
struct ColumnStats {
    kind: ScaleKind,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl ColumnStats {
    fn fit(kind: ScaleKind, rows: &[Vec<f64>]) -> Result<Self> {
        let dim = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: bad.len(),
            });
        }
        let mut a = Vec::with_capacity(dim);
        let mut b = Vec::with_capacity(dim);
        for j in 0..dim {
            let column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
            match kind {
                ScaleKind::Identity => {
                    a.push(0.0);
                    b.push(1.0);
                }
                ScaleKind::Normalize => {
                    a.push(column.iter().copied().fold(f64::INFINITY, f64::min));
                    b.push(column.iter().copied().fold(f64::NEG_INFINITY, f64::max));
                }
                ScaleKind::Standardize => {
                    let (mean, std) = mean_std(&column);
                    a.push(mean);
                    b.push(std);
                }
            }
        }
        Ok(Self { kind, a, b })
    }

    fn forward(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.a.len() {
                    return Err(Error::DimensionMismatch {
                        expected: self.a.len(),
                        got: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(j, &v)| match self.kind {
                        ScaleKind::Identity => v,
                        ScaleKind::Normalize => forward_normalize(v, self.a[j], self.b[j]),
                        ScaleKind::Standardize => (v - self.a[j]) / self.b[j],
                    })
                    .collect())
            })
            .collect()
    }

    fn reverse(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        rows.iter()
            .map(|row| {
                if row.len() != self.a.len() {
                    return Err(Error::DimensionMismatch {
                        expected: self.a.len(),
                        got: row.len(),
                    });
                }
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(j, &v)| match self.kind {
                        ScaleKind::Identity => v,
                        ScaleKind::Normalize => reverse_normalize(v, self.a[j], self.b[j]),
                        ScaleKind::Standardize => v * self.b[j] + self.a[j],
                    })
                    .collect())
            })
            .collect()
    }
}

/// Fitted transform over parameter rows and value rows.
///
/// # Examples
///
/// ```
/// use bayes_planner::scaler::{ScaleKind, Scaler};
///
/// let params = vec![vec![0.0, 10.0], vec![1.0, 30.0]];
/// let values = vec![vec![2.0], vec![4.0]];
/// let mut scaler = Scaler::new(ScaleKind::Normalize, ScaleKind::Standardize);
/// let (p, v) = scaler.fit_transform(&params, &values).unwrap();
/// assert_eq!(p[1], vec![1.0, 1.0]);
/// assert!(v[0][0] < 0.0 && v[1][0] > 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scaler {
    param_kind: ScaleKind,
    value_kind: ScaleKind,
    params: Option<ColumnStats>,
    values: Option<ColumnStats>,
}

impl Scaler {
    /// Creates an unfitted scaler.
    #[must_use]
    pub fn new(param_kind: ScaleKind, value_kind: ScaleKind) -> Self {
        Self {
            param_kind,
            value_kind,
            params: None,
            values: None,
        }
    }

    /// Returns `true` once [`fit`](Self::fit) has been called.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.params.is_some() && self.values.is_some()
    }

    /// Fits the per-column statistics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for ragged arrays.
    pub fn fit(&mut self, params: &[Vec<f64>], values: &[Vec<f64>]) -> Result<()> {
        self.params = Some(ColumnStats::fit(self.param_kind, params)?);
        self.values = Some(ColumnStats::fit(self.value_kind, values)?);
        Ok(())
    }

    /// Applies the fitted transform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the scaler was never fitted and
    /// [`Error::DimensionMismatch`] if column counts differ from the fit.
    pub fn transform(
        &self,
        params: &[Vec<f64>],
        values: &[Vec<f64>],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let (p, v) = self.fitted()?;
        Ok((p.forward(params)?, v.forward(values)?))
    }

    /// Fits on the given arrays and transforms them.
    ///
    /// # Errors
    ///
    /// See [`fit`](Self::fit).
    pub fn fit_transform(
        &mut self,
        params: &[Vec<f64>],
        values: &[Vec<f64>],
    ) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        self.fit(params, values)?;
        self.transform(params, values)
    }

    /// Undoes the transform on parameter rows.
    ///
    /// # Errors
    ///
    /// See [`transform`](Self::transform).
    pub fn inverse_transform_params(&self, params: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fitted()?.0.reverse(params)
    }

    /// Undoes the transform on value rows.
    ///
    /// # Errors
    ///
    /// See [`transform`](Self::transform).
    pub fn inverse_transform_values(&self, values: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        self.fitted()?.1.reverse(values)
    }

    /// Fits on the concatenation of all task arrays and transforms every task.
    ///
    /// Each task is a `(params, values)` pair.
    ///
    /// # Errors
    ///
    /// See [`fit`](Self::fit).
    pub fn fit_transform_tasks(
        &mut self,
        tasks: &[(Vec<Vec<f64>>, Vec<Vec<f64>>)],
    ) -> Result<Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)>> {
        let all_params: Vec<Vec<f64>> = tasks.iter().flat_map(|t| t.0.iter().cloned()).collect();
        let all_values: Vec<Vec<f64>> = tasks.iter().flat_map(|t| t.1.iter().cloned()).collect();
        self.fit(&all_params, &all_values)?;
        self.transform_tasks(tasks)
    }

    /// Transforms every task with the already fitted statistics.
    ///
    /// # Errors
    ///
    /// See [`transform`](Self::transform).
    pub fn transform_tasks(
        &self,
        tasks: &[(Vec<Vec<f64>>, Vec<Vec<f64>>)],
    ) -> Result<Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)>> {
        tasks.iter().map(|(p, v)| self.transform(p, v)).collect()
    }

    fn fitted(&self) -> Result<(&ColumnStats, &ColumnStats)> {
        match (&self.params, &self.values) {
            (Some(p), Some(v)) => Ok((p, v)),
            _ => Err(Error::Internal("scaler used before fit")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapsed_span_maps_to_half() {
        assert!((forward_normalize(3.0, 3.0, 3.0) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn normalize_round_trips_through_inverse() {
        let params = vec![vec![-1.0, 5.0], vec![3.0, 7.0], vec![1.0, 6.0]];
        let values = vec![vec![1.0], vec![2.0], vec![4.0]];
        let mut scaler = Scaler::new(ScaleKind::Normalize, ScaleKind::Standardize);
        let (p, v) = scaler.fit_transform(&params, &values).unwrap();
        assert_eq!(p[0], vec![0.0, 0.0]);
        assert_eq!(p[1], vec![1.0, 1.0]);
        let back = scaler.inverse_transform_values(&v).unwrap();
        for (a, b) in back.iter().zip(&values) {
            assert!((a[0] - b[0]).abs() < 1e-12);
        }
    }

    #[test]
    fn single_value_has_unit_std() {
        assert_eq!(mean_std(&[4.0]), (4.0, 1.0));
    }

    #[test]
    fn tasks_share_one_fit() {
        let tasks = vec![
            (vec![vec![0.0]], vec![vec![0.0]]),
            (vec![vec![10.0]], vec![vec![2.0]]),
        ];
        let mut scaler = Scaler::new(ScaleKind::Normalize, ScaleKind::Normalize);
        let out = scaler.fit_transform_tasks(&tasks).unwrap();
        assert_eq!(out[0].0[0][0], 0.0);
        assert_eq!(out[1].0[0][0], 1.0);
        assert_eq!(out[1].1[0][0], 1.0);
    }

    #[test]
    fn unfitted_transform_errors() {
        let scaler = Scaler::new(ScaleKind::Identity, ScaleKind::Identity);
        assert!(scaler.transform(&[], &[]).is_err());
    }
}
