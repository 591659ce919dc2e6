//! Reduction of multi-objective values to a single merit per point.
//!
//! Scalarizers work on a whole batch of rows at once since both built-in
//! variants normalize each objective over the rows they are given. The
//! merit is always to be minimized.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scaler::forward_normalize;
use crate::types::Direction;

/// Reduces rows of objective values to one merit value per row.
pub trait Scalarizer: Send + Sync {
    /// Scalarizes every row. Lower merits are better.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ObjectiveDimensionMismatch`] if a row does not hold
    /// one value per objective.
    fn scalarize(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Number of objectives expected per row.
    fn n_objectives(&self) -> usize;
}

/// Which built-in scalarizer to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScalarizerKind {
    /// See [`Hypervolume`].
    #[default]
    Hypervolume,
    /// See [`WeightedSum`].
    WeightedSum,
}

impl ScalarizerKind {
    /// Instantiates the scalarizer for `goals`.
    ///
    /// `weights` is only used by [`WeightedSum`]; an empty slice means equal
    /// weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty goal list or weights of
    /// the wrong length.
    pub fn build(self, goals: &[Direction], weights: &[f64]) -> Result<Box<dyn Scalarizer>> {
        if goals.is_empty() {
            return Err(Error::InvalidConfig(
                "multi-objective scalarization needs at least one goal".to_string(),
            ));
        }
        Ok(match self {
            Self::Hypervolume => Box::new(Hypervolume::new(goals.to_vec())),
            Self::WeightedSum => Box::new(WeightedSum::new(goals.to_vec(), weights.to_vec())?),
        })
    }
}

impl FromStr for ScalarizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hypervolume" => Ok(Self::Hypervolume),
            "weighted_sum" => Ok(Self::WeightedSum),
            other => Err(Error::UnknownScalarizer(other.to_string())),
        }
    }
}

impl fmt::Display for ScalarizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hypervolume => f.write_str("hypervolume"),
            Self::WeightedSum => f.write_str("weighted_sum"),
        }
    }
}

/// Hypervolume-style merit.
///
/// Each objective is turned into a minimization problem and normalized to
/// `[0, 1]` over the rows. A row's merit is one minus the volume of the box
/// between the row and the worst corner, `1 - Π(1 - v_i)`, so a row that is
/// best in every objective scores 0.
#[derive(Clone, Debug)]
pub struct Hypervolume {
    goals: Vec<Direction>,
}

impl Hypervolume {
    /// Creates a hypervolume scalarizer for the given goals.
    #[must_use]
    pub fn new(goals: Vec<Direction>) -> Self {
        Self { goals }
    }
}

impl Scalarizer for Hypervolume {
    fn scalarize(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let normalized = normalize_minimize(rows, &self.goals)?;
        Ok(normalized
            .iter()
            .map(|row| 1.0 - row.iter().map(|v| 1.0 - v).product::<f64>())
            .collect())
    }

    fn n_objectives(&self) -> usize {
        self.goals.len()
    }
}

/// Weighted sum of the normalized, minimization-oriented objectives.
#[derive(Clone, Debug)]
pub struct WeightedSum {
    goals: Vec<Direction>,
    weights: Vec<f64>,
}

impl WeightedSum {
    /// Creates a weighted-sum scalarizer. Empty `weights` means equal weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the weights do not match the
    /// goals or are negative.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(goals: Vec<Direction>, weights: Vec<f64>) -> Result<Self> {
        let weights = if weights.is_empty() {
            vec![1.0 / goals.len().max(1) as f64; goals.len()]
        } else {
            weights
        };
        if weights.len() != goals.len() {
            return Err(Error::InvalidConfig(format!(
                "{} weights for {} objectives",
                weights.len(),
                goals.len()
            )));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidConfig(
                "scalarizer weights must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self { goals, weights })
    }
}

impl Scalarizer for WeightedSum {
    fn scalarize(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let normalized = normalize_minimize(rows, &self.goals)?;
        Ok(normalized
            .iter()
            .map(|row| row.iter().zip(&self.weights).map(|(v, w)| v * w).sum())
            .collect())
    }

    fn n_objectives(&self) -> usize {
        self.goals.len()
    }
}

/// Orients every objective for minimization and min-max normalizes it over
/// the rows.
fn normalize_minimize(rows: &[Vec<f64>], goals: &[Direction]) -> Result<Vec<Vec<f64>>> {
    let k = goals.len();
    if let Some(bad) = rows.iter().find(|r| r.len() != k) {
        return Err(Error::ObjectiveDimensionMismatch {
            expected: k,
            got: bad.len(),
        });
    }
    let oriented: Vec<Vec<f64>> = rows
        .iter()
        .map(|r| r.iter().zip(goals).map(|(v, g)| v * g.sign()).collect())
        .collect();
    let mut lo = vec![f64::INFINITY; k];
    let mut hi = vec![f64::NEG_INFINITY; k];
    for row in &oriented {
        for (j, &v) in row.iter().enumerate() {
            lo[j] = lo[j].min(v);
            hi[j] = hi[j].max(v);
        }
    }
    Ok(oriented
        .into_iter()
        .map(|row| {
            row.into_iter()
                .enumerate()
                .map(|(j, v)| forward_normalize(v, lo[j], hi[j]))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hypervolume_prefers_dominating_rows() {
        let hv = Hypervolume::new(vec![Direction::Minimize, Direction::Maximize]);
        let rows = vec![vec![0.0, 10.0], vec![1.0, 0.0], vec![0.5, 5.0]];
        let merits = hv.scalarize(&rows).unwrap();
        assert!(merits[0].abs() < 1e-12);
        assert!((merits[1] - 1.0).abs() < 1e-12);
        assert!(merits[2] > merits[0] && merits[2] < merits[1]);
    }

    #[test]
    fn weighted_sum_defaults_to_equal_weights() {
        let ws = WeightedSum::new(vec![Direction::Minimize; 2], vec![]).unwrap();
        let merits = ws.scalarize(&[vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        assert!((merits[0] - 0.5).abs() < 1e-12);
        assert!((merits[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_objective_count() {
        let hv = Hypervolume::new(vec![Direction::Minimize; 2]);
        assert!(matches!(
            hv.scalarize(&[vec![1.0]]),
            Err(Error::ObjectiveDimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn parses_names() {
        assert_eq!(
            "weighted_sum".parse::<ScalarizerKind>().unwrap(),
            ScalarizerKind::WeightedSum
        );
        assert!("chimera".parse::<ScalarizerKind>().is_err());
    }
}
