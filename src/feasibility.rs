//! Feasibility strategies for handling infeasible experiments.
//!
//! A strategy decides two things: whether missing regression targets are
//! substituted (the `naive-*` family) and how the predicted probability of
//! feasibility is folded into the acquisition value.
//!
//! | Strategy | Substitution | Composite acquisition |
//! |----------|--------------|-----------------------|
//! | `naive-0` | infeasible targets become the worst feasible value | `a` |
//! | `naive-replace` | infeasible targets become the previous model's mean | `a` |
//! | `fwa` | none | `a · p_feas` |
//! | `fca` | none | `a`, subject to `p_feas >= c` |
//! | `fia` | none | `(1 - r^c) · a + r^c · p_feas` |
//!
//! Here `a` is the range-normalized base acquisition, `p_feas` the
//! classifier's probability of feasibility, `c` the feasibility parameter
//! and `r` the fraction of infeasible observations.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Substitution rule of a naive strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NaiveStrategy {
    /// Replace missing targets with the worst feasible target.
    Zero,
    /// Replace missing targets with the previous regression surrogate's mean.
    Replace,
}

/// How infeasible experiments are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum FeasibilityStrategy {
    /// Substitute missing targets; no classifier.
    Naive(NaiveStrategy),
    /// Feasibility-weighted acquisition.
    Fwa,
    /// Feasibility-constrained acquisition.
    Fca,
    /// Feasibility-interpolated acquisition.
    Fia,
}

impl Default for FeasibilityStrategy {
    fn default() -> Self {
        Self::Naive(NaiveStrategy::Zero)
    }
}

impl FeasibilityStrategy {
    /// Returns `true` for the `naive-*` family.
    #[must_use]
    pub fn is_naive(self) -> bool {
        matches!(self, Self::Naive(_))
    }

    /// Returns `true` if a feasibility classifier must be trained.
    #[must_use]
    pub fn needs_classifier(self) -> bool {
        !self.is_naive()
    }

    /// The configuration name of the strategy.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Naive(NaiveStrategy::Zero) => "naive-0",
            Self::Naive(NaiveStrategy::Replace) => "naive-replace",
            Self::Fwa => "fwa",
            Self::Fca => "fca",
            Self::Fia => "fia",
        }
    }

    /// Combines a normalized base acquisition value with the probability of
    /// feasibility.
    ///
    /// `feasibility_only` switches naive strategies to scoring by `p_feas`
    /// alone. For `fca` the constraint is not part of the value; see
    /// [`satisfies`](Self::satisfies).
    #[must_use]
    pub fn combine(
        self,
        acq: f64,
        p_feas: f64,
        feas_param: f64,
        infeasible_ratio: f64,
        feasibility_only: bool,
    ) -> f64 {
        match self {
            Self::Naive(_) if feasibility_only => p_feas,
            Self::Naive(_) | Self::Fca => acq,
            Self::Fwa => acq * p_feas,
            Self::Fia => {
                let w = infeasible_ratio.powf(feas_param);
                (1.0 - w) * acq + w * p_feas
            }
        }
    }

    /// Returns `true` if a candidate with `p_feas` meets the strategy's
    /// hard constraint. Only `fca` has one.
    #[must_use]
    pub fn satisfies(self, p_feas: f64, feas_param: f64) -> bool {
        match self {
            Self::Fca => p_feas >= feas_param,
            Self::Naive(_) | Self::Fwa | Self::Fia => true,
        }
    }
}

impl FromStr for FeasibilityStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "naive-0" => Ok(Self::Naive(NaiveStrategy::Zero)),
            "naive-replace" => Ok(Self::Naive(NaiveStrategy::Replace)),
            "fwa" => Ok(Self::Fwa),
            "fca" => Ok(Self::Fca),
            "fia" => Ok(Self::Fia),
            other => Err(Error::UnknownFeasibilityStrategy(other.to_string())),
        }
    }
}

impl TryFrom<String> for FeasibilityStrategy {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FeasibilityStrategy> for String {
    fn from(value: FeasibilityStrategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FeasibilityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a `"<strategy>_<parameter>"` label such as `"fca_0.2"`.
///
/// # Errors
///
/// Returns [`Error::UnknownFeasibilityStrategy`] for an unknown strategy
/// and [`Error::InvalidConfig`] for a missing or non-numeric parameter.
///
/// # Examples
///
/// ```
/// use bayes_planner::feasibility::{FeasibilityStrategy, parse_strategy_label};
///
/// let (strategy, param) = parse_strategy_label("fia_0.5").unwrap();
/// assert_eq!(strategy, FeasibilityStrategy::Fia);
/// assert!((param - 0.5).abs() < f64::EPSILON);
/// ```
pub fn parse_strategy_label(label: &str) -> Result<(FeasibilityStrategy, f64)> {
    let (name, param) = label
        .rsplit_once('_')
        .ok_or_else(|| Error::InvalidConfig(format!("missing parameter in '{label}'")))?;
    let strategy = name.parse()?;
    let param = param
        .parse::<f64>()
        .map_err(|e| Error::InvalidConfig(format!("bad parameter in '{label}': {e}")))?;
    Ok((strategy, param))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_names() {
        for name in ["naive-0", "naive-replace", "fwa", "fca", "fia"] {
            let s: FeasibilityStrategy = name.parse().unwrap();
            assert_eq!(s.as_str(), name);
        }
    }

    #[test]
    fn unknown_naive_variant_is_rejected() {
        assert!(matches!(
            "naive-mean".parse::<FeasibilityStrategy>(),
            Err(Error::UnknownFeasibilityStrategy(_))
        ));
    }

    #[test]
    fn labels_split_on_last_underscore() {
        assert_eq!(
            parse_strategy_label("naive-0_0").unwrap(),
            (FeasibilityStrategy::Naive(NaiveStrategy::Zero), 0.0)
        );
        assert_eq!(
            parse_strategy_label("fia_1000").unwrap(),
            (FeasibilityStrategy::Fia, 1000.0)
        );
        assert!(parse_strategy_label("fca").is_err());
        assert!(parse_strategy_label("fca_x").is_err());
    }

    #[test]
    fn combine_matches_each_rule() {
        let a = 0.6;
        let p = 0.5;
        assert!((FeasibilityStrategy::Fwa.combine(a, p, 0.0, 0.3, false) - 0.3).abs() < 1e-12);
        assert!((FeasibilityStrategy::Fca.combine(a, p, 0.2, 0.3, false) - a).abs() < 1e-12);
        let fia = FeasibilityStrategy::Fia.combine(a, p, 1.0, 0.25, false);
        assert!((fia - (0.75 * a + 0.25 * p)).abs() < 1e-12);
        let naive = FeasibilityStrategy::Naive(NaiveStrategy::Zero);
        assert!((naive.combine(a, p, 0.0, 0.3, false) - a).abs() < 1e-12);
        assert!((naive.combine(a, p, 0.0, 0.3, true) - p).abs() < 1e-12);
    }

    #[test]
    fn only_fca_constrains() {
        assert!(!FeasibilityStrategy::Fca.satisfies(0.1, 0.2));
        assert!(FeasibilityStrategy::Fca.satisfies(0.2, 0.2));
        assert!(FeasibilityStrategy::Fwa.satisfies(0.0, 0.9));
    }
}
