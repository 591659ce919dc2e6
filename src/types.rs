//! Core types shared across the planner.

use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The direction of optimization.
///
/// Internally the planner always minimizes; maximized objectives are
/// sign-flipped before any scaling happens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Minimize the objective value.
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "min"))]
    Minimize,
    /// Maximize the objective value.
    #[cfg_attr(feature = "serde", serde(alias = "max"))]
    Maximize,
}

impl Direction {
    /// Factor that maps a value in this direction onto the minimization convention.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::Minimize => 1.0,
            Self::Maximize => -1.0,
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "min" | "minimize" => Ok(Self::Minimize),
            "max" | "maximize" => Ok(Self::Maximize),
            other => Err(Error::UnknownGoal(other.to_string())),
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Minimize => write!(f, "minimize"),
            Self::Maximize => write!(f, "maximize"),
        }
    }
}
