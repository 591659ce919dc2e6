//! Substitution of missing regression targets for naive strategies.

use crate::error::{Error, Result};
use crate::feasibility::{FeasibilityStrategy, NaiveStrategy};
use crate::surrogate::RegressionModel;
use crate::training::TrainingSets;

/// Outcome of [`apply_substitution`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Substitution {
    /// The regression set was left as is (non-naive strategy).
    Unchanged,
    /// Infeasible rows were added with substituted targets.
    Substituted {
        /// Number of rows that received a substituted target.
        n_replaced: usize,
    },
    /// Substitution was not possible; acquisition falls back to the
    /// probability of feasibility alone for this step.
    FeasibilityOnly,
}

impl Substitution {
    /// Returns `true` for [`Substitution::FeasibilityOnly`].
    #[must_use]
    pub fn is_feasibility_only(self) -> bool {
        matches!(self, Self::FeasibilityOnly)
    }
}

/// Rewrites the regression set of `sets` according to `strategy`.
///
/// Naive strategies need at least one feasible and one infeasible
/// observation. `naive-0` fills infeasible targets with the worst feasible
/// target; `naive-replace` uses the mean of `prior`, the regression model
/// of the previous step, and defers when there is none. On success the
/// regression set covers the whole history in history order.
///
/// # Errors
///
/// Propagates prediction errors from `prior`.
pub fn apply_substitution(
    strategy: FeasibilityStrategy,
    sets: &mut TrainingSets,
    prior: Option<&dyn RegressionModel>,
) -> Result<Substitution> {
    let FeasibilityStrategy::Naive(naive) = strategy else {
        return Ok(Substitution::Unchanged);
    };
    if sets.y_reg.is_empty() || !sets.has_both_classes() {
        return Ok(Substitution::FeasibilityOnly);
    }

    let infeasible = sets.infeasible_indices();
    let replacements: Vec<f64> = match naive {
        NaiveStrategy::Zero => {
            let worst = sets
                .y_reg
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            vec![worst; infeasible.len()]
        }
        NaiveStrategy::Replace => {
            let Some(model) = prior else {
                return Ok(Substitution::FeasibilityOnly);
            };
            let x: Vec<Vec<f64>> = infeasible.iter().map(|&i| sets.x_cla[i].clone()).collect();
            model.predict_many(&x)?.into_iter().map(|p| p.mean).collect()
        }
    };

    let mut feasible_targets = sets.y_reg.iter().copied();
    let mut substituted = replacements.into_iter();
    let mut y_reg = Vec::with_capacity(sets.y_cla.len());
    for &label in &sets.y_cla {
        let next = if label > 0.5 {
            substituted.next()
        } else {
            feasible_targets.next()
        };
        match next {
            Some(v) => y_reg.push(v),
            None => return Err(Error::Internal("regression rows out of sync")),
        }
    }

    sets.x_reg.clone_from(&sets.x_cla);
    sets.y_reg = y_reg;
    Ok(Substitution::Substituted {
        n_replaced: infeasible.len(),
    })
}
