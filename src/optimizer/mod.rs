//! Optimizers that turn a [`FeasibilityAwareAcquisition`] into a batch of
//! parameter vectors.
//!
//! Both built-in optimizers work on decoded [`ParamVector`]s and score
//! them through the encoder, so every proposal is admissible by
//! construction. Known constraints are hard: a vector rejected by any of
//! them is never scored.
//!
//! Batch assembly is shared:
//!
//! - joint batches (batch expected improvement) grow greedily, each slot
//!   maximizing the joint value of the batch so far;
//! - otherwise the best distinct candidates are taken.
//!
//! Either way only candidates that satisfy the strategy's feasibility
//! constraint compete on value; missing slots fall back to the highest
//! probability of feasibility.

pub mod genetic;
pub mod gradient;

use core::fmt;
use core::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub use self::genetic::GeneticOptimizer;
pub use self::gradient::GradientOptimizer;
use crate::acquisition::FeasibilityAwareAcquisition;
use crate::encoding::Encoder;
use crate::error::{Error, Result};
use crate::param::ParamVector;

/// Attempts per sample before giving up on the known constraints.
const MAX_REJECTIONS: usize = 1000;

/// Candidates considered per slot when growing a joint batch.
const JOINT_POOL: usize = 64;

/// Joint-batch points closer than this in every feature are treated as one.
const NEAR_DUPLICATE_TOL: f64 = 1e-3;

/// A user predicate; `false` marks a parameter vector as inadmissible.
pub type KnownConstraint = Arc<dyn Fn(&ParamVector) -> bool + Send + Sync>;

/// Built-in acquisition optimizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AcquisitionOptimizerKind {
    /// Multi-start local ascent.
    #[default]
    Gradient,
    /// Genetic algorithm.
    Genetic,
}

impl AcquisitionOptimizerKind {
    /// Instantiates the optimizer with its default settings.
    #[must_use]
    pub fn build(self) -> Box<dyn AcquisitionOptimizer> {
        match self {
            Self::Gradient => Box::new(GradientOptimizer::default()),
            Self::Genetic => Box::new(GeneticOptimizer::default()),
        }
    }
}

impl FromStr for AcquisitionOptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gradient" => Ok(Self::Gradient),
            "genetic" => Ok(Self::Genetic),
            other => Err(Error::UnknownOptimizer(other.to_string())),
        }
    }
}

impl fmt::Display for AcquisitionOptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gradient => "gradient",
            Self::Genetic => "genetic",
        })
    }
}

/// Everything an optimizer needs for one planning step.
pub struct AcquisitionProblem<'a> {
    /// The composite acquisition to maximize.
    pub acquisition: &'a FeasibilityAwareAcquisition<'a>,
    /// Encoder of the current parameter space.
    pub encoder: &'a Encoder,
    /// Hard constraints on proposals.
    pub known_constraints: &'a [KnownConstraint],
    /// Number of vectors to return.
    pub batch_size: usize,
}

impl fmt::Debug for AcquisitionProblem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionProblem")
            .field("acquisition", self.acquisition)
            .field("n_known_constraints", &self.known_constraints.len())
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl AcquisitionProblem<'_> {
    /// Returns `true` if every known constraint accepts `params`.
    #[must_use]
    pub fn is_admissible(&self, params: &ParamVector) -> bool {
        self.known_constraints.iter().all(|c| c(params))
    }

    /// Draws a random vector accepted by every known constraint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFeasibleCandidates`] if no admissible vector is
    /// found within a fixed number of attempts.
    pub fn sample_admissible(&self, rng: &mut fastrand::Rng) -> Result<ParamVector> {
        for _ in 0..MAX_REJECTIONS {
            let params = self.encoder.space().sample(rng);
            if self.is_admissible(&params) {
                return Ok(params);
            }
        }
        Err(Error::NoFeasibleCandidates)
    }

    /// Scores a vector.
    ///
    /// # Errors
    ///
    /// Propagates encoding errors.
    pub fn score(&self, params: ParamVector) -> Result<Candidate> {
        let features = self.encoder.encode(&params)?;
        let value = self.acquisition.evaluate(&features);
        let p_feas = self.acquisition.prob_feasible(&features);
        let satisfies = self.acquisition.satisfies_constraint(&features);
        Ok(Candidate {
            params,
            features,
            value,
            p_feas,
            satisfies,
        })
    }
}

/// A scored parameter vector.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// The parameter vector.
    pub params: ParamVector,
    /// Its encoded features.
    pub features: Vec<f64>,
    /// Composite acquisition value.
    pub value: f64,
    /// Probability of feasibility.
    pub p_feas: f64,
    /// Whether the strategy's feasibility constraint holds.
    pub satisfies: bool,
}

/// Maximizes an acquisition over the parameter space.
pub trait AcquisitionOptimizer: Send + Sync {
    /// Returns exactly `problem.batch_size` admissible vectors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFeasibleCandidates`] when the known constraints
    /// reject every sample, and propagates acquisition errors.
    fn optimize(
        &self,
        problem: &AcquisitionProblem<'_>,
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<ParamVector>>;
}

/// Assembles the batch from a pool of scored candidates.
///
/// The result always holds `problem.batch_size` vectors; missing slots are
/// filled with random admissible samples.
pub(crate) fn assemble_batch(
    problem: &AcquisitionProblem<'_>,
    mut pool: Vec<Candidate>,
    rng: &mut fastrand::Rng,
) -> Result<Vec<ParamVector>> {
    pool.sort_by(|a, b| b.value.total_cmp(&a.value));
    dedup_params(&mut pool);

    let mut batch = if problem.acquisition.is_joint_batch() {
        greedy_joint_batch(problem, pool)?
    } else {
        select_batch(pool, problem.batch_size)
    };

    while batch.len() < problem.batch_size {
        batch.push(problem.sample_admissible(rng)?);
    }
    Ok(batch)
}

fn dedup_params(pool: &mut Vec<Candidate>) {
    let mut kept: Vec<Candidate> = Vec::with_capacity(pool.len());
    for c in pool.drain(..) {
        if !kept.iter().any(|k| k.params == c.params) {
            kept.push(c);
        }
    }
    *pool = kept;
}

/// Takes the best candidates meeting the feasibility constraint, then the
/// remaining ones by probability of feasibility.
///
/// `pool` must be sorted by descending value and free of duplicates.
pub(crate) fn select_batch(pool: Vec<Candidate>, batch_size: usize) -> Vec<ParamVector> {
    let (satisfying, mut rest): (Vec<Candidate>, Vec<Candidate>) =
        pool.into_iter().partition(|c| c.satisfies);
    let mut batch: Vec<ParamVector> = satisfying
        .into_iter()
        .take(batch_size)
        .map(|c| c.params)
        .collect();
    if batch.len() < batch_size {
        trace_debug!(
            n_satisfying = batch.len(),
            batch_size,
            "falling back to candidates with the highest feasibility"
        );
        rest.sort_by(|a, b| b.p_feas.total_cmp(&a.p_feas));
        batch.extend(
            rest.into_iter()
                .take(batch_size - batch.len())
                .map(|c| c.params),
        );
    }
    batch
}

/// Grows a batch slot by slot, each time adding the constraint-satisfying
/// candidate that maximizes the joint value; then fills up by probability
/// of feasibility.
///
/// Candidates within [`NEAR_DUPLICATE_TOL`] of a chosen point are skipped.
fn greedy_joint_batch(
    problem: &AcquisitionProblem<'_>,
    pool: Vec<Candidate>,
) -> Result<Vec<ParamVector>> {
    let (mut satisfying, mut rest): (Vec<Candidate>, Vec<Candidate>) =
        pool.into_iter().partition(|c| c.satisfies);
    satisfying.truncate(JOINT_POOL);
    let mut batch: Vec<ParamVector> = Vec::with_capacity(problem.batch_size);
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(problem.batch_size);

    while batch.len() < problem.batch_size {
        let mut best: Option<(usize, f64)> = None;
        for (i, c) in satisfying.iter().enumerate() {
            if is_near_any(&c.features, &rows) {
                continue;
            }
            rows.push(c.features.clone());
            let value = problem.acquisition.evaluate_batch(&rows)?;
            rows.pop();
            if best.is_none_or(|(_, v)| value > v) {
                best = Some((i, value));
            }
        }
        let Some((i, _)) = best else { break };
        let c = satisfying.swap_remove(i);
        rows.push(c.features);
        batch.push(c.params);
    }

    if batch.len() < problem.batch_size {
        trace_debug!(
            n_satisfying = batch.len(),
            batch_size = problem.batch_size,
            "joint batch falling back to candidates with the highest feasibility"
        );
        rest.sort_by(|a, b| b.p_feas.total_cmp(&a.p_feas));
        for c in rest {
            if batch.len() == problem.batch_size {
                break;
            }
            if is_near_any(&c.features, &rows) {
                continue;
            }
            rows.push(c.features);
            batch.push(c.params);
        }
    }
    Ok(batch)
}

fn is_near_any(features: &[f64], rows: &[Vec<f64>]) -> bool {
    rows.iter().any(|row| {
        row.iter()
            .zip(features)
            .all(|(a, b)| (a - b).abs() < NEAR_DUPLICATE_TOL)
    })
}
