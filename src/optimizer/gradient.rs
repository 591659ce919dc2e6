//! Multi-start local ascent on the acquisition.
//!
//! A pool of random admissible vectors is scored; the best of them seed
//! local searches that alternate projected finite-difference ascent over
//! the continuous parameters with a neighbourhood search over discrete and
//! categorical ones.

use super::{AcquisitionOptimizer, AcquisitionProblem, Candidate, assemble_batch};
use crate::error::Result;
use crate::param::{ParamValue, ParamVector};
use crate::parameter::ParameterKind;

/// Finite-difference step in normalized units.
const FD_STEP: f64 = 1e-4;
/// Line-search steps below this end the continuous ascent.
const MIN_STEP: f64 = 1e-4;
/// Largest number of alternative options tried per categorical parameter.
const MAX_CATEGORICAL_MOVES: usize = 32;

/// Multi-start projected ascent with discrete neighbourhood moves.
///
/// # Examples
///
/// ```
/// use bayes_planner::optimizer::GradientOptimizer;
///
/// let optimizer = GradientOptimizer::default().n_raw_samples(256).n_restarts(4);
/// # let _ = optimizer;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GradientOptimizer {
    n_raw_samples: usize,
    n_restarts: usize,
    max_iters: usize,
    initial_step: f64,
}

impl Default for GradientOptimizer {
    fn default() -> Self {
        Self {
            n_raw_samples: 512,
            n_restarts: 8,
            max_iters: 30,
            initial_step: 0.1,
        }
    }
}

impl GradientOptimizer {
    /// Sets the number of random vectors scored before the local searches.
    #[must_use]
    pub fn n_raw_samples(mut self, n: usize) -> Self {
        self.n_raw_samples = n.max(1);
        self
    }

    /// Sets the number of local searches.
    #[must_use]
    pub fn n_restarts(mut self, n: usize) -> Self {
        self.n_restarts = n;
        self
    }

    /// Sets the iteration limit of each local search.
    #[must_use]
    pub fn max_iters(mut self, n: usize) -> Self {
        self.max_iters = n;
        self
    }

    fn refine(
        &self,
        problem: &AcquisitionProblem<'_>,
        start: Candidate,
        rng: &mut fastrand::Rng,
    ) -> Result<Candidate> {
        let continuous: Vec<(usize, f64, f64)> = problem
            .encoder
            .space()
            .iter()
            .enumerate()
            .filter_map(|(i, p)| match p.kind {
                ParameterKind::Continuous { low, high } => Some((i, low, high)),
                _ => None,
            })
            .collect();

        let mut current = start;
        let mut step = self.initial_step;
        for _ in 0..self.max_iters {
            let mut improved = false;

            if !continuous.is_empty() && step >= MIN_STEP {
                if let Some(next) = ascend(problem, &current, &continuous, step)? {
                    current = next;
                    improved = true;
                } else {
                    step *= 0.5;
                }
            }

            if let Some(next) = best_neighbour(problem, &current, rng)? {
                current = next;
                improved = true;
            }

            if !improved && (continuous.is_empty() || step < MIN_STEP) {
                break;
            }
        }
        Ok(current)
    }
}

impl AcquisitionOptimizer for GradientOptimizer {
    fn optimize(
        &self,
        problem: &AcquisitionProblem<'_>,
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<ParamVector>> {
        let mut pool = Vec::with_capacity(self.n_raw_samples + self.n_restarts);
        for _ in 0..self.n_raw_samples {
            let params = problem.sample_admissible(rng)?;
            pool.push(problem.score(params)?);
        }
        pool.sort_by(|a, b| b.value.total_cmp(&a.value));

        let starts: Vec<Candidate> = pool.iter().take(self.n_restarts).cloned().collect();
        for start in starts {
            let refined = self.refine(problem, start, rng)?;
            pool.push(refined);
        }

        trace_debug!(
            n_candidates = pool.len(),
            best = pool.iter().map(|c| c.value).fold(f64::NEG_INFINITY, f64::max),
            "gradient optimizer finished"
        );
        assemble_batch(problem, pool, rng)
    }
}

fn with_value(params: &ParamVector, index: usize, value: ParamValue) -> ParamVector {
    let mut next = params.clone();
    next.values_mut()[index] = value;
    next
}

fn normalized(params: &ParamVector, index: usize, low: f64, high: f64) -> f64 {
    let x = params[index].as_f64().unwrap_or(low);
    ((x - low) / (high - low)).clamp(0.0, 1.0)
}

fn acquisition_at(problem: &AcquisitionProblem<'_>, params: &ParamVector) -> Result<f64> {
    Ok(problem.acquisition.evaluate(&problem.encoder.encode(params)?))
}

/// One projected ascent step with a backtracking line search.
fn ascend(
    problem: &AcquisitionProblem<'_>,
    current: &Candidate,
    continuous: &[(usize, f64, f64)],
    step: f64,
) -> Result<Option<Candidate>> {
    let mut grad = Vec::with_capacity(continuous.len());
    for &(i, low, high) in continuous {
        let t = normalized(&current.params, i, low, high);
        let (t_lo, t_hi) = ((t - FD_STEP).max(0.0), (t + FD_STEP).min(1.0));
        let at = |t: f64| with_value(&current.params, i, ParamValue::Float(low + t * (high - low)));
        let f_hi = acquisition_at(problem, &at(t_hi))?;
        let f_lo = acquisition_at(problem, &at(t_lo))?;
        grad.push((f_hi - f_lo) / (t_hi - t_lo));
    }
    let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return Ok(None);
    }

    let mut trial_step = step;
    while trial_step >= MIN_STEP {
        let mut moved = current.params.clone();
        for (&(i, low, high), g) in continuous.iter().zip(&grad) {
            let t = normalized(&current.params, i, low, high);
            let t = (t + trial_step * g / norm).clamp(0.0, 1.0);
            moved.values_mut()[i] = ParamValue::Float(low + t * (high - low));
        }
        if problem.is_admissible(&moved) {
            let candidate = problem.score(moved)?;
            if candidate.value > current.value {
                return Ok(Some(candidate));
            }
        }
        trial_step *= 0.5;
    }
    Ok(None)
}

/// The best improving single-parameter move over discrete and categorical
/// parameters, if any.
fn best_neighbour(
    problem: &AcquisitionProblem<'_>,
    current: &Candidate,
    rng: &mut fastrand::Rng,
) -> Result<Option<Candidate>> {
    let mut best: Option<Candidate> = None;
    for (i, param) in problem.encoder.space().iter().enumerate() {
        let moves: Vec<ParamValue> = match &param.kind {
            ParameterKind::Continuous { .. } => continue,
            ParameterKind::Discrete { options } => {
                let x = current.params[i].as_f64().unwrap_or(options[0]);
                let mut sorted = options.clone();
                sorted.sort_by(f64::total_cmp);
                let pos = sorted.partition_point(|&o| o < x);
                [pos.checked_sub(1), Some(pos + 1)]
                    .into_iter()
                    .flatten()
                    .filter_map(|j| sorted.get(j).copied())
                    .filter(|&o| o != x)
                    .map(ParamValue::Float)
                    .collect()
            }
            ParameterKind::Categorical { options, .. } => {
                let own = current.params[i].as_index();
                let mut others: Vec<usize> =
                    (0..options.len()).filter(|&j| Some(j) != own).collect();
                if others.len() > MAX_CATEGORICAL_MOVES {
                    rng.shuffle(&mut others);
                    others.truncate(MAX_CATEGORICAL_MOVES);
                }
                others.into_iter().map(ParamValue::Categorical).collect()
            }
        };

        for value in moves {
            let moved = with_value(&current.params, i, value);
            if !problem.is_admissible(&moved) {
                continue;
            }
            let candidate = problem.score(moved)?;
            let threshold = best.as_ref().map_or(current.value, |b| b.value);
            if candidate.value > threshold {
                best = Some(candidate);
            }
        }
    }
    Ok(best)
}
