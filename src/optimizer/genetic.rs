//! Elitist genetic algorithm over parameter vectors.
//!
//! Continuous parameters recombine with simulated binary crossover (SBX)
//! and mutate with polynomial mutation; discrete parameters do the same in
//! value space and snap to the nearest option; categorical parameters use
//! uniform crossover and uniform resampling.

use super::{AcquisitionOptimizer, AcquisitionProblem, Candidate, assemble_batch};
use crate::error::Result;
use crate::param::{ParamValue, ParamVector};
use crate::parameter::{Parameter, ParameterKind};
use crate::rng_util;

/// Genetic acquisition optimizer.
///
/// # Examples
///
/// ```
/// use bayes_planner::optimizer::GeneticOptimizer;
///
/// let optimizer = GeneticOptimizer::default()
///     .population_size(32)
///     .generations(10);
/// # let _ = optimizer;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GeneticOptimizer {
    population_size: usize,
    generations: usize,
    crossover_prob: f64,
    crossover_eta: f64,
    mutation_eta: f64,
}

impl Default for GeneticOptimizer {
    fn default() -> Self {
        Self {
            population_size: 64,
            generations: 25,
            crossover_prob: 0.9,
            crossover_eta: 15.0,
            mutation_eta: 20.0,
        }
    }
}

impl GeneticOptimizer {
    /// Sets the population size (at least 4).
    #[must_use]
    pub fn population_size(mut self, n: usize) -> Self {
        self.population_size = n.max(4);
        self
    }

    /// Sets the number of generations.
    #[must_use]
    pub fn generations(mut self, n: usize) -> Self {
        self.generations = n;
        self
    }

    /// Sets the crossover probability.
    #[must_use]
    pub fn crossover_prob(mut self, p: f64) -> Self {
        self.crossover_prob = p.clamp(0.0, 1.0);
        self
    }

    fn offspring(
        &self,
        problem: &AcquisitionProblem<'_>,
        population: &[Candidate],
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<Candidate>> {
        let params = problem.encoder.space().parameters();
        let mut children = Vec::with_capacity(population.len());
        while children.len() < population.len() {
            let p1 = tournament(population, rng);
            let p2 = tournament(population, rng);
            let (mut c1, mut c2) = crossover(
                rng,
                &p1.params,
                &p2.params,
                params,
                self.crossover_prob,
                self.crossover_eta,
            );
            mutate(rng, &mut c1, params, self.mutation_eta);
            mutate(rng, &mut c2, params, self.mutation_eta);
            for child in [c1, c2] {
                let child = if problem.is_admissible(&child) {
                    child
                } else {
                    problem.sample_admissible(rng)?
                };
                children.push(problem.score(child)?);
            }
        }
        children.truncate(population.len());
        Ok(children)
    }
}

impl AcquisitionOptimizer for GeneticOptimizer {
    fn optimize(
        &self,
        problem: &AcquisitionProblem<'_>,
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<ParamVector>> {
        let size = self.population_size.max(problem.batch_size);
        let mut population = Vec::with_capacity(size);
        for _ in 0..size {
            let params = problem.sample_admissible(rng)?;
            population.push(problem.score(params)?);
        }

        for _ in 0..self.generations {
            let children = self.offspring(problem, &population, rng)?;
            population.extend(children);
            population.sort_by(|a, b| b.value.total_cmp(&a.value));
            let mut survivors: Vec<Candidate> = Vec::with_capacity(size);
            for c in population {
                if survivors.len() == size {
                    break;
                }
                if !survivors.iter().any(|s| s.params == c.params) {
                    survivors.push(c);
                }
            }
            while survivors.len() < size {
                let params = problem.sample_admissible(rng)?;
                survivors.push(problem.score(params)?);
            }
            population = survivors;
            trace_debug!(
                best = population[0].value,
                "genetic optimizer generation"
            );
        }

        assemble_batch(problem, population, rng)
    }
}

/// Binary tournament on the acquisition value.
fn tournament<'p>(population: &'p [Candidate], rng: &mut fastrand::Rng) -> &'p Candidate {
    let a = &population[rng.usize(0..population.len())];
    let b = &population[rng.usize(0..population.len())];
    if a.value >= b.value { a } else { b }
}

// ---------------------------------------------------------------------------
// Genetic operators
// ---------------------------------------------------------------------------

fn snap(options: &[f64], value: f64) -> f64 {
    options
        .iter()
        .copied()
        .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
        .unwrap_or(value)
}

/// SBX crossover for numeric parameters, uniform crossover for categorical.
fn crossover(
    rng: &mut fastrand::Rng,
    parent1: &ParamVector,
    parent2: &ParamVector,
    params: &[Parameter],
    crossover_prob: f64,
    eta: f64,
) -> (ParamVector, ParamVector) {
    let mut child1 = parent1.clone();
    let mut child2 = parent2.clone();
    if rng.f64() > crossover_prob {
        return (child1, child2);
    }

    for (i, param) in params.iter().enumerate() {
        match (parent1[i], parent2[i], &param.kind) {
            (ParamValue::Float(p1), ParamValue::Float(p2), ParameterKind::Continuous { low, high }) => {
                if (p1 - p2).abs() < 1e-14 {
                    continue;
                }
                let (c1, c2) = sbx_crossover_f64(rng, p1, p2, *low, *high, eta);
                child1.values_mut()[i] = ParamValue::Float(c1);
                child2.values_mut()[i] = ParamValue::Float(c2);
            }
            (ParamValue::Float(p1), ParamValue::Float(p2), ParameterKind::Discrete { options }) => {
                if (p1 - p2).abs() < 1e-14 {
                    continue;
                }
                let (low, high) = param.bounds().unwrap_or((p1.min(p2), p1.max(p2)));
                let (c1, c2) = sbx_crossover_f64(rng, p1, p2, low, high, eta);
                child1.values_mut()[i] = ParamValue::Float(snap(options, c1));
                child2.values_mut()[i] = ParamValue::Float(snap(options, c2));
            }
            (ParamValue::Categorical(_), ParamValue::Categorical(_), _) => {
                if rng.bool() {
                    let (a, b) = (child1[i], child2[i]);
                    child1.values_mut()[i] = b;
                    child2.values_mut()[i] = a;
                }
            }
            _ => {}
        }
    }

    (child1, child2)
}

/// SBX crossover for a single numeric dimension.
fn sbx_crossover_f64(
    rng: &mut fastrand::Rng,
    p1: f64,
    p2: f64,
    low: f64,
    high: f64,
    eta: f64,
) -> (f64, f64) {
    let u = rng.f64();

    let beta = if u <= 0.5 {
        (2.0 * u).powf(1.0 / (eta + 1.0))
    } else {
        (1.0 / (2.0 * (1.0 - u))).powf(1.0 / (eta + 1.0))
    };

    let c1 = 0.5 * ((1.0 + beta) * p1 + (1.0 - beta) * p2);
    let c2 = 0.5 * ((1.0 - beta) * p1 + (1.0 + beta) * p2);

    (c1.clamp(low, high), c2.clamp(low, high))
}

/// Polynomial mutation, each parameter with probability `1 / n`.
#[allow(clippy::cast_precision_loss)]
fn mutate(rng: &mut fastrand::Rng, individual: &mut ParamVector, params: &[Parameter], eta: f64) {
    let n = individual.len();
    if n == 0 {
        return;
    }
    let mutation_prob = 1.0 / n as f64;

    for (value, param) in individual.values_mut().iter_mut().zip(params) {
        if rng.f64() >= mutation_prob {
            continue;
        }
        *value = match (*value, &param.kind) {
            (ParamValue::Float(x), ParameterKind::Continuous { low, high }) => {
                ParamValue::Float(polynomial_mutation_f64(rng, x, *low, *high, eta))
            }
            (ParamValue::Float(x), ParameterKind::Discrete { options }) => {
                let (low, high) = param.bounds().unwrap_or((x, x));
                ParamValue::Float(snap(options, polynomial_mutation_f64(rng, x, low, high, eta)))
            }
            (ParamValue::Categorical(_), ParameterKind::Categorical { options, .. }) => {
                ParamValue::Categorical(rng.usize(0..options.len()))
            }
            (other, _) => other,
        };
    }
}

/// Polynomial mutation for a single numeric value.
fn polynomial_mutation_f64(rng: &mut fastrand::Rng, x: f64, low: f64, high: f64, eta: f64) -> f64 {
    let u = rng_util::f64_range(rng, 0.0, 1.0);
    let range = high - low;
    if range <= 0.0 {
        return x;
    }

    let delta1 = (x - low) / range;
    let delta2 = (high - x) / range;

    let delta_q = if u < 0.5 {
        let xy = 1.0 - delta1;
        let val = 2.0 * u + (1.0 - 2.0 * u) * xy.powf(eta + 1.0);
        val.powf(1.0 / (eta + 1.0)) - 1.0
    } else {
        let xy = 1.0 - delta2;
        let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * xy.powf(eta + 1.0);
        1.0 - val.powf(1.0 / (eta + 1.0))
    };

    (x + delta_q * range).clamp(low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{BaseAcquisition, FeasibilityAwareAcquisition};
    use crate::encoding::Encoder;
    use crate::feasibility::{FeasibilityStrategy, NaiveStrategy};
    use crate::parameter::ParameterSpace;
    use crate::surrogate::{Prediction, RegressionModel};

    struct Ridge;

    impl RegressionModel for Ridge {
        fn predict(&self, x: &[f64]) -> Prediction {
            Prediction {
                mean: (x[0] - 0.7).abs() + (x[1] - 0.25).abs(),
                variance: 1e-6,
            }
        }

        fn n_features(&self) -> usize {
            2
        }
    }

    #[test]
    fn operators_stay_admissible() {
        let space = ParameterSpace::new(vec![
            Parameter::continuous("x", -2.0, 2.0),
            Parameter::discrete("d", vec![1.0, 4.0, 9.0]),
            Parameter::categorical("k", ["a", "b"]),
        ])
        .unwrap();
        let mut rng = fastrand::Rng::with_seed(11);
        for _ in 0..200 {
            let a = space.sample(&mut rng);
            let b = space.sample(&mut rng);
            let (mut c1, c2) = crossover(&mut rng, &a, &b, space.parameters(), 1.0, 15.0);
            mutate(&mut rng, &mut c1, space.parameters(), 20.0);
            space.check_vector(&c1).unwrap();
            space.check_vector(&c2).unwrap();
        }
    }

    #[test]
    fn polynomial_mutation_respects_bounds() {
        let mut rng = fastrand::Rng::with_seed(2);
        for _ in 0..500 {
            let y = polynomial_mutation_f64(&mut rng, 0.99, 0.0, 1.0, 20.0);
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn converges_towards_the_ridge_minimum() {
        let space = ParameterSpace::new(vec![
            Parameter::continuous("x", 0.0, 1.0),
            Parameter::discrete("d", vec![0.0, 0.25, 0.5, 0.75, 1.0]),
        ])
        .unwrap();
        let enc = Encoder::new(&space, false);
        let model = Ridge;
        let acq = FeasibilityAwareAcquisition::new(
            &model,
            None,
            BaseAcquisition::UpperConfidenceBound { beta: 0.0 },
            FeasibilityStrategy::Naive(NaiveStrategy::Zero),
            0.0,
            0.0,
            (-2.0, 0.0),
            false,
        );
        let problem = AcquisitionProblem {
            acquisition: &acq,
            encoder: &enc,
            known_constraints: &[],
            batch_size: 2,
        };
        let mut rng = fastrand::Rng::with_seed(5);
        let batch = GeneticOptimizer::default().optimize(&problem, &mut rng).unwrap();
        assert_eq!(batch.len(), 2);
        assert_ne!(batch[0], batch[1]);
        let x = batch[0][0].as_f64().unwrap();
        assert!((x - 0.7).abs() < 0.1, "x = {x}");
        assert_eq!(batch[0][1], ParamValue::Float(0.25));
    }
}
