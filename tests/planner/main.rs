#![allow(clippy::cast_precision_loss)]

mod categorical;
mod config;
mod continuous;
mod initial_design;
mod multi_objective;
#[cfg(feature = "serde")]
mod persistence;

use bayes_planner::optimizer::GradientOptimizer;
use bayes_planner::prelude::*;

/// A small optimizer so end-to-end runs stay quick.
fn small_optimizer() -> GradientOptimizer {
    GradientOptimizer::default()
        .n_raw_samples(64)
        .n_restarts(2)
        .max_iters(10)
}

/// Asks and evaluates until `budget` observations are recorded.
///
/// `evaluate` returns `None` for a failed experiment.
fn run_to_budget<F>(planner: &mut Planner, budget: usize, mut evaluate: F) -> History
where
    F: FnMut(&ParamVector) -> Option<Vec<f64>>,
{
    let mut history = History::new();
    while history.len() < budget {
        let batch = planner.ask(&history).unwrap();
        assert_eq!(batch.len(), planner.config().batch_size);
        for params in batch {
            if history.len() == budget {
                break;
            }
            match evaluate(&params) {
                Some(values) => history.add_observation(Observation::multi(params, values)),
                None => history.add_observation(Observation::missing(params)),
            }
        }
        check_training_rows(planner, &history);
    }
    history
}

/// Row-count invariants of the last surrogate step.
fn check_training_rows(planner: &Planner, history: &History) {
    let Some(report) = planner.last_report() else {
        return;
    };
    if report.phase != Phase::SurrogateProposal {
        return;
    }
    let sets = planner.training_sets().unwrap();
    assert_eq!(sets.x_cla.len(), report.n_observations);
    assert_eq!(sets.y_cla.len(), report.n_observations);
    assert!(sets.x_reg.len() <= sets.x_cla.len());
    assert_eq!(sets.x_reg.len(), sets.y_reg.len());
    assert!(report.n_observations <= history.len());
}
