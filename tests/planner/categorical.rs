use bayes_planner::prelude::*;

use crate::{run_to_budget, small_optimizer};

const N_OPTIONS: u8 = 21;
const LABELS: [&str; 7] = [
    "naive-0_0",
    "fia_1000",
    "fwa_0",
    "fca_0.2",
    "fca_0.8",
    "fia_0.5",
    "fia_2.0",
];

fn grid_parameter(name: &str) -> Parameter {
    let options: Vec<String> = (0..N_OPTIONS).map(|i| format!("{name}{i}")).collect();
    let descriptors = (0..N_OPTIONS)
        .map(|i| {
            let t = f64::from(i) / f64::from(N_OPTIONS - 1);
            vec![t, t * t]
        })
        .collect();
    Parameter::categorical(name, options).with_descriptors(descriptors)
}

fn grid() -> ParameterSpace {
    ParameterSpace::new(vec![grid_parameter("x"), grid_parameter("y")]).unwrap()
}

/// Fails in the upper corner; otherwise a bowl centred on option (6, 14).
fn evaluate(params: &ParamVector) -> Option<Vec<f64>> {
    let x = params[0].as_index().unwrap() as f64;
    let y = params[1].as_index().unwrap() as f64;
    if x > 15.0 && y > 15.0 {
        return None;
    }
    Some(vec![(x - 6.0).powi(2) + (y - 14.0).powi(2)])
}

fn planner(label: &str, use_descriptors: bool, batch_size: usize) -> Planner {
    let (strategy, param) = parse_strategy_label(label).unwrap();
    let mut planner = Planner::builder()
        .feasibility(strategy, param)
        .use_descriptors(use_descriptors)
        .batch_size(batch_size)
        .num_init_design(5)
        .random_seed(100)
        .num_acqf_samples(100)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    planner.set_param_space(&grid()).unwrap();
    planner
}

#[test]
fn every_strategy_runs_to_budget() {
    for label in LABELS {
        for use_descriptors in [false, true] {
            for batch_size in [1, 2] {
                let mut p = planner(label, use_descriptors, batch_size);
                assert_eq!(p.problem_type(), Some(ProblemType::FullyCategorical));
                assert_eq!(p.has_descriptors(), use_descriptors);

                let budget = 5 + 4 * batch_size;
                let history = run_to_budget(&mut p, budget, evaluate);
                assert_eq!(history.len(), budget, "{label} descriptors={use_descriptors}");
                assert!(history.params().all(|v| grid().check_vector(v).is_ok()));

                // One more step trains on every observation of the campaign.
                p.ask(&history).unwrap();
                let sets = p.training_sets().unwrap();
                assert_eq!(sets.x_cla.len(), budget);
                assert_eq!(sets.y_cla.len(), budget);
            }
        }
    }
}

#[test]
fn categorical_batches_are_not_scored_jointly() {
    let mut p = planner("fwa_0", false, 2);
    run_to_budget(&mut p, 7, evaluate);
    let report = p.last_report().unwrap();
    assert_eq!(report.phase, Phase::SurrogateProposal);
    assert!(!report.joint_batch);
}

#[test]
fn classifier_is_only_fit_for_non_naive_strategies() {
    let mut naive = planner("naive-0_0", false, 1);
    run_to_budget(&mut naive, 7, evaluate);
    assert!(naive.surrogates().unwrap().classifier.is_none());

    let mut fwa = planner("fwa_0", false, 1);
    run_to_budget(&mut fwa, 7, evaluate);
    assert!(fwa.surrogates().unwrap().classifier.is_some());
}

#[test]
fn general_acquisition_averages_over_a_parameter() {
    let mut p = Planner::builder()
        .acquisition_type(AcquisitionKind::General)
        .general_parameters(vec![1])
        .feas_strategy(FeasibilityStrategy::Fwa)
        .num_init_design(4)
        .random_seed(12)
        .num_acqf_samples(50)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    p.set_param_space(&grid()).unwrap();
    let history = run_to_budget(&mut p, 6, evaluate);
    assert_eq!(history.len(), 6);
    let report = p.last_report().unwrap();
    assert_eq!(report.acquisition, Some(AcquisitionKind::General));
    assert_eq!(report.acquisition_range, Some((0.0, 1.0)));
}

#[test]
fn general_parameters_must_be_discrete_or_categorical() {
    let mut p = Planner::builder()
        .acquisition_type(AcquisitionKind::General)
        .general_parameters(vec![0])
        .build()
        .unwrap();
    let space = ParameterSpace::new(vec![Parameter::continuous("x", 0.0, 1.0)]).unwrap();
    assert!(matches!(
        p.set_param_space(&space),
        Err(Error::InvalidConfig(_))
    ));
}
