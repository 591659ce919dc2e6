use bayes_planner::prelude::*;

use crate::{run_to_budget, small_optimizer};

const D1: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];
const D2: [f64; 4] = [1.0, 2.0, 3.0, 4.0];

fn space() -> ParameterSpace {
    ParameterSpace::new(vec![
        Parameter::discrete("d1", D1.to_vec()),
        Parameter::discrete("d2", D2.to_vec()),
        Parameter::categorical("k", ["a", "b", "c"]),
    ])
    .unwrap()
}

/// Objective 0 is minimized, objective 1 maximized.
fn objectives(d1: f64, d2: f64, k: usize, shift: f64) -> [f64; 2] {
    let penalty = if k == 1 { 0.0 } else { 0.3 };
    [(d1 - 0.5 - shift).powi(2) + penalty, d2 * (1.0 - d1)]
}

fn evaluate(params: &ParamVector) -> Option<Vec<f64>> {
    let d1 = params[0].as_f64().unwrap();
    let d2 = params[1].as_f64().unwrap();
    let k = params[2].as_index().unwrap();
    if k == 2 && d2 > 3.5 {
        return None;
    }
    Some(objectives(d1, d2, k, 0.0).to_vec())
}

/// A source task on the target's feature layout: `[d1, d2, one-hot k]`.
///
/// Row 0 is best on both objectives.
fn source_task(shift: f64, seed: u64) -> SourceTask {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut params = vec![vec![0.5 + shift, 1.0, 0.0, 1.0, 0.0]];
    let mut values = vec![vec![-1.0, 10.0]];
    for _ in 0..7 {
        let d1 = D1[rng.usize(..D1.len())];
        let d2 = D2[rng.usize(..D2.len())];
        let k = rng.usize(..3);
        let mut row = vec![d1, (d2 - 1.0) / 3.0, 0.0, 0.0, 0.0];
        row[2 + k] = 1.0;
        params.push(row);
        values.push(objectives(d1, d2, k, shift).to_vec());
    }
    SourceTask::new(params, values).unwrap()
}

fn goals() -> MultiObjectiveConfig {
    MultiObjectiveConfig {
        goals: vec![Direction::Minimize, Direction::Maximize],
        scalarizer: ScalarizerKind::Hypervolume,
        weights: Vec::new(),
    }
}

fn meta_planner() -> Planner {
    let meta = MetaLearningConfig::new(
        vec![source_task(0.0, 1), source_task(0.1, 2)],
        vec![source_task(-0.1, 3)],
    );
    let mut planner = Planner::builder()
        .multi_objective(goals())
        .meta_learning(meta)
        .feasibility(FeasibilityStrategy::Fwa, 0.0)
        .num_init_design(5)
        .random_seed(31)
        .num_acqf_samples(100)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();
    planner
}

#[test]
fn mixed_space_with_meta_learning_runs_to_budget() {
    let mut planner = meta_planner();
    assert_eq!(planner.problem_type(), Some(ProblemType::MixedCatDisc));
    assert!(planner.meta_model().is_none());

    let history = run_to_budget(&mut planner, 10, evaluate);
    assert_eq!(history.len(), 10);
    assert!(history.iter().all(|o| o.is_missing() || o.values.len() == 2));

    let meta = planner.meta_model().unwrap();
    assert_eq!(meta.n_tasks(), 2);
    assert!(meta.valid_lml().is_some());
    assert!(planner.last_report().unwrap().meta_conditioned);
}

#[test]
fn source_and_target_values_are_scalarized_alike() {
    let mut planner = meta_planner();
    let prepared = planner.prepared_source().unwrap();
    assert_eq!(prepared.train.len(), 2);
    assert_eq!(prepared.valid.len(), 1);
    for (x, y) in prepared.train.iter().chain(&prepared.valid) {
        assert_eq!(x.len(), y.len());
        assert!(x.iter().all(|row| row.len() == 5));
        // The dominating row has the lowest merit.
        let lowest = y.iter().copied().fold(f64::INFINITY, f64::min);
        assert!((y[0] - lowest).abs() < f64::EPSILON);
    }

    // The same holds for the target's training set.
    let mut history = History::new();
    let dominating = ParamVector::new(vec![
        ParamValue::Float(0.5),
        ParamValue::Float(4.0),
        ParamValue::Categorical(1),
    ]);
    history.add_observation(Observation::multi(dominating, vec![0.0, 5.0]));
    for (d1, d2, k) in [(0.0, 1.0, 0), (1.0, 2.0, 2), (0.25, 3.0, 1), (0.75, 1.0, 0)] {
        let params = ParamVector::new(vec![
            ParamValue::Float(d1),
            ParamValue::Float(d2),
            ParamValue::Categorical(k),
        ]);
        let values = evaluate(&params).unwrap();
        history.add_observation(Observation::multi(params, values));
    }
    planner.ask(&history).unwrap();
    let sets = planner.training_sets().unwrap();
    assert_eq!(sets.incumbent(), Some(sets.y_reg[0]));
}

#[test]
fn maximized_source_values_are_sign_flipped() {
    let task = SourceTask::single(
        vec![vec![0.0], vec![0.5], vec![1.0]],
        vec![1.0, 2.0, 3.0],
    )
    .unwrap();
    let planner = Planner::builder()
        .maximize()
        .meta_learning(MetaLearningConfig::new(vec![task], Vec::new()))
        .build()
        .unwrap();
    let (_, y) = &planner.prepared_source().unwrap().train[0];
    // The largest raw value becomes the lowest target.
    assert!(y[2] < y[1] && y[1] < y[0]);
}

#[test]
fn pretrained_meta_models_skip_training() {
    let mut trained = meta_planner();
    run_to_budget(&mut trained, 6, evaluate);
    let model = trained.meta_model().unwrap().clone();

    let mut planner = Planner::builder()
        .multi_objective(goals())
        .meta_learning(MetaLearningConfig::pretrained(model.clone()))
        .num_init_design(5)
        .random_seed(32)
        .num_acqf_samples(100)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();
    assert!(planner.prepared_source().is_none());
    assert_eq!(planner.meta_model(), Some(&model));

    run_to_budget(&mut planner, 6, evaluate);
    assert_eq!(planner.meta_model(), Some(&model));
    assert!(planner.last_report().unwrap().meta_conditioned);
}

#[test]
fn weighted_sum_needs_matching_weights() {
    let config = MultiObjectiveConfig {
        scalarizer: ScalarizerKind::WeightedSum,
        weights: vec![1.0, 2.0, 3.0],
        ..goals()
    };
    assert!(matches!(
        Planner::builder().multi_objective(config).build(),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn single_objective_rows_are_rejected_in_multi_objective_mode() {
    let mut planner = Planner::builder()
        .multi_objective(goals())
        .num_init_design(1)
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();
    let mut history = History::new();
    history.push(
        ParamVector::new(vec![
            ParamValue::Float(0.5),
            ParamValue::Float(2.0),
            ParamValue::Categorical(0),
        ]),
        1.0,
    );
    assert!(matches!(
        planner.ask(&history),
        Err(Error::ObjectiveDimensionMismatch { .. })
    ));
}
