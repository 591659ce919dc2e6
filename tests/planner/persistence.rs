use bayes_planner::prelude::*;

use crate::{run_to_budget, small_optimizer};

fn tempdir() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir =
        std::env::temp_dir().join(format!("bayes_planner_test_{}_{id}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn config_loads_from_json_with_defaults() {
    let json = r#"{
        "goal": "max",
        "feas_strategy": "fca",
        "feas_param": 0.8,
        "batch_size": 2,
        "acquisition_type": "ucb",
        "acquisition_optimizer_kind": "genetic"
    }"#;
    let config: PlannerConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.goal, Direction::Maximize);
    assert_eq!(config.feas_strategy, FeasibilityStrategy::Fca);
    assert_eq!(config.batch_size, 2);
    assert_eq!(config.acquisition_type, AcquisitionKind::Ucb);
    assert_eq!(
        config.acquisition_optimizer_kind,
        AcquisitionOptimizerKind::Genetic
    );
    assert_eq!(config.num_init_design, 5);
    config.validate().unwrap();
}

#[test]
fn unknown_strategy_names_fail_to_load() {
    let json = r#"{ "feas_strategy": "naive-mean" }"#;
    assert!(serde_json::from_str::<PlannerConfig>(json).is_err());
}

#[test]
fn config_survives_a_json_round_trip() {
    let config = PlannerConfig {
        feas_strategy: FeasibilityStrategy::Naive(NaiveStrategy::Replace),
        random_seed: Some(9),
        general_parameters: vec![0, 2],
        acquisition_type: AcquisitionKind::General,
        multi_objective: Some(MultiObjectiveConfig {
            goals: vec![Direction::Minimize, Direction::Maximize],
            scalarizer: ScalarizerKind::WeightedSum,
            weights: vec![0.3, 0.7],
        }),
        ..PlannerConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"naive-replace\""));
    let back: PlannerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn meta_model_is_saved_then_restored_from_model_path() {
    let path = tempdir().join("meta.json");
    let space = ParameterSpace::new(vec![
        Parameter::continuous("x", 0.0, 1.0),
        Parameter::continuous("y", 0.0, 1.0),
    ])
    .unwrap();
    let task = |shift: f64| {
        let params: Vec<Vec<f64>> = (0..8_u8)
            .map(|i| {
                let t = f64::from(i) / 7.0;
                vec![t, 1.0 - t]
            })
            .collect();
        let values = params.iter().map(|r| (r[0] - 0.4 - shift).powi(2)).collect();
        SourceTask::single(params, values).unwrap()
    };
    let evaluate = |p: &ParamVector| Some(vec![(p[0].as_f64().unwrap() - 0.4).powi(2)]);

    let mut meta = MetaLearningConfig::new(vec![task(0.0), task(0.2)], vec![task(0.1)]);
    meta.model_path = Some(path.clone());
    let mut first = Planner::builder()
        .meta_learning(meta)
        .num_init_design(3)
        .random_seed(6)
        .num_acqf_samples(100)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    first.set_param_space(&space).unwrap();
    run_to_budget(&mut first, 4, evaluate);
    assert!(path.exists());
    let trained = first.meta_model().unwrap().clone();

    // JSON keeps the hyperparameters up to float formatting.
    let restored = MetaGp::load(&path).unwrap();
    assert_eq!(restored.n_tasks(), trained.n_tasks());
    assert!((restored.train_lml() - trained.train_lml()).abs() < 1e-9);

    let mut from_disk = MetaLearningConfig::default();
    from_disk.model_path = Some(path.clone());
    let mut second = Planner::builder()
        .meta_learning(from_disk)
        .num_init_design(3)
        .random_seed(7)
        .num_acqf_samples(100)
        .acquisition_optimizer(small_optimizer())
        .build()
        .unwrap();
    second.set_param_space(&space).unwrap();
    assert!(second.prepared_source().is_none());
    run_to_budget(&mut second, 4, evaluate);
    let reloaded = second.meta_model().unwrap();
    assert_eq!(reloaded.n_tasks(), 2);
    assert!((reloaded.train_lml() - trained.train_lml()).abs() < 1e-9);
}
