use bayes_planner::prelude::*;

#[test]
fn every_option_name_parses() {
    assert_eq!("ei".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::Ei);
    assert_eq!("ucb".parse::<AcquisitionKind>().unwrap(), AcquisitionKind::Ucb);
    assert_eq!(
        "variance".parse::<AcquisitionKind>().unwrap(),
        AcquisitionKind::Variance
    );
    assert_eq!(
        "general".parse::<AcquisitionKind>().unwrap(),
        AcquisitionKind::General
    );
    assert_eq!(
        "gradient".parse::<AcquisitionOptimizerKind>().unwrap(),
        AcquisitionOptimizerKind::Gradient
    );
    assert_eq!(
        "genetic".parse::<AcquisitionOptimizerKind>().unwrap(),
        AcquisitionOptimizerKind::Genetic
    );
    assert_eq!(
        "random".parse::<InitDesignStrategy>().unwrap(),
        InitDesignStrategy::Random
    );
    assert_eq!(
        "weighted_sum".parse::<ScalarizerKind>().unwrap(),
        ScalarizerKind::WeightedSum
    );
    assert_eq!("max".parse::<Direction>().unwrap(), Direction::Maximize);
    assert_eq!(
        "naive-replace".parse::<FeasibilityStrategy>().unwrap(),
        FeasibilityStrategy::Naive(NaiveStrategy::Replace)
    );
}

#[test]
fn unknown_names_are_configuration_errors() {
    assert!(matches!(
        "thompson".parse::<AcquisitionKind>(),
        Err(Error::UnknownAcquisition(_))
    ));
    assert!(matches!(
        "lbfgs".parse::<AcquisitionOptimizerKind>(),
        Err(Error::UnknownOptimizer(_))
    ));
    assert!(matches!(
        "naive-mean".parse::<FeasibilityStrategy>(),
        Err(Error::UnknownFeasibilityStrategy(_))
    ));
    assert!(matches!(
        "chebyshev".parse::<ScalarizerKind>(),
        Err(Error::UnknownScalarizer(_))
    ));
    assert!(matches!(
        "sideways".parse::<Direction>(),
        Err(Error::UnknownGoal(_))
    ));
    assert!(matches!(
        parse_strategy_label("fca"),
        Err(Error::InvalidConfig(_))
    ));
}

#[cfg(feature = "sobol")]
#[test]
fn sobol_parses_with_the_feature() {
    assert_eq!(
        "sobol".parse::<InitDesignStrategy>().unwrap(),
        InitDesignStrategy::Sobol
    );
}

#[cfg(not(feature = "sobol"))]
#[test]
fn sobol_is_unknown_without_the_feature() {
    assert!(matches!(
        "sobol".parse::<InitDesignStrategy>(),
        Err(Error::UnknownInitialDesign(_))
    ));
}

#[test]
fn invalid_numeric_settings_are_rejected() {
    let builds = [
        Planner::builder().batch_size(0).build(),
        Planner::builder().feas_param(f64::NAN).build(),
        Planner::builder()
            .feasibility(FeasibilityStrategy::Fca, 1.2)
            .build(),
        Planner::builder().max_jitter(1e-9).build(),
        Planner::builder().classifier_iters(0).build(),
        Planner::builder().num_acqf_samples(0).build(),
        Planner::builder()
            .acquisition_type(AcquisitionKind::General)
            .build(),
    ];
    for build in builds {
        assert!(matches!(build, Err(Error::InvalidConfig(_))));
    }
}

#[test]
fn config_struct_and_builder_agree() {
    let config = PlannerConfig {
        feas_strategy: FeasibilityStrategy::Fia,
        feas_param: 0.5,
        batch_size: 2,
        num_init_design: 3,
        ..PlannerConfig::default()
    };
    let from_struct = Planner::new(config.clone()).unwrap();
    let from_builder = Planner::builder().config(config).build().unwrap();
    assert_eq!(from_struct.config(), from_builder.config());
    assert_eq!(from_struct.config().n_objectives(), 1);
}

#[test]
fn multi_objective_goal_must_stay_minimize() {
    let result = Planner::builder()
        .maximize()
        .multi_objective(MultiObjectiveConfig {
            goals: vec![Direction::Minimize, Direction::Maximize],
            ..MultiObjectiveConfig::default()
        })
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}

#[test]
fn meta_learning_without_any_model_source_is_rejected() {
    let result = Planner::builder()
        .meta_learning(MetaLearningConfig::new(Vec::new(), Vec::new()))
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
