use std::sync::Arc;

use super::Planner;
use super::config::{MetaLearningConfig, MultiObjectiveConfig, PlannerConfig};
use crate::acquisition::AcquisitionKind;
use crate::error::Result;
use crate::feasibility::FeasibilityStrategy;
use crate::initial_design::{InitDesignStrategy, InitialDesign};
use crate::optimizer::{AcquisitionOptimizer, AcquisitionOptimizerKind, KnownConstraint};
use crate::param::ParamVector;
use crate::types::Direction;

/// A builder for constructing [`Planner`] instances with a fluent API.
///
/// Created via [`Planner::builder()`]. Every option of [`PlannerConfig`]
/// has a setter; on top of that the builder accepts known constraints and
/// custom initial designs or acquisition optimizers.
///
/// # Defaults
///
/// - Options: [`PlannerConfig::default()`]
/// - Initial design: built from `init_design_strategy`
/// - Acquisition optimizer: built from `acquisition_optimizer_kind`
/// - Known constraints: none
///
/// # Examples
///
/// ```
/// use bayes_planner::prelude::*;
///
/// let planner = Planner::builder()
///     .maximize()
///     .feasibility(FeasibilityStrategy::Fca, 0.8)
///     .batch_size(2)
///     .known_constraint(|p: &ParamVector| p[0].as_f64().is_some_and(|x| x <= 0.9))
///     .build()
///     .unwrap();
///
/// assert_eq!(planner.config().goal, Direction::Maximize);
/// ```
pub struct PlannerBuilder {
    config: PlannerConfig,
    known_constraints: Vec<KnownConstraint>,
    init_design: Option<Box<dyn InitialDesign>>,
    optimizer: Option<Box<dyn AcquisitionOptimizer>>,
}

impl PlannerBuilder {
    /// Create a new builder with default settings.
    pub(super) fn new() -> Self {
        Self {
            config: PlannerConfig::default(),
            known_constraints: Vec::new(),
            init_design: None,
            optimizer: None,
        }
    }

    /// Replace every option at once.
    #[must_use]
    pub fn config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Minimize the objective (the default).
    #[must_use]
    pub fn minimize(mut self) -> Self {
        self.config.goal = Direction::Minimize;
        self
    }

    /// Maximize the objective.
    #[must_use]
    pub fn maximize(mut self) -> Self {
        self.config.goal = Direction::Maximize;
        self
    }

    /// Set the optimization direction explicitly.
    #[must_use]
    pub fn goal(mut self, goal: Direction) -> Self {
        self.config.goal = goal;
        self
    }

    /// Set the feasibility strategy.
    #[must_use]
    pub fn feas_strategy(mut self, strategy: FeasibilityStrategy) -> Self {
        self.config.feas_strategy = strategy;
        self
    }

    /// Set the strategy parameter.
    #[must_use]
    pub fn feas_param(mut self, param: f64) -> Self {
        self.config.feas_param = param;
        self
    }

    /// Set the feasibility strategy together with its parameter.
    #[must_use]
    pub fn feasibility(self, strategy: FeasibilityStrategy, param: f64) -> Self {
        self.feas_strategy(strategy).feas_param(param)
    }

    /// Set the number of vectors per `ask`.
    #[must_use]
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    /// Seed every random draw of the planner.
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// Encode categorical options by their descriptors.
    #[must_use]
    pub fn use_descriptors(mut self, enabled: bool) -> Self {
        self.config.use_descriptors = enabled;
        self
    }

    /// Set the number of observations before the surrogate takes over.
    #[must_use]
    pub fn num_init_design(mut self, n: usize) -> Self {
        self.config.num_init_design = n;
        self
    }

    /// Choose a built-in initial design.
    #[must_use]
    pub fn init_design_strategy(mut self, strategy: InitDesignStrategy) -> Self {
        self.config.init_design_strategy = strategy;
        self
    }

    /// Use a custom initial design instead of `init_design_strategy`.
    #[must_use]
    pub fn initial_design(mut self, design: impl InitialDesign + 'static) -> Self {
        self.init_design = Some(Box::new(design));
        self
    }

    /// Set the acquisition family.
    #[must_use]
    pub fn acquisition_type(mut self, kind: AcquisitionKind) -> Self {
        self.config.acquisition_type = kind;
        self
    }

    /// Choose a built-in acquisition optimizer.
    #[must_use]
    pub fn acquisition_optimizer_kind(mut self, kind: AcquisitionOptimizerKind) -> Self {
        self.config.acquisition_optimizer_kind = kind;
        self
    }

    /// Use a custom acquisition optimizer instead of `acquisition_optimizer_kind`.
    #[must_use]
    pub fn acquisition_optimizer(mut self, optimizer: impl AcquisitionOptimizer + 'static) -> Self {
        self.optimizer = Some(Box::new(optimizer));
        self
    }

    /// Set the largest jitter tried when factorizing kernel matrices.
    #[must_use]
    pub fn max_jitter(mut self, jitter: f64) -> Self {
        self.config.max_jitter = jitter;
        self
    }

    /// Set the Newton iterations of the feasibility classifier.
    #[must_use]
    pub fn classifier_iters(mut self, n: usize) -> Self {
        self.config.classifier_iters = n;
        self
    }

    /// Set the number of random points used to estimate the acquisition range.
    #[must_use]
    pub fn num_acqf_samples(mut self, n: usize) -> Self {
        self.config.num_acqf_samples = n;
        self
    }

    /// Set the parameters averaged over by the `general` family.
    #[must_use]
    pub fn general_parameters(mut self, indices: Vec<usize>) -> Self {
        self.config.general_parameters = indices;
        self
    }

    /// Optimize several objectives through a scalarizer.
    #[must_use]
    pub fn multi_objective(mut self, config: MultiObjectiveConfig) -> Self {
        self.config.multi_objective = Some(config);
        self
    }

    /// Enable meta-learning.
    #[must_use]
    pub fn meta_learning(mut self, config: MetaLearningConfig) -> Self {
        self.config.meta_learning = Some(config);
        self
    }

    /// Add a known constraint; proposals never violate it.
    #[must_use]
    pub fn known_constraint<F>(mut self, constraint: F) -> Self
    where
        F: Fn(&ParamVector) -> bool + Send + Sync + 'static,
    {
        self.known_constraints.push(Arc::new(constraint));
        self
    }

    /// Add shared known constraints.
    #[must_use]
    pub fn known_constraints(mut self, constraints: impl IntoIterator<Item = KnownConstraint>) -> Self {
        self.known_constraints.extend(constraints);
        self
    }

    /// Build the [`Planner`] with the configured options.
    ///
    /// # Errors
    ///
    /// See [`Planner::new`].
    pub fn build(self) -> Result<Planner> {
        Planner::from_parts(
            self.config,
            self.known_constraints,
            self.init_design,
            self.optimizer,
        )
    }
}
