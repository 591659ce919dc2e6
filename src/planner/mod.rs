//! The ask loop.
//!
//! A [`Planner`] is either in the initial-design phase, where proposals
//! come from an [`InitialDesign`], or in the surrogate phase, where each
//! step runs:
//!
//! 1. [`build_training_sets`]
//! 2. [`apply_substitution`]
//! 3. regression and feasibility surrogates
//! 4. incumbent and infeasible ratio
//! 5. [`estimate_range`]
//! 6. [`FeasibilityAwareAcquisition`] assembly
//! 7. the [`AcquisitionOptimizer`]
//!
//! The phase is decided afresh on every [`Planner::ask`].

mod builder;
pub mod config;
pub mod source;

pub use builder::PlannerBuilder;
pub use config::{MetaLearningConfig, MultiObjectiveConfig, PlannerConfig};
pub use source::{PreparedTasks, SourceTask};

use crate::acquisition::range::estimate_range;
use crate::acquisition::{
    AcquisitionKind, FeasibilityAwareAcquisition, FeatureOverride, general_variants, select_base,
};
use crate::encoding::Encoder;
use crate::error::{Error, Result};
use crate::history::History;
use crate::initial_design::InitialDesign;
use crate::optimizer::{AcquisitionOptimizer, AcquisitionProblem, KnownConstraint};
use crate::param::ParamVector;
use crate::parameter::ParameterSpace;
use crate::problem::{ProblemType, has_descriptors};
use crate::rng_util;
use crate::scalarizer::Scalarizer;
use crate::substitution::{Substitution, apply_substitution};
use crate::surrogate::gp::GpPosterior;
use crate::surrogate::{
    MetaGp, RegressionModel, SurrogatePair, build_classifier, build_regression, select_kernel,
};
use crate::training::{TrainingSets, ValueTransform, build_training_sets};

/// Which branch an `ask` took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Proposals came from the initial design.
    InitialDesign,
    /// Proposals came from the surrogate-based acquisition.
    SurrogateProposal,
}

/// Summary of the last `ask`.
#[derive(Clone, Debug, PartialEq)]
pub struct StepReport {
    /// Branch taken.
    pub phase: Phase,
    /// Observations in the history passed to `ask`.
    pub n_observations: usize,
    /// What the substitution policy did; `None` in the initial design.
    pub substitution: Option<Substitution>,
    /// Whether the acquisition scored by feasibility alone.
    pub feasibility_only: bool,
    /// Lowest scaled regression target.
    pub incumbent: Option<f64>,
    /// Fraction of infeasible observations.
    pub infeasible_ratio: f64,
    /// Normalization range of the base acquisition.
    pub acquisition_range: Option<(f64, f64)>,
    /// Acquisition family used.
    pub acquisition: Option<AcquisitionKind>,
    /// Whether the batch was scored jointly.
    pub joint_batch: bool,
    /// Whether the regression surrogate used the meta-trained kernel.
    pub meta_conditioned: bool,
}

impl StepReport {
    fn initial_design(n_observations: usize) -> Self {
        Self {
            phase: Phase::InitialDesign,
            n_observations,
            substitution: None,
            feasibility_only: false,
            incumbent: None,
            infeasible_ratio: 0.0,
            acquisition_range: None,
            acquisition: None,
            joint_batch: false,
            meta_conditioned: false,
        }
    }
}

/// Everything derived from the parameter space.
struct SpaceState {
    encoder: Encoder,
    problem_type: ProblemType,
    has_descriptors: bool,
    general: Vec<FeatureOverride>,
}

/// A feasibility-aware Bayesian optimization planner.
///
/// # Examples
///
/// ```
/// use bayes_planner::prelude::*;
///
/// let space = ParameterSpace::new(vec![
///     Parameter::continuous("x", 0.0, 1.0),
///     Parameter::continuous("y", 0.0, 1.0),
/// ])
/// .unwrap();
///
/// let mut planner = Planner::builder()
///     .random_seed(7)
///     .num_init_design(3)
///     .num_acqf_samples(200)
///     .build()
///     .unwrap();
/// planner.set_param_space(&space).unwrap();
///
/// let mut history = History::new();
/// for _ in 0..5 {
///     let batch = planner.ask(&history).unwrap();
///     for params in batch {
///         let x = params[0].as_f64().unwrap();
///         let y = params[1].as_f64().unwrap();
///         history.push(params, (x - 0.2).powi(2) + (y - 0.7).powi(2));
///     }
/// }
/// assert_eq!(history.len(), 5);
/// ```
pub struct Planner {
    config: PlannerConfig,
    known_constraints: Vec<KnownConstraint>,
    init_design: Box<dyn InitialDesign>,
    optimizer: Box<dyn AcquisitionOptimizer>,
    scalarizer: Option<Box<dyn Scalarizer>>,
    rng: fastrand::Rng,
    space: Option<SpaceState>,
    num_init_design_completed: usize,
    source: Option<PreparedTasks>,
    meta_model: Option<MetaGp>,
    training_sets: Option<TrainingSets>,
    surrogates: Option<SurrogatePair>,
    last_report: Option<StepReport>,
}

impl core::fmt::Debug for Planner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Planner")
            .field("config", &self.config)
            .field("known_constraints", &self.known_constraints.len())
            .field("num_init_design_completed", &self.num_init_design_completed)
            .field("problem_type", &self.problem_type())
            .field("last_report", &self.last_report)
            .finish_non_exhaustive()
    }
}

impl Planner {
    /// Creates a planner with the built-in initial design and optimizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `config` does not validate, and
    /// propagates scalarizer and source-task preparation errors.
    pub fn new(config: PlannerConfig) -> Result<Self> {
        Self::from_parts(config, Vec::new(), None, None)
    }

    /// Returns a builder for a planner.
    #[must_use]
    pub fn builder() -> PlannerBuilder {
        PlannerBuilder::new()
    }

    fn from_parts(
        config: PlannerConfig,
        known_constraints: Vec<KnownConstraint>,
        init_design: Option<Box<dyn InitialDesign>>,
        optimizer: Option<Box<dyn AcquisitionOptimizer>>,
    ) -> Result<Self> {
        config.validate()?;

        let scalarizer = config
            .multi_objective
            .as_ref()
            .map(|m| m.scalarizer.build(&m.goals, &m.weights))
            .transpose()?;

        let source = match &config.meta_learning {
            Some(meta) if meta.train_tasks.iter().any(|t| !t.is_empty()) => {
                Some(source::prepare_source_tasks(
                    &meta.train_tasks,
                    &meta.valid_tasks,
                    config.goal,
                    scalarizer.as_deref(),
                )?)
            }
            _ => None,
        };
        let meta_model = config
            .meta_learning
            .as_ref()
            .and_then(|m| m.pretrained.clone());

        let init_design = init_design
            .unwrap_or_else(|| config.init_design_strategy.build(config.random_seed));
        let optimizer = optimizer.unwrap_or_else(|| config.acquisition_optimizer_kind.build());

        trace_info!(
            feas_strategy = config.feas_strategy.as_str(),
            feas_param = config.feas_param,
            batch_size = config.batch_size,
            acquisition = %config.acquisition_type,
            "planner created"
        );

        Ok(Self {
            rng: rng_util::rng_from_seed(config.random_seed),
            config,
            known_constraints,
            init_design,
            optimizer,
            scalarizer,
            space: None,
            num_init_design_completed: 0,
            source,
            meta_model,
            training_sets: None,
            surrogates: None,
            last_report: None,
        })
    }

    /// Sets the parameter space and recomputes the problem type.
    ///
    /// Surrogates of an earlier space are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the general parameters do not fit
    /// the space.
    pub fn set_param_space(&mut self, space: &ParameterSpace) -> Result<()> {
        let encoder = Encoder::new(space, self.config.use_descriptors);
        let problem_type = ProblemType::infer(space);
        let has_descriptors = has_descriptors(space, self.config.use_descriptors);
        let general = if self.config.acquisition_type == AcquisitionKind::General {
            general_variants(&encoder, &self.config.general_parameters)?
        } else {
            Vec::new()
        };

        trace_info!(
            problem_type = problem_type.as_str(),
            has_descriptors,
            feature_dim = encoder.feature_dim(),
            "parameter space set"
        );

        self.init_design.set_param_space(space);
        self.space = Some(SpaceState {
            encoder,
            problem_type,
            has_descriptors,
            general,
        });
        self.training_sets = None;
        self.surrogates = None;
        Ok(())
    }

    /// Proposes the next `batch_size` parameter vectors.
    ///
    /// Uses the initial design while the history holds fewer than
    /// `num_init_design` observations or only missing values; the
    /// surrogate-based acquisition otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterSpaceNotSet`] before
    /// [`set_param_space`](Self::set_param_space), and propagates errors of
    /// every step of the pipeline. Nothing is proposed on error.
    pub fn ask(&mut self, history: &History) -> Result<Vec<ParamVector>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("ask", n_observations = history.len()).entered();

        if self.space.is_none() {
            return Err(Error::ParameterSpaceNotSet);
        }
        if history.len() < self.config.num_init_design || history.all_missing() {
            self.ask_initial_design(history.len())
        } else {
            self.ask_surrogate(history)
        }
    }

    fn ask_initial_design(&mut self, n_observations: usize) -> Result<Vec<ParamVector>> {
        let mut batch = Vec::with_capacity(self.config.batch_size);
        for _ in 0..self.config.batch_size {
            self.init_design.tell(self.num_init_design_completed);
            let params = self.init_design.ask()?.into_first()?;
            self.num_init_design_completed += 1;
            batch.push(params);
        }
        trace_info!(
            completed = self.num_init_design_completed,
            n_observations,
            "initial design proposed"
        );
        self.last_report = Some(StepReport::initial_design(n_observations));
        Ok(batch)
    }

    fn ask_surrogate(&mut self, history: &History) -> Result<Vec<ParamVector>> {
        self.ensure_meta_model()?;
        let space = self.space.as_ref().ok_or(Error::ParameterSpaceNotSet)?;
        let config = &self.config;

        let transform = ValueTransform {
            goal: config.goal,
            scalarizer: self.scalarizer.as_deref(),
        };
        let mut sets = build_training_sets(history, &space.encoder, &transform)?;

        let prior = self
            .surrogates
            .as_ref()
            .map(|s| &s.regression as &dyn RegressionModel);
        let substitution = apply_substitution(config.feas_strategy, &mut sets, prior)?;
        let feasibility_only = substitution.is_feasibility_only();
        if feasibility_only {
            trace_debug!(
                strategy = config.feas_strategy.as_str(),
                "substitution deferred; scoring by feasibility alone"
            );
        }

        let regression = match &self.meta_model {
            Some(meta) => condition_meta(meta, space, &sets, config.max_jitter)?,
            None => build_regression(
                &sets,
                space.problem_type,
                space.has_descriptors,
                &space.encoder,
                config.max_jitter,
                &mut self.rng,
            )?,
        };
        let classifier = if config.feas_strategy.needs_classifier()
            || (feasibility_only && sets.has_both_classes())
        {
            Some(build_classifier(
                &sets,
                config.classifier_iters,
                config.max_jitter,
            )?)
        } else {
            None
        };

        let f_best = sets.incumbent().ok_or(Error::EmptyHistory)?;
        let infeasible_ratio = sets.infeasible_ratio();

        let base = select_base(
            config.acquisition_type,
            config.batch_size,
            space.problem_type,
            f_best,
            space.general.clone(),
            &mut self.rng,
        );
        let range = estimate_range(
            &base,
            &regression,
            &space.encoder,
            config.num_acqf_samples,
            &mut self.rng,
        )?;

        let (batch, joint_batch) = {
            let acquisition = FeasibilityAwareAcquisition::new(
                &regression,
                classifier.as_ref(),
                base,
                config.feas_strategy,
                config.feas_param,
                infeasible_ratio,
                range,
                feasibility_only,
            );
            let problem = AcquisitionProblem {
                acquisition: &acquisition,
                encoder: &space.encoder,
                known_constraints: &self.known_constraints,
                batch_size: config.batch_size,
            };
            let batch = self.optimizer.optimize(&problem, &mut self.rng)?;
            (batch, acquisition.is_joint_batch())
        };
        if batch.len() != config.batch_size {
            return Err(Error::Internal("optimizer returned a batch of the wrong size"));
        }

        trace_info!(
            n_observations = history.len(),
            incumbent = f_best,
            infeasible_ratio,
            feasibility_only,
            "surrogate proposal"
        );

        self.last_report = Some(StepReport {
            phase: Phase::SurrogateProposal,
            n_observations: history.len(),
            substitution: Some(substitution),
            feasibility_only,
            incumbent: Some(f_best),
            infeasible_ratio,
            acquisition_range: Some(range),
            acquisition: Some(config.acquisition_type),
            joint_batch,
            meta_conditioned: self.meta_model.is_some(),
        });
        self.training_sets = Some(sets);
        self.surrogates = Some(SurrogatePair {
            regression,
            classifier,
        });
        Ok(batch)
    }

    /// Restores or trains the meta model once, before the first surrogate step.
    fn ensure_meta_model(&mut self) -> Result<()> {
        let Some(meta) = &self.config.meta_learning else {
            return Ok(());
        };
        if self.meta_model.is_some() {
            return Ok(());
        }

        #[cfg(feature = "serde")]
        if let Some(path) = meta.model_path.as_ref().filter(|p| p.exists()) {
            let model = MetaGp::load(path)?;
            trace_info!(path = %path.display(), n_tasks = model.n_tasks(), "meta model restored");
            self.meta_model = Some(model);
            return Ok(());
        }

        let space = self.space.as_ref().ok_or(Error::ParameterSpaceNotSet)?;
        let prepared = self.source.as_ref().ok_or_else(|| {
            Error::InvalidConfig("meta_learning has no model and no training tasks".to_string())
        })?;
        trace_warn!(
            n_train = prepared.train.len(),
            n_valid = prepared.valid.len(),
            "no meta model supplied; training one on the source tasks"
        );
        let (kind, layout) = select_kernel(space.problem_type, space.has_descriptors, &space.encoder)?;
        let model = MetaGp::train(kind, layout, &prepared.train, &prepared.valid, &mut self.rng)?;

        #[cfg(feature = "serde")]
        if let Some(path) = &meta.model_path {
            model.save(path)?;
        }
        #[cfg(not(feature = "serde"))]
        let _ = meta;

        self.meta_model = Some(model);
        Ok(())
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Problem type of the current space; `None` before one was set.
    #[must_use]
    pub fn problem_type(&self) -> Option<ProblemType> {
        self.space.as_ref().map(|s| s.problem_type)
    }

    /// Whether descriptors are used for the current space.
    #[must_use]
    pub fn has_descriptors(&self) -> bool {
        self.space.as_ref().is_some_and(|s| s.has_descriptors)
    }

    /// Number of initial-design points proposed so far.
    #[must_use]
    pub fn num_init_design_completed(&self) -> usize {
        self.num_init_design_completed
    }

    /// Training sets of the last surrogate step.
    #[must_use]
    pub fn training_sets(&self) -> Option<&TrainingSets> {
        self.training_sets.as_ref()
    }

    /// Surrogates of the last surrogate step.
    #[must_use]
    pub fn surrogates(&self) -> Option<&SurrogatePair> {
        self.surrogates.as_ref()
    }

    /// Summary of the last `ask`.
    #[must_use]
    pub fn last_report(&self) -> Option<&StepReport> {
        self.last_report.as_ref()
    }

    /// The meta model, once restored or trained.
    #[must_use]
    pub fn meta_model(&self) -> Option<&MetaGp> {
        self.meta_model.as_ref()
    }

    /// Source tasks after sign flip, scalarization and scaling.
    #[must_use]
    pub fn prepared_source(&self) -> Option<&PreparedTasks> {
        self.source.as_ref()
    }
}

/// Conditions the meta-trained kernel on the target task.
fn condition_meta(
    meta: &MetaGp,
    space: &SpaceState,
    sets: &TrainingSets,
    max_jitter: f64,
) -> Result<GpPosterior> {
    // Rejects unsupported problem types just as the plain builder does.
    select_kernel(space.problem_type, space.has_descriptors, &space.encoder)?;
    meta.kernel()
        .check_consistent()
        .map_err(|msg| Error::InvalidConfig(format!("meta model: {msg}")))?;
    let layout = meta.kernel().layout();
    let width = layout.numeric.len() + layout.groups.iter().map(|g| g.1).sum::<usize>();
    let feature_dim = space.encoder.feature_dim();
    if width != feature_dim || meta.kernel().min_feature_dim() > feature_dim {
        return Err(Error::DimensionMismatch {
            expected: feature_dim,
            got: width.max(meta.kernel().min_feature_dim()),
        });
    }
    let posterior = meta.condition(&sets.x_reg, &sets.y_reg, max_jitter)?;
    trace_info!(
        n_train = posterior.n_train(),
        n_tasks = meta.n_tasks(),
        "meta surrogate conditioned"
    );
    Ok(posterior)
}
