//! Planner configuration.

#[cfg(feature = "serde")]
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::source::SourceTask;
use crate::acquisition::AcquisitionKind;
use crate::acquisition::range::DEFAULT_NUM_SAMPLES;
use crate::error::{Error, Result};
use crate::feasibility::FeasibilityStrategy;
use crate::initial_design::InitDesignStrategy;
use crate::optimizer::AcquisitionOptimizerKind;
use crate::scalarizer::ScalarizerKind;
use crate::surrogate::MetaGp;
use crate::surrogate::gp::MIN_JITTER;
use crate::types::Direction;

/// Multi-objective settings.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MultiObjectiveConfig {
    /// Direction of each objective.
    pub goals: Vec<Direction>,
    /// How objectives are reduced to one merit.
    pub scalarizer: ScalarizerKind,
    /// Objective weights for [`ScalarizerKind::WeightedSum`]; empty means equal.
    pub weights: Vec<f64>,
}

/// Meta-learning settings.
///
/// The meta model is taken from `pretrained` if set, then from
/// `model_path` if that file exists; otherwise it is trained on the source
/// tasks (and written to `model_path`, if given).
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MetaLearningConfig {
    /// Tasks the shared hyperparameters are trained on.
    pub train_tasks: Vec<SourceTask>,
    /// Tasks used to score the trained hyperparameters.
    pub valid_tasks: Vec<SourceTask>,
    /// A meta model trained earlier.
    pub pretrained: Option<MetaGp>,
    /// Where the meta model is restored from or saved to.
    #[cfg(feature = "serde")]
    pub model_path: Option<PathBuf>,
}

impl MetaLearningConfig {
    /// Meta-learning from the given source tasks.
    #[must_use]
    pub fn new(train_tasks: Vec<SourceTask>, valid_tasks: Vec<SourceTask>) -> Self {
        Self {
            train_tasks,
            valid_tasks,
            ..Self::default()
        }
    }

    /// Meta-learning from a model trained earlier.
    #[must_use]
    pub fn pretrained(model: MetaGp) -> Self {
        Self {
            pretrained: Some(model),
            ..Self::default()
        }
    }

    fn has_model_source(&self) -> bool {
        #[cfg(feature = "serde")]
        let from_disk = self.model_path.as_ref().is_some_and(|p| p.exists());
        #[cfg(not(feature = "serde"))]
        let from_disk = false;
        self.pretrained.is_some() || from_disk || self.train_tasks.iter().any(|t| !t.is_empty())
    }
}

/// Every recognized planner option and its default.
///
/// # Defaults
///
/// | Option | Default |
/// |--------|---------|
/// | `goal` | minimize |
/// | `feas_strategy` | `naive-0` |
/// | `feas_param` | 0.2 |
/// | `batch_size` | 1 |
/// | `random_seed` | none |
/// | `use_descriptors` | false |
/// | `num_init_design` | 5 |
/// | `init_design_strategy` | random |
/// | `acquisition_type` | ei |
/// | `acquisition_optimizer_kind` | gradient |
/// | `max_jitter` | 0.1 |
/// | `classifier_iters` | 50 |
/// | `num_acqf_samples` | 2000 |
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PlannerConfig {
    /// Optimization direction of the (scalarized) objective.
    pub goal: Direction,
    /// How infeasible observations are handled.
    pub feas_strategy: FeasibilityStrategy,
    /// Strategy parameter: threshold for `fca`, exponent for `fia`.
    pub feas_param: f64,
    /// Number of vectors per `ask`.
    pub batch_size: usize,
    /// Seed for every random draw of the planner.
    pub random_seed: Option<u64>,
    /// Encode categorical options by their descriptors where available.
    pub use_descriptors: bool,
    /// Observations required before the surrogate takes over.
    pub num_init_design: usize,
    /// Built-in initial design.
    pub init_design_strategy: InitDesignStrategy,
    /// Acquisition family.
    pub acquisition_type: AcquisitionKind,
    /// Built-in acquisition optimizer.
    pub acquisition_optimizer_kind: AcquisitionOptimizerKind,
    /// Largest diagonal jitter tried when factorizing kernel matrices.
    pub max_jitter: f64,
    /// Newton iterations of the feasibility classifier.
    pub classifier_iters: usize,
    /// Random points used to estimate the acquisition range.
    pub num_acqf_samples: usize,
    /// Parameter indices averaged over by the `general` family.
    pub general_parameters: Vec<usize>,
    /// Multi-objective settings.
    pub multi_objective: Option<MultiObjectiveConfig>,
    /// Meta-learning settings.
    pub meta_learning: Option<MetaLearningConfig>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            goal: Direction::Minimize,
            feas_strategy: FeasibilityStrategy::default(),
            feas_param: 0.2,
            batch_size: 1,
            random_seed: None,
            use_descriptors: false,
            num_init_design: 5,
            init_design_strategy: InitDesignStrategy::default(),
            acquisition_type: AcquisitionKind::default(),
            acquisition_optimizer_kind: AcquisitionOptimizerKind::default(),
            max_jitter: 0.1,
            classifier_iters: 50,
            num_acqf_samples: DEFAULT_NUM_SAMPLES,
            general_parameters: Vec::new(),
            multi_objective: None,
            meta_learning: None,
        }
    }
}

impl PlannerConfig {
    /// Checks every option that can be checked without a parameter space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".to_string());
        }
        if !self.feas_param.is_finite() || self.feas_param < 0.0 {
            return invalid(format!(
                "feas_param must be finite and non-negative, got {}",
                self.feas_param
            ));
        }
        if self.feas_strategy == FeasibilityStrategy::Fca && self.feas_param > 1.0 {
            return invalid(format!(
                "fca threshold must lie in [0, 1], got {}",
                self.feas_param
            ));
        }
        if !self.max_jitter.is_finite() || self.max_jitter < MIN_JITTER {
            return invalid(format!(
                "max_jitter must be at least {MIN_JITTER:e}, got {}",
                self.max_jitter
            ));
        }
        if self.classifier_iters == 0 {
            return invalid("classifier_iters must be at least 1".to_string());
        }
        if self.num_acqf_samples == 0 {
            return invalid("num_acqf_samples must be at least 1".to_string());
        }
        if self.acquisition_type == AcquisitionKind::General && self.general_parameters.is_empty() {
            return invalid("the general acquisition needs general_parameters".to_string());
        }

        if let Some(moo) = &self.multi_objective {
            if moo.goals.is_empty() {
                return invalid("multi_objective.goals must not be empty".to_string());
            }
            if self.goal != Direction::Minimize {
                return invalid(
                    "multi-objective merits are minimized; set per-objective goals instead of goal"
                        .to_string(),
                );
            }
            if moo.scalarizer == ScalarizerKind::WeightedSum
                && !moo.weights.is_empty()
                && moo.weights.len() != moo.goals.len()
            {
                return invalid(format!(
                    "expected {} weights, got {}",
                    moo.goals.len(),
                    moo.weights.len()
                ));
            }
        }

        if let Some(meta) = &self.meta_learning
            && !meta.has_model_source()
        {
            return invalid(
                "meta_learning needs training tasks, a pretrained model or a saved model".to_string(),
            );
        }
        Ok(())
    }

    /// Number of objective values expected per observation.
    #[must_use]
    pub fn n_objectives(&self) -> usize {
        self.multi_objective.as_ref().map_or(1, |m| m.goals.len())
    }
}
