#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Feasibility-aware Bayesian optimization for closed-loop experiment
//! planning. Given the history of evaluated parameter vectors, a
//! [`Planner`] proposes the next batch to evaluate. Failed or infeasible
//! experiments are recorded as missing values; the planner learns where
//! they occur and steers away from them with one of several strategies.
//!
//! # Getting Started
//!
//! ```
//! use bayes_planner::prelude::*;
//!
//! let space = ParameterSpace::new(vec![
//!     Parameter::continuous("temperature", 20.0, 80.0),
//!     Parameter::categorical("solvent", ["water", "ethanol", "toluene"]),
//! ])
//! .unwrap();
//!
//! let mut planner = Planner::builder()
//!     .feasibility(FeasibilityStrategy::Fwa, 0.0)
//!     .num_init_design(4)
//!     .num_acqf_samples(200)
//!     .random_seed(42)
//!     .build()
//!     .unwrap();
//! planner.set_param_space(&space).unwrap();
//!
//! let mut history = History::new();
//! for _ in 0..6 {
//!     for params in planner.ask(&history).unwrap() {
//!         let t = params[0].as_f64().unwrap();
//!         if t > 70.0 {
//!             // The experiment failed.
//!             history.add_observation(Observation::missing(params));
//!         } else {
//!             let solvent = params[1].as_index().unwrap();
//!             history.push(params, (t - 45.0).abs() + f64::from(u8::from(solvent != 1)));
//!         }
//!     }
//! }
//! assert_eq!(history.len(), 6);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Planner`] | The ask loop: initial design first, then surrogate-based proposals. |
//! | [`ParameterSpace`] | Ordered continuous, discrete and categorical [`Parameter`]s. |
//! | [`History`] | Evaluated [`ParamVector`]s with their objective values; NaN marks a failure. |
//! | [`FeasibilityStrategy`] | How infeasible observations shape the acquisition. |
//! | [`PlannerConfig`] | Every option with its default; built fluently with [`PlannerBuilder`]. |
//!
//! # Feasibility Strategies
//!
//! | Strategy | Label | Behaviour |
//! |----------|-------|-----------|
//! | naive-0 | `naive-0` | Infeasible targets become the worst feasible target. |
//! | naive-replace | `naive-replace` | Infeasible targets become the previous surrogate's mean. |
//! | FWA | `fwa` | Acquisition weighted by the probability of feasibility. |
//! | FCA | `fca` | Candidates must reach a feasibility probability threshold. |
//! | FIA | `fia` | Acquisition and feasibility mixed by the infeasible fraction. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on configuration types, [`MetaGp`](surrogate::MetaGp) persistence | off |
//! | `sobol` | [`SobolDesign`](initial_design::SobolDesign) initial design | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at each planning step | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod encoding;
mod error;
pub mod feasibility;
pub mod history;
pub mod initial_design;
mod normal;
pub mod optimizer;
mod param;
pub mod parameter;
pub mod planner;
pub mod problem;
mod rng_util;
pub mod scalarizer;
pub mod scaler;
pub mod substitution;
pub mod surrogate;
pub mod training;
mod types;

pub use error::{Error, Result};
pub use feasibility::{FeasibilityStrategy, NaiveStrategy};
pub use history::{History, Observation};
pub use param::{ParamValue, ParamVector};
pub use parameter::{Parameter, ParameterKind, ParameterSpace};
pub use planner::{Planner, PlannerBuilder, PlannerConfig};
pub use problem::ProblemType;
pub use types::Direction;

/// Convenient wildcard import for the most common types.
///
/// ```
/// use bayes_planner::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::AcquisitionKind;
    pub use crate::error::{Error, Result};
    pub use crate::feasibility::{FeasibilityStrategy, NaiveStrategy, parse_strategy_label};
    pub use crate::history::{History, Observation};
    #[cfg(feature = "sobol")]
    pub use crate::initial_design::SobolDesign;
    pub use crate::initial_design::{
        DesignProposal, InitDesignStrategy, InitialDesign, RandomDesign,
    };
    pub use crate::optimizer::{
        AcquisitionOptimizer, AcquisitionOptimizerKind, GeneticOptimizer, GradientOptimizer,
        KnownConstraint,
    };
    pub use crate::param::{ParamValue, ParamVector};
    pub use crate::parameter::{Parameter, ParameterKind, ParameterSpace};
    pub use crate::planner::{
        MetaLearningConfig, MultiObjectiveConfig, Phase, Planner, PlannerBuilder, PlannerConfig,
        SourceTask, StepReport,
    };
    pub use crate::problem::ProblemType;
    pub use crate::scalarizer::{Scalarizer, ScalarizerKind};
    pub use crate::surrogate::MetaGp;
    pub use crate::types::Direction;
}
