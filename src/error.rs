use crate::problem::ProblemType;

/// Errors raised while configuring the planner or proposing new parameters.
///
/// Configuration errors surface at the point where the offending option is
/// selected and are never retried. Every error aborts the current
/// [`Planner::ask`](crate::Planner::ask) call without partial results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when a parameter space is created without parameters.
    #[error("parameter space must contain at least one parameter")]
    EmptyParameterSpace,

    /// Returned when a continuous parameter has `low >= high` or non-finite bounds.
    #[error("invalid bounds for '{name}': low ({low}) must be less than high ({high})")]
    InvalidBounds {
        /// The parameter name.
        name: String,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a discrete or categorical parameter has no options.
    #[error("parameter '{name}' must have at least one option")]
    EmptyOptions {
        /// The parameter name.
        name: String,
    },

    /// Returned when categorical descriptors do not line up with the options.
    #[error("invalid descriptors for '{name}': {reason}")]
    InvalidDescriptors {
        /// The parameter name.
        name: String,
        /// What is wrong with the descriptors.
        reason: String,
    },

    /// Returned when a parameter vector holds a value its parameter cannot take.
    #[error("invalid value for parameter '{name}': {reason}")]
    InvalidParamValue {
        /// The parameter name.
        name: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// Returned when `ask` is called before a parameter space was set.
    #[error("no parameter space has been set on the planner")]
    ParameterSpaceNotSet,

    /// Returned for an unrecognized feasibility strategy name.
    #[error("unknown feasibility strategy: '{0}'")]
    UnknownFeasibilityStrategy(String),

    /// Returned for an unrecognized acquisition function type.
    #[error("acquisition function type '{0}' not understood")]
    UnknownAcquisition(String),

    /// Returned for an unrecognized acquisition optimizer kind.
    #[error("unknown acquisition optimizer: '{0}'")]
    UnknownOptimizer(String),

    /// Returned for an unrecognized (or feature-disabled) initial design strategy.
    #[error("unknown initial design strategy: '{0}'")]
    UnknownInitialDesign(String),

    /// Returned for an unrecognized multi-objective scalarizer.
    #[error("unknown scalarizer: '{0}'")]
    UnknownScalarizer(String),

    /// Returned for an unrecognized optimization goal.
    #[error("unknown optimization goal: '{0}'")]
    UnknownGoal(String),

    /// Returned when a numeric or structural configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Returned when no regression surrogate is available for a problem type.
    #[error("no regression surrogate is available for problem type '{0}'")]
    UnsupportedProblemType(ProblemType),

    /// Returned when training data is requested from an empty history.
    #[error("observation history is empty")]
    EmptyHistory,

    /// Returned when a vector does not have the expected number of entries.
    #[error("dimension mismatch: expected {expected} values but got {got}")]
    DimensionMismatch {
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// Returned when an observation holds the wrong number of objective values.
    #[error("objective dimension mismatch: expected {expected} values, got {got}")]
    ObjectiveDimensionMismatch {
        /// The expected number of objective values.
        expected: usize,
        /// The actual number of objective values.
        got: usize,
    },

    /// Returned when the kernel matrix stays indefinite after the largest jitter.
    #[error("covariance matrix is not positive definite even with jitter {jitter:e}")]
    NumericalInstability {
        /// The largest jitter that was tried.
        jitter: f64,
    },

    /// Returned when an initial design hands back an empty batch.
    #[error("initial design returned neither a parameter vector nor a non-empty batch")]
    InitialDesignContract,

    /// Returned when no candidate satisfies the known constraints.
    #[error("no candidate satisfying the known constraints could be sampled")]
    NoFeasibleCandidates,

    /// Returned when reading or writing a persisted model fails.
    #[cfg(feature = "serde")]
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
