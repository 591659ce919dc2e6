//! Problem-type inference over a parameter space.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::parameter::{ParamType, ParameterSpace};

/// Classification of a parameter space by the mix of parameter types it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProblemType {
    /// Only continuous parameters.
    FullyContinuous,
    /// Only discrete parameters.
    FullyDiscrete,
    /// Only categorical parameters.
    FullyCategorical,
    /// Discrete and continuous parameters.
    MixedDiscCont,
    /// Categorical and continuous parameters.
    MixedCatCont,
    /// Categorical and discrete parameters.
    MixedCatDisc,
    /// All three parameter types.
    FullyMixed,
}

impl ProblemType {
    /// Infers the problem type from the parameter types in `space`.
    #[must_use]
    pub fn infer(space: &ParameterSpace) -> Self {
        let has = |t: ParamType| space.iter().any(|p| p.param_type() == t);
        match (
            has(ParamType::Continuous),
            has(ParamType::Discrete),
            has(ParamType::Categorical),
        ) {
            (true, false, false) => Self::FullyContinuous,
            (false, true, false) => Self::FullyDiscrete,
            (false, false, true) => Self::FullyCategorical,
            (true, true, false) => Self::MixedDiscCont,
            (true, false, true) => Self::MixedCatCont,
            (false, true, true) => Self::MixedCatDisc,
            // A validated space is never empty, so (false, false, false)
            // only arises for a space built without validation.
            (true, true, true) | (false, false, false) => Self::FullyMixed,
        }
    }

    /// Returns the snake-case name of the problem type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullyContinuous => "fully_continuous",
            Self::FullyDiscrete => "fully_discrete",
            Self::FullyCategorical => "fully_categorical",
            Self::MixedDiscCont => "mixed_disc_cont",
            Self::MixedCatCont => "mixed_cat_cont",
            Self::MixedCatDisc => "mixed_cat_disc",
            Self::FullyMixed => "fully_mixed",
        }
    }

    /// Returns `true` if at least one categorical parameter is present.
    #[must_use]
    pub fn has_categorical(self) -> bool {
        matches!(
            self,
            Self::FullyCategorical | Self::MixedCatCont | Self::MixedCatDisc | Self::FullyMixed
        )
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` iff descriptors are enabled and some categorical parameter
/// carries them.
#[must_use]
pub fn has_descriptors(space: &ParameterSpace, use_descriptors: bool) -> bool {
    use_descriptors && space.iter().any(|p| p.descriptors().is_some())
}
