//! Initial-design strategies used until enough data exists for a surrogate.
//!
//! The planner drives a design one point at a time: `tell(iteration)` with
//! the number of design points completed so far, then `ask()`.
//!
//! | Strategy | Feature | Points |
//! |----------|---------|--------|
//! | [`RandomDesign`] | none | uniform random |
//! | [`SobolDesign`] | `sobol` | scrambled Sobol sequence indexed by iteration |

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::{ParamValue, ParamVector};
use crate::parameter::{Parameter, ParameterKind, ParameterSpace};

/// Built-in initial design.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum InitDesignStrategy {
    /// Uniform random sampling.
    #[default]
    Random,
    /// Scrambled Sobol sequence.
    #[cfg(feature = "sobol")]
    Sobol,
}

impl InitDesignStrategy {
    /// Instantiates the design, seeded from `seed` when given.
    #[must_use]
    pub fn build(self, seed: Option<u64>) -> Box<dyn InitialDesign> {
        match self {
            Self::Random => Box::new(seed.map_or_else(RandomDesign::new, RandomDesign::with_seed)),
            #[cfg(feature = "sobol")]
            Self::Sobol => Box::new(SobolDesign::with_seed(seed.unwrap_or(0))),
        }
    }
}

impl FromStr for InitDesignStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            #[cfg(feature = "sobol")]
            "sobol" => Ok(Self::Sobol),
            other => Err(Error::UnknownInitialDesign(other.to_string())),
        }
    }
}

impl fmt::Display for InitDesignStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            #[cfg(feature = "sobol")]
            Self::Sobol => "sobol",
        })
    }
}

/// What an initial design hands back from [`InitialDesign::ask`].
///
/// Only the first vector of a batch is used; an empty batch is a contract
/// violation.
#[derive(Clone, Debug, PartialEq)]
pub enum DesignProposal {
    /// A single parameter vector.
    Single(ParamVector),
    /// A batch of parameter vectors.
    Batch(Vec<ParamVector>),
}

impl DesignProposal {
    /// The proposed vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitialDesignContract`] for an empty batch.
    pub fn into_first(self) -> Result<ParamVector> {
        match self {
            Self::Single(p) => Ok(p),
            Self::Batch(batch) => batch.into_iter().next().ok_or(Error::InitialDesignContract),
        }
    }
}

/// A space-filling strategy for the first evaluations.
pub trait InitialDesign: Send {
    /// Sets the parameter space to sample from.
    fn set_param_space(&mut self, space: &ParameterSpace);

    /// Reports how many initial-design points were completed so far.
    fn tell(&mut self, iteration: usize);

    /// Proposes the next point.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterSpaceNotSet`] before a space was set.
    fn ask(&mut self) -> Result<DesignProposal>;
}

/// Uniform random design.
pub struct RandomDesign {
    rng: fastrand::Rng,
    space: Option<ParameterSpace>,
}

impl RandomDesign {
    /// Creates a design with a random seed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
            space: None,
        }
    }

    /// Creates a design with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            space: None,
        }
    }
}

impl Default for RandomDesign {
    fn default() -> Self {
        Self::new()
    }
}

impl InitialDesign for RandomDesign {
    fn set_param_space(&mut self, space: &ParameterSpace) {
        self.space = Some(space.clone());
    }

    fn tell(&mut self, _iteration: usize) {}

    fn ask(&mut self) -> Result<DesignProposal> {
        let space = self.space.as_ref().ok_or(Error::ParameterSpaceNotSet)?;
        Ok(DesignProposal::Single(space.sample(&mut self.rng)))
    }
}

/// Scrambled Sobol design (Burley 2020).
///
/// Point `i` of the design is the `i`-th point of the sequence, where `i`
/// is the iteration last passed to [`tell`](InitialDesign::tell); each
/// parameter maps to one Sobol dimension.
///
/// Requires the **`sobol`** feature flag.
#[cfg(feature = "sobol")]
pub struct SobolDesign {
    seed: u32,
    index: u32,
    space: Option<ParameterSpace>,
}

#[cfg(feature = "sobol")]
impl SobolDesign {
    /// Creates a Sobol design with the given scrambling seed.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: seed as u32,
            index: 0,
            space: None,
        }
    }
}

#[cfg(feature = "sobol")]
impl InitialDesign for SobolDesign {
    fn set_param_space(&mut self, space: &ParameterSpace) {
        self.space = Some(space.clone());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn tell(&mut self, iteration: usize) {
        self.index = iteration as u32;
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ask(&mut self) -> Result<DesignProposal> {
        let space = self.space.as_ref().ok_or(Error::ParameterSpaceNotSet)?;
        let values = space
            .iter()
            .enumerate()
            .map(|(dim, p)| {
                let dim = dim as u32;
                // Dimensions past the table reuse it under a different scramble.
                let (dim, seed) = (
                    dim % sobol_burley::NUM_DIMENSIONS,
                    self.seed.wrapping_add(dim / sobol_burley::NUM_DIMENSIONS),
                );
                let point = f64::from(sobol_burley::sample(self.index, dim, seed));
                map_unit_point(point, p)
            })
            .collect();
        self.index = self.index.wrapping_add(1);
        Ok(DesignProposal::Single(values))
    }
}

/// Maps a point of `[0, 1)` onto a parameter.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#[cfg_attr(not(feature = "sobol"), allow(dead_code))]
pub(crate) fn map_unit_point(point: f64, param: &Parameter) -> ParamValue {
    let pick = |n: usize| ((point * n as f64).floor() as usize).min(n - 1);
    match &param.kind {
        ParameterKind::Continuous { low, high } => ParamValue::Float(low + point * (high - low)),
        ParameterKind::Discrete { options } => ParamValue::Float(options[pick(options.len())]),
        ParameterKind::Categorical { options, .. } => ParamValue::Categorical(pick(options.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::continuous("x", -1.0, 3.0),
            Parameter::discrete("d", vec![2.0, 4.0, 8.0]),
            Parameter::categorical("k", ["a", "b", "c", "d"]),
        ])
        .unwrap()
    }

    #[test]
    fn random_design_needs_a_space() {
        let mut design = RandomDesign::with_seed(0);
        assert!(matches!(design.ask(), Err(Error::ParameterSpaceNotSet)));
        design.set_param_space(&space());
        let p = design.ask().unwrap().into_first().unwrap();
        space().check_vector(&p).unwrap();
    }

    #[test]
    fn empty_batch_violates_the_contract() {
        assert!(matches!(
            DesignProposal::Batch(Vec::new()).into_first(),
            Err(Error::InitialDesignContract)
        ));
        let p = ParamVector::new(vec![ParamValue::Float(1.0)]);
        assert_eq!(
            DesignProposal::Batch(vec![p.clone(), ParamVector::default()])
                .into_first()
                .unwrap(),
            p
        );
    }

    #[test]
    fn unit_points_map_to_admissible_values() {
        let s = space();
        for point in [0.0, 0.3, 0.999_999] {
            let values: ParamVector = s.iter().map(|p| map_unit_point(point, p)).collect();
            s.check_vector(&values).unwrap();
        }
        assert_eq!(map_unit_point(0.999_999, &s.parameters()[2]), ParamValue::Categorical(3));
    }

    #[test]
    fn parses_strategies() {
        assert_eq!(
            "random".parse::<InitDesignStrategy>().unwrap(),
            InitDesignStrategy::Random
        );
        assert!(matches!(
            "lhs".parse::<InitDesignStrategy>(),
            Err(Error::UnknownInitialDesign(_))
        ));
    }

    #[cfg(feature = "sobol")]
    #[test]
    fn sobol_design_is_deterministic_per_iteration() {
        let mut a = SobolDesign::with_seed(7);
        let mut b = SobolDesign::with_seed(7);
        a.set_param_space(&space());
        b.set_param_space(&space());
        a.tell(3);
        b.tell(3);
        let pa = a.ask().unwrap().into_first().unwrap();
        let pb = b.ask().unwrap().into_first().unwrap();
        assert_eq!(pa, pb);
        space().check_vector(&pa).unwrap();
    }
}
