//! Parameter descriptors and the parameter space.
//!
//! A [`ParameterSpace`] is an ordered list of [`Parameter`]s. Each parameter
//! is continuous (bounded interval), discrete (finite set of numeric
//! options) or categorical (finite set of named options, optionally with a
//! descriptor vector per option).
//!
//! # Example
//!
//! ```
//! use bayes_planner::parameter::{Parameter, ParameterSpace};
//!
//! let space = ParameterSpace::new(vec![
//!     Parameter::continuous("temperature", 20.0, 80.0),
//!     Parameter::discrete("stirring", vec![100.0, 200.0, 400.0]),
//!     Parameter::categorical("solvent", ["water", "ethanol", "dmso"])
//!         .with_descriptors(vec![vec![80.1, 1.0], vec![24.5, 0.8], vec![46.7, 2.0]]),
//! ])
//! .unwrap();
//!
//! assert_eq!(space.len(), 3);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::{ParamValue, ParamVector};
use crate::rng_util;

/// The type tag of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// Real-valued within bounds.
    Continuous,
    /// One of a finite set of numbers.
    Discrete,
    /// One of a finite set of named options.
    Categorical,
}

/// How a parameter's values are described.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParameterKind {
    /// Real values in `[low, high]`.
    Continuous {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
    },
    /// A finite set of numeric options.
    Discrete {
        /// The admissible values.
        options: Vec<f64>,
    },
    /// A finite set of named options.
    Categorical {
        /// Option names.
        options: Vec<String>,
        /// Optional descriptor vector per option (all of equal length).
        descriptors: Option<Vec<Vec<f64>>>,
    },
}

/// A named parameter of the search space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameter {
    /// Human-readable parameter name.
    pub name: String,
    /// The admissible values.
    pub kind: ParameterKind,
}

impl Parameter {
    /// Creates a continuous parameter on `[low, high]`.
    pub fn continuous(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Continuous { low, high },
        }
    }

    /// Creates a discrete parameter with the given numeric options.
    pub fn discrete(name: impl Into<String>, options: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Discrete { options },
        }
    }

    /// Creates a categorical parameter with the given option names.
    pub fn categorical<S: Into<String>>(
        name: impl Into<String>,
        options: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Categorical {
                options: options.into_iter().map(Into::into).collect(),
                descriptors: None,
            },
        }
    }

    /// Attaches one descriptor vector per option to a categorical parameter.
    ///
    /// Has no effect on continuous or discrete parameters.
    #[must_use]
    pub fn with_descriptors(mut self, descriptors: Vec<Vec<f64>>) -> Self {
        if let ParameterKind::Categorical {
            descriptors: slot, ..
        } = &mut self.kind
        {
            *slot = Some(descriptors);
        }
        self
    }

    /// Returns the parameter's type tag.
    #[must_use]
    pub fn param_type(&self) -> ParamType {
        match self.kind {
            ParameterKind::Continuous { .. } => ParamType::Continuous,
            ParameterKind::Discrete { .. } => ParamType::Discrete,
            ParameterKind::Categorical { .. } => ParamType::Categorical,
        }
    }

    /// Number of options for discrete and categorical parameters.
    #[must_use]
    pub fn n_options(&self) -> Option<usize> {
        match &self.kind {
            ParameterKind::Continuous { .. } => None,
            ParameterKind::Discrete { options } => Some(options.len()),
            ParameterKind::Categorical { options, .. } => Some(options.len()),
        }
    }

    /// Returns the descriptors of a categorical parameter, if any.
    #[must_use]
    pub fn descriptors(&self) -> Option<&[Vec<f64>]> {
        match &self.kind {
            ParameterKind::Categorical {
                descriptors: Some(d),
                ..
            } => Some(d),
            _ => None,
        }
    }

    /// Numeric bounds of continuous and discrete parameters.
    #[must_use]
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match &self.kind {
            ParameterKind::Continuous { low, high } => Some((*low, *high)),
            ParameterKind::Discrete { options } => {
                let low = options.iter().copied().fold(f64::INFINITY, f64::min);
                let high = options.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                Some((low, high))
            }
            ParameterKind::Categorical { .. } => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.kind {
            ParameterKind::Continuous { low, high } => {
                if !low.is_finite() || !high.is_finite() || low >= high {
                    return Err(Error::InvalidBounds {
                        name: self.name.clone(),
                        low: *low,
                        high: *high,
                    });
                }
            }
            ParameterKind::Discrete { options } => {
                if options.is_empty() {
                    return Err(Error::EmptyOptions {
                        name: self.name.clone(),
                    });
                }
                if options.iter().any(|v| !v.is_finite()) {
                    return Err(Error::InvalidParamValue {
                        name: self.name.clone(),
                        reason: "discrete options must be finite".to_string(),
                    });
                }
            }
            ParameterKind::Categorical {
                options,
                descriptors,
            } => {
                if options.is_empty() {
                    return Err(Error::EmptyOptions {
                        name: self.name.clone(),
                    });
                }
                if let Some(descriptors) = descriptors {
                    if descriptors.len() != options.len() {
                        return Err(Error::InvalidDescriptors {
                            name: self.name.clone(),
                            reason: format!(
                                "{} descriptor vectors for {} options",
                                descriptors.len(),
                                options.len()
                            ),
                        });
                    }
                    let width = descriptors[0].len();
                    if width == 0 || descriptors.iter().any(|d| d.len() != width) {
                        return Err(Error::InvalidDescriptors {
                            name: self.name.clone(),
                            reason: "descriptor vectors must be non-empty and of equal length"
                                .to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Checks that `value` is admissible for this parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParamValue`] on a type mismatch, an
    /// out-of-bounds number or an out-of-range option index.
    pub fn check_value(&self, value: &ParamValue) -> Result<()> {
        let invalid = |reason: String| Error::InvalidParamValue {
            name: self.name.clone(),
            reason,
        };
        match (&self.kind, value) {
            (ParameterKind::Continuous { low, high }, ParamValue::Float(v)) => {
                if v.is_nan() || *v < *low || *v > *high {
                    return Err(invalid(format!("{v} outside [{low}, {high}]")));
                }
            }
            (ParameterKind::Discrete { options }, ParamValue::Float(v)) => {
                if !options.iter().any(|o| (o - v).abs() <= 1e-12 * o.abs().max(1.0)) {
                    return Err(invalid(format!("{v} is not one of the options")));
                }
            }
            (ParameterKind::Categorical { options, .. }, ParamValue::Categorical(i)) => {
                if *i >= options.len() {
                    return Err(invalid(format!(
                        "option index {i} out of range for {} options",
                        options.len()
                    )));
                }
            }
            (_, other) => return Err(invalid(format!("unexpected value kind {other:?}"))),
        }
        Ok(())
    }

    /// Draws a uniformly random admissible value.
    #[must_use]
    pub fn sample(&self, rng: &mut fastrand::Rng) -> ParamValue {
        match &self.kind {
            ParameterKind::Continuous { low, high } => {
                ParamValue::Float(rng_util::f64_range(rng, *low, *high))
            }
            ParameterKind::Discrete { options } => {
                ParamValue::Float(options[rng.usize(0..options.len())])
            }
            ParameterKind::Categorical { options, .. } => {
                ParamValue::Categorical(rng.usize(0..options.len()))
            }
        }
    }
}

/// An ordered, validated collection of parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
}

impl ParameterSpace {
    /// Creates a parameter space, validating every parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, bounds are invalid, options
    /// are empty, or descriptors do not match the options.
    pub fn new(parameters: Vec<Parameter>) -> Result<Self> {
        if parameters.is_empty() {
            return Err(Error::EmptyParameterSpace);
        }
        for p in &parameters {
            p.validate()?;
        }
        Ok(Self { parameters })
    }

    /// Returns the parameters in order.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Iterates over the parameters.
    pub fn iter(&self) -> core::slice::Iter<'_, Parameter> {
        self.parameters.iter()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Always `false`; a validated space holds at least one parameter.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Checks that `params` has one admissible value per parameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] or [`Error::InvalidParamValue`].
    pub fn check_vector(&self, params: &ParamVector) -> Result<()> {
        if params.len() != self.parameters.len() {
            return Err(Error::DimensionMismatch {
                expected: self.parameters.len(),
                got: params.len(),
            });
        }
        for (p, v) in self.parameters.iter().zip(params.values()) {
            p.check_value(v)?;
        }
        Ok(())
    }

    /// Draws a uniformly random parameter vector.
    #[must_use]
    pub fn sample(&self, rng: &mut fastrand::Rng) -> ParamVector {
        self.parameters.iter().map(|p| p.sample(rng)).collect()
    }
}

impl<'a> IntoIterator for &'a ParameterSpace {
    type Item = &'a Parameter;
    type IntoIter = core::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.parameters.iter()
    }
}
