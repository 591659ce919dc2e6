//! Parameter value storage types.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents one parameter's value inside a [`ParamVector`].
///
/// Continuous and discrete parameters store their numeric value. For
/// categorical parameters, the `Categorical` variant stores the index into
/// the options array.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    /// A continuous or discrete parameter value.
    Float(f64),
    /// A categorical parameter value, stored as an index into the options.
    Categorical(usize),
}

impl ParamValue {
    /// Returns the numeric value, or `None` for categorical values.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Categorical(_) => None,
        }
    }

    /// Returns the option index, or `None` for numeric values.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Float(_) => None,
            Self::Categorical(i) => Some(*i),
        }
    }
}

/// A point in the parameter space: one [`ParamValue`] per parameter, in
/// parameter-space order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamVector {
    values: Vec<ParamValue>,
}

impl ParamVector {
    /// Creates a parameter vector from its values.
    #[must_use]
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    /// Returns the values in parameter order.
    #[must_use]
    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    /// Returns a mutable view of the values.
    pub fn values_mut(&mut self) -> &mut [ParamValue] {
        &mut self.values
    }

    /// Returns the value of the `index`-th parameter.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index)
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the vector holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flattens the vector into numbers; categorical values become their index.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_array(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| match v {
                ParamValue::Float(x) => *x,
                ParamValue::Categorical(i) => *i as f64,
            })
            .collect()
    }
}

impl From<Vec<ParamValue>> for ParamVector {
    fn from(values: Vec<ParamValue>) -> Self {
        Self::new(values)
    }
}

impl FromIterator<ParamValue> for ParamVector {
    fn from_iter<I: IntoIterator<Item = ParamValue>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl core::ops::Index<usize> for ParamVector {
    type Output = ParamValue;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}
