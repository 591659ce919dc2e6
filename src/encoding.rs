//! Feature encoding of parameter vectors for the surrogate models.
//!
//! Every parameter maps onto a contiguous group of features:
//!
//! | Parameter | Encoding | Width |
//! |-----------|----------|-------|
//! | continuous | value normalized by its bounds | 1 |
//! | discrete | value normalized by option min/max | 1 |
//! | categorical | one-hot over the options | `n_options` |
//! | categorical with descriptors (when enabled) | descriptor vector, each column normalized by its min/max over the options | descriptor length |
//!
//! All features therefore live in `[0, 1]`.

use crate::error::{Error, Result};
use crate::param::{ParamValue, ParamVector};
use crate::parameter::{ParameterKind, ParameterSpace};
use crate::scaler::{forward_normalize, reverse_normalize};

/// How a parameter's features are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    /// A single normalized numeric feature.
    Numeric,
    /// A one-hot block over categorical options.
    OneHot,
    /// A normalized descriptor vector.
    Descriptor,
}

/// The contiguous feature block owned by one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureGroup {
    /// Index of the parameter in the space.
    pub param_index: usize,
    /// First feature column of the block.
    pub offset: usize,
    /// Number of feature columns.
    pub width: usize,
    /// Encoding used by the block.
    pub kind: GroupKind,
}

/// Encodes parameter vectors into `[0, 1]` feature rows and back.
#[derive(Clone, Debug)]
pub struct Encoder {
    space: ParameterSpace,
    groups: Vec<FeatureGroup>,
    /// Normalized descriptor table per parameter (empty unless `Descriptor`).
    descriptor_tables: Vec<Vec<Vec<f64>>>,
    dim: usize,
}

impl Encoder {
    /// Builds the encoding for `space`.
    ///
    /// Descriptor encodings are only used when `use_descriptors` is set.
    #[must_use]
    pub fn new(space: &ParameterSpace, use_descriptors: bool) -> Self {
        let mut groups = Vec::with_capacity(space.len());
        let mut descriptor_tables = Vec::with_capacity(space.len());
        let mut offset = 0;

        for (param_index, p) in space.iter().enumerate() {
            let (kind, width, table) = match &p.kind {
                ParameterKind::Continuous { .. } | ParameterKind::Discrete { .. } => {
                    (GroupKind::Numeric, 1, Vec::new())
                }
                ParameterKind::Categorical {
                    descriptors: Some(desc),
                    ..
                } if use_descriptors => {
                    let width = desc[0].len();
                    (GroupKind::Descriptor, width, normalize_descriptors(desc))
                }
                ParameterKind::Categorical { options, .. } => {
                    (GroupKind::OneHot, options.len(), Vec::new())
                }
            };
            groups.push(FeatureGroup {
                param_index,
                offset,
                width,
                kind,
            });
            descriptor_tables.push(table);
            offset += width;
        }

        Self {
            space: space.clone(),
            groups,
            descriptor_tables,
            dim: offset,
        }
    }

    /// The encoded parameter space.
    #[must_use]
    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Feature blocks in parameter order.
    #[must_use]
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Total number of feature columns.
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.dim
    }

    /// Encodes one parameter vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the vector length differs
    /// from the space and [`Error::InvalidParamValue`] on a value of the
    /// wrong kind.
    pub fn encode(&self, params: &ParamVector) -> Result<Vec<f64>> {
        if params.len() != self.space.len() {
            return Err(Error::DimensionMismatch {
                expected: self.space.len(),
                got: params.len(),
            });
        }
        let mut row = Vec::with_capacity(self.dim);
        for (index, value) in params.values().iter().enumerate() {
            row.extend(self.encode_value(index, value)?);
        }
        Ok(row)
    }

    /// Encodes the value of a single parameter into its feature block.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] for an out-of-range index and
    /// [`Error::InvalidParamValue`] on a value of the wrong kind.
    pub fn encode_value(&self, param_index: usize, value: &ParamValue) -> Result<Vec<f64>> {
        let (Some(group), Some(param)) = (
            self.groups.get(param_index),
            self.space.parameters().get(param_index),
        ) else {
            return Err(Error::DimensionMismatch {
                expected: self.space.len(),
                got: param_index + 1,
            });
        };
        let mismatch = || Error::InvalidParamValue {
            name: param.name.clone(),
            reason: format!("unexpected value kind {value:?}"),
        };
        let mut block = vec![0.0; group.width];
        match group.kind {
            GroupKind::Numeric => {
                let v = value.as_f64().ok_or_else(mismatch)?;
                let (lo, hi) = param.bounds().ok_or_else(mismatch)?;
                block[0] = forward_normalize(v, lo, hi);
            }
            GroupKind::OneHot => {
                let i = value.as_index().ok_or_else(mismatch)?;
                *block.get_mut(i).ok_or_else(mismatch)? = 1.0;
            }
            GroupKind::Descriptor => {
                let i = value.as_index().ok_or_else(mismatch)?;
                let desc = self.descriptor_tables[param_index]
                    .get(i)
                    .ok_or_else(mismatch)?;
                block.copy_from_slice(desc);
            }
        }
        Ok(block)
    }

    /// Encodes many parameter vectors.
    ///
    /// # Errors
    ///
    /// See [`encode`](Self::encode).
    pub fn encode_all<'a, I>(&self, params: I) -> Result<Vec<Vec<f64>>>
    where
        I: IntoIterator<Item = &'a ParamVector>,
    {
        params.into_iter().map(|p| self.encode(p)).collect()
    }

    /// Decodes a feature row into the nearest admissible parameter vector.
    ///
    /// Continuous features are clamped to the bounds, discrete ones snap to
    /// the nearest option, one-hot blocks take the arg-max and descriptor
    /// blocks the nearest option descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `features` has the wrong length.
    pub fn decode(&self, features: &[f64]) -> Result<ParamVector> {
        if features.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                got: features.len(),
            });
        }
        let mut values = Vec::with_capacity(self.space.len());
        for group in &self.groups {
            let param = &self.space.parameters()[group.param_index];
            let block = &features[group.offset..group.offset + group.width];
            let value = match (&param.kind, group.kind) {
                (ParameterKind::Continuous { low, high }, _) => {
                    ParamValue::Float(reverse_normalize(block[0].clamp(0.0, 1.0), *low, *high))
                }
                (ParameterKind::Discrete { options }, _) => {
                    let (lo, hi) = param.bounds().unwrap_or((0.0, 1.0));
                    let raw = reverse_normalize(block[0], lo, hi);
                    ParamValue::Float(nearest_option(options, raw))
                }
                (ParameterKind::Categorical { .. }, GroupKind::Descriptor) => {
                    let table = &self.descriptor_tables[group.param_index];
                    ParamValue::Categorical(nearest_row(table, block))
                }
                (ParameterKind::Categorical { .. }, _) => ParamValue::Categorical(argmax(block)),
            };
            values.push(value);
        }
        Ok(ParamVector::new(values))
    }

    /// Snaps a feature row onto the encoding of its nearest admissible point.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn project(&self, features: &[f64]) -> Result<Vec<f64>> {
        let params = self.decode(features)?;
        self.encode(&params)
    }
}

fn normalize_descriptors(desc: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let width = desc.first().map_or(0, Vec::len);
    let mins: Vec<f64> = (0..width)
        .map(|j| desc.iter().map(|d| d[j]).fold(f64::INFINITY, f64::min))
        .collect();
    let maxs: Vec<f64> = (0..width)
        .map(|j| desc.iter().map(|d| d[j]).fold(f64::NEG_INFINITY, f64::max))
        .collect();
    desc.iter()
        .map(|d| {
            d.iter()
                .enumerate()
                .map(|(j, &v)| forward_normalize(v, mins[j], maxs[j]))
                .collect()
        })
        .collect()
}

fn nearest_option(options: &[f64], value: f64) -> f64 {
    options
        .iter()
        .copied()
        .min_by(|a, b| (a - value).abs().total_cmp(&(b - value).abs()))
        .unwrap_or(value)
}

fn nearest_row(table: &[Vec<f64>], target: &[f64]) -> usize {
    let dist = |row: &[f64]| -> f64 {
        row.iter()
            .zip(target)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
    };
    table
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| dist(a).total_cmp(&dist(b)))
        .map_or(0, |(i, _)| i)
}

fn argmax(block: &[f64]) -> usize {
    block
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map_or(0, |(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::Parameter;

    fn mixed_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::continuous("x", -1.0, 1.0),
            Parameter::discrete("d", vec![0.0, 5.0, 10.0]),
            Parameter::categorical("k", ["a", "b", "c"]).with_descriptors(vec![
                vec![0.0, 10.0],
                vec![1.0, 20.0],
                vec![2.0, 40.0],
            ]),
        ])
        .unwrap()
    }

    #[test]
    fn one_hot_layout_without_descriptors() {
        let enc = Encoder::new(&mixed_space(), false);
        assert_eq!(enc.feature_dim(), 5);
        let row = enc
            .encode(&ParamVector::new(vec![
                ParamValue::Float(0.0),
                ParamValue::Float(10.0),
                ParamValue::Categorical(1),
            ]))
            .unwrap();
        assert_eq!(row, vec![0.5, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn descriptor_layout_when_enabled() {
        let enc = Encoder::new(&mixed_space(), true);
        assert_eq!(enc.feature_dim(), 4);
        assert_eq!(enc.groups()[2].kind, GroupKind::Descriptor);
        let row = enc
            .encode(&ParamVector::new(vec![
                ParamValue::Float(1.0),
                ParamValue::Float(0.0),
                ParamValue::Categorical(2),
            ]))
            .unwrap();
        assert_eq!(row, vec![1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn decode_snaps_to_admissible_values() {
        let enc = Encoder::new(&mixed_space(), true);
        let params = enc.decode(&[1.7, 0.45, 0.4, 0.3]).unwrap();
        assert_eq!(params[0], ParamValue::Float(1.0));
        assert_eq!(params[1], ParamValue::Float(5.0));
        assert_eq!(params[2], ParamValue::Categorical(1));
    }

    #[test]
    fn project_is_idempotent() {
        let enc = Encoder::new(&mixed_space(), false);
        let once = enc.project(&[0.3, 0.8, 0.2, 0.9, 0.1]).unwrap();
        let twice = enc.project(&once).unwrap();
        assert_eq!(&once[1..], &[1.0, 0.0, 1.0, 0.0]);
        for (a, b) in once.iter().zip(&twice) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn rejects_wrong_length() {
        let enc = Encoder::new(&mixed_space(), false);
        assert!(matches!(
            enc.encode(&ParamVector::new(vec![ParamValue::Float(0.0)])),
            Err(Error::DimensionMismatch { .. })
        ));
    }
}
