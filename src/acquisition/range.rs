//! Estimation of the base acquisition's value range for normalization.

use super::BaseAcquisition;
use crate::encoding::Encoder;
use crate::error::Result;
use crate::surrogate::RegressionModel;

/// Default number of random points used to estimate the range.
pub const DEFAULT_NUM_SAMPLES: usize = 2000;

/// Spans narrower than this fall back to `(0, 1)`.
pub const RANGE_EPSILON: f64 = 1e-6;

/// `(min, max)` of `values`, or `(0, 1)` when the span is below
/// [`RANGE_EPSILON`] or there are no finite values.
///
/// # Examples
///
/// ```
/// use bayes_planner::acquisition::range::range_from_values;
///
/// assert_eq!(range_from_values(&[0.2, 0.7, 0.4]), (0.2, 0.7));
/// assert_eq!(range_from_values(&[0.3, 0.3 + 1e-9]), (0.0, 1.0));
/// ```
#[must_use]
pub fn range_from_values(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() || hi - lo < RANGE_EPSILON {
        (0.0, 1.0)
    } else {
        (lo, hi)
    }
}

/// Estimates the range of `base` over `n` uniformly random points of the
/// encoder's space.
///
/// The feasibility term is not involved. The joint family is scored on
/// random batches of its own size, drawn from the same `n` points, so the
/// range matches the values the batch is compared on. The `General` family
/// is not estimated and always yields `(0, 1)`.
///
/// # Errors
///
/// Propagates encoding errors and, for the joint family, factorization
/// errors of [`BaseAcquisition::batch_value`].
pub fn estimate_range(
    base: &BaseAcquisition,
    model: &dyn RegressionModel,
    encoder: &Encoder,
    n: usize,
    rng: &mut fastrand::Rng,
) -> Result<(f64, f64)> {
    let q = match base {
        BaseAcquisition::General { .. } => return Ok((0.0, 1.0)),
        BaseAcquisition::QExpectedImprovement { base_samples, .. } => {
            base_samples.first().map_or(1, Vec::len).max(1)
        }
        _ => 1,
    };
    let mut values = Vec::with_capacity(n / q + 1);
    if q == 1 {
        for _ in 0..n {
            let params = encoder.space().sample(rng);
            let x = encoder.encode(&params)?;
            values.push(base.single_value(model, &x));
        }
    } else {
        for _ in 0..(n / q).max(1) {
            let rows = (0..q)
                .map(|_| encoder.encode(&encoder.space().sample(rng)))
                .collect::<Result<Vec<_>>>()?;
            values.push(base.batch_value(model, &rows)?);
        }
    }
    let range = range_from_values(&values);
    trace_debug!(lo = range.0, hi = range.1, n, "acquisition range estimated");
    Ok(range)
}
