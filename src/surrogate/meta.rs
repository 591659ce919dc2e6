//! Meta-learned Gaussian process.
//!
//! The kernel hyperparameters are shared across related source tasks and
//! trained by maximizing the sum of the per-task log marginal likelihoods.
//! On the target task the trained kernel is only conditioned on the
//! current regression data, never refit.

#[cfg(feature = "serde")]
use std::path::Path;

use nalgebra::DVector;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::gp::{GpPosterior, MIN_JITTER, log_marginal_likelihood, maximize_log_params};
use super::kernel::{Kernel, KernelKind, KernelLayout};
use crate::error::{Error, Result};
use crate::rng_util;

/// Feature rows and scalar targets of one task.
pub type TaskData = (Vec<Vec<f64>>, Vec<f64>);

/// Likelihood evaluations per restart during meta-training.
const META_MAX_EVALS: usize = 200;
/// Random restarts during meta-training.
const META_RESTARTS: usize = 4;

/// A GP whose hyperparameters were trained on source tasks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MetaGp {
    kernel: Kernel,
    n_tasks: usize,
    train_lml: f64,
    valid_lml: Option<f64>,
}

impl MetaGp {
    /// Trains shared hyperparameters on `train` and scores them on `valid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] without usable training tasks and
    /// [`Error::DimensionMismatch`] for tasks of the wrong feature width.
    pub fn train(
        kind: KernelKind,
        layout: KernelLayout,
        train: &[TaskData],
        valid: &[TaskData],
        rng: &mut fastrand::Rng,
    ) -> Result<Self> {
        let train: Vec<(Vec<Vec<f64>>, DVector<f64>)> = train
            .iter()
            .filter(|(x, y)| !x.is_empty() && x.len() == y.len())
            .map(|(x, y)| (x.clone(), centered(y)))
            .collect();
        if train.is_empty() {
            return Err(Error::InvalidConfig(
                "meta-learning needs at least one non-empty source task".to_string(),
            ));
        }
        let width = layout.numeric.len() + layout.groups.iter().map(|g| g.1).sum::<usize>();
        for (x, _) in &train {
            if let Some(bad) = x.iter().find(|row| row.len() < width) {
                return Err(Error::DimensionMismatch {
                    expected: width,
                    got: bad.len(),
                });
            }
        }

        let mut kernel = Kernel::new(kind, layout);
        let bounds = kernel.log_bounds();
        let mut starts = vec![kernel.to_log_vector()];
        for _ in 0..META_RESTARTS {
            starts.push(
                bounds
                    .iter()
                    .map(|(lo, hi)| rng_util::f64_range(rng, *lo, *hi))
                    .collect(),
            );
        }

        let mut probe = kernel.clone();
        let (theta, train_lml) = maximize_log_params(
            |theta| {
                probe.set_log_vector(theta);
                summed_lml(&probe, &train)
            },
            &starts,
            &bounds,
            META_MAX_EVALS,
        );
        kernel.set_log_vector(&theta);

        let valid: Vec<(Vec<Vec<f64>>, DVector<f64>)> = valid
            .iter()
            .filter(|(x, y)| !x.is_empty() && x.len() == y.len())
            .map(|(x, y)| (x.clone(), centered(y)))
            .collect();
        let valid_lml = (!valid.is_empty()).then(|| summed_lml(&kernel, &valid));

        trace_info!(
            n_tasks = train.len(),
            train_lml,
            valid_lml = valid_lml.unwrap_or(f64::NAN),
            "meta-training finished"
        );

        Ok(Self {
            kernel,
            n_tasks: train.len(),
            train_lml,
            valid_lml,
        })
    }

    /// Conditions the meta-trained kernel on target-task data.
    ///
    /// # Errors
    ///
    /// See [`GpPosterior::condition_kernel`].
    pub fn condition(&self, x: &[Vec<f64>], y: &[f64], max_jitter: f64) -> Result<GpPosterior> {
        GpPosterior::condition_kernel(self.kernel.clone(), x, y, max_jitter)
    }

    /// The trained kernel.
    #[must_use]
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Number of source tasks used for training.
    #[must_use]
    pub fn n_tasks(&self) -> usize {
        self.n_tasks
    }

    /// Summed log marginal likelihood on the training tasks.
    #[must_use]
    pub fn train_lml(&self) -> f64 {
        self.train_lml
    }

    /// Summed log marginal likelihood on the validation tasks, if any.
    #[must_use]
    pub fn valid_lml(&self) -> Option<f64> {
        self.valid_lml
    }

    /// Writes the model to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on I/O or serialization failure.
    #[cfg(feature = "serde")]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| Error::Storage(e.to_string()))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| Error::Storage(e.to_string()))
    }

    /// Reads a model written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on I/O or deserialization failure, and
    /// when the stored hyperparameters do not match the stored layout.
    #[cfg(feature = "serde")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        let model: Self = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Storage(e.to_string()))?;
        model
            .kernel
            .check_consistent()
            .map_err(|msg| Error::Storage(format!("malformed meta model: {msg}")))?;
        Ok(model)
    }
}

fn centered(y: &[f64]) -> DVector<f64> {
    #[allow(clippy::cast_precision_loss)]
    let mean = y.iter().sum::<f64>() / y.len().max(1) as f64;
    DVector::from_iterator(y.len(), y.iter().map(|v| v - mean))
}

fn summed_lml(kernel: &Kernel, tasks: &[(Vec<Vec<f64>>, DVector<f64>)]) -> f64 {
    tasks
        .iter()
        .map(|(x, y)| {
            log_marginal_likelihood(kernel.matrix(x, MIN_JITTER), y).unwrap_or(f64::NEG_INFINITY)
        })
        .sum()
}
