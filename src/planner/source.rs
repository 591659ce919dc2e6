//! Preparation of source-task data for meta-learning.
//!
//! Source tasks pass through a fixed, ordered pipeline of pure stages:
//!
//! 1. [`TaskStage::SignFlip`]: negate every value when maximizing;
//! 2. [`TaskStage::Scalarize`]: reduce multi-objective rows to one merit;
//! 3. [`TaskStage::Scale`]: normalize parameters and standardize values,
//!    fit on the training tasks and applied unchanged to validation tasks.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scalarizer::Scalarizer;
use crate::scaler::{ScaleKind, Scaler};
use crate::surrogate::meta::TaskData;
use crate::types::Direction;

/// Observations of one related task.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SourceTask {
    /// Feature rows, one per observation, laid out like the target
    /// encoding (one column per numeric parameter, one-hot or descriptor
    /// columns per categorical parameter).
    pub params: Vec<Vec<f64>>,
    /// Objective rows, one per observation.
    pub values: Vec<Vec<f64>>,
}

impl SourceTask {
    /// Creates a task, checking that rows line up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the row counts differ.
    pub fn new(params: Vec<Vec<f64>>, values: Vec<Vec<f64>>) -> Result<Self> {
        if params.len() != values.len() {
            return Err(Error::DimensionMismatch {
                expected: params.len(),
                got: values.len(),
            });
        }
        Ok(Self { params, values })
    }

    /// Creates a single-objective task.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn single(params: Vec<Vec<f64>>, values: Vec<f64>) -> Result<Self> {
        Self::new(params, values.into_iter().map(|v| vec![v]).collect())
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the task holds no observations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// One stage of the source-task pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStage {
    /// Negate values for maximization goals.
    SignFlip,
    /// Reduce multi-objective rows to one value.
    Scalarize,
    /// Normalize parameters and standardize values.
    Scale,
}

/// The stages in application order.
pub const PIPELINE: [TaskStage; 3] = [TaskStage::SignFlip, TaskStage::Scalarize, TaskStage::Scale];

/// Negates every value if `goal` is [`Direction::Maximize`].
#[must_use]
pub fn flip_signs(tasks: &[SourceTask], goal: Direction) -> Vec<SourceTask> {
    let sign = goal.sign();
    tasks
        .iter()
        .map(|t| SourceTask {
            params: t.params.clone(),
            values: t
                .values
                .iter()
                .map(|row| row.iter().map(|v| v * sign).collect())
                .collect(),
        })
        .collect()
}

/// Scalarizes each task's rows independently.
///
/// Without a scalarizer the tasks pass through unchanged.
///
/// # Errors
///
/// Propagates [`Scalarizer::scalarize`] errors.
pub fn scalarize_tasks(
    tasks: &[SourceTask],
    scalarizer: Option<&dyn Scalarizer>,
) -> Result<Vec<SourceTask>> {
    let Some(scalarizer) = scalarizer else {
        return Ok(tasks.to_vec());
    };
    tasks
        .iter()
        .map(|t| {
            let merits = scalarizer.scalarize(&t.values)?;
            Ok(SourceTask {
                params: t.params.clone(),
                values: merits.into_iter().map(|v| vec![v]).collect(),
            })
        })
        .collect()
}

/// Source tasks ready for meta-training.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedTasks {
    /// Scaled training tasks.
    pub train: Vec<TaskData>,
    /// Scaled validation tasks.
    pub valid: Vec<TaskData>,
    /// Scaler fitted on the training tasks.
    pub scaler: Scaler,
}

/// Fits a scaler on `train` and applies it to both task lists.
///
/// # Errors
///
/// Returns [`Error::ObjectiveDimensionMismatch`] when a task was not reduced
/// to one value per row, and propagates scaler errors.
pub fn scale_tasks(train: &[SourceTask], valid: &[SourceTask]) -> Result<PreparedTasks> {
    let as_pairs = |tasks: &[SourceTask]| -> Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        tasks
            .iter()
            .map(|t| (t.params.clone(), t.values.clone()))
            .collect()
    };
    let mut scaler = Scaler::new(ScaleKind::Normalize, ScaleKind::Standardize);
    let train = scaler.fit_transform_tasks(&as_pairs(train))?;
    let valid = scaler.transform_tasks(&as_pairs(valid))?;
    Ok(PreparedTasks {
        train: to_task_data(train)?,
        valid: to_task_data(valid)?,
        scaler,
    })
}

fn to_task_data(tasks: Vec<(Vec<Vec<f64>>, Vec<Vec<f64>>)>) -> Result<Vec<TaskData>> {
    tasks
        .into_iter()
        .map(|(params, values)| {
            let y = values
                .into_iter()
                .map(|row| match row.as_slice() {
                    [v] => Ok(*v),
                    other => Err(Error::ObjectiveDimensionMismatch {
                        expected: 1,
                        got: other.len(),
                    }),
                })
                .collect::<Result<Vec<f64>>>()?;
            Ok((params, y))
        })
        .collect()
}

/// Runs every stage of [`PIPELINE`] in order.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] without training tasks and propagates
/// stage errors.
pub fn prepare_source_tasks(
    train: &[SourceTask],
    valid: &[SourceTask],
    goal: Direction,
    scalarizer: Option<&dyn Scalarizer>,
) -> Result<PreparedTasks> {
    if train.iter().all(SourceTask::is_empty) {
        return Err(Error::InvalidConfig(
            "meta-learning needs at least one non-empty training task".to_string(),
        ));
    }
    let (mut train, mut valid) = (train.to_vec(), valid.to_vec());
    let mut prepared = None;
    for stage in PIPELINE {
        match stage {
            TaskStage::SignFlip => {
                train = flip_signs(&train, goal);
                valid = flip_signs(&valid, goal);
            }
            TaskStage::Scalarize => {
                train = scalarize_tasks(&train, scalarizer)?;
                valid = scalarize_tasks(&valid, scalarizer)?;
            }
            TaskStage::Scale => prepared = Some(scale_tasks(&train, &valid)?),
        }
    }
    trace_debug!(
        n_train = train.len(),
        n_valid = valid.len(),
        "source tasks prepared"
    );
    prepared.ok_or(Error::Internal("source pipeline has no scale stage"))
}
