// External imports
use log::{info, warn};
use ndarray::s;
use serde::Serialize;
use std::fmt;

// Internal imports
use super::step_6_regressor_arch::{Model, Regressor};
use crate::constants::{
    DEGENERATE_SAMPLE_THRESHOLD, SMALL_DATASET_SPLIT_RATIO, SMALL_DATASET_THRESHOLD,
    VALIDATION_SPLIT_RATIO,
};
use crate::error::{ForecastError, Result};
use crate::types::Dataset;

/// Chronological train/test split sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPlan {
    pub train_len: usize,
    pub test_len: usize,
    /// Too few samples to hold any out: fitted and evaluated on the same data
    pub degenerate: bool,
}

/// Non-fatal remarks about how a model was trained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainingNote {
    DegenerateSmallSample { samples: usize },
}

impl fmt::Display for TrainingNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingNote::DegenerateSmallSample { samples } => write!(
                f,
                "only {} samples: fitted on all of them, predictions are in-sample",
                samples
            ),
        }
    }
}

/// Split sizes for `n` samples.
///
/// The test share is 20%, or 50% below ten samples, rounded up. Below five
/// samples nothing is held out. Returns `None` for an empty dataset.
pub fn plan_split(n: usize) -> Option<SplitPlan> {
    if n == 0 {
        return None;
    }
    if n < DEGENERATE_SAMPLE_THRESHOLD {
        return Some(SplitPlan {
            train_len: n,
            test_len: n,
            degenerate: true,
        });
    }

    let fraction = if n < SMALL_DATASET_THRESHOLD {
        SMALL_DATASET_SPLIT_RATIO
    } else {
        VALIDATION_SPLIT_RATIO
    };
    let test_len = ((n as f64 * fraction).ceil() as usize).clamp(1, n - 1);
    Some(SplitPlan {
        train_len: n - test_len,
        test_len,
        degenerate: false,
    })
}

/// Root mean squared error, `None` for empty input
pub fn rmse(predictions: &[f64], targets: &[f64]) -> Option<f64> {
    if predictions.is_empty() || predictions.len() != targets.len() {
        return None;
    }
    let sum: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t) * (p - t))
        .sum();
    Some((sum / predictions.len() as f64).sqrt())
}

/// A fitted model together with its evaluation on the held-out tail
#[derive(Debug)]
pub struct TrainingOutcome<M> {
    pub model: M,
    pub plan: SplitPlan,
    /// Predictions for the test samples, oldest first
    pub test_predictions: Vec<f64>,
    pub test_rmse: Option<f64>,
    pub notes: Vec<TrainingNote>,
}

/// Fits `regressor` on the oldest samples and evaluates on the newest
///
/// # Arguments
///
/// * `ticker` - Symbol the dataset belongs to, used in errors and logs
/// * `regressor` - Model factory to fit
/// * `dataset` - Chronologically ordered samples
///
/// # Returns
///
/// The fitted model with its test predictions, or `DataUnavailable` for an empty dataset
pub fn train_model<R: Regressor>(
    ticker: &str,
    regressor: &R,
    dataset: &Dataset,
) -> Result<TrainingOutcome<R::Model>> {
    let plan = plan_split(dataset.len()).ok_or_else(|| ForecastError::DataUnavailable {
        ticker: ticker.to_string(),
        reason: "no training samples".into(),
    })?;

    let x = dataset.feature_matrix()?;
    let y = dataset.label_vector();
    let mut notes = Vec::new();

    let (model, test_x, test_y) = if plan.degenerate {
        let note = TrainingNote::DegenerateSmallSample {
            samples: dataset.len(),
        };
        warn!("{}: {}", ticker, note);
        notes.push(note);
        let model = regressor.fit(x.view(), y.view())?;
        (model, x.view(), y.view())
    } else {
        let split = plan.train_len;
        info!(
            "{}: training on {} samples, testing on {}",
            ticker, plan.train_len, plan.test_len
        );
        let model = regressor.fit(x.slice(s![..split, ..]), y.slice(s![..split]))?;
        (model, x.slice(s![split.., ..]), y.slice(s![split..]))
    };

    let test_predictions = model.predict(test_x)?.to_vec();
    let targets = test_y.to_vec();
    let test_rmse = rmse(&test_predictions, &targets);
    if let Some(value) = test_rmse {
        info!("{}: test RMSE {:.4}", ticker, value);
    }

    Ok(TrainingOutcome {
        model,
        plan,
        test_predictions,
        test_rmse,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureScheme, Sample};
    use crate::util::test_utils::MeanRegressor;

    fn dataset(n: usize) -> Dataset {
        let mut dataset = Dataset::new(FeatureScheme::PriceWindow { window_size: 1 });
        for i in 0..n {
            dataset.samples.push(Sample {
                features: vec![i as f64, 0.0, 0.0, 0.0],
                label: i as f64,
                span: None,
            });
        }
        dataset
    }

    #[test]
    fn test_split_sizes() {
        assert_eq!(plan_split(0), None);
        for n in 1..5 {
            let plan = plan_split(n).unwrap();
            assert!(plan.degenerate);
            assert_eq!((plan.train_len, plan.test_len), (n, n));
        }
        // Half held out below ten samples, rounded up
        assert_eq!(plan_split(5).unwrap().test_len, 3);
        assert_eq!(plan_split(9).unwrap().test_len, 5);
        // A fifth from ten samples on
        assert_eq!(plan_split(10).unwrap().test_len, 2);
        assert_eq!(plan_split(12).unwrap().test_len, 3);
        assert_eq!(plan_split(100).unwrap().test_len, 20);
        assert!(!plan_split(100).unwrap().degenerate);
    }

    #[test]
    fn test_train_on_oldest_test_on_newest() {
        let outcome = train_model("AAPL", &MeanRegressor, &dataset(10)).unwrap();

        assert_eq!(outcome.plan.train_len, 8);
        assert_eq!(outcome.test_predictions.len(), 2);
        // Mean of labels 0..8
        assert!(outcome.test_predictions.iter().all(|p| (*p - 3.5).abs() < 1e-12));
        let expected = (((8.0f64 - 3.5).powi(2) + (9.0f64 - 3.5).powi(2)) / 2.0).sqrt();
        assert!((outcome.test_rmse.unwrap() - expected).abs() < 1e-12);
        assert!(outcome.notes.is_empty());
    }

    #[test]
    fn test_tiny_dataset_is_fitted_in_sample() {
        let outcome = train_model("AAPL", &MeanRegressor, &dataset(1)).unwrap();

        assert!(outcome.plan.degenerate);
        assert_eq!(outcome.test_predictions, vec![0.0]);
        assert_eq!(
            outcome.notes,
            vec![TrainingNote::DegenerateSmallSample { samples: 1 }]
        );
    }

    #[test]
    fn test_empty_dataset_is_unavailable() {
        let result = train_model("AAPL", &MeanRegressor, &dataset(0));
        assert!(matches!(result, Err(ForecastError::DataUnavailable { .. })));
    }

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&[], &[]), None);
        assert_eq!(rmse(&[1.0, 3.0], &[1.0, 1.0]), Some(2.0f64.sqrt()));
    }
}
