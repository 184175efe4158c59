// External imports
use log::{info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_5_dataset_assembly::{DatasetAssembly, DatasetOrigin};
use super::step_6_regressor_arch::{Model, Regressor};
use super::step_7_train_model::train_model;
use super::step_9_dataset_serialization::DatasetCache;
use crate::config::PipelineConfig;
use crate::constants::{MAX_SENTIMENT_SAMPLES, RECENT_PREDICTIONS};
use crate::error::{ForecastError, Result, Stage, StageContext};
use crate::sources::{MarketDataSource, NewsSource, SentimentScorer};
use crate::types::{ForecastResult, ScoredHeadline};
use crate::util::model_logger::ForecastRunRecord;

/// Clamps the change implied by `raw` relative to `last_close` to `±max_pct`.
///
/// A prediction inside the bound is returned untouched. A zero `last_close`
/// has no defined change and caps to zero.
pub fn cap_prediction(raw: f64, last_close: f64, max_pct: f64) -> ForecastResult {
    if last_close == 0.0 {
        return ForecastResult {
            raw_prediction: raw,
            capped_pct_change: 0.0,
            capped_prediction: 0.0,
        };
    }

    let pct = (raw - last_close) / last_close;
    let clamped = pct.max(-max_pct).min(max_pct);
    let capped_prediction = if clamped == pct {
        raw
    } else {
        last_close + last_close * clamped
    };

    ForecastResult {
        raw_prediction: raw,
        capped_pct_change: clamped,
        capped_prediction,
    }
}

/// Wraps a model's raw next-day prediction with a maximum daily change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedForecaster {
    max_daily_change_pct: f64,
}

impl BoundedForecaster {
    pub fn new(max_daily_change_pct: f64) -> Result<Self> {
        if !max_daily_change_pct.is_finite() || max_daily_change_pct < 0.0 {
            return Err(ForecastError::Configuration(format!(
                "max_daily_change_pct must be a non-negative number, got {}",
                max_daily_change_pct
            )));
        }
        Ok(Self {
            max_daily_change_pct,
        })
    }

    pub fn max_daily_change_pct(&self) -> f64 {
        self.max_daily_change_pct
    }

    /// Predicts from one feature vector and caps the result against `last_close`
    pub fn predict<M: Model + ?Sized>(
        &self,
        model: &M,
        latest_features: &[f64],
        last_close: f64,
    ) -> Result<ForecastResult> {
        if !last_close.is_finite() {
            return Err(ForecastError::Model(format!(
                "last known close is not a number: {}",
                last_close
            )));
        }

        let x = Array2::from_shape_vec((1, latest_features.len()), latest_features.to_vec())
            .map_err(|e| ForecastError::Model(e.to_string()))?;
        let raw = model
            .predict(x.view())?
            .first()
            .copied()
            .ok_or_else(|| ForecastError::Model("model returned no prediction".into()))?;
        if !raw.is_finite() {
            return Err(ForecastError::Model(format!("model predicted {}", raw)));
        }

        Ok(cap_prediction(raw, last_close, self.max_daily_change_pct))
    }
}

/// JSON result of a forecasting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub ok: bool,
    pub symbol: String,
    pub samples: usize,
    /// Capped next-day close, `null` only without any sample
    pub prediction: Option<f64>,
    pub recent_predictions: Vec<f64>,
    pub sentiment_samples: Vec<ScoredHeadline>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<DatasetOrigin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capped_pct_change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_rmse: Option<f64>,
    /// Feature vector the prediction was made from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_features: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl ForecastReport {
    fn empty(symbol: &str) -> Self {
        Self {
            ok: true,
            symbol: symbol.to_string(),
            samples: 0,
            prediction: None,
            recent_predictions: Vec::new(),
            sentiment_samples: Vec::new(),
            error: None,
            origin: None,
            raw_prediction: None,
            capped_pct_change: None,
            last_close: None,
            test_rmse: None,
            latest_features: None,
            notes: Vec::new(),
        }
    }

    /// Report for a run that could not complete
    pub fn failure(symbol: &str, error: &ForecastError) -> Self {
        Self {
            ok: false,
            error: Some(error.to_string()),
            ..Self::empty(symbol)
        }
    }
}

/// Assembles the dataset, trains, and produces a capped next-day forecast
///
/// # Arguments
///
/// * `ticker` - Instrument symbol, case-insensitive
/// * `config` - Run settings
/// * `cache` - Cached dataset store shared between runs
/// * `prices`, `news`, `scorer` - External collaborators
/// * `regressor` - Model to fit
///
/// # Returns
///
/// The report of a completed run; fatal errors carry ticker and stage
pub fn run_forecast<R: Regressor>(
    ticker: &str,
    config: &PipelineConfig,
    cache: &DatasetCache,
    prices: &dyn MarketDataSource,
    news: &dyn NewsSource,
    scorer: &dyn SentimentScorer,
    regressor: &R,
) -> Result<ForecastReport> {
    let symbol = ticker.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(ForecastError::Configuration("ticker must not be empty".into()));
    }
    config.validate()?;
    let forecaster = BoundedForecaster::new(config.max_daily_change_pct)?;

    let assembled = DatasetAssembly::new(config, cache).assemble(&symbol, prices, news, scorer)?;
    let dataset = &assembled.dataset;

    let mut report = ForecastReport {
        samples: dataset.len(),
        sentiment_samples: assembled
            .headlines
            .iter()
            .take(MAX_SENTIMENT_SAMPLES)
            .cloned()
            .collect(),
        origin: Some(assembled.origin),
        ..ForecastReport::empty(&symbol)
    };
    if dataset.is_empty() {
        warn!("{}: no samples, no prediction", symbol);
        return Ok(report);
    }

    let outcome = train_model(&symbol, regressor, dataset).at_stage(&symbol, Stage::Training)?;

    // The live next-day vector when there is one, otherwise the newest sample
    let (features, last_close) = match &assembled.latest {
        Some(latest) if latest.features.len() == dataset.scheme.feature_len() => {
            (latest.features.clone(), latest.last_close)
        }
        _ => {
            let newest = dataset.samples.last().ok_or_else(|| ForecastError::DataUnavailable {
                ticker: symbol.clone(),
                reason: "no samples".into(),
            })?;
            let last_close = dataset
                .scheme
                .last_close(&newest.features)
                .ok_or_else(|| ForecastError::Model("sample holds no close".into()))
                .at_stage(&symbol, Stage::Prediction)?;
            (newest.features.clone(), last_close)
        }
    };

    let forecast = forecaster
        .predict(&outcome.model, &features, last_close)
        .at_stage(&symbol, Stage::Prediction)?;
    info!(
        "{}: raw {:.4}, capped {:.4} ({:+.2}%) from last close {:.4}",
        symbol,
        forecast.raw_prediction,
        forecast.capped_prediction,
        forecast.capped_pct_change * 100.0,
        last_close
    );

    let recent_start = outcome.test_predictions.len().saturating_sub(RECENT_PREDICTIONS);
    report.prediction = Some(forecast.capped_prediction);
    report.recent_predictions = outcome.test_predictions[recent_start..].to_vec();
    report.raw_prediction = Some(forecast.raw_prediction);
    report.capped_pct_change = Some(forecast.capped_pct_change);
    report.last_close = Some(last_close);
    report.test_rmse = outcome.test_rmse;
    report.latest_features = Some(features);
    report.notes = outcome.notes.iter().map(|n| n.to_string()).collect();
    report.notes.extend(assembled.issues.iter().map(|e| e.to_string()));

    if let Some(dir) = &config.run_log_dir {
        let record = ForecastRunRecord::new(&symbol, &assembled, &outcome.plan, outcome.test_rmse, &forecast);
        if let Err(e) = record.save(dir) {
            warn!("{}: could not write run record: {}", symbol, e);
        }
    }

    Ok(report)
}
