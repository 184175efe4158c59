// External crates
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::SENTIMENT_LOOKBACK;
use crate::error::{ForecastError, Result};

/// One daily OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// A scored sentiment observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentEvent {
    pub date: NaiveDate,
    pub score: f64,
}

/// A raw headline as delivered by a news source
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub text: String,
    pub date: NaiveDate,
}

/// A headline together with the score it received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHeadline {
    pub text: String,
    pub score: f64,
}

/// Per-day row of the aligned timeline.
///
/// Indicator values are `None` while their rolling window is still filling;
/// `sentiment` holds the trailing aligned sentiment vector of the day (oldest
/// first, strictly before `date`).
#[derive(Debug, Clone, PartialEq)]
pub struct DailyFeatureRow {
    pub date: NaiveDate,
    pub close: f64,
    pub sma_10: Option<f64>,
    pub ema_10: Option<f64>,
    pub rsi_14: Option<f64>,
    pub atr_14: Option<f64>,
    pub sentiment: Vec<f64>,
}

impl DailyFeatureRow {
    /// Sentiment of the most recent day before this row
    pub fn aligned_sentiment(&self) -> f64 {
        self.sentiment.last().copied().unwrap_or(0.0)
    }

    /// Whether every rolling window feeding this row is fully populated
    pub fn is_eligible(&self) -> bool {
        self.indicator_features().is_some()
    }

    /// Indicator-scheme feature vector, `None` if any input is undefined
    pub fn indicator_features(&self) -> Option<Vec<f64>> {
        let values = [
            Some(self.close),
            self.sma_10,
            self.ema_10,
            self.rsi_14,
            self.atr_14,
            Some(self.aligned_sentiment()),
        ];
        let features: Option<Vec<f64>> = values.into_iter().collect();
        features.filter(|f| f.iter().all(|v| v.is_finite()))
    }
}

/// Dates bracketing a sample built from a real timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSpan {
    /// Latest day any feature was taken from
    pub window_end: NaiveDate,
    pub label_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f64>,
    pub label: f64,
    /// Absent for synthetic and cached samples
    pub span: Option<SampleSpan>,
}

/// How a feature vector was laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureScheme {
    /// `window_size` trailing closes followed by the trailing sentiment vector
    PriceWindow { window_size: usize },
    /// Current-day close, SMA_10, EMA_10, RSI_14, ATR_14 and aligned sentiment
    Indicators,
}

impl FeatureScheme {
    pub fn feature_len(&self) -> usize {
        match self {
            FeatureScheme::PriceWindow { window_size } => window_size + SENTIMENT_LOOKBACK,
            FeatureScheme::Indicators => crate::constants::INDICATOR_FEATURES.len(),
        }
    }

    /// Last known close encoded in a feature vector of this scheme
    pub fn last_close(&self, features: &[f64]) -> Option<f64> {
        match self {
            FeatureScheme::PriceWindow { window_size } => {
                window_size.checked_sub(1).and_then(|i| features.get(i)).copied()
            }
            FeatureScheme::Indicators => features.first().copied(),
        }
    }
}

/// Chronologically ordered samples
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub scheme: FeatureScheme,
    pub samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(scheme: FeatureScheme) -> Self {
        Self {
            scheme,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Feature matrix `[n_samples, n_features]`
    pub fn feature_matrix(&self) -> Result<Array2<f64>> {
        let n_features = self.scheme.feature_len();
        let mut flat = Vec::with_capacity(self.samples.len() * n_features);
        for (i, sample) in self.samples.iter().enumerate() {
            if sample.features.len() != n_features {
                return Err(ForecastError::Configuration(format!(
                    "sample {} has {} features, expected {}",
                    i,
                    sample.features.len(),
                    n_features
                )));
            }
            flat.extend_from_slice(&sample.features);
        }
        Array2::from_shape_vec((self.samples.len(), n_features), flat)
            .map_err(|e| ForecastError::Model(e.to_string()))
    }

    pub fn label_vector(&self) -> Array1<f64> {
        Array1::from(self.labels())
    }

    /// Contiguous sub-range of samples, order preserved
    pub fn slice(&self, start: usize, end: usize) -> Dataset {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Dataset {
            scheme: self.scheme,
            samples: self.samples[start..end].to_vec(),
        }
    }
}

/// Outcome of a capped forecast
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastResult {
    pub raw_prediction: f64,
    pub capped_pct_change: f64,
    pub capped_prediction: f64,
}

/// Feature vector for the next, not yet observed, day
#[derive(Debug, Clone, PartialEq)]
pub struct LatestFeatures {
    pub features: Vec<f64>,
    pub last_close: f64,
}
