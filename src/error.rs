// External crates
use chrono::NaiveDate;
use polars::error::PolarsError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage a fatal error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchPrices,
    FetchNews,
    SentimentAlignment,
    TechnicalIndicators,
    DatasetBuild,
    SyntheticFallback,
    CacheWrite,
    Training,
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FetchPrices => "price fetch",
            Stage::FetchNews => "news fetch",
            Stage::SentimentAlignment => "sentiment alignment",
            Stage::TechnicalIndicators => "technical indicators",
            Stage::DatasetBuild => "dataset build",
            Stage::SyntheticFallback => "synthetic fallback",
            Stage::CacheWrite => "dataset cache write",
            Stage::Training => "training",
            Stage::Prediction => "prediction",
        };
        f.write_str(name)
    }
}

/// Errors raised by the forecasting core
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Nothing usable came back from the price or news side
    #[error("no usable data for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A sentiment event that could not be mapped onto the price timeline
    #[error("sentiment event dated {date} was not aligned: {reason}")]
    AlignmentInconsistency { date: NaiveDate, reason: String },

    #[error("price timeline is not strictly increasing at position {position}")]
    UnorderedTimeline { position: usize },

    #[error("model error: {0}")]
    Model(String),

    #[error("{ticker}: {stage} failed: {source}")]
    Stage {
        ticker: String,
        stage: Stage,
        #[source]
        source: Box<ForecastError>,
    },

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Attaches ticker and stage context to a fatal error
pub trait StageContext<T> {
    fn at_stage(self, ticker: &str, stage: Stage) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<ForecastError>,
{
    fn at_stage(self, ticker: &str, stage: Stage) -> Result<T> {
        self.map_err(|e| {
            let source = e.into();
            match source {
                // Keep the innermost stage
                ForecastError::Stage { .. } => source,
                other => ForecastError::Stage {
                    ticker: ticker.to_string(),
                    stage,
                    source: Box::new(other),
                },
            }
        })
    }
}

/// Errors raised by the external collaborators (price feed, news feed)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
