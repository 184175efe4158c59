//! Capabilities the forecasting core consumes but does not implement.
//!
//! Price and news sources report failures as [`SourceError`]; the dataset
//! assembly step is the single place that turns those into empty results.

// External crates
use chrono::NaiveDate;

// Internal modules
use crate::error::SourceError;
use crate::types::{NewsItem, PricePoint};

/// Daily price history provider
pub trait MarketDataSource {
    /// Bars for `ticker` in `[start, end]`, oldest first.
    ///
    /// An unknown ticker or an empty range is `Ok(vec![])`, not an error.
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, SourceError>;
}

/// Headline provider
pub trait NewsSource {
    /// Headlines about `ticker` from the last `window_days` days
    fn fetch(&self, ticker: &str, window_days: i64) -> Result<Vec<NewsItem>, SourceError>;
}

/// Text sentiment model
pub trait SentimentScorer {
    /// Score in `[-1, 1]`; `0.0` for empty or unscorable text
    fn score(&self, text: &str) -> f64;
}

/// News source that never has anything to say
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

impl NewsSource for NoNews {
    fn fetch(&self, _ticker: &str, _window_days: i64) -> Result<Vec<NewsItem>, SourceError> {
        Ok(Vec::new())
    }
}
