// Shared fixtures for the unit and pipeline tests

// External imports
use chrono::{Duration, NaiveDate};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;

// Internal imports
use crate::config::PipelineConfig;
use crate::daily::step_1_synthetic_series::SyntheticConfig;
use crate::daily::step_6_regressor_arch::{Model, Regressor, RegressorConfig};
use crate::error::{Result, SourceError};
use crate::sources::{MarketDataSource, NewsSource, SentimentScorer};
use crate::types::{NewsItem, PricePoint};

/// Calendar day `offset` days after 2024-01-01
pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

/// Closes `start, start + step, ...` on consecutive days
pub fn linear_prices(n: usize, start: f64, step: f64) -> Vec<PricePoint> {
    (0..n)
        .map(|i| {
            let close = start + i as f64 * step;
            PricePoint {
                date: day(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1_000,
            }
        })
        .collect()
}

pub fn constant_prices(n: usize, price: f64) -> Vec<PricePoint> {
    linear_prices(n, price, 0.0)
}

/// Seeded random walk with realistic open/high/low around each close
pub fn random_walk_prices(n: usize, seed: u64) -> Vec<PricePoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close: f64 = 100.0;
    let mut prices = Vec::with_capacity(n);

    for i in 0..n {
        let open = close;
        close *= 1.0 + rng.random_range(-0.02..0.02);
        let high = open.max(close) * (1.0 + rng.random_range(0.0..0.005));
        let low = open.min(close) * (1.0 - rng.random_range(0.0..0.005));
        prices.push(PricePoint {
            date: day(i as i64),
            open,
            high,
            low,
            close,
            volume: rng.random_range(10_000..100_000),
        });
    }
    prices
}

/// One headline per date
pub fn headlines_on(dates: &[NaiveDate]) -> Vec<NewsItem> {
    dates
        .iter()
        .enumerate()
        .map(|(i, date)| NewsItem {
            text: format!("headline {}", i),
            date: *date,
        })
        .collect()
}

/// Config with a small synthetic fallback, a short training run and a fixed day
pub fn test_config(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        cache_dir: dir.join("cache"),
        synthetic: SyntheticConfig {
            n_days: 80,
            window_size: 10,
            ..SyntheticConfig::default()
        },
        training: RegressorConfig {
            epochs: 50,
            ..RegressorConfig::default()
        },
        as_of: Some(day(365)),
        ..PipelineConfig::default()
    }
}

pub struct StaticPrices(pub Vec<PricePoint>);

impl MarketDataSource for StaticPrices {
    fn fetch(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> std::result::Result<Vec<PricePoint>, SourceError> {
        Ok(self.0.clone())
    }
}

pub struct StaticNews(pub Vec<NewsItem>);

impl NewsSource for StaticNews {
    fn fetch(&self, _ticker: &str, _window_days: i64) -> std::result::Result<Vec<NewsItem>, SourceError> {
        Ok(self.0.clone())
    }
}

/// Price and news source whose every call fails
pub struct FailingSource;

impl MarketDataSource for FailingSource {
    fn fetch(
        &self,
        _ticker: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> std::result::Result<Vec<PricePoint>, SourceError> {
        Err(SourceError::Transport("connection refused".into()))
    }
}

impl NewsSource for FailingSource {
    fn fetch(&self, _ticker: &str, _window_days: i64) -> std::result::Result<Vec<NewsItem>, SourceError> {
        Err(SourceError::Malformed("unexpected payload".into()))
    }
}

pub struct FixedScorer(pub f64);

impl SentimentScorer for FixedScorer {
    fn score(&self, _text: &str) -> f64 {
        self.0
    }
}

/// Predicts the same value for every row
pub struct ConstantModel(pub f64);

impl Model for ConstantModel {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        Ok(Array1::from_elem(x.nrows(), self.0))
    }
}

/// Fits the mean of the training labels
pub struct MeanRegressor;

impl Regressor for MeanRegressor {
    type Model = ConstantModel;

    fn fit(&self, _x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<ConstantModel> {
        Ok(ConstantModel(y.mean().unwrap_or(0.0)))
    }
}
