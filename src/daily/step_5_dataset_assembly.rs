// External crates
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};

// Internal modules
use super::step_1_synthetic_series::generate;
use super::step_2_sentiment_alignment::align;
use super::step_3_technical_indicators::{compute, to_feature_rows};
use super::step_4_windowed_dataset::{build, latest_features};
use super::step_9_dataset_serialization::DatasetCache;
use crate::config::PipelineConfig;
use crate::constants::{MIN_HISTORY_ROWS, MIN_SENTIMENT_OBSERVATIONS, SENTIMENT_LOOKBACK};
use crate::error::{ForecastError, Result, Stage, StageContext};
use crate::sources::{MarketDataSource, NewsSource, SentimentScorer};
use crate::types::{Dataset, LatestFeatures, NewsItem, PricePoint, ScoredHeadline, SentimentEvent};

/// Where the training dataset of a run came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrigin {
    /// Built from fetched prices and news
    Live,
    /// Reused from the ticker's cached artifact
    Cached,
    /// Generated by the synthetic fallback
    Synthetic,
}

/// Dataset of one run plus what was learned while assembling it
#[derive(Debug)]
pub struct AssembledDataset {
    pub dataset: Dataset,
    pub origin: DatasetOrigin,
    pub headlines: Vec<ScoredHeadline>,
    /// Input for the next-day forecast, live datasets only
    pub latest: Option<LatestFeatures>,
    /// Sentiment events that could not be aligned
    pub issues: Vec<ForecastError>,
    pub price_rows: usize,
}

/// Scores each headline; out-of-range scores are clamped, unscorable ones count as neutral
pub fn score_headlines(items: &[NewsItem], scorer: &dyn SentimentScorer) -> Vec<ScoredHeadline> {
    items
        .iter()
        .map(|item| {
            let score = scorer.score(&item.text);
            let score = if score.is_finite() { score.clamp(-1.0, 1.0) } else { 0.0 };
            ScoredHeadline {
                text: item.text.clone(),
                score,
            }
        })
        .collect()
}

/// Builds the training dataset of a ticker from live sources, falling back
/// to the cached artifact or synthetic data when the live inputs are too thin
pub struct DatasetAssembly<'a> {
    config: &'a PipelineConfig,
    cache: &'a DatasetCache,
}

impl<'a> DatasetAssembly<'a> {
    pub fn new(config: &'a PipelineConfig, cache: &'a DatasetCache) -> Self {
        Self { config, cache }
    }

    fn fetch_prices(&self, ticker: &str, source: &dyn MarketDataSource) -> Vec<PricePoint> {
        let end = self.config.as_of_date();
        let start: NaiveDate = end - Duration::days(self.config.history_days);
        match source.fetch(ticker, start, end) {
            Ok(prices) => prices,
            Err(e) => {
                warn!("{}: {} failed, continuing without prices: {}", ticker, Stage::FetchPrices, e);
                Vec::new()
            }
        }
    }

    fn fetch_news(&self, ticker: &str, news: &dyn NewsSource) -> Vec<NewsItem> {
        match news.fetch(ticker, self.config.news_window_days) {
            Ok(items) => items,
            Err(e) => {
                warn!("{}: {} failed, continuing without news: {}", ticker, Stage::FetchNews, e);
                Vec::new()
            }
        }
    }

    /// Reuses a non-empty cached dataset, otherwise generates and caches a synthetic one
    fn fallback(&self, ticker: &str, reason: &str) -> Result<(Dataset, DatasetOrigin)> {
        warn!("{}: falling back ({})", ticker, reason);

        match self.cache.load(ticker) {
            Ok(Some(dataset)) if !dataset.is_empty() => {
                info!("{}: reusing {} cached samples", ticker, dataset.len());
                return Ok((dataset, DatasetOrigin::Cached));
            }
            Ok(_) => {}
            Err(e) => warn!("{}: cached dataset unreadable, regenerating: {}", ticker, e),
        }

        let dataset = generate(&self.config.synthetic).at_stage(ticker, Stage::SyntheticFallback)?;
        self.cache
            .save(ticker, &dataset)
            .at_stage(ticker, Stage::CacheWrite)?;
        Ok((dataset, DatasetOrigin::Synthetic))
    }

    /// Assembles the dataset for `ticker`
    ///
    /// # Arguments
    ///
    /// * `ticker` - Instrument symbol
    /// * `prices` - Daily price history provider
    /// * `news` - Headline provider
    /// * `scorer` - Headline sentiment model
    ///
    /// # Returns
    ///
    /// The dataset and its origin. Fatal errors carry the ticker and stage.
    pub fn assemble(
        &self,
        ticker: &str,
        prices: &dyn MarketDataSource,
        news: &dyn NewsSource,
        scorer: &dyn SentimentScorer,
    ) -> Result<AssembledDataset> {
        let history = self.fetch_prices(ticker, prices);
        let items = self.fetch_news(ticker, news);
        let headlines = score_headlines(&items, scorer);
        info!(
            "{}: {} price rows, {} scored headlines",
            ticker,
            history.len(),
            headlines.len()
        );

        if history.len() < MIN_HISTORY_ROWS || headlines.len() < MIN_SENTIMENT_OBSERVATIONS {
            let reason = format!(
                "{} price rows (need {}), {} sentiment observations (need {})",
                history.len(),
                MIN_HISTORY_ROWS,
                headlines.len(),
                MIN_SENTIMENT_OBSERVATIONS
            );
            let (dataset, origin) = self.fallback(ticker, &reason)?;
            return Ok(AssembledDataset {
                dataset,
                origin,
                headlines,
                latest: None,
                issues: Vec::new(),
                price_rows: history.len(),
            });
        }

        let events: Vec<SentimentEvent> = items
            .iter()
            .zip(&headlines)
            .map(|(item, headline)| SentimentEvent {
                date: item.date,
                score: headline.score,
            })
            .collect();

        let timeline: Vec<NaiveDate> = history.iter().map(|p| p.date).collect();
        let aligned = align(&timeline, &events, SENTIMENT_LOOKBACK)
            .at_stage(ticker, Stage::SentimentAlignment)?;
        let indicators = compute(&history).at_stage(ticker, Stage::TechnicalIndicators)?;
        let rows = to_feature_rows(&history, &indicators, &aligned)
            .at_stage(ticker, Stage::TechnicalIndicators)?;
        let dataset = build(&rows, self.config.scheme).at_stage(ticker, Stage::DatasetBuild)?;
        let latest = latest_features(&rows, &aligned, self.config.scheme);
        let issues = aligned.issues;

        if dataset.is_empty() {
            let (dataset, origin) = self.fallback(ticker, "no usable rows in the live history")?;
            return Ok(AssembledDataset {
                dataset,
                origin,
                headlines,
                latest: None,
                issues,
                price_rows: history.len(),
            });
        }

        self.cache
            .save(ticker, &dataset)
            .at_stage(ticker, Stage::CacheWrite)?;

        Ok(AssembledDataset {
            dataset,
            origin: DatasetOrigin::Live,
            headlines,
            latest,
            issues,
            price_rows: history.len(),
        })
    }
}
