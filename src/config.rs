// External crates
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// Internal modules
use crate::constants::{
    CACHE_DIR, DEFAULT_HISTORY_DAYS, DEFAULT_NEWS_WINDOW_DAYS, MAX_DAILY_CHANGE_PCT,
};
use crate::daily::step_1_synthetic_series::SyntheticConfig;
use crate::daily::step_6_regressor_arch::RegressorConfig;
use crate::error::{ForecastError, Result};
use crate::types::FeatureScheme;

/// Settings of one forecasting run.
///
/// Every field is optional in the JSON form; missing ones take the crate
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the per-ticker cached datasets
    pub cache_dir: PathBuf,
    /// Calendar days of price history to request
    pub history_days: i64,
    /// Calendar days of news to request
    pub news_window_days: i64,
    pub scheme: FeatureScheme,
    pub max_daily_change_pct: f64,
    pub synthetic: SyntheticConfig,
    pub training: RegressorConfig,
    /// Last day of the requested history, today when absent
    pub as_of: Option<NaiveDate>,
    /// Where to append run records, none written when absent
    pub run_log_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(CACHE_DIR),
            history_days: DEFAULT_HISTORY_DAYS,
            news_window_days: DEFAULT_NEWS_WINDOW_DAYS,
            scheme: FeatureScheme::Indicators,
            max_daily_change_pct: MAX_DAILY_CHANGE_PCT,
            synthetic: SyntheticConfig::default(),
            training: RegressorConfig::default(),
            as_of: None,
            run_log_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a JSON config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_days <= 0 {
            return Err(ForecastError::Configuration(format!(
                "history_days must be positive, got {}",
                self.history_days
            )));
        }
        if self.news_window_days < 0 {
            return Err(ForecastError::Configuration(format!(
                "news_window_days must not be negative, got {}",
                self.news_window_days
            )));
        }
        if !self.max_daily_change_pct.is_finite() || self.max_daily_change_pct < 0.0 {
            return Err(ForecastError::Configuration(format!(
                "max_daily_change_pct must be a non-negative number, got {}",
                self.max_daily_change_pct
            )));
        }
        if let FeatureScheme::PriceWindow { window_size: 0 } = self.scheme {
            return Err(ForecastError::Configuration(
                "price window scheme needs a positive window_size".into(),
            ));
        }
        self.synthetic.validate()?;
        self.training.validate()
    }

    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Local::now().date_naive())
    }
}
