// External crates
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

// Internal modules
use crate::constants::{
    DEFAULT_WINDOW_SIZE, SENTIMENT_LOOKBACK, SYNTHETIC_DAYS, SYNTHETIC_DRIFT,
    SYNTHETIC_INITIAL_PRICE, SYNTHETIC_SEED, SYNTHETIC_SENTIMENT_IMPACT, SYNTHETIC_SENTIMENT_STD,
    SYNTHETIC_VOLATILITY,
};
use crate::error::{ForecastError, Result};
use crate::types::{Dataset, FeatureScheme, Sample};

/// Parameters of the geometric Brownian motion fallback dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub n_days: usize,
    pub window_size: usize,
    /// `None` uses every valid window start
    pub n_samples: Option<usize>,
    pub initial_price: f64,
    /// Daily drift of the log-price process
    pub drift: f64,
    /// Daily volatility of the log-price process
    pub volatility: f64,
    /// Shift applied to the next-day log-return per unit of summed sentiment
    pub sentiment_impact: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_days: SYNTHETIC_DAYS,
            window_size: DEFAULT_WINDOW_SIZE,
            n_samples: None,
            initial_price: SYNTHETIC_INITIAL_PRICE,
            drift: SYNTHETIC_DRIFT,
            volatility: SYNTHETIC_VOLATILITY,
            sentiment_impact: SYNTHETIC_SENTIMENT_IMPACT,
            seed: SYNTHETIC_SEED,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ForecastError::Configuration(
                "synthetic window_size must be positive".into(),
            ));
        }
        if self.n_days <= self.window_size + 1 {
            return Err(ForecastError::Configuration(format!(
                "n_days ({}) must be larger than window_size + 1 ({})",
                self.n_days,
                self.window_size + 1
            )));
        }
        if self.n_samples == Some(0) {
            return Err(ForecastError::Configuration(
                "n_samples must be positive when given".into(),
            ));
        }
        if !self.initial_price.is_finite() || self.initial_price <= 0.0 {
            return Err(ForecastError::Configuration(format!(
                "initial_price must be a positive number, got {}",
                self.initial_price
            )));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(ForecastError::Configuration(format!(
                "volatility must be a non-negative number, got {}",
                self.volatility
            )));
        }
        if !self.drift.is_finite() || !self.sentiment_impact.is_finite() {
            return Err(ForecastError::Configuration(
                "drift and sentiment_impact must be finite".into(),
            ));
        }
        Ok(())
    }
}

/// Simulates a log-price path: `ln(initial_price)` plus the cumulative sum of
/// `n_days` normal increments with mean `drift - volatility^2 / 2`.
pub fn simulate_log_prices(config: &SyntheticConfig, rng: &mut StdRng) -> Result<Vec<f64>> {
    let mean = config.drift - 0.5 * config.volatility * config.volatility;
    let increments = Normal::new(mean, config.volatility)
        .map_err(|e| ForecastError::Configuration(format!("invalid return distribution: {}", e)))?;

    let mut log_price = config.initial_price.ln();
    let mut path = Vec::with_capacity(config.n_days);
    for _ in 0..config.n_days {
        log_price += rng.sample(increments);
        path.push(log_price);
    }
    Ok(path)
}

/// Window starts spread evenly over `[0, max_samples)`, truncated to integers.
///
/// Returns every start when `n_samples` is `None` or exceeds `max_samples`.
pub fn window_start_indices(max_samples: usize, n_samples: Option<usize>) -> Vec<usize> {
    let count = match n_samples {
        Some(n) if n < max_samples => n,
        _ => max_samples,
    };
    if count == max_samples {
        return (0..max_samples).collect();
    }
    if count == 1 {
        return vec![0];
    }

    let last = (max_samples - 1) as f64;
    let step = last / (count - 1) as f64;
    (0..count)
        .map(|i| {
            if i == count - 1 {
                max_samples - 1
            } else {
                (i as f64 * step).floor() as usize
            }
        })
        .collect()
}

/// Generates a sliding-window dataset from a simulated GBM price path.
///
/// Each sample holds `window_size` prices followed by three synthetic
/// sentiment values; its label is the last window price advanced by the
/// path's true next-day log-return plus `sentiment_impact * sum(sentiment)`.
/// The same config always yields bit-identical samples.
pub fn generate(config: &SyntheticConfig) -> Result<Dataset> {
    config.validate()?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let log_prices = simulate_log_prices(config, &mut rng)?;
    let prices: Vec<f64> = log_prices.iter().map(|lp| lp.exp()).collect();

    let window_size = config.window_size;
    // One day is kept back for the next-day label
    let max_samples = config.n_days - window_size - 1;
    let starts = window_start_indices(max_samples, config.n_samples);

    let sentiment_dist = Normal::new(0.0, SYNTHETIC_SENTIMENT_STD)
        .map_err(|e| ForecastError::Configuration(format!("invalid sentiment distribution: {}", e)))?;

    let mut dataset = Dataset::new(FeatureScheme::PriceWindow { window_size });
    dataset.samples.reserve(starts.len());

    for start in starts {
        let end = start + window_size;
        let mut features = Vec::with_capacity(window_size + SENTIMENT_LOOKBACK);
        features.extend_from_slice(&prices[start..end]);

        let mut sentiment_sum = 0.0;
        for _ in 0..SENTIMENT_LOOKBACK {
            let value: f64 = rng.sample(sentiment_dist);
            let value = value.clamp(-1.0, 1.0);
            sentiment_sum += value;
            features.push(value);
        }

        let next_day_log_return = log_prices[end] - log_prices[end - 1];
        let adjusted = next_day_log_return + config.sentiment_impact * sentiment_sum;
        let label = prices[end - 1] * adjusted.exp();

        dataset.samples.push(Sample {
            features,
            label,
            span: None,
        });
    }

    info!(
        "Synthetic dataset generated: {} samples x {} features (seed {})",
        dataset.len(),
        window_size + SENTIMENT_LOOKBACK,
        config.seed
    );
    Ok(dataset)
}
