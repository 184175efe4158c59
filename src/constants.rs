// Indicator periods
pub const SMA_PERIOD: usize = 10;
pub const EMA_PERIOD: usize = 10;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

/// Rows before this index never carry a full set of indicators.
pub const INDICATOR_WARMUP: usize = 14;

// Indicator-scheme feature names, in feature-vector order
pub const INDICATOR_FEATURES: [&str; 6] = [
    "close",
    "sma_10",
    "ema_10",
    "rsi_14",
    "atr_14",
    "aligned_sentiment",
];

// Sentiment alignment
pub const SENTIMENT_LOOKBACK: usize = 3;
pub const SYNTHETIC_SENTIMENT_STD: f64 = 0.4;

// Dataset assembly thresholds
pub const MIN_HISTORY_ROWS: usize = 14;
pub const MIN_SENTIMENT_OBSERVATIONS: usize = 3;
pub const DEFAULT_WINDOW_SIZE: usize = 100;
pub const DEFAULT_HISTORY_DAYS: i64 = 150;
pub const DEFAULT_NEWS_WINDOW_DAYS: i64 = 3;

// Synthetic series defaults (daily drift ~0.02%, daily volatility ~1%)
pub const SYNTHETIC_DAYS: usize = 3000;
pub const SYNTHETIC_INITIAL_PRICE: f64 = 150.0;
pub const SYNTHETIC_DRIFT: f64 = 0.0002;
pub const SYNTHETIC_VOLATILITY: f64 = 0.01;
pub const SYNTHETIC_SENTIMENT_IMPACT: f64 = 0.002;
pub const SYNTHETIC_SEED: u64 = 42;

// Training split policy
pub const VALIDATION_SPLIT_RATIO: f64 = 0.2;
pub const SMALL_DATASET_SPLIT_RATIO: f64 = 0.5;
pub const SMALL_DATASET_THRESHOLD: usize = 10;
pub const DEGENERATE_SAMPLE_THRESHOLD: usize = 5;
pub const RECENT_PREDICTIONS: usize = 5;
pub const MAX_SENTIMENT_SAMPLES: usize = 10;

// Forecast safety bound
pub const MAX_DAILY_CHANGE_PCT: f64 = 0.1;

// Regressor defaults
pub const LEARNING_RATE: f64 = 0.05;
pub const EPOCHS: usize = 400;

// Cache paths
pub const CACHE_DIR: &str = "data_store";
pub const CACHE_FILE_SUFFIX: &str = "_dataset.json";
