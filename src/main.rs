// External crates
use anyhow::{bail, Context, Result};
use log::{error, info};
use std::env;
use std::path::PathBuf;
use std::process;

// Local modules
use sentiment_forecast::config::PipelineConfig;
use sentiment_forecast::daily::step_6_regressor_arch::LinearRegressor;
use sentiment_forecast::daily::step_8_bounded_prediction::{run_forecast, ForecastReport};
use sentiment_forecast::daily::step_9_dataset_serialization::DatasetCache;
use sentiment_forecast::sources::{NewsSource, NoNews};
use sentiment_forecast::util::file_utils::{CsvMarketData, JsonNewsFeed};
use sentiment_forecast::util::lexicon_scorer::LexiconScorer;

const USAGE: &str =
    "usage: sentiment-forecast <TICKER> <PRICES_CSV|PRICES_DIR> [NEWS_JSON|-] [CONFIG_JSON]";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Accept ticker, price source, news file and config as positional arguments
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let ticker = args[1].trim().to_uppercase();
    let prices_path = PathBuf::from(&args[2]);
    let news_path = args.get(3).filter(|arg| arg.as_str() != "-").map(PathBuf::from);

    let config = match args.get(4) {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => PipelineConfig::default(),
    };

    let prices = if prices_path.is_dir() {
        CsvMarketData::from_dir(&prices_path)
    } else {
        CsvMarketData::from_file(&prices_path)
    };
    let news: Box<dyn NewsSource> = match news_path {
        Some(path) => Box::new(JsonNewsFeed::new(path, config.as_of_date())),
        None => Box::new(NoNews),
    };
    let cache = DatasetCache::new(&config.cache_dir);
    let regressor = LinearRegressor::new(config.training.clone());
    let scorer = LexiconScorer::new();

    info!("Using ticker: {} | prices: {}", ticker, prices_path.display());
    info!("Dataset cache: {}", cache.dir().display());
    let report = match run_forecast(
        &ticker,
        &config,
        &cache,
        &prices,
        news.as_ref(),
        &scorer,
        &regressor,
    ) {
        Ok(report) => report,
        Err(e) => {
            error!("Forecast failed: {}", e);
            ForecastReport::failure(&ticker, &e)
        }
    };

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    if !report.ok {
        process::exit(1);
    }
    Ok(())
}
