#[cfg(test)]
mod tests {
    use crate::config::PipelineConfig;
    use crate::daily::step_5_dataset_assembly::DatasetOrigin;
    use crate::daily::step_8_bounded_prediction::run_forecast;
    use crate::daily::step_9_dataset_serialization::DatasetCache;
    use crate::types::PricePoint;
    use crate::util::file_utils::{CsvMarketData, JsonNewsFeed, PRICE_FILE_SUFFIX};
    use crate::util::lexicon_scorer::LexiconScorer;
    use crate::util::test_utils::{random_walk_prices, test_config, MeanRegressor};
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_prices(path: &Path, prices: &[PricePoint]) {
        let mut file = File::create(path).unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        for p in prices {
            writeln!(
                file,
                "{},{},{},{},{},{}",
                p.date.format("%Y-%m-%d"),
                p.open,
                p.high,
                p.low,
                p.close,
                p.volume
            )
            .unwrap();
        }
    }

    #[test]
    fn test_forecast_from_csv_and_json_files() {
        let dir = tempdir().unwrap();
        let prices = random_walk_prices(70, 5);
        let last_day = prices[69].date;
        write_prices(&dir.path().join(format!("TSLA{}", PRICE_FILE_SUFFIX)), &prices);

        let news_path = dir.path().join("news.json");
        let mut news = File::create(&news_path).unwrap();
        write!(
            news,
            r#"[
                {{"title": "Shares surge on strong demand", "date": "{d0}", "ticker": "TSLA"}},
                {{"title": "Regulators probe recall as shares plunge", "date": "{d1}", "ticker": "TSLA"}},
                {{"title": "Analysts upgrade Tesla after record deliveries", "date": "{d2}", "ticker": "tsla"}},
                {{"title": "Apple unveils new phone", "date": "{d0}", "ticker": "AAPL"}}
            ]"#,
            d0 = last_day.format("%Y-%m-%d"),
            d1 = prices[68].date.format("%Y-%m-%d"),
            d2 = prices[67].date.format("%Y-%m-%d"),
        )
        .unwrap();

        let config = PipelineConfig {
            as_of: Some(last_day),
            ..test_config(dir.path())
        };
        let cache = DatasetCache::new(&config.cache_dir);
        let report = run_forecast(
            "tsla",
            &config,
            &cache,
            &CsvMarketData::from_dir(dir.path()),
            &JsonNewsFeed::new(&news_path, config.as_of_date()),
            &LexiconScorer::new(),
            &MeanRegressor,
        )
        .unwrap();

        assert!(report.ok);
        assert_eq!(report.origin, Some(DatasetOrigin::Live));
        assert_eq!(report.samples, 70 - 14 - 1);
        assert_eq!(report.sentiment_samples.len(), 3);
        assert!(report.sentiment_samples.iter().any(|s| s.score > 0.0));
        assert!(report.sentiment_samples.iter().any(|s| s.score < 0.0));

        let last_close = report.last_close.unwrap();
        assert!((last_close - prices[69].close).abs() < 1e-9);
        assert!(report.capped_pct_change.unwrap().abs() <= 0.1);
        assert!(cache.path_for("TSLA").exists());
    }

    #[test]
    fn test_missing_price_file_runs_on_synthetic_data() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let cache = DatasetCache::new(&config.cache_dir);

        let report = run_forecast(
            "ZZZZ",
            &config,
            &cache,
            &CsvMarketData::from_dir(dir.path()),
            &JsonNewsFeed::new(dir.path().join("none.json"), config.as_of_date()),
            &LexiconScorer::new(),
            &MeanRegressor,
        )
        .unwrap();

        assert_eq!(report.origin, Some(DatasetOrigin::Synthetic));
        assert!(report.prediction.is_some());
        assert!(report.sentiment_samples.is_empty());
    }
}
