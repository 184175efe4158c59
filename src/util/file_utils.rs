// External crates
use chrono::{Duration, NaiveDate};
use log::{debug, warn};
use polars::prelude::*;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

// Internal modules
use crate::error::SourceError;
use crate::sources::{MarketDataSource, NewsSource};
use crate::types::{NewsItem, PricePoint};

/// File name of a ticker's price history inside a data directory
pub const PRICE_FILE_SUFFIX: &str = "_daily_ohlcv.csv";

/// Maps a CSV header to the standard OHLCV name, case-insensitively
///
/// # Arguments
///
/// * `column_name` - Header as found in the file
///
/// # Returns
///
/// The standard name, or `None` for columns the loader does not use
pub fn standard_column_name(column_name: &str) -> Option<&'static str> {
    let name = match column_name.trim().to_lowercase().as_str() {
        "open" | "o" | "op" | "openprice" | "open_price" => "open",
        "high" | "h" | "highprice" | "high_price" | "max" => "high",
        "low" | "l" | "lowprice" | "low_price" | "min" => "low",
        "close" | "c" | "cl" | "closeprice" | "close_price" => "close",
        "volume" | "vol" | "v" | "volumes" => "volume",
        "timestamp" | "time" | "date" | "t" | "datetime" | "dt" | "day" => "time",
        "adj close" | "adj_close" | "adjusted close" | "adjusted_close" | "adjclose" => {
            "adjusted_close"
        }
        _ => return None,
    };
    Some(name)
}

/// Parses `YYYY-MM-DD`, ignoring any time-of-day suffix
pub fn parse_day(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, SourceError> {
    let column = df.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| SourceError::Malformed(format!("missing {} at row {}", name, row)))
        })
        .collect()
}

/// Reads daily OHLCV bars from a CSV file
///
/// Headers are matched case-insensitively (`Close`, `close`, `c`, ...). Only
/// a date and a close (or adjusted close) column are required: missing
/// open/high/low fall back to the close and missing volume to zero.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
///
/// # Returns
///
/// Bars sorted by date, one per day (the last row wins on duplicates)
pub fn read_price_csv<P: AsRef<Path>>(file_path: P) -> Result<Vec<PricePoint>, SourceError> {
    let file = File::open(file_path.as_ref())?;
    let df = CsvReader::new(file).finish()?;

    let mut columns: HashMap<&'static str, String> = HashMap::new();
    for column_name in df.get_column_names() {
        if let Some(standard) = standard_column_name(column_name.as_str()) {
            columns.entry(standard).or_insert_with(|| column_name.to_string());
        }
    }
    debug!("{}: column mapping {:?}", file_path.as_ref().display(), columns);

    let time_name = columns
        .get("time")
        .ok_or_else(|| SourceError::Malformed("no date column".into()))?;
    let close_name = columns
        .get("close")
        .or_else(|| columns.get("adjusted_close"))
        .ok_or_else(|| SourceError::Malformed("no close column".into()))?;

    let close = float_column(&df, close_name)?;
    let optional = |standard: &str| -> Result<Option<Vec<f64>>, SourceError> {
        columns.get(standard).map(|name| float_column(&df, name)).transpose()
    };
    let open = optional("open")?.unwrap_or_else(|| close.clone());
    let high = optional("high")?.unwrap_or_else(|| close.clone());
    let low = optional("low")?.unwrap_or_else(|| close.clone());
    let volume = optional("volume")?.unwrap_or_else(|| vec![0.0; close.len()]);

    let time_column = df.column(time_name)?.cast(&DataType::String)?;
    let times = time_column.str()?;

    let mut by_day: HashMap<NaiveDate, PricePoint> = HashMap::with_capacity(df.height());
    for (row, time) in times.into_iter().enumerate() {
        let date = time
            .and_then(parse_day)
            .ok_or_else(|| SourceError::Malformed(format!("unreadable date at row {}", row)))?;
        by_day.insert(
            date,
            PricePoint {
                date,
                open: open[row],
                high: high[row],
                low: low[row],
                close: close[row],
                volume: volume[row].max(0.0).round() as u64,
            },
        );
    }

    let mut prices: Vec<PricePoint> = by_day.into_values().collect();
    prices.sort_by_key(|p| p.date);
    Ok(prices)
}

/// Daily prices read from local CSV files
#[derive(Debug, Clone)]
pub enum CsvMarketData {
    /// One file used for every ticker
    File(PathBuf),
    /// `<dir>/<TICKER>_daily_ohlcv.csv` per ticker
    Directory(PathBuf),
}

impl CsvMarketData {
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Self {
        CsvMarketData::File(path.into())
    }

    pub fn from_dir<P: Into<PathBuf>>(dir: P) -> Self {
        CsvMarketData::Directory(dir.into())
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        match self {
            CsvMarketData::File(path) => path.clone(),
            CsvMarketData::Directory(dir) => {
                dir.join(format!("{}{}", ticker.trim().to_uppercase(), PRICE_FILE_SUFFIX))
            }
        }
    }
}

impl MarketDataSource for CsvMarketData {
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, SourceError> {
        let path = self.path_for(ticker);
        let prices = match read_price_csv(&path) {
            Ok(prices) => prices,
            Err(SourceError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("{}: no price file at {}", ticker, path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        Ok(prices
            .into_iter()
            .filter(|p| p.date >= start && p.date <= end)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct NewsRecord {
    #[serde(alias = "title", alias = "headline")]
    text: String,
    #[serde(alias = "timestamp", alias = "published_at", alias = "publishedAt")]
    date: String,
    #[serde(default)]
    ticker: Option<String>,
}

/// Headlines read from a JSON array of `{text|title, date|timestamp, ticker?}` records
#[derive(Debug, Clone)]
pub struct JsonNewsFeed {
    path: PathBuf,
    as_of: NaiveDate,
}

impl JsonNewsFeed {
    /// `as_of` is the last day of the news window; a window of `n` days
    /// starts `n - 1` days before it
    pub fn new<P: Into<PathBuf>>(path: P, as_of: NaiveDate) -> Self {
        Self {
            path: path.into(),
            as_of,
        }
    }
}

impl NewsSource for JsonNewsFeed {
    fn fetch(&self, ticker: &str, window_days: i64) -> Result<Vec<NewsItem>, SourceError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<NewsRecord> = serde_json::from_str(&contents)?;
        if window_days <= 0 {
            return Ok(Vec::new());
        }
        // `window_days` calendar days ending with `as_of`
        let first_day = self.as_of - Duration::days(window_days - 1);

        let mut items = Vec::new();
        for record in records {
            let about_ticker = record
                .ticker
                .as_deref()
                .map_or(true, |t| t.trim().eq_ignore_ascii_case(ticker.trim()));
            if !about_ticker {
                continue;
            }
            let Some(date) = parse_day(&record.date) else {
                warn!("Skipping headline with unreadable date {:?}", record.date);
                continue;
            };
            if date >= first_day && date <= self.as_of {
                items.push(NewsItem {
                    text: record.text,
                    date,
                });
            }
        }
        items.sort_by_key(|item| item.date);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_reads_capitalized_headers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Open,High,Low,Close,Volume").unwrap();
        writeln!(file, "2024-01-03,11.0,12.5,10.5,12.0,2000").unwrap();
        writeln!(file, "2024-01-02,10.0,11.0,9.5,10.5,1500").unwrap();

        let prices = read_price_csv(file.path()).unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].date, day("2024-01-02"));
        assert_eq!(prices[0].close, 10.5);
        assert_eq!(prices[1].high, 12.5);
        assert_eq!(prices[1].volume, 2000);
    }

    #[test]
    fn test_close_only_file_fills_other_columns() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,adj close").unwrap();
        writeln!(file, "2024-02-01 00:00:00,100").unwrap();
        writeln!(file, "2024-02-02 00:00:00,101").unwrap();

        let prices = read_price_csv(file.path()).unwrap();
        assert_eq!(prices[1].close, 101.0);
        assert_eq!(prices[1].open, 101.0);
        assert_eq!(prices[1].volume, 0);
    }

    #[test]
    fn test_missing_close_is_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "date,open").unwrap();
        writeln!(file, "2024-02-01,1.0").unwrap();
        assert!(matches!(read_price_csv(file.path()), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn test_directory_source_filters_range_and_unknown_tickers() {
        let dir = tempdir().unwrap();
        let mut file = File::create(dir.path().join("AAPL_daily_ohlcv.csv")).unwrap();
        writeln!(file, "date,close").unwrap();
        for d in 1..=9 {
            writeln!(file, "2024-03-0{},{}", d, 100 + d).unwrap();
        }

        let source = CsvMarketData::from_dir(dir.path());
        let prices = source.fetch("aapl", day("2024-03-03"), day("2024-03-05")).unwrap();
        assert_eq!(prices.iter().map(|p| p.close).collect::<Vec<_>>(), vec![103.0, 104.0, 105.0]);

        assert!(source.fetch("MSFT", day("2024-03-01"), day("2024-03-09")).unwrap().is_empty());
    }

    #[test]
    fn test_news_feed_window_and_ticker() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"title": "Apple beats estimates", "timestamp": "2024-05-10T13:00:00Z", "ticker": "AAPL"}},
                {{"text": "Market wrap", "date": "2024-05-09"}},
                {{"text": "Old news", "date": "2024-04-01"}},
                {{"text": "Microsoft rallies", "date": "2024-05-10", "ticker": "MSFT"}},
                {{"text": "Bad date", "date": "yesterday"}}
            ]"#
        )
        .unwrap();

        let feed = JsonNewsFeed::new(file.path(), day("2024-05-10"));
        let items = feed.fetch("aapl", 3).unwrap();

        let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Market wrap", "Apple beats estimates"]);
        assert_eq!(items[1].date, day("2024-05-10"));
    }

    #[test]
    fn test_news_window_counts_calendar_days() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"text": "four days back", "date": "2024-05-07"}},
                {{"text": "three days back", "date": "2024-05-08"}},
                {{"text": "today", "date": "2024-05-10"}}
            ]"#
        )
        .unwrap();
        let feed = JsonNewsFeed::new(file.path(), day("2024-05-10"));

        let dates: Vec<_> = feed.fetch("AAPL", 3).unwrap().iter().map(|i| i.date).collect();
        assert_eq!(dates, vec![day("2024-05-08"), day("2024-05-10")]);

        let today: Vec<_> = feed.fetch("AAPL", 1).unwrap().iter().map(|i| i.date).collect();
        assert_eq!(today, vec![day("2024-05-10")]);

        assert!(feed.fetch("AAPL", 0).unwrap().is_empty());
    }

    #[test]
    fn test_missing_news_file_is_empty() {
        let feed = JsonNewsFeed::new("/nonexistent/news.json", day("2024-05-10"));
        assert!(feed.fetch("AAPL", 3).unwrap().is_empty());
    }
}
