// External imports
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

// Internal imports
use crate::constants::CACHE_FILE_SUFFIX;
use crate::error::{ForecastError, Result};
use crate::types::{Dataset, FeatureScheme, Sample};

/// Bumped whenever the on-disk layout changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// On-disk form of a cached dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDataset {
    pub version: u32,
    pub ticker: String,
    pub created_at: DateTime<Utc>,
    pub scheme: FeatureScheme,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl CachedDataset {
    pub fn from_dataset(ticker: &str, dataset: &Dataset) -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            ticker: ticker.to_string(),
            created_at: Utc::now(),
            scheme: dataset.scheme,
            features: dataset.samples.iter().map(|s| s.features.clone()).collect(),
            labels: dataset.labels(),
        }
    }

    /// Rebuilds the dataset, rejecting artifacts whose shapes disagree with their scheme
    pub fn into_dataset(self) -> Result<Dataset> {
        if self.features.len() != self.labels.len() {
            return Err(ForecastError::Configuration(format!(
                "cached dataset for {} has {} feature rows but {} labels",
                self.ticker,
                self.features.len(),
                self.labels.len()
            )));
        }
        let expected = self.scheme.feature_len();
        if let Some(row) = self.features.iter().position(|f| f.len() != expected) {
            return Err(ForecastError::Configuration(format!(
                "cached dataset for {} has a ragged row at {}",
                self.ticker, row
            )));
        }

        let samples = self
            .features
            .into_iter()
            .zip(self.labels)
            .map(|(features, label)| Sample {
                features,
                label,
                span: None,
            })
            .collect();
        Ok(Dataset {
            scheme: self.scheme,
            samples,
        })
    }
}

/// Per-ticker dataset artifacts under one directory.
///
/// Writes for a ticker are serialized by a per-ticker lock and land through
/// a temporary file that is renamed into place, so a reader sees either the
/// previous artifact or the new one.
#[derive(Debug)]
pub struct DatasetCache {
    dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DatasetCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<TICKER>_dataset.json`; characters unsafe in file names become `_`
    pub fn path_for(&self, ticker: &str) -> PathBuf {
        let name: String = ticker
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}{}", name, CACHE_FILE_SUFFIX))
    }

    fn lock_for(&self, ticker: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(ticker.trim().to_uppercase())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
        // The guarded unit value cannot be left inconsistent by a panic
        lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Writes `dataset` as the ticker's artifact, replacing any previous one
    pub fn save(&self, ticker: &str, dataset: &Dataset) -> Result<PathBuf> {
        let lock = self.lock_for(ticker);
        let _guard = Self::guard(&lock);

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(ticker);
        let artifact = CachedDataset::from_dataset(ticker, dataset);

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &artifact)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(io::Error::from)?;

        info!(
            "Cached {} samples for {} at {}",
            dataset.len(),
            ticker,
            path.display()
        );
        Ok(path)
    }

    /// The ticker's artifact, `None` when absent or written by another format version
    pub fn load(&self, ticker: &str) -> Result<Option<Dataset>> {
        let lock = self.lock_for(ticker);
        let _guard = Self::guard(&lock);

        let path = self.path_for(ticker);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let artifact: CachedDataset = serde_json::from_str(&contents)?;
        if artifact.version != CACHE_FORMAT_VERSION {
            warn!(
                "Ignoring cached dataset {} with format version {}",
                path.display(),
                artifact.version
            );
            return Ok(None);
        }
        artifact.into_dataset().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daily::step_1_synthetic_series::{generate, SyntheticConfig};
    use std::thread;
    use tempfile::tempdir;

    fn small_dataset(seed: u64) -> Dataset {
        generate(&SyntheticConfig {
            n_days: 60,
            window_size: 10,
            seed,
            ..SyntheticConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let dir = tempdir().unwrap();
        let cache = DatasetCache::new(dir.path());
        let dataset = small_dataset(42);

        let path = cache.save("AAPL", &dataset).unwrap();
        assert!(path.ends_with("AAPL_dataset.json"));

        let loaded = cache.load("AAPL").unwrap().unwrap();
        assert_eq!(loaded.scheme, dataset.scheme);
        assert_eq!(loaded.len(), dataset.len());
        for (a, b) in loaded.samples.iter().zip(dataset.samples.iter()) {
            assert_eq!(a.label.to_bits(), b.label.to_bits());
            assert!(a.features.iter().zip(&b.features).all(|(x, y)| x.to_bits() == y.to_bits()));
        }
    }

    #[test]
    fn test_missing_artifact_is_none() {
        let dir = tempdir().unwrap();
        let cache = DatasetCache::new(dir.path().join("not_created_yet"));
        assert!(cache.load("MSFT").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_previous_artifact() {
        let dir = tempdir().unwrap();
        let cache = DatasetCache::new(dir.path());
        cache.save("TSLA", &small_dataset(1)).unwrap();
        let second = small_dataset(2);
        cache.save("TSLA", &second).unwrap();

        let loaded = cache.load("tsla").unwrap().unwrap();
        assert_eq!(loaded.labels(), second.labels());

        // Only the artifact remains, no stray temporary files
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_ticker_names_are_sanitized() {
        let cache = DatasetCache::new("cache");
        assert_eq!(
            cache.path_for("brk/b"),
            PathBuf::from("cache").join("BRK_B_dataset.json")
        );
    }

    #[test]
    fn test_ragged_artifact_is_rejected() {
        let dir = tempdir().unwrap();
        let cache = DatasetCache::new(dir.path());
        let artifact = CachedDataset {
            version: CACHE_FORMAT_VERSION,
            ticker: "AAPL".into(),
            created_at: Utc::now(),
            scheme: FeatureScheme::PriceWindow { window_size: 2 },
            features: vec![vec![1.0, 2.0, 0.0, 0.0, 0.0], vec![1.0]],
            labels: vec![3.0, 4.0],
        };
        fs::write(cache.path_for("AAPL"), serde_json::to_string(&artifact).unwrap()).unwrap();

        assert!(cache.load("AAPL").is_err());
    }

    #[test]
    fn test_other_format_version_is_ignored() {
        let dir = tempdir().unwrap();
        let cache = DatasetCache::new(dir.path());
        let mut artifact = CachedDataset::from_dataset("AAPL", &small_dataset(3));
        artifact.version = CACHE_FORMAT_VERSION + 1;
        fs::write(cache.path_for("AAPL"), serde_json::to_string(&artifact).unwrap()).unwrap();

        assert!(cache.load("AAPL").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_writers_leave_a_complete_artifact() {
        let dir = tempdir().unwrap();
        let cache = Arc::new(DatasetCache::new(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|seed| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.save("NVDA", &small_dataset(seed)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let loaded = cache.load("NVDA").unwrap().unwrap();
        assert_eq!(loaded.len(), small_dataset(0).len());
    }
}
