use std::fs;
use std::path::{Path, PathBuf};
use chrono::Local;
use serde::{Serialize, Deserialize};
use std::io::Write;

use crate::daily::step_5_dataset_assembly::{AssembledDataset, DatasetOrigin};
use crate::daily::step_7_train_model::SplitPlan;
use crate::error::Result;
use crate::types::ForecastResult;

/// One forecasting run, as written to the run log directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRunRecord {
    pub timestamp: String,
    pub ticker: String,
    pub origin: DatasetOrigin,
    pub price_rows: usize,
    pub headlines: usize,
    pub alignment_issues: usize,
    pub samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub test_rmse: Option<f64>,
    pub raw_prediction: f64,
    pub capped_prediction: f64,
    pub capped_pct_change: f64,
    pub notes: String,
}

impl ForecastRunRecord {
    pub fn new(
        ticker: &str,
        assembled: &AssembledDataset,
        plan: &SplitPlan,
        test_rmse: Option<f64>,
        forecast: &ForecastResult,
    ) -> Self {
        let mut record = Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ticker: ticker.to_string(),
            origin: assembled.origin,
            price_rows: assembled.price_rows,
            headlines: assembled.headlines.len(),
            alignment_issues: assembled.issues.len(),
            samples: assembled.dataset.len(),
            train_samples: plan.train_len,
            test_samples: plan.test_len,
            test_rmse,
            raw_prediction: forecast.raw_prediction,
            capped_prediction: forecast.capped_prediction,
            capped_pct_change: forecast.capped_pct_change,
            notes: String::new(),
        };
        if plan.degenerate {
            record.add_note("fitted and evaluated on the same samples");
        }
        record
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    /// Writes the record as `<TICKER>_<timestamp>_run.json` under `run_dir`
    pub fn save(&self, run_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(run_dir)?;

        let stamp: String = self
            .timestamp
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let file_path = run_dir.join(format!("{}_{}_run.json", self.ticker, stamp));

        let json = serde_json::to_string_pretty(&self)?;
        let mut file = fs::File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}
