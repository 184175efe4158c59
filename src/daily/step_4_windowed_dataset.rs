// External crates
use log::debug;

// Internal modules
use super::step_2_sentiment_alignment::AlignedSentiment;
use crate::error::{ForecastError, Result};
use crate::types::{DailyFeatureRow, Dataset, FeatureScheme, LatestFeatures, Sample, SampleSpan};

/// Sliding windows of `window_size` closes, labelled with the close one step
/// past the window end.
///
/// The sentiment part of a sample is the trailing vector of the label day,
/// so it only covers days inside (or before) the price window.
pub fn build_price_window_dataset(rows: &[DailyFeatureRow], window_size: usize) -> Result<Dataset> {
    if window_size == 0 {
        return Err(ForecastError::Configuration(
            "window_size must be positive".into(),
        ));
    }

    let scheme = FeatureScheme::PriceWindow { window_size };
    let mut dataset = Dataset::new(scheme);
    if rows.len() <= window_size {
        return Ok(dataset);
    }

    for start in 0..rows.len() - window_size {
        let label_row = &rows[start + window_size];
        let window = &rows[start..start + window_size];

        let mut features = Vec::with_capacity(scheme.feature_len());
        features.extend(window.iter().map(|r| r.close));
        features.extend_from_slice(&label_row.sentiment);

        if features.len() != scheme.feature_len()
            || !features.iter().all(|v| v.is_finite())
            || !label_row.close.is_finite()
        {
            debug!("Skipping window ending {}: non-finite input", label_row.date);
            continue;
        }

        dataset.samples.push(Sample {
            features,
            label: label_row.close,
            span: Some(SampleSpan {
                window_end: window[window_size - 1].date,
                label_date: label_row.date,
            }),
        });
    }

    Ok(dataset)
}

/// One sample per eligible day: that day's indicator row, labelled with the
/// next timeline day's close.
pub fn build_indicator_dataset(rows: &[DailyFeatureRow]) -> Dataset {
    let mut dataset = Dataset::new(FeatureScheme::Indicators);

    for pair in rows.windows(2) {
        let (today, next) = (&pair[0], &pair[1]);
        let Some(features) = today.indicator_features() else {
            continue;
        };
        if !next.close.is_finite() {
            continue;
        }
        dataset.samples.push(Sample {
            features,
            label: next.close,
            span: Some(SampleSpan {
                window_end: today.date,
                label_date: next.date,
            }),
        });
    }

    dataset
}

/// Builds the supervised dataset for `scheme`, chronological and never shuffled
pub fn build(rows: &[DailyFeatureRow], scheme: FeatureScheme) -> Result<Dataset> {
    let dataset = match scheme {
        FeatureScheme::PriceWindow { window_size } => build_price_window_dataset(rows, window_size)?,
        FeatureScheme::Indicators => build_indicator_dataset(rows),
    };
    debug!(
        "Built {} samples from {} rows ({:?})",
        dataset.len(),
        rows.len(),
        scheme
    );
    Ok(dataset)
}

/// Feature vector for the day after the last row, which has no label yet
pub fn latest_features(
    rows: &[DailyFeatureRow],
    aligned: &AlignedSentiment,
    scheme: FeatureScheme,
) -> Option<LatestFeatures> {
    let last = rows.last()?;

    let features = match scheme {
        FeatureScheme::PriceWindow { window_size } => {
            if window_size == 0 || rows.len() < window_size {
                return None;
            }
            let mut features: Vec<f64> = rows[rows.len() - window_size..]
                .iter()
                .map(|r| r.close)
                .collect();
            features.extend_from_slice(&aligned.forward);
            features
        }
        FeatureScheme::Indicators => last.indicator_features()?,
    };

    let complete = features.len() == scheme.feature_len() && features.iter().all(|v| v.is_finite());
    complete.then(|| LatestFeatures {
        features,
        last_close: last.close,
    })
}
