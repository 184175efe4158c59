// External crates
use polars::prelude::*;

// Internal modules
use super::step_2_sentiment_alignment::AlignedSentiment;
use crate::constants::{ATR_PERIOD, EMA_PERIOD, RSI_PERIOD, SMA_PERIOD};
use crate::types::{DailyFeatureRow, PricePoint};

/// Columns added by [`add_technical_indicators`]
pub const INDICATOR_COLUMNS: [&str; 4] = ["sma_10", "ema_10", "rsi_14", "atr_14"];

fn rolling_options(window: usize) -> RollingOptionsFixedWindow {
    RollingOptionsFixedWindow {
        window_size: window,
        min_periods: window,
        center: false,
        weights: None,
        fn_params: None,
    }
}

/// All-null column, used when the series is shorter than the window
fn undefined(name: &str, len: usize) -> Series {
    Series::full_null(name.into(), len, &DataType::Float64)
}

fn check_window(window: usize) -> PolarsResult<()> {
    if window == 0 {
        return Err(PolarsError::ComputeError(
            "Indicator window must be positive".into(),
        ));
    }
    Ok(())
}

fn float_values(df: &DataFrame, column: &str) -> PolarsResult<Vec<f64>> {
    Ok(df
        .column(column)?
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Builds the OHLCV frame, one row per bar, all columns Float64
pub fn prices_to_dataframe(prices: &[PricePoint]) -> PolarsResult<DataFrame> {
    let open: Vec<f64> = prices.iter().map(|p| p.open).collect();
    let high: Vec<f64> = prices.iter().map(|p| p.high).collect();
    let low: Vec<f64> = prices.iter().map(|p| p.low).collect();
    let close: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let volume: Vec<f64> = prices.iter().map(|p| p.volume as f64).collect();

    DataFrame::new(vec![
        Series::new("open".into(), open).into_column(),
        Series::new("high".into(), high).into_column(),
        Series::new("low".into(), low).into_column(),
        Series::new("close".into(), close).into_column(),
        Series::new("volume".into(), volume).into_column(),
    ])
}

/// Simple moving average, null until `window` observations exist
pub fn calculate_sma(df: &DataFrame, column: &str, window: usize) -> PolarsResult<Series> {
    check_window(window)?;
    let series = df.column(column)?.f64()?.clone().into_series();

    if series.len() < window {
        return Ok(undefined(column, series.len()));
    }
    series.rolling_mean(rolling_options(window))
}

/// Exponential moving average with `alpha = 2 / (window + 1)`, seeded from the first value
pub fn calculate_ema(df: &DataFrame, column: &str, window: usize) -> PolarsResult<Series> {
    check_window(window)?;
    let alpha = 2.0 / (window as f64 + 1.0);

    let mut ema: Option<f64> = None;
    let values: Vec<Option<f64>> = float_values(df, column)?
        .into_iter()
        .map(|value| {
            let next = match ema {
                None => value,
                Some(prev) => alpha * value + (1.0 - alpha) * prev,
            };
            ema = Some(next);
            ema
        })
        .collect();

    Ok(Series::new(column.into(), values))
}

/// RSI from averaged gains and losses.
///
/// A zero average loss never reaches the division: the value is undefined
/// for a flat window and saturates at 100 when there were only gains.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if !avg_gain.is_finite() || !avg_loss.is_finite() {
        return None;
    }
    if avg_loss <= 0.0 {
        return if avg_gain > 0.0 { Some(100.0) } else { None };
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Relative Strength Index over the trailing `window` day-over-day close deltas
pub fn calculate_rsi(df: &DataFrame, window: usize) -> PolarsResult<Series> {
    check_window(window)?;
    let close = float_values(df, "close")?;

    // Needs `window` deltas, so `window + 1` closes
    if close.len() <= window {
        return Ok(undefined("rsi", close.len()));
    }

    let deltas: Vec<f64> = close.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let avg_gain = Series::new("gains".into(), gains).rolling_mean(rolling_options(window))?;
    let avg_loss = Series::new("losses".into(), losses).rolling_mean(rolling_options(window))?;

    // Row 0 has no delta
    let mut rsi: Vec<Option<f64>> = Vec::with_capacity(close.len());
    rsi.push(None);
    for (gain, loss) in avg_gain.f64()?.into_iter().zip(avg_loss.f64()?.into_iter()) {
        let value = match (gain, loss) {
            (Some(g), Some(l)) => rsi_from_averages(g, l),
            _ => None,
        };
        rsi.push(value);
    }

    Ok(Series::new("rsi".into(), rsi))
}

/// Average True Range: trailing mean of `max(high - low, |high - prev_close|, |low - prev_close|)`
pub fn calculate_atr(df: &DataFrame, window: usize) -> PolarsResult<Series> {
    check_window(window)?;
    let high = float_values(df, "high")?;
    let low = float_values(df, "low")?;
    let close = float_values(df, "close")?;

    if df.height() < window {
        return Ok(undefined("atr", df.height()));
    }

    let mut tr_values = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let range = high[i] - low[i];
        let tr = if i == 0 {
            range
        } else {
            let pc = close[i - 1];
            range.max((high[i] - pc).abs()).max((low[i] - pc).abs())
        };
        tr_values.push(tr);
    }

    Series::new("tr".into(), tr_values).rolling_mean(rolling_options(window))
}

/// Adds SMA_10, EMA_10, RSI_14 and ATR_14 columns to an OHLCV frame
pub fn add_technical_indicators(df: &mut DataFrame) -> PolarsResult<()> {
    let sma_10 = calculate_sma(df, "close", SMA_PERIOD)?;
    let ema_10 = calculate_ema(df, "close", EMA_PERIOD)?;
    let rsi_14 = calculate_rsi(df, RSI_PERIOD)?;
    let atr_14 = calculate_atr(df, ATR_PERIOD)?;

    df.with_column(sma_10.with_name(INDICATOR_COLUMNS[0].into()))?;
    df.with_column(ema_10.with_name(INDICATOR_COLUMNS[1].into()))?;
    df.with_column(rsi_14.with_name(INDICATOR_COLUMNS[2].into()))?;
    df.with_column(atr_14.with_name(INDICATOR_COLUMNS[3].into()))?;

    Ok(())
}

/// Price history augmented with the indicator columns
pub fn compute(prices: &[PricePoint]) -> PolarsResult<DataFrame> {
    let mut df = prices_to_dataframe(prices)?;
    add_technical_indicators(&mut df)?;
    Ok(df)
}

/// Joins the indicator frame with the aligned sentiment into per-day rows.
///
/// Non-finite indicator values are treated as undefined.
pub fn to_feature_rows(
    prices: &[PricePoint],
    indicators: &DataFrame,
    sentiment: &AlignedSentiment,
) -> PolarsResult<Vec<DailyFeatureRow>> {
    if indicators.height() != prices.len() {
        return Err(PolarsError::ShapeMismatch(
            format!(
                "Indicator frame has {} rows for {} prices",
                indicators.height(),
                prices.len()
            )
            .into(),
        ));
    }

    let column = |name: &str| -> PolarsResult<Vec<Option<f64>>> {
        Ok(indicators
            .column(name)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect())
    };
    let sma = column(INDICATOR_COLUMNS[0])?;
    let ema = column(INDICATOR_COLUMNS[1])?;
    let rsi = column(INDICATOR_COLUMNS[2])?;
    let atr = column(INDICATOR_COLUMNS[3])?;

    let rows = prices
        .iter()
        .enumerate()
        .map(|(i, price)| DailyFeatureRow {
            date: price.date,
            close: price.close,
            sma_10: sma[i],
            ema_10: ema[i],
            rsi_14: rsi[i],
            atr_14: atr[i],
            sentiment: sentiment
                .vector_for(price.date)
                .map(|v| v.to_vec())
                .unwrap_or_else(|| vec![0.0; sentiment.lookback]),
        })
        .collect();

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INDICATOR_WARMUP;
    use crate::util::test_utils::{constant_prices, linear_prices, random_walk_prices};

    fn column_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name).unwrap().f64().unwrap().into_iter().collect()
    }

    #[test]
    fn test_constant_series_has_undefined_rsi() {
        let df = compute(&constant_prices(40, 50.0)).unwrap();
        let rsi = column_values(&df, "rsi_14");

        assert!(rsi.iter().all(|v| v.is_none()), "RSI should be undefined: {:?}", rsi);
        assert!(rsi.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_strictly_increasing_series_saturates_rsi() {
        let df = compute(&linear_prices(40, 100.0, 1.0)).unwrap();
        let rsi = column_values(&df, "rsi_14");

        for (i, value) in rsi.iter().enumerate() {
            if i < 14 {
                assert!(value.is_none(), "row {} should be warming up", i);
            } else {
                assert_eq!(*value, Some(100.0), "row {}", i);
            }
        }
    }

    #[test]
    fn test_rsi_matches_hand_computation() {
        // Alternating +2 / -1 moves: 7 gains of 2 and 7 losses of 1 per 14 deltas
        let closes: Vec<f64> = (0..20)
            .scan(100.0, |price, i| {
                let current = *price;
                *price += if i % 2 == 0 { 2.0 } else { -1.0 };
                Some(current)
            })
            .collect();
        let df = DataFrame::new(vec![Series::new("close".into(), closes).into_column()]).unwrap();
        let rsi = calculate_rsi(&df, 14).unwrap();
        let value = rsi.f64().unwrap().get(14).unwrap();

        let expected = 100.0 - 100.0 / (1.0 + (7.0 * 2.0 / 14.0) / (7.0 * 1.0 / 14.0));
        assert!((value - expected).abs() < 1e-9);
        assert!(rsi.f64().unwrap().get(13).is_none());
    }

    #[test]
    fn test_rsi_from_averages_never_divides_by_zero() {
        assert_eq!(rsi_from_averages(0.0, 0.0), None);
        assert_eq!(rsi_from_averages(1.5, 0.0), Some(100.0));
        assert_eq!(rsi_from_averages(1.0, 1.0), Some(50.0));
        assert_eq!(rsi_from_averages(f64::NAN, 1.0), None);
    }

    #[test]
    fn test_sma_and_ema_values() {
        let df = compute(&linear_prices(12, 1.0, 1.0)).unwrap();
        let sma = column_values(&df, "sma_10");
        let ema = column_values(&df, "ema_10");

        assert!(sma[..9].iter().all(|v| v.is_none()));
        // Mean of 1..=10 and of 2..=11
        assert!((sma[9].unwrap() - 5.5).abs() < 1e-12);
        assert!((sma[10].unwrap() - 6.5).abs() < 1e-12);

        // EMA is defined from the first row, seeded with the first close
        assert_eq!(ema[0], Some(1.0));
        let alpha = 2.0 / 11.0;
        assert!((ema[1].unwrap() - (alpha * 2.0 + (1.0 - alpha) * 1.0)).abs() < 1e-12);
        assert!(ema.iter().all(|v| v.is_some()));
    }

    #[test]
    fn test_atr_uses_true_range() {
        let prices = random_walk_prices(30, 11);
        let df = compute(&prices).unwrap();
        let atr = column_values(&df, "atr_14");

        assert!(atr[..13].iter().all(|v| v.is_none()));

        let true_range = |i: usize| {
            let p = &prices[i];
            if i == 0 {
                return p.high - p.low;
            }
            let pc = prices[i - 1].close;
            (p.high - p.low).max((p.high - pc).abs()).max((p.low - pc).abs())
        };
        let expected: f64 = (6..20).map(true_range).sum::<f64>() / 14.0;
        assert!((atr[19].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_first_fourteen_rows_are_never_eligible() {
        let prices = random_walk_prices(40, 3);
        let df = compute(&prices).unwrap();
        let timeline: Vec<_> = prices.iter().map(|p| p.date).collect();
        let aligned = crate::daily::step_2_sentiment_alignment::align(&timeline, &[], 3).unwrap();
        let rows = to_feature_rows(&prices, &df, &aligned).unwrap();

        assert_eq!(rows.len(), 40);
        assert!(rows[..INDICATOR_WARMUP].iter().all(|r| !r.is_eligible()));
        assert!(rows[INDICATOR_WARMUP..].iter().any(|r| r.is_eligible()));
    }

    #[test]
    fn test_short_series_is_all_undefined() {
        let df = compute(&linear_prices(5, 10.0, 1.0)).unwrap();
        for name in ["sma_10", "rsi_14", "atr_14"] {
            assert!(column_values(&df, name).iter().all(|v| v.is_none()), "{}", name);
        }
    }

    #[test]
    fn test_empty_history_produces_empty_frame() {
        let df = compute(&[]).unwrap();
        assert_eq!(df.height(), 0);
        for name in INDICATOR_COLUMNS {
            assert!(df.column(name).is_ok(), "missing column {}", name);
        }
    }
}
