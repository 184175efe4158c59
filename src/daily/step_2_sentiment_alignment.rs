// External crates
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;

// Internal modules
use crate::error::{ForecastError, Result};
use crate::types::SentimentEvent;

/// Sentiment mapped onto a daily price timeline
#[derive(Debug)]
pub struct AlignedSentiment {
    pub lookback: usize,
    /// Mean sentiment per timeline day, `0.0` where no event landed
    pub daily: Vec<f64>,
    /// Trailing vector for each timeline day, oldest first
    pub vectors: BTreeMap<NaiveDate, Vec<f64>>,
    /// Trailing vector for the day after the timeline ends
    pub forward: Vec<f64>,
    /// Events that could not be placed on the timeline
    pub issues: Vec<ForecastError>,
}

impl AlignedSentiment {
    pub fn vector_for(&self, day: NaiveDate) -> Option<&[f64]> {
        self.vectors.get(&day).map(|v| v.as_slice())
    }
}

/// Checks that the timeline is strictly increasing (sorted, no duplicates)
pub fn check_timeline(timeline: &[NaiveDate]) -> Result<()> {
    match timeline.windows(2).position(|w| w[0] >= w[1]) {
        Some(i) => Err(ForecastError::UnorderedTimeline { position: i + 1 }),
        None => Ok(()),
    }
}

/// Per-day sentiment means of one timeline
#[derive(Debug)]
pub struct DailySentiment {
    /// Mean per timeline day, `0.0` where no event landed
    pub daily: Vec<f64>,
    /// Mean of the last day's events together with those dated after it,
    /// `None` when nothing arrived after the last day
    pub after_close: Option<f64>,
    pub issues: Vec<ForecastError>,
}

/// Mean of the scores, sorted first so the result does not depend on event order
fn bucket_mean(mut scores: Vec<f64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.sort_by(|a, b| a.total_cmp(b));
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Averages events per timeline day.
///
/// Events dated between two timeline days (weekends, holidays) count towards
/// the next timeline day. Events after the last day are kept apart in
/// `after_close` since the day they belong to has no bar yet. Events before
/// the first day or with a non-finite score are returned as issues.
pub fn aggregate_daily(timeline: &[NaiveDate], events: &[SentimentEvent]) -> DailySentiment {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); timeline.len()];
    let mut after: Vec<f64> = Vec::new();
    let mut issues = Vec::new();

    let (first, last) = match (timeline.first(), timeline.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            for event in events {
                issues.push(ForecastError::AlignmentInconsistency {
                    date: event.date,
                    reason: "timeline is empty".into(),
                });
            }
            return DailySentiment {
                daily: Vec::new(),
                after_close: None,
                issues,
            };
        }
    };

    for event in events {
        if !event.score.is_finite() {
            issues.push(ForecastError::AlignmentInconsistency {
                date: event.date,
                reason: format!("score {} is not a finite number", event.score),
            });
            continue;
        }
        if event.date < first {
            issues.push(ForecastError::AlignmentInconsistency {
                date: event.date,
                reason: format!("before the price timeline starting {}", first),
            });
            continue;
        }
        let score = event.score.clamp(-1.0, 1.0);
        if event.date > last {
            debug!("Sentiment from {} is newer than the last bar {}", event.date, last);
            after.push(score);
            continue;
        }

        let slot = timeline.partition_point(|day| *day < event.date);
        if timeline[slot] != event.date {
            debug!("Sentiment from {} rolled forward to {}", event.date, timeline[slot]);
        }
        buckets[slot].push(score);
    }

    let after_close = (!after.is_empty()).then(|| {
        let mut closing = buckets[buckets.len() - 1].clone();
        closing.extend(after);
        bucket_mean(closing)
    });
    let daily = buckets.into_iter().map(bucket_mean).collect();
    DailySentiment {
        daily,
        after_close,
        issues,
    }
}

/// Trailing window `[daily[end - lookback], .., daily[end - 1]]`, zero-padded on the left
fn trailing_vector(daily: &[f64], end: usize, lookback: usize) -> Vec<f64> {
    (0..lookback)
        .map(|k| {
            let offset = lookback - k;
            end.checked_sub(offset).map(|i| daily[i]).unwrap_or(0.0)
        })
        .collect()
}

/// Aligns sparse sentiment events onto a daily timeline.
///
/// The vector of day `i` holds the daily sentiment of the `lookback` timeline
/// days strictly before `i`. A day's own sentiment first shows up in the
/// vector of the following day. The `forward` vector, for the day after the
/// timeline, also counts events dated after the last day in its newest slot.
pub fn align(
    timeline: &[NaiveDate],
    events: &[SentimentEvent],
    lookback: usize,
) -> Result<AlignedSentiment> {
    if lookback == 0 {
        return Err(ForecastError::Configuration(
            "sentiment lookback must be positive".into(),
        ));
    }
    check_timeline(timeline)?;

    let DailySentiment {
        daily,
        after_close,
        issues,
    } = aggregate_daily(timeline, events);
    for issue in &issues {
        warn!("Ignoring sentiment event: {}", issue);
    }

    let vectors = timeline
        .iter()
        .enumerate()
        .map(|(i, day)| (*day, trailing_vector(&daily, i, lookback)))
        .collect();
    let mut forward = trailing_vector(&daily, timeline.len(), lookback);
    // News published after the last close is known before the next bar
    if let (Some(value), Some(newest)) = (after_close, forward.last_mut()) {
        *newest = value;
    }

    Ok(AlignedSentiment {
        lookback,
        daily,
        vectors,
        forward,
        issues,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn consecutive_days(n: i64) -> Vec<NaiveDate> {
        (0..n).map(day).collect()
    }

    fn event(offset: i64, score: f64) -> SentimentEvent {
        SentimentEvent {
            date: day(offset),
            score,
        }
    }

    #[test]
    fn test_no_events_yields_zero_vectors() {
        let timeline = consecutive_days(10);
        let aligned = align(&timeline, &[], 3).unwrap();

        assert_eq!(aligned.vectors.len(), 10);
        for vector in aligned.vectors.values() {
            assert_eq!(vector, &vec![0.0, 0.0, 0.0]);
        }
        assert_eq!(aligned.forward, vec![0.0, 0.0, 0.0]);
        assert!(aligned.issues.is_empty());
    }

    #[test]
    fn test_single_event_appears_only_in_following_lookback_days() {
        let timeline = consecutive_days(12);
        let d = 4;
        let lookback = 3;
        let aligned = align(&timeline, &[event(d, 0.5)], lookback).unwrap();

        for i in 0..12 {
            let vector = aligned.vector_for(day(i)).unwrap();
            let contains = vector.contains(&0.5);
            let expected = i > d && i <= d + lookback as i64;
            assert_eq!(contains, expected, "day {} vector {:?}", i, vector);
        }

        // Oldest first: the day right after D has the event in the last slot
        assert_eq!(aligned.vector_for(day(d + 1)).unwrap(), &[0.0, 0.0, 0.5]);
        assert_eq!(aligned.vector_for(day(d + 3)).unwrap(), &[0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_same_day_events_are_averaged_regardless_of_order() {
        let timeline = consecutive_days(5);
        let forward = [event(1, 0.9), event(1, -0.3), event(1, 0.3)];
        let reversed = [event(1, 0.3), event(1, -0.3), event(1, 0.9)];

        let a = align(&timeline, &forward, 2).unwrap();
        let b = align(&timeline, &reversed, 2).unwrap();

        assert_eq!(a.daily, b.daily);
        assert_eq!(a.vectors, b.vectors);
        assert!((a.daily[1] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_gap_day_event_rolls_forward() {
        // Friday, then Monday
        let friday = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let timeline = vec![friday, monday, monday + Duration::days(1)];

        let aligned = align(&timeline, &[SentimentEvent { date: saturday, score: -0.6 }], 1).unwrap();

        assert_eq!(aligned.daily, vec![0.0, -0.6, 0.0]);
        assert_eq!(aligned.vector_for(monday).unwrap(), &[0.0]);
        assert_eq!(aligned.vector_for(monday + Duration::days(1)).unwrap(), &[-0.6]);
        assert!(aligned.issues.is_empty());
    }

    #[test]
    fn test_unmapped_events_are_reported_not_fatal() {
        let timeline = consecutive_days(5);
        let events = [event(-2, 0.4), event(-1, 0.1), event(2, f64::NAN), event(2, 0.2)];
        let aligned = align(&timeline, &events, 2).unwrap();

        assert_eq!(aligned.issues.len(), 3);
        assert!(aligned
            .issues
            .iter()
            .all(|e| matches!(e, ForecastError::AlignmentInconsistency { .. })));
        assert_eq!(aligned.daily, vec![0.0, 0.0, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let timeline = consecutive_days(3);
        let aligned = align(&timeline, &[event(0, 4.0)], 1).unwrap();
        assert_eq!(aligned.daily[0], 1.0);
    }

    #[test]
    fn test_forward_vector_covers_last_days() {
        let timeline = consecutive_days(4);
        let aligned = align(&timeline, &[event(3, 0.7), event(2, -0.1)], 3).unwrap();
        assert_eq!(aligned.forward, vec![0.0, -0.1, 0.7]);
    }

    #[test]
    fn test_news_after_last_bar_reaches_forward_vector() {
        // Monday to Friday, then a Saturday headline
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let timeline: Vec<_> = (0..5).map(|i| monday + Duration::days(i)).collect();
        let saturday = monday + Duration::days(5);

        let aligned = align(&timeline, &[SentimentEvent { date: saturday, score: 0.9 }], 3).unwrap();

        assert!(aligned.issues.is_empty());
        assert_eq!(aligned.forward, vec![0.0, 0.0, 0.9]);
        assert!(aligned.daily.iter().all(|d| *d == 0.0));
        assert!(aligned.vectors.values().all(|v| !v.contains(&0.9)));
    }

    #[test]
    fn test_after_close_news_is_averaged_with_last_day() {
        let timeline = consecutive_days(4);
        let events = [event(3, 0.2), event(5, 0.6), event(6, -0.2)];
        let aligned = align(&timeline, &events, 2).unwrap();

        assert_eq!(aligned.daily[3], 0.2);
        assert!((aligned.forward[1] - 0.2).abs() < 1e-12);
        assert_eq!(aligned.forward[0], 0.0);
        assert_eq!(aligned.vector_for(day(3)).unwrap(), &[0.0, 0.0]);
    }

    #[test]
    fn test_unordered_timeline_is_rejected() {
        let timeline = vec![day(0), day(2), day(2)];
        let result = align(&timeline, &[], 3);
        assert!(matches!(result, Err(ForecastError::UnorderedTimeline { position: 2 })));
    }

    #[test]
    fn test_zero_lookback_is_rejected() {
        let result = align(&consecutive_days(3), &[], 0);
        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn test_empty_timeline_reports_every_event() {
        let aligned = align(&[], &[event(0, 0.1)], 3).unwrap();
        assert!(aligned.vectors.is_empty());
        assert_eq!(aligned.issues.len(), 1);
        assert_eq!(aligned.forward, vec![0.0, 0.0, 0.0]);
    }
}
