//! Time-series shaping: timestamp normalization, downsampling and derived
//! statistics for the stats panel.
//!
//! The backend returns `localtime` as text and is not consistent about the
//! format; both ISO timestamps and US-locale strings show up in practice.
//! Timestamps are wall-clock values in the device's local time, so trailing
//! `Z`/offset markers on the ISO form are stripped rather than converted.

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Error, Result};

/// Half-open selection window over device-local time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

impl TimeRange {
    pub fn new(from: NaiveDateTime, to: NaiveDateTime) -> Result<Self> {
        if to <= from {
            return Err(Error::InvalidTimeRange);
        }
        Ok(Self { from, to })
    }

    /// `[now - hours, now]` in local wall-clock time. Backs the quick
    /// presets (6h / 24h / 7d) and the default window. Non-positive and
    /// absurdly large window sizes are rejected instead of overflowing.
    pub fn last_hours(hours: i64) -> Result<Self> {
        if hours <= 0 {
            return Err(Error::InvalidTimeRange);
        }
        let window = Duration::try_hours(hours).ok_or(Error::InvalidTimeRange)?;
        let to = Local::now().naive_local();
        let from = to
            .checked_sub_signed(window)
            .ok_or(Error::InvalidTimeRange)?;
        Ok(Self { from, to })
    }

    pub fn duration(&self) -> Duration {
        self.to - self.from
    }
}

/// One normalized telemetry point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Parse a `localtime` string from a query response.
///
/// Accepted forms:
/// - ISO: `2025-03-06T15:44:33.000Z` (offset markers ignored)
/// - US locale: `3/11/2025, 10:45:01 AM`
pub fn parse_localtime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::Timestamp(raw.to_string()));
    }

    if raw.contains('/') && raw.contains(',') {
        return parse_us_locale(raw);
    }
    parse_iso(raw)
}

fn parse_iso(raw: &str) -> Result<NaiveDateTime> {
    let cleaned = strip_offset(raw);
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(cleaned, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(cleaned, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(Error::Timestamp(raw.to_string()))
}

/// Drop a trailing `Z` or `+HH:MM`/`-HH:MM` offset so the wall-clock part
/// is kept as-is instead of being shifted to UTC.
fn strip_offset(raw: &str) -> &str {
    if let Some(stripped) = raw.strip_suffix('Z') {
        return stripped;
    }
    if raw.len() > 6 {
        let (head, tail) = raw.split_at(raw.len() - 6);
        let bytes = tail.as_bytes();
        let is_offset = (bytes[0] == b'+' || bytes[0] == b'-')
            && bytes[1].is_ascii_digit()
            && bytes[2].is_ascii_digit()
            && bytes[3] == b':'
            && bytes[4].is_ascii_digit()
            && bytes[5].is_ascii_digit();
        // Only strip when the tail follows a time component, not a date like
        // `2025-03-06`.
        if is_offset && head.contains('T') {
            return head;
        }
    }
    raw
}

fn parse_us_locale(raw: &str) -> Result<NaiveDateTime> {
    let bad = || Error::Timestamp(raw.to_string());

    let (date_part, time_part) = raw.split_once(',').ok_or_else(bad)?;
    let mut fields = date_part.trim().split('/');
    let month: u32 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let day: u32 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let year: i32 = fields.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?;

    let time_part = time_part.trim();
    if time_part.is_empty() {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    let (clock, meridiem) = match time_part.split_once(' ') {
        Some((clock, meridiem)) => (clock, Some(meridiem.trim().to_ascii_uppercase())),
        None => (time_part, None),
    };
    let mut parts = clock.split(':');
    let mut hours: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let minutes: u32 = parts.next().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let seconds: u32 = parts
        .next()
        .map(|s| s.parse().map_err(|_| bad()))
        .transpose()?
        .unwrap_or(0);

    match meridiem.as_deref() {
        Some("PM") if hours != 12 => hours += 12,
        Some("AM") if hours == 12 => hours = 0,
        Some("AM") | Some("PM") | None => {}
        Some(_) => return Err(bad()),
    }

    let time = NaiveTime::from_hms_opt(hours, minutes, seconds).ok_or_else(bad)?;
    Ok(date.and_time(time))
}

/// Parse a user-entered range bound: `YYYY-MM-DD`,
/// `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_user_datetime(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(Error::Timestamp(raw.to_string()))
}

/// Fixed-stride downsampling for chart rendering. The first and last
/// elements always survive; everything in between is kept every
/// `ceil(len / cap)` steps. Identity when the input already fits the cap.
/// The output may exceed the cap by one element (the appended tail). A cap
/// of zero is treated as one, degenerating to just the endpoints.
pub fn downsample<T: Clone>(items: &[T], cap: usize) -> Vec<T> {
    let cap = cap.max(1);
    if items.len() <= cap {
        return items.to_vec();
    }
    let step = items.len().div_ceil(cap);
    let mut out: Vec<T> = items.iter().step_by(step).cloned().collect();
    if (items.len() - 1) % step != 0 {
        out.push(items[items.len() - 1].clone());
    }
    out
}

/// Derived statistics for the stats panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl Stats {
    /// Compute over the finite values in `values`; `None` when nothing
    /// survives the filter.
    pub fn compute(values: &[f64]) -> Option<Stats> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let count = finite.len();
        let (min, max) = match finite.iter().minmax_by(|a, b| a.total_cmp(b)) {
            itertools::MinMaxResult::NoElements => unreachable!("non-empty"),
            itertools::MinMaxResult::OneElement(v) => (*v, *v),
            itertools::MinMaxResult::MinMax(lo, hi) => (*lo, *hi),
        };
        let mean = finite.iter().sum::<f64>() / count as f64;
        let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Some(Stats {
            count,
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        let from = dt(2025, 3, 1, 12, 0, 0);
        assert!(TimeRange::new(from, from).is_err());
        assert!(TimeRange::new(from, from - Duration::hours(1)).is_err());
        assert!(TimeRange::new(from, from + Duration::seconds(1)).is_ok());
    }

    #[test]
    fn test_last_hours_window() {
        let range = TimeRange::last_hours(24).unwrap();
        assert_eq!(range.duration(), Duration::hours(24));
    }

    #[test]
    fn test_last_hours_rejects_bad_windows() {
        assert!(TimeRange::last_hours(0).is_err());
        assert!(TimeRange::last_hours(-6).is_err());
        // Values beyond what a Duration or timestamp can hold must come
        // back as errors, not aborts.
        assert!(TimeRange::last_hours(4_000_000_000_000).is_err());
        assert!(TimeRange::last_hours(i64::MAX).is_err());
    }

    #[rstest]
    #[case("2025-03-06T15:44:33.000Z", dt(2025, 3, 6, 15, 44, 33))]
    #[case("2025-03-06T15:44:33Z", dt(2025, 3, 6, 15, 44, 33))]
    #[case("2025-03-06T15:44:33+02:00", dt(2025, 3, 6, 15, 44, 33))]
    #[case("2025-03-06T15:44:33-05:00", dt(2025, 3, 6, 15, 44, 33))]
    #[case("2025-03-06T15:44:33", dt(2025, 3, 6, 15, 44, 33))]
    #[case("2025-03-06", dt(2025, 3, 6, 0, 0, 0))]
    #[case("3/11/2025, 10:45:01 AM", dt(2025, 3, 11, 10, 45, 1))]
    #[case("3/11/2025, 10:45:01 PM", dt(2025, 3, 11, 22, 45, 1))]
    #[case("12/31/2025, 12:00:00 AM", dt(2025, 12, 31, 0, 0, 0))]
    #[case("6/1/2025, 12:15:30 PM", dt(2025, 6, 1, 12, 15, 30))]
    #[case("3/11/2025, 22:45:01", dt(2025, 3, 11, 22, 45, 1))]
    fn test_parse_localtime(#[case] raw: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_localtime(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("not a date")]
    #[case("13/45/2025, 10:00:00 AM")]
    #[case("2025-13-40T99:00:00")]
    fn test_parse_localtime_rejects(#[case] raw: &str) {
        assert!(matches!(parse_localtime(raw), Err(Error::Timestamp(_))));
    }

    #[rstest]
    #[case("2025-03-06", dt(2025, 3, 6, 0, 0, 0))]
    #[case("2025-03-06 15:44", dt(2025, 3, 6, 15, 44, 0))]
    #[case("2025-03-06 15:44:33", dt(2025, 3, 6, 15, 44, 33))]
    #[case("  2025-03-06 15:44:33  ", dt(2025, 3, 6, 15, 44, 33))]
    fn test_parse_user_datetime(#[case] raw: &str, #[case] expected: NaiveDateTime) {
        assert_eq!(parse_user_datetime(raw).unwrap(), expected);
    }

    #[test]
    fn test_parse_user_datetime_rejects() {
        assert!(parse_user_datetime("yesterday").is_err());
        assert!(parse_user_datetime("06/03/2025").is_err());
    }

    #[test]
    fn test_downsample_identity_under_cap() {
        let data: Vec<u32> = (0..100).collect();
        assert_eq!(downsample(&data, 100), data);
        assert_eq!(downsample(&data, 5000), data);
    }

    #[test]
    fn test_downsample_keeps_endpoints() {
        let data: Vec<u32> = (0..10_000).collect();
        let out = downsample(&data, 5000);
        assert_eq!(out.first(), Some(&0));
        assert_eq!(out.last(), Some(&9999));
        assert!(out.len() <= 5001);
    }

    #[test]
    fn test_downsample_zero_cap_keeps_endpoints() {
        let data: Vec<u32> = (0..10).collect();
        assert_eq!(downsample(&data, 0), vec![0, 9]);
        assert_eq!(downsample(&[7u32], 0), vec![7]);
    }

    #[test]
    fn test_downsample_empty() {
        let out: Vec<u32> = downsample(&[], 10);
        assert!(out.is_empty());
    }

    #[test]
    fn test_stats_basic() {
        let stats = Stats::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_filters_non_finite() {
        let stats = Stats::compute(&[1.0, f64::NAN, 3.0, f64::INFINITY]).unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
    }

    #[test]
    fn test_stats_empty() {
        assert!(Stats::compute(&[]).is_none());
        assert!(Stats::compute(&[f64::NAN]).is_none());
    }

    proptest! {
        #[test]
        fn prop_downsample_bounds(len in 0usize..4000, cap in 0usize..500) {
            let data: Vec<usize> = (0..len).collect();
            let out = downsample(&data, cap);
            prop_assert!(out.len() <= cap.max(1) + 1);
            if !data.is_empty() {
                prop_assert_eq!(out.first(), data.first());
                prop_assert_eq!(out.last(), data.last());
            }
        }

        #[test]
        fn prop_stats_ordering(values in proptest::collection::vec(-1e6f64..1e6, 1..200)) {
            let stats = Stats::compute(&values).unwrap();
            prop_assert!(stats.min <= stats.mean + 1e-9);
            prop_assert!(stats.mean <= stats.max + 1e-9);
            prop_assert!(stats.std_dev >= 0.0);
            prop_assert_eq!(stats.count, values.len());
        }
    }
}
