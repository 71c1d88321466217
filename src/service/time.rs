//! Timestamp parsing and hourly statistics

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};

use crate::domain::TimeSeriesPoint;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a client timestamp.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and
/// `YYYY-MM-DD`. Forms without an offset are taken as UTC.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Count timestamps per hour over the `days` days up to and including the
/// current hour. Timestamps outside the window are ignored.
pub fn hourly_series<I>(sent: I, now: DateTime<Utc>, days: i64) -> Vec<TimeSeriesPoint>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let end = truncate_to_hour(now);
    let start = end - Duration::days(days);
    let buckets = (days * 24 + 1) as usize;

    let mut counts = vec![0u64; buckets];
    for at in sent {
        let at = truncate_to_hour(at);
        if at < start || at > end {
            continue;
        }
        let index = (at - start).num_hours() as usize;
        if let Some(count) = counts.get_mut(index) {
            *count += 1;
        }
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, sent)| TimeSeriesPoint {
            time: (start + Duration::hours(i as i64)).to_rfc3339_opts(SecondsFormat::Secs, true),
            sent,
        })
        .collect()
}
