//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, N-M, comma lists.
//! Example: "0 2 * * *" = every day at 02:00.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

/// Compute the next fire time of `expression` strictly after `after`.
/// Returns `None` for an unparseable expression or one that never fires.
pub fn next_fire(expression: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let spec = CronSpec::parse(expression)?;

    let mut candidate = (after + Duration::minutes(1))
        .with_second(0)
        .unwrap_or(after)
        .with_nanosecond(0)
        .unwrap_or(after);

    // Walk minute by minute, up to 60 days ahead — enough for any
    // DOM/DOW combination this parser accepts.
    for _ in 0..(60 * 24 * 60) {
        if spec.matches(candidate) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }
    None
}

/// A parsed 5-field cron expression.
struct CronSpec {
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days: Vec<u32>,
    months: Vec<u32>,
    weekdays: Vec<u32>,
}

impl CronSpec {
    fn parse(expression: &str) -> Option<Self> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        if parts.len() != 5 {
            tracing::warn!(
                "invalid cron expression '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
                expression
            );
            return None;
        }
        Some(Self {
            minutes: parse_field(parts[0], 0, 59)?,
            hours: parse_field(parts[1], 0, 23)?,
            days: parse_field(parts[2], 1, 31)?,
            months: parse_field(parts[3], 1, 12)?,
            // 7 is accepted as an alias for Sunday (0)
            weekdays: parse_field(parts[4], 0, 7)?
                .into_iter()
                .map(|d| if d == 7 { 0 } else { d })
                .collect(),
        })
    }

    fn matches(&self, t: DateTime<Utc>) -> bool {
        self.minutes.contains(&t.minute())
            && self.hours.contains(&t.hour())
            && self.days.contains(&t.day())
            && self.months.contains(&t.month())
            && self.weekdays.contains(&t.weekday().num_days_from_sunday())
    }
}

/// Parse one cron field into the list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N — every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma list; each item a number or range
    let mut values = Vec::new();
    for item in field.split(',') {
        let item = item.trim();
        if let Some((lo, hi)) = item.split_once('-') {
            let lo: u32 = lo.parse().ok()?;
            let hi: u32 = hi.parse().ok()?;
            if lo > hi || lo < min || hi > max {
                return None;
            }
            values.extend(lo..=hi);
        } else {
            let n: u32 = item.parse().ok()?;
            if n < min || n > max {
                return None;
            }
            values.push(n);
        }
    }
    if values.is_empty() { None } else { Some(values) }
}
