//! Schedule expressions accepted by the job scheduler.
//!
//! The `cron` crate is only touched in this module. Everything else works
//! with [`JobSchedule`], so the parser can be replaced without changing the
//! scheduler.

use chrono::{DateTime, Local};
use miniclaw_core::{MiniclawError, Result};
use std::str::FromStr;
use std::time::Duration;

/// A parsed, armable schedule.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl JobSchedule {
    /// Parse a 5- or 6-field cron expression, an `@`-shortcut, or
    /// `@every <duration>`.
    pub fn parse(expression: &str) -> Result<Self> {
        let expr = expression.trim();
        let invalid = |reason: String| MiniclawError::InvalidSchedule {
            expression: expression.to_string(),
            reason,
        };

        if let Some(rest) = expr.strip_prefix("@every") {
            let interval =
                humantime::parse_duration(rest.trim()).map_err(|e| invalid(e.to_string()))?;
            if interval < Duration::from_secs(1) {
                return Err(invalid("interval must be at least 1s".into()));
            }
            return Ok(Self::Every(interval));
        }

        let six_field = match expr {
            "@yearly" | "@annually" => "0 0 0 1 1 *".to_string(),
            "@monthly" => "0 0 0 1 * *".to_string(),
            "@weekly" => "0 0 0 * * Sun".to_string(),
            "@daily" | "@midnight" => "0 0 0 * * *".to_string(),
            "@hourly" => "0 0 * * * *".to_string(),
            s if s.starts_with('@') => return Err(invalid(format!("unknown shortcut {s}"))),
            s => normalize_fields(s).map_err(invalid)?,
        };

        let schedule = cron::Schedule::from_str(&six_field).map_err(|e| invalid(e.to_string()))?;
        Ok(Self::Cron(Box::new(schedule)))
    }

    /// The first fire time strictly after `now`.
    pub fn next_after(&self, now: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Self::Cron(schedule) => schedule.after(&now).next(),
            Self::Every(interval) => Some(now + chrono::Duration::from_std(*interval).ok()?),
        }
    }
}

/// Bring a user expression to the 6/7-field form with seconds first and
/// translate standard day-of-week numbers.
fn normalize_fields(expr: &str) -> std::result::Result<String, String> {
    let mut fields: Vec<String> = expr.split_whitespace().map(str::to_string).collect();
    match fields.len() {
        5 => fields.insert(0, "0".into()),
        6 | 7 => {}
        n => return Err(format!("expected 5 or 6 fields, got {n}")),
    }
    fields[5] = translate_day_of_week(&fields[5])?;
    Ok(fields.join(" "))
}

/// Map standard numbering (Sunday = 0 or 7) onto the cron crate's, where
/// Sunday = 1 and Saturday = 7. Names and wildcards pass through.
fn translate_day_of_week(field: &str) -> std::result::Result<String, String> {
    let mut out: Vec<String> = Vec::new();
    for item in field.split(',') {
        if item == "*" || item == "?" || item.chars().any(|c| c.is_ascii_alphabetic()) {
            out.push(item.to_string());
            continue;
        }

        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid day-of-week step in {item:?}"))?;
                if step == 0 {
                    return Err(format!("invalid day-of-week step in {item:?}"));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_weekday(a)?, parse_weekday(b)?)
        } else {
            let day = parse_weekday(range)?;
            (day, if step.is_some() { 6 } else { day })
        };
        if start > end {
            return Err(format!("invalid day-of-week range {item:?}"));
        }

        let step = step.unwrap_or(1) as usize;
        let mut days: Vec<u32> = (start..=end)
            .step_by(step)
            .map(|d| if d == 7 { 1 } else { d + 1 })
            .collect();
        days.sort_unstable();
        days.dedup();
        out.extend(days.iter().map(u32::to_string));
    }
    out.dedup();
    Ok(out.join(","))
}

fn parse_weekday(s: &str) -> std::result::Result<u32, String> {
    let day: u32 = s
        .parse()
        .map_err(|_| format!("invalid day-of-week value {s:?}"))?;
    if day > 7 {
        return Err(format!("day-of-week {day} out of range 0-7"));
    }
    Ok(day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    #[test]
    fn test_day_of_week_translation() {
        assert_eq!(translate_day_of_week("0").unwrap(), "1");
        assert_eq!(translate_day_of_week("7").unwrap(), "1");
        assert_eq!(translate_day_of_week("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(translate_day_of_week("5-7").unwrap(), "1,6,7");
        assert_eq!(translate_day_of_week("*/2").unwrap(), "1,3,5,7");
        assert_eq!(translate_day_of_week("MON-FRI").unwrap(), "MON-FRI");
        assert_eq!(translate_day_of_week("*").unwrap(), "*");
        assert!(translate_day_of_week("8").is_err());
        assert!(translate_day_of_week("5-2").is_err());
    }

    #[test]
    fn test_five_fields_gain_seconds() {
        assert_eq!(normalize_fields("30 9 * * 1").unwrap(), "0 30 9 * * 2");
        assert!(normalize_fields("* * *").is_err());
    }

    #[test]
    fn test_monday_job_fires_on_monday() {
        let schedule = JobSchedule::parse("0 9 * * 1").unwrap();
        // 2026-10-14 is a Wednesday.
        let now = Local.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        let next = schedule.next_after(now).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!((next.hour(), next.minute()), (9, 0));
    }

    #[test]
    fn test_sunday_as_zero_and_seven() {
        let now = Local.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();
        for expr in ["0 8 * * 0", "0 8 * * 7"] {
            let next = JobSchedule::parse(expr).unwrap().next_after(now).unwrap();
            assert_eq!(next.weekday(), Weekday::Sun);
        }
    }
}
