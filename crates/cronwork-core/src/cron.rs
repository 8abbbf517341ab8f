use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use chrono_tz::Tz;

use crate::error::{Result, ScheduleError};

/// Upper bound for the `next_run` forward search, in minutes. Four years
/// covers every reachable 5-field expression including leap days.
const NEXT_RUN_SEARCH_MINUTES: i64 = 4 * 366 * 24 * 60;

/// Pure cron evaluation against an absolute instant.
///
/// Accepts the standard 5-field form (minute hour day month weekday) and an
/// extended 6-field form whose first field is a seconds specifier (`*`,
/// `*/N`, or a literal second). All evaluation happens in the evaluator's
/// configured time zone; callers always pass UTC instants.
#[derive(Debug, Clone)]
pub struct CronEvaluator {
    tz: Tz,
}

impl CronEvaluator {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(chrono_tz::UTC)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Whether `expression` matches `instant`, at minute precision for the
    /// 5-field form and second precision for the 6-field form.
    pub fn is_due(&self, expression: &str, instant: DateTime<Utc>) -> Result<bool> {
        let local = instant.with_timezone(&self.tz);
        let fields: Vec<&str> = expression.split_whitespace().collect();

        let standard = match fields.len() {
            5 => &fields[..],
            6 => {
                // The seconds specifier is checked first and conjunctively:
                // a miss here is a miss regardless of the remaining fields.
                if !seconds_match(fields[0], local.second())
                    .ok_or_else(|| format_error("second", expression))?
                {
                    return Ok(false);
                }
                &fields[1..]
            }
            _ => return Err(format_error("field count", expression)),
        };

        self.standard_fields_match(standard, expression, &local)
    }

    /// The next instant after "now" matched by the trailing five fields.
    pub fn next_run(&self, expression: &str) -> Result<DateTime<Utc>> {
        self.next_run_after(expression, Utc::now())
    }

    /// The next matching instant strictly after `from`, searched at minute
    /// granularity. Seconds-level specifiers are not consulted here; a
    /// 6-field expression is matched on its trailing five fields.
    pub fn next_run_after(&self, expression: &str, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let standard: &[&str] = match fields.len() {
            5 => &fields,
            6 => {
                // Validate the seconds field even though the search ignores it.
                seconds_match(fields[0], 0).ok_or_else(|| format_error("second", expression))?;
                &fields[1..]
            }
            _ => return Err(format_error("field count", expression)),
        };

        let mut candidate = truncate_to_minute(from.with_timezone(&self.tz)) + Duration::minutes(1);
        for _ in 0..NEXT_RUN_SEARCH_MINUTES {
            if self.standard_fields_match(standard, expression, &candidate)? {
                return Ok(candidate.with_timezone(&Utc));
            }
            candidate += Duration::minutes(1);
        }

        Err(format_error("unreachable expression", expression))
    }

    fn standard_fields_match(
        &self,
        fields: &[&str],
        expression: &str,
        local: &DateTime<Tz>,
    ) -> Result<bool> {
        let checks = [
            ("minute", fields[0], local.minute(), 0, 59, false),
            ("hour", fields[1], local.hour(), 0, 23, false),
            ("day of month", fields[2], local.day(), 1, 31, false),
            ("month", fields[3], local.month(), 1, 12, false),
            (
                "weekday",
                fields[4],
                local.weekday().num_days_from_sunday(),
                0,
                7,
                true,
            ),
        ];

        for (name, spec, value, min, max, is_weekday) in checks {
            let matched = field_matches(spec, value, min, max, is_weekday)
                .ok_or_else(|| format_error(name, expression))?;
            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn format_error(field: &str, expression: &str) -> ScheduleError {
    ScheduleError::Format {
        field: field.to_string(),
        expression: expression.to_string(),
    }
}

fn truncate_to_minute(dt: DateTime<Tz>) -> DateTime<Tz> {
    dt - Duration::seconds(i64::from(dt.second())) - Duration::nanoseconds(i64::from(dt.nanosecond()))
}

/// Seconds specifier: `*`, `*/N`, or a literal 0-59. Returns `None` when the
/// specifier is malformed.
fn seconds_match(spec: &str, second: u32) -> Option<bool> {
    if spec == "*" {
        return Some(true);
    }
    if let Some(step) = spec.strip_prefix("*/") {
        let step: u32 = step.parse().ok().filter(|s| *s > 0)?;
        return Some(second % step == 0);
    }
    let literal: u32 = spec.parse().ok().filter(|s| *s <= 59)?;
    Some(second == literal)
}

/// One standard cron field: `*`, `N`, `N-M`, comma lists, and `*/N` or
/// `A-B/N` steps. Returns `None` when the field is malformed. Every list
/// part is validated even after a match, so a bad part fails the expression
/// at every instant rather than only when the good parts miss.
fn field_matches(spec: &str, value: u32, min: u32, max: u32, is_weekday: bool) -> Option<bool> {
    let mut matched = false;
    for part in spec.split(',') {
        if part.is_empty() {
            return None;
        }
        if part_matches(part, value, min, max, is_weekday)? {
            matched = true;
        }
    }
    Some(matched)
}

fn part_matches(part: &str, value: u32, min: u32, max: u32, is_weekday: bool) -> Option<bool> {
    let (range, step) = match part.split_once('/') {
        Some((range, step)) => {
            let step: u32 = step.parse().ok().filter(|s| *s > 0)?;
            (range, step)
        }
        None => (part, 1),
    };

    let (lo, hi) = if range == "*" {
        (min, max)
    } else if let Some((lo, hi)) = range.split_once('-') {
        let lo: u32 = lo.parse().ok()?;
        let hi: u32 = hi.parse().ok()?;
        (lo, hi)
    } else {
        let n: u32 = range.parse().ok()?;
        // A bare number with a step ("5/15") extends to the field maximum.
        if step > 1 { (n, max) } else { (n, n) }
    };

    if lo < min || hi > max || lo > hi {
        return None;
    }

    // Weekday fields treat 7 as Sunday alongside 0.
    let candidates = if is_weekday && value == 0 {
        [0u32, 7]
    } else {
        [value, value]
    };

    Some(candidates.iter().any(|v| {
        *v >= lo && *v <= hi && (*v - lo) % step == 0
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_with_step_extends_to_max() {
        assert_eq!(field_matches("5/15", 20, 0, 59, false), Some(true));
        assert_eq!(field_matches("5/15", 21, 0, 59, false), Some(false));
    }

    #[test]
    fn weekday_seven_is_sunday() {
        assert_eq!(field_matches("7", 0, 0, 7, true), Some(true));
        assert_eq!(field_matches("0", 0, 0, 7, true), Some(true));
        assert_eq!(field_matches("1-5", 0, 0, 7, true), Some(false));
    }

    #[test]
    fn malformed_parts_are_rejected(){
        assert_eq!(field_matches("", 0, 0, 59, false), None);
        assert_eq!(field_matches("a", 0, 0, 59, false), None);
        assert_eq!(field_matches("10-5", 0, 0, 59, false), None);
        assert_eq!(field_matches("*/0", 0, 0, 59, false), None);
        assert_eq!(field_matches("61", 0, 0, 59, false), None);
    }

    #[test]
    fn bad_list_part_is_rejected_at_every_value() {
        // A list with one bad part must fail whether or not the good part
        // matches the current value.
        assert_eq!(field_matches("5,99", 5, 0, 59, false), None);
        assert_eq!(field_matches("5,99", 20, 0, 59, false), None);
        assert_eq!(field_matches("5,x", 5, 0, 59, false), None);
    }
}
