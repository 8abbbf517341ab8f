//! Fluent frequency builders mirroring the common scheduler vocabulary
//! (`every_minute`, `daily_at`, `mondays`, ...). Every builder funnels
//! through [`splice_into_position`], a pure function over the expression
//! string with an explicit index table for both field layouts.

use crate::task::Task;

/// Logical cron position, independent of the 5-field/6-field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronPosition {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

/// Map a logical position to its field index. The 6-field layout carries a
/// leading seconds field, shifting every index up by one.
fn field_index(position: CronPosition, field_count: usize) -> Option<usize> {
    let base = match position {
        CronPosition::Minute => 0,
        CronPosition::Hour => 1,
        CronPosition::DayOfMonth => 2,
        CronPosition::Month => 3,
        CronPosition::DayOfWeek => 4,
    };

    match field_count {
        5 => Some(base),
        6 => Some(base + 1),
        _ => None,
    }
}

/// Replace one logical field of `expression` with `value`, leaving the rest
/// untouched. Expressions with an unsupported field count come back
/// unchanged.
pub fn splice_into_position(expression: &str, position: CronPosition, value: &str) -> String {
    let mut fields: Vec<&str> = expression.split_whitespace().collect();

    match field_index(position, fields.len()) {
        Some(index) => {
            fields[index] = value;
            fields.join(" ")
        }
        None => expression.to_string(),
    }
}

impl Task {
    fn splice(&mut self, position: CronPosition, value: &str) -> &mut Self {
        self.expression = splice_into_position(&self.expression, position, value);
        self
    }

    // --- sub-minute frequencies (daemon mode) ------------------------------

    pub fn every_second(&mut self) -> &mut Self {
        self.cron("* * * * * *")
    }

    pub fn every_two_seconds(&mut self) -> &mut Self {
        self.cron("*/2 * * * * *")
    }

    pub fn every_thirty_seconds(&mut self) -> &mut Self {
        self.cron("*/30 * * * * *")
    }

    // --- minute frequencies ------------------------------------------------

    pub fn every_minute(&mut self) -> &mut Self {
        self.cron("* * * * *")
    }

    pub fn every_two_minutes(&mut self) -> &mut Self {
        self.cron("*/2 * * * *")
    }

    pub fn every_five_minutes(&mut self) -> &mut Self {
        self.cron("*/5 * * * *")
    }

    pub fn every_ten_minutes(&mut self) -> &mut Self {
        self.cron("*/10 * * * *")
    }

    pub fn every_fifteen_minutes(&mut self) -> &mut Self {
        self.cron("*/15 * * * *")
    }

    pub fn every_thirty_minutes(&mut self) -> &mut Self {
        self.cron("0,30 * * * *")
    }

    // --- hourly frequencies ------------------------------------------------

    pub fn hourly(&mut self) -> &mut Self {
        self.cron("0 * * * *")
    }

    pub fn hourly_at(&mut self, minutes: &[u32]) -> &mut Self {
        let value = join(minutes);
        self.splice(CronPosition::Minute, &value)
    }

    pub fn every_two_hours(&mut self) -> &mut Self {
        self.cron("0 */2 * * *")
    }

    // --- daily frequencies -------------------------------------------------

    pub fn daily(&mut self) -> &mut Self {
        self.cron("0 0 * * *")
    }

    pub fn daily_at(&mut self, time: &str) -> &mut Self {
        self.at(time)
    }

    pub fn twice_daily(&mut self, first: u32, second: u32) -> &mut Self {
        let hours = format!("{first},{second}");
        self.splice(CronPosition::Minute, "0")
            .splice(CronPosition::Hour, &hours)
    }

    // --- weekly frequencies ------------------------------------------------

    pub fn weekly(&mut self) -> &mut Self {
        self.cron("0 0 * * 0")
    }

    pub fn weekly_on(&mut self, days: &[u32], time: &str) -> &mut Self {
        let value = join(days);
        self.daily_at(time).splice(CronPosition::DayOfWeek, &value)
    }

    pub fn weekdays(&mut self) -> &mut Self {
        self.splice(CronPosition::DayOfWeek, "1-5")
    }

    pub fn weekends(&mut self) -> &mut Self {
        self.splice(CronPosition::DayOfWeek, "0,6")
    }

    pub fn mondays(&mut self) -> &mut Self {
        self.weekly_on(&[1], "00:00")
    }

    pub fn tuesdays(&mut self) -> &mut Self {
        self.weekly_on(&[2], "00:00")
    }

    pub fn wednesdays(&mut self) -> &mut Self {
        self.weekly_on(&[3], "00:00")
    }

    pub fn thursdays(&mut self) -> &mut Self {
        self.weekly_on(&[4], "00:00")
    }

    pub fn fridays(&mut self) -> &mut Self {
        self.weekly_on(&[5], "00:00")
    }

    pub fn saturdays(&mut self) -> &mut Self {
        self.weekly_on(&[6], "00:00")
    }

    pub fn sundays(&mut self) -> &mut Self {
        self.weekly_on(&[0], "00:00")
    }

    // --- monthly and beyond ------------------------------------------------

    pub fn monthly(&mut self) -> &mut Self {
        self.cron("0 0 1 * *")
    }

    pub fn monthly_on(&mut self, day: u32, time: &str) -> &mut Self {
        self.daily_at(time)
            .splice(CronPosition::DayOfMonth, &day.to_string())
    }

    pub fn twice_monthly(&mut self, first: u32, second: u32, time: &str) -> &mut Self {
        let days = format!("{first},{second}");
        self.daily_at(time).splice(CronPosition::DayOfMonth, &days)
    }

    /// Standard cron has no last-day token; 28-31 approximates it and the
    /// runner is expected to tolerate the overshoot on short months.
    pub fn last_day_of_month(&mut self, time: &str) -> &mut Self {
        self.daily_at(time).splice(CronPosition::DayOfMonth, "28-31")
    }

    pub fn quarterly(&mut self) -> &mut Self {
        self.cron("0 0 1 1,4,7,10 *")
    }

    pub fn yearly(&mut self) -> &mut Self {
        self.cron("0 0 1 1 *")
    }

    pub fn yearly_on(&mut self, month: u32, day: u32, time: &str) -> &mut Self {
        self.daily_at(time)
            .splice(CronPosition::DayOfMonth, &day.to_string())
            .splice(CronPosition::Month, &month.to_string())
    }

    // --- core helpers ------------------------------------------------------

    /// Set the minute and hour fields from an `HH:MM` string. Unparseable
    /// components fall back to zero.
    pub fn at(&mut self, time: &str) -> &mut Self {
        let (hour, minute) = match time.split_once(':') {
            Some((h, m)) => (
                h.parse::<u32>().unwrap_or(0),
                m.parse::<u32>().unwrap_or(0),
            ),
            None => (time.parse::<u32>().unwrap_or(0), 0),
        };

        self.splice(CronPosition::Minute, &minute.to_string())
            .splice(CronPosition::Hour, &hour.to_string())
    }

    pub fn cron(&mut self, expression: &str) -> &mut Self {
        self.expression = expression.to_string();
        self
    }
}

fn join(values: &[u32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
