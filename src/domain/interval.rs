//! Candle aggregation intervals and bucket alignment.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interval {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
}

impl Interval {
    /// Opening timestamp of the bar that `ts` belongs to.
    ///
    /// `session_offset_hours` shifts where a trading day begins for daily and
    /// weekly bars; intraday buckets are aligned on the wall clock.
    pub fn bucket_start(&self, ts: NaiveDateTime, session_offset_hours: i64) -> NaiveDateTime {
        match *self {
            Interval::Minutes(n) => {
                let minutes = ts.hour() * 60 + ts.minute();
                let floored = minutes - minutes % n.max(1);
                midnight(ts.date()) + Duration::minutes(floored as i64)
            }
            Interval::Hours(n) => {
                let floored = ts.hour() - ts.hour() % n.max(1);
                midnight(ts.date()) + Duration::hours(floored as i64)
            }
            Interval::Days(n) => {
                let day = session_day(ts, session_offset_hours);
                let ordinal = day.num_days_from_ce();
                let floored = ordinal - ordinal.rem_euclid(n.max(1) as i32);
                midnight(day - Duration::days((ordinal - floored) as i64))
            }
            Interval::Weeks(n) => {
                let day = session_day(ts, session_offset_hours);
                let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
                // 0001-01-01 is a Monday, so whole weeks count cleanly from CE.
                let week = monday.num_days_from_ce().div_euclid(7);
                let floored = week - week.rem_euclid(n.max(1) as i32);
                midnight(monday - Duration::weeks((week - floored) as i64))
            }
        }
    }
}

fn session_day(ts: NaiveDateTime, session_offset_hours: i64) -> NaiveDate {
    (ts + Duration::hours(session_offset_hours)).date()
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_time(chrono::NaiveTime::MIN)
}

impl FromStr for Interval {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ParseError {
                message: format!("interval '{}' has no unit", s),
                position: s.len(),
            })?;
        let (count, unit) = s.split_at(split);
        let count: u32 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| ParseError {
                message: format!("invalid interval count '{}'", count),
                position: 0,
            })?
        };
        if count == 0 {
            return Err(ParseError {
                message: "interval count must be positive".to_string(),
                position: 0,
            });
        }
        match unit {
            "m" | "min" => Ok(Interval::Minutes(count)),
            "h" => Ok(Interval::Hours(count)),
            "d" => Ok(Interval::Days(count)),
            "w" | "wk" => Ok(Interval::Weeks(count)),
            _ => Err(ParseError {
                message: format!("unknown interval unit '{}'", unit),
                position: split,
            }),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Minutes(n) => write!(f, "{}m", n),
            Interval::Hours(n) => write!(f, "{}h", n),
            Interval::Days(n) => write!(f, "{}d", n),
            Interval::Weeks(n) => write!(f, "{}w", n),
        }
    }
}
