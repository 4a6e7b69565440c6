//! Run parameters and the result handed to external accounting.

use chrono::{NaiveDate, NaiveDateTime};

use crate::domain::candle_series::DEFAULT_CAPACITY;
use crate::domain::interval::Interval;
use crate::domain::investment::Investment;
use crate::domain::lifecycle::{OrderMarker, PositionSnapshot};

pub const DEFAULT_INITIAL_CASH: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSettings {
    pub investment: Investment,
    pub initial_cash: f64,
    /// Resolution of the ticks the price source delivers.
    pub interval: Interval,
    pub candle_capacity: usize,
    /// Ticks before this only warm the aggregator.
    pub start_time: Option<NaiveDateTime>,
}

impl BacktestSettings {
    pub fn new(investment: Investment) -> Self {
        BacktestSettings {
            investment,
            initial_cash: DEFAULT_INITIAL_CASH,
            interval: Interval::Days(1),
            candle_capacity: DEFAULT_CAPACITY,
            start_time: None,
        }
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Output of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub markers: Vec<OrderMarker>,
    pub snapshot: PositionSnapshot,
    /// Ticks pulled from the source, warm-up included.
    pub ticks: usize,
    pub abandoned: usize,
}
