#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::VecDeque;
use std::io::Write;
use stepwise::domain::backtest::BacktestSettings;
pub use stepwise::domain::candle::Candle;
use stepwise::domain::error::EngineError;
use stepwise::domain::expr_parser::parse;
use stepwise::domain::investment::Investment;
use stepwise::domain::rule::{CascadeTransaction, Rule, RuleType, SizeType, TradeAction};
use stepwise::ports::price_port::PriceSource;

/// In-memory price source. An optional error is returned once the bars run out.
pub struct VecPriceSource {
    bars: VecDeque<Candle>,
    error: Option<String>,
}

impl VecPriceSource {
    pub fn new(bars: Vec<Candle>) -> Self {
        Self {
            bars: bars.into(),
            error: None,
        }
    }

    pub fn failing_after(bars: Vec<Candle>, reason: &str) -> Self {
        Self {
            bars: bars.into(),
            error: Some(reason.to_string()),
        }
    }
}

impl PriceSource for VecPriceSource {
    fn next_bar(&mut self) -> Result<Option<Candle>, EngineError> {
        match self.bars.pop_front() {
            Some(bar) => Ok(Some(bar)),
            None => match self.error.take() {
                Some(reason) => Err(EngineError::Source { reason }),
                None => Ok(None),
            },
        }
    }
}

pub fn day(i: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i)
}

pub fn make_bar(ts: NaiveDateTime, close: f64) -> Candle {
    Candle {
        timestamp: ts,
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1000.0,
    }
}

/// Daily bars starting 2024-01-01 (a Monday), one per close.
pub fn daily_bars(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(day(i as i64), close))
        .collect()
}

pub fn settings(initial_cash: f64) -> BacktestSettings {
    let mut settings = BacktestSettings::new(Investment::new("BHP", "STK", "ASX", "AUD"));
    settings.initial_cash = initial_cash;
    settings
}

pub fn make_rule(
    id: &str,
    rule_type: RuleType,
    action: TradeAction,
    transactions: &[(&str, f64, SizeType)],
) -> Rule {
    Rule {
        id: id.to_string(),
        rule_type,
        action,
        transactions: transactions
            .iter()
            .map(|(expr, size, size_type)| CascadeTransaction {
                expression: parse(expr).unwrap(),
                size: *size,
                size_type: *size_type,
            })
            .collect(),
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn prices_csv(bars: &[Candle]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for bar in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        ));
    }
    out
}
