//! Indicator functions.
//!
//! This module defines the contract between bindings and indicator
//! implementations:
//! - `IndicatorFn`: a pure function from an OHLCV window and named
//!   parameters to named output series aligned with the window
//! - `IndicatorParams`: numeric parameters keyed by name
//! - `IndicatorRegistry`: resolves `(package, function)` to an implementation
//!
//! Outputs hold NaN where the function has too little history.

pub mod bollinger;
pub mod ema;
pub mod extremes;
pub mod macd;
pub mod obv;
pub mod roc;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod wma;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;

pub const BUILTIN_PACKAGE: &str = "builtin";

/// Name of the output of single-output functions.
pub const SINGLE_OUTPUT: &str = "real";

pub type IndicatorOutput = BTreeMap<String, Vec<f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorParams {
    values: BTreeMap<String, f64>,
}

impl IndicatorParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.get(name).unwrap_or(default)
    }

    /// A lookback length: a positive whole number.
    pub fn period(&self, name: &str, default: usize) -> Result<usize, EngineError> {
        let Some(raw) = self.get(name) else {
            return Ok(default);
        };
        if raw.fract() != 0.0 || raw < 1.0 {
            return Err(EngineError::TypeMismatch {
                reason: format!("parameter {} must be a positive integer, got {}", name, raw),
            });
        }
        Ok(raw as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

pub trait IndicatorFn: Send + Sync {
    /// Names of the series `compute` returns.
    fn outputs(&self) -> &'static [&'static str];

    /// Must not depend on anything but its inputs.
    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError>;
}

pub(crate) fn single_output(values: Vec<f64>) -> IndicatorOutput {
    let mut out = IndicatorOutput::new();
    out.insert(SINGLE_OUTPUT.to_string(), values);
    out
}

#[derive(Clone, Default)]
pub struct IndicatorRegistry {
    functions: HashMap<(String, String), Arc<dyn IndicatorFn>>,
}

impl IndicatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, Arc<dyn IndicatorFn>); 11] = [
            ("SMA", Arc::new(sma::Sma)),
            ("EMA", Arc::new(ema::Ema)),
            ("WMA", Arc::new(wma::Wma)),
            ("RSI", Arc::new(rsi::Rsi)),
            ("MACD", Arc::new(macd::Macd)),
            ("BBANDS", Arc::new(bollinger::Bbands)),
            ("STDDEV", Arc::new(stddev::StdDev)),
            ("ROC", Arc::new(roc::Roc)),
            ("OBV", Arc::new(obv::Obv)),
            ("HIGHEST", Arc::new(extremes::Highest)),
            ("LOWEST", Arc::new(extremes::Lowest)),
        ];
        for (name, function) in builtins {
            registry.register(BUILTIN_PACKAGE, name, function);
        }
        registry
    }

    /// Register or replace a function. Function names are case-insensitive.
    pub fn register(&mut self, package: &str, function: &str, implementation: Arc<dyn IndicatorFn>) {
        self.functions
            .insert(key(package, function), implementation);
    }

    pub fn resolve(&self, package: &str, function: &str) -> Result<Arc<dyn IndicatorFn>, EngineError> {
        self.functions
            .get(&key(package, function))
            .cloned()
            .ok_or_else(|| EngineError::UnknownIndicator {
                package: package.to_string(),
                function: function.to_string(),
            })
    }
}

fn key(package: &str, function: &str) -> (String, String) {
    (package.to_string(), function.to_ascii_uppercase())
}

/// Rolling reduction over full windows of `period` values; NaN before that.
pub(crate) fn rolling(values: &[f64], period: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        out[i] = f(&values[i + 1 - period..=i]);
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Duration, NaiveDate};

    use crate::domain::candle::Candle;

    pub fn window(closes: &[f64]) -> OhlcvWindow {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1000.0,
            })
            .collect();
        OhlcvWindow::from_candles(&candles)
    }
}
