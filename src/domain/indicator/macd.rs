//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Outputs: `macd`, `signal`, `hist`.
//! Default parameters: fast=12, slow=26, signal=9

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::ema::ema;
use crate::domain::indicator::{IndicatorFn, IndicatorOutput, IndicatorParams};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

pub struct MacdLines {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdLines {
    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    // The EMA skips the NaN warmup of the line and seeds on its first values.
    let signal = ema(&line, signal_period);
    let hist = line.iter().zip(&signal).map(|(m, s)| m - s).collect();
    MacdLines {
        macd: line,
        signal,
        hist,
    }
}

pub struct Macd;

impl IndicatorFn for Macd {
    fn outputs(&self) -> &'static [&'static str] {
        &["macd", "signal", "hist"]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let fast = params.period("fastperiod", DEFAULT_FAST)?;
        let slow = params.period("slowperiod", DEFAULT_SLOW)?;
        let signal = params.period("signalperiod", DEFAULT_SIGNAL)?;
        let lines = macd(&window.close, fast, slow, signal);

        let mut out = IndicatorOutput::new();
        out.insert("macd".to_string(), lines.macd);
        out.insert("signal".to_string(), lines.signal);
        out.insert("hist".to_string(), lines.hist);
        Ok(out)
    }
}
