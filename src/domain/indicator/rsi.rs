//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Warmup: first n bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

pub const DEFAULT_PERIOD: usize = 14;

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..values.len() {
        let change = values[i] - values[i - 1];
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i < period {
            avg_gain += gain;
            avg_loss += loss;
        } else if i == period {
            avg_gain = (avg_gain + gain) / period as f64;
            avg_loss = (avg_loss + loss) / period as f64;
            out[i] = rsi_value(avg_gain, avg_loss);
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
            out[i] = rsi_value(avg_gain, avg_loss);
        }
    }
    out
}

pub struct Rsi;

impl IndicatorFn for Rsi {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        Ok(single_output(rsi(&window.close, period)))
    }
}
