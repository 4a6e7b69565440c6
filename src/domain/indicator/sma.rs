//! Simple Moving Average.
//!
//! SMA(n)[i] = (C[i-n+1] + ... + C[i]) / n
//! Warmup: first (n-1) bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

pub const DEFAULT_PERIOD: usize = 30;

pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = sum / period as f64;
        }
    }
    out
}

pub struct Sma;

impl IndicatorFn for Sma {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        Ok(single_output(sma(&window.close, period)))
    }
}
