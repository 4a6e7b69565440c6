//! Historic high / low over a lookback.
//!
//! HIGHEST(n)[i] = max(H[i-n], ..., H[i-1]), excluding the current bar.
//! LOWEST(n)[i] = min(L[i-n], ..., L[i-1]).
//! Warmup: first n bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

pub const DEFAULT_PERIOD: usize = 10;

pub fn highest(values: &[f64], period: usize) -> Vec<f64> {
    lookback(values, period, f64::max)
}

pub fn lowest(values: &[f64], period: usize) -> Vec<f64> {
    lookback(values, period, f64::min)
}

fn lookback(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period..values.len() {
        out[i] = values[i - period..i]
            .iter()
            .copied()
            .fold(values[i - period], pick);
    }
    out
}

pub struct Highest;

impl IndicatorFn for Highest {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("period", DEFAULT_PERIOD)?;
        Ok(single_output(highest(&window.high, period)))
    }
}

pub struct Lowest;

impl IndicatorFn for Lowest {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("period", DEFAULT_PERIOD)?;
        Ok(single_output(lowest(&window.low, period)))
    }
}
