//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are NaN. A NaN input restarts the seed.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

pub const DEFAULT_PERIOD: usize = 30;

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;
    let mut seen = 0;

    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            sum = 0.0;
            seen = 0;
            continue;
        }
        seen += 1;
        if seen < period {
            sum += value;
        } else if seen == period {
            sum += value;
            ema = sum / period as f64;
            out[i] = ema;
        } else {
            ema = value * k + ema * (1.0 - k);
            out[i] = ema;
        }
    }
    out
}

pub struct Ema;

impl IndicatorFn for Ema {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        Ok(single_output(ema(&window.close, period)))
    }
}
