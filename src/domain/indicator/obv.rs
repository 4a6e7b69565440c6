//! OBV (On-Balance Volume).

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

/// OBV[0] = volume[0]
/// If close[i] > close[i-1]: OBV[i] = OBV[i-1] + volume[i]
/// If close[i] < close[i-1]: OBV[i] = OBV[i-1] - volume[i]
/// If close[i] == close[i-1]: OBV[i] = OBV[i-1]
///
/// No warmup period.
pub fn obv(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(close.len());
    let mut total = 0.0;
    for (i, (&c, &v)) in close.iter().zip(volume).enumerate() {
        if i == 0 {
            total = v;
        } else if c > close[i - 1] {
            total += v;
        } else if c < close[i - 1] {
            total -= v;
        }
        out.push(total);
    }
    out
}

pub struct Obv;

impl IndicatorFn for Obv {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        _params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        Ok(single_output(obv(&window.close, &window.volume)))
    }
}
