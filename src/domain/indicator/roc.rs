//! ROC (Rate of Change).
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! If C[i-n] == 0: ROC = 0
//! Warmup: first n bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, single_output,
};

pub const DEFAULT_PERIOD: usize = 10;

pub fn roc(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in period..values.len() {
        let prev = values[i - period];
        out[i] = if prev == 0.0 {
            0.0
        } else {
            ((values[i] - prev) / prev) * 100.0
        };
    }
    out
}

pub struct Roc;

impl IndicatorFn for Roc {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        Ok(single_output(roc(&window.close, period)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn roc_percent_change() {
        let out = roc(&[100.0, 105.0, 110.0], 2);
        assert!(out[1].is_nan());
        assert_relative_eq!(out[2], 10.0);
    }

    #[test]
    fn roc_zero_base() {
        let out = roc(&[0.0, 5.0], 1);
        assert_relative_eq!(out[1], 0.0);
    }
}
