//! Standard Deviation.
//!
//! Population standard deviation over n closing prices, scaled by `nbdev`.
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n-1) / n)
//! Warmup: first (n-1) bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    IndicatorFn, IndicatorOutput, IndicatorParams, SINGLE_OUTPUT, rolling, single_output,
};

pub const DEFAULT_PERIOD: usize = 5;

pub fn stddev(values: &[f64], period: usize) -> Vec<f64> {
    rolling(values, period, |window| {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        variance.sqrt()
    })
}

pub struct StdDev;

impl IndicatorFn for StdDev {
    fn outputs(&self) -> &'static [&'static str] {
        &[SINGLE_OUTPUT]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        let scale = params.get_or("nbdev", 1.0);
        let values = stddev(&window.close, period)
            .into_iter()
            .map(|v| v * scale)
            .collect();
        Ok(single_output(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::window;
    use approx::assert_relative_eq;

    #[test]
    fn stddev_known_value() {
        let out = stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert_relative_eq!(out[7], 2.0);
        assert!(out[6].is_nan());
    }

    #[test]
    fn stddev_constant_is_zero() {
        let out = stddev(&[3.0; 4], 2);
        assert_relative_eq!(out[3], 0.0);
    }

    #[test]
    fn nbdev_scales_output() {
        let params = IndicatorParams::new().with("timeperiod", 2.0).with("nbdev", 3.0);
        let out = StdDev.compute(&window(&[1.0, 3.0]), &params).unwrap();
        assert_relative_eq!(out[SINGLE_OUTPUT][1], 3.0);
    }
}
