//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (nbdevup × StdDev)
//! - Lower: Middle - (nbdevdn × StdDev)
//!
//! StdDev is population standard deviation (divides by N, not N-1).
//! Outputs: `upper`, `middle`, `lower`.
//! Warmup: first (period-1) bars are NaN.

use crate::domain::candle::OhlcvWindow;
use crate::domain::error::EngineError;
use crate::domain::indicator::sma::sma;
use crate::domain::indicator::stddev::stddev;
use crate::domain::indicator::{IndicatorFn, IndicatorOutput, IndicatorParams};

pub const DEFAULT_PERIOD: usize = 5;
pub const DEFAULT_DEVIATIONS: f64 = 2.0;

pub struct Bands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(values: &[f64], period: usize, dev_up: f64, dev_down: f64) -> Bands {
    let middle = sma(values, period);
    let deviation = stddev(values, period);
    let upper = middle
        .iter()
        .zip(&deviation)
        .map(|(m, d)| m + dev_up * d)
        .collect();
    let lower = middle
        .iter()
        .zip(&deviation)
        .map(|(m, d)| m - dev_down * d)
        .collect();
    Bands {
        upper,
        middle,
        lower,
    }
}

pub struct Bbands;

impl IndicatorFn for Bbands {
    fn outputs(&self) -> &'static [&'static str] {
        &["upper", "middle", "lower"]
    }

    fn compute(
        &self,
        window: &OhlcvWindow,
        params: &IndicatorParams,
    ) -> Result<IndicatorOutput, EngineError> {
        let period = params.period("timeperiod", DEFAULT_PERIOD)?;
        let dev_up = params.get_or("nbdevup", DEFAULT_DEVIATIONS);
        let dev_down = params.get_or("nbdevdn", DEFAULT_DEVIATIONS);
        let bands = bollinger(&window.close, period, dev_up, dev_down);

        let mut out = IndicatorOutput::new();
        out.insert("upper".to_string(), bands.upper);
        out.insert("middle".to_string(), bands.middle);
        out.insert("lower".to_string(), bands.lower);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bands_surround_middle() {
        let bands = bollinger(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8, 2.0, 1.0);
        // Population stddev of this set is 2.
        assert_relative_eq!(bands.middle[7], 5.0);
        assert_relative_eq!(bands.upper[7], 9.0);
        assert_relative_eq!(bands.lower[7], 3.0);
        assert!(bands.upper[6].is_nan());
    }

    #[test]
    fn flat_prices_collapse_bands() {
        let bands = bollinger(&[10.0; 5], 3, 2.0, 2.0);
        assert_relative_eq!(bands.upper[4], 10.0);
        assert_relative_eq!(bands.lower[4], 10.0);
    }
}
