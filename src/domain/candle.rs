//! OHLCV candle representation and the column view handed to indicators.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Fold a partial bar for the same timestamp into this one.
    ///
    /// `open` is kept, `close` follows the incoming bar, `high`/`low`
    /// widen and `volume` accumulates.
    pub fn merge(&mut self, incoming: &Candle) {
        self.close = incoming.close;
        self.high = self.high.max(incoming.high);
        self.low = self.low.min(incoming.low);
        self.volume += incoming.volume;
    }

    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Same bar re-stamped at `timestamp`.
    pub fn at(&self, timestamp: NaiveDateTime) -> Candle {
        Candle {
            timestamp,
            ..self.clone()
        }
    }
}

/// Column-oriented copy of a candle window, the input shape of every
/// indicator function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OhlcvWindow {
    pub timestamps: Vec<NaiveDateTime>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl OhlcvWindow {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut window = OhlcvWindow {
            timestamps: Vec::with_capacity(candles.len()),
            open: Vec::with_capacity(candles.len()),
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
            volume: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            window.timestamps.push(c.timestamp);
            window.open.push(c.open);
            window.high.push(c.high);
            window.low.push(c.low);
            window.close.push(c.close);
            window.volume.push(c.volume);
        }
        window
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
