//! Multi-resolution candle aggregation.
//!
//! One bounded [`CandleSeries`] per (symbol, interval). A primary tick is
//! folded into every subscribed interval at the bucket it falls in, so the
//! coarser bars grow incrementally instead of being rebuilt from history.

use std::collections::{BTreeSet, HashMap};

use crate::domain::candle::Candle;
use crate::domain::candle_series::{CandleSeries, DEFAULT_CAPACITY, UpdateMode, Upsert};
use crate::domain::error::EngineError;
use crate::domain::interval::Interval;

#[derive(Debug, Clone)]
pub struct CandleAggregator {
    capacity: usize,
    session_offset_hours: i64,
    series: HashMap<(String, Interval), CandleSeries>,
    subscriptions: HashMap<String, BTreeSet<Interval>>,
}

impl CandleAggregator {
    pub fn new(capacity: usize) -> Self {
        CandleAggregator {
            capacity,
            session_offset_hours: 0,
            series: HashMap::new(),
            subscriptions: HashMap::new(),
        }
    }

    /// Hours by which daily and weekly buckets start early.
    pub fn with_session_offset(mut self, hours: i64) -> Self {
        self.session_offset_hours = hours;
        self
    }

    /// Register an interval that [`fold_tick`](Self::fold_tick) keeps current.
    pub fn subscribe(&mut self, symbol: &str, interval: Interval) {
        self.subscriptions
            .entry(symbol.to_string())
            .or_default()
            .insert(interval);
    }

    pub fn subscriptions(&self, symbol: &str) -> Vec<Interval> {
        self.subscriptions
            .get(symbol)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Insert or fold `bar` into the series for `(symbol, interval)`,
    /// creating the series on first use.
    pub fn update(
        &mut self,
        symbol: &str,
        interval: Interval,
        bar: &Candle,
        mode: UpdateMode,
    ) -> Result<Upsert, EngineError> {
        let capacity = self.capacity;
        let series = self
            .series
            .entry((symbol.to_string(), interval))
            .or_insert_with(|| CandleSeries::new(capacity));
        match series.upsert(bar, mode) {
            Upsert::OutOfOrder { newest } => Err(EngineError::CandleOrder {
                series: format!("{}@{}", symbol, interval),
                newest,
                incoming: bar.timestamp,
            }),
            outcome => Ok(outcome),
        }
    }

    /// Fold one primary-interval tick into every subscribed interval.
    pub fn fold_tick(&mut self, symbol: &str, tick: &Candle) -> Result<(), EngineError> {
        for interval in self.subscriptions(symbol) {
            let bucket = interval.bucket_start(tick.timestamp, self.session_offset_hours);
            self.update(symbol, interval, &tick.at(bucket), UpdateMode::Merge)?;
        }
        Ok(())
    }

    /// Preload completed history for one interval.
    pub fn seed(
        &mut self,
        symbol: &str,
        interval: Interval,
        history: &[Candle],
    ) -> Result<(), EngineError> {
        for bar in history {
            self.update(symbol, interval, bar, UpdateMode::Replace)?;
        }
        Ok(())
    }

    /// Live buffer for `(symbol, interval)`, oldest first.
    ///
    /// Empty when fewer than two bars exist; callers treat that as
    /// insufficient history and retry on a later tick.
    pub fn query(&self, symbol: &str, interval: Interval) -> Vec<Candle> {
        match self.series.get(&(symbol.to_string(), interval)) {
            Some(series) if series.len() >= 2 => series.candles(),
            _ => Vec::new(),
        }
    }

    pub fn bar_count(&self, symbol: &str, interval: Interval) -> usize {
        self.series
            .get(&(symbol.to_string(), interval))
            .map_or(0, CandleSeries::len)
    }
}

impl Default for CandleAggregator {
    fn default() -> Self {
        CandleAggregator::new(DEFAULT_CAPACITY)
    }
}
