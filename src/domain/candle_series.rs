//! Capacity-bounded, time-ordered candle buffer.
//!
//! Each bar gets a monotonically increasing sequence number when first
//! inserted; the timestamp index stores that number, so lookups stay O(1)
//! after the front of the buffer is evicted (position = seq - evicted).

use chrono::NaiveDateTime;
use std::collections::{HashMap, VecDeque};

use crate::domain::candle::Candle;

pub const DEFAULT_CAPACITY: usize = 300;
/// Largest window a config may request per interval.
pub const MAX_CAPACITY: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Overwrite the bar at the incoming timestamp verbatim.
    Replace,
    /// Fold the incoming partial bar into the existing one.
    Merge,
}

/// What an insert did to the buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Appended,
    /// Appended after dropping the oldest bar.
    Evicted(Candle),
    Replaced,
    Merged,
    /// The incoming timestamp precedes the newest bar and is not in the
    /// buffer; nothing changed.
    OutOfOrder { newest: NaiveDateTime },
}

#[derive(Debug, Clone)]
pub struct CandleSeries {
    capacity: usize,
    bars: VecDeque<Candle>,
    index: HashMap<NaiveDateTime, u64>,
    evicted: u64,
}

impl CandleSeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        CandleSeries {
            capacity,
            bars: VecDeque::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            evicted: 0,
        }
    }

    pub fn upsert(&mut self, incoming: &Candle, mode: UpdateMode) -> Upsert {
        if let Some(&seq) = self.index.get(&incoming.timestamp) {
            let pos = (seq - self.evicted) as usize;
            let bar = &mut self.bars[pos];
            return match mode {
                UpdateMode::Replace => {
                    *bar = incoming.clone();
                    Upsert::Replaced
                }
                UpdateMode::Merge => {
                    bar.merge(incoming);
                    Upsert::Merged
                }
            };
        }

        if let Some(newest) = self.bars.back() {
            if incoming.timestamp < newest.timestamp {
                return Upsert::OutOfOrder {
                    newest: newest.timestamp,
                };
            }
        }

        let dropped = if self.bars.len() == self.capacity {
            self.bars.pop_front().map(|old| {
                self.index.remove(&old.timestamp);
                self.evicted += 1;
                old
            })
        } else {
            None
        };

        let seq = self.evicted + self.bars.len() as u64;
        self.index.insert(incoming.timestamp, seq);
        self.bars.push_back(incoming.clone());

        match dropped {
            Some(old) => Upsert::Evicted(old),
            None => Upsert::Appended,
        }
    }

    pub fn get(&self, timestamp: NaiveDateTime) -> Option<&Candle> {
        self.index
            .get(&timestamp)
            .map(|&seq| &self.bars[(seq - self.evicted) as usize])
    }

    pub fn last(&self) -> Option<&Candle> {
        self.bars.back()
    }

    /// Live buffer, oldest first.
    pub fn candles(&self) -> Vec<Candle> {
        self.bars.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for CandleSeries {
    fn default() -> Self {
        CandleSeries::new(DEFAULT_CAPACITY)
    }
}
