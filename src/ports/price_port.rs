//! Price source port trait.

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;

/// Finite, non-restartable producer of primary-interval ticks in
/// non-decreasing timestamp order.
pub trait PriceSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_bar(&mut self) -> Result<Option<Candle>, EngineError>;
}
