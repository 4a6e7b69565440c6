//! Order marker sink port trait.

use crate::domain::error::EngineError;
use crate::domain::lifecycle::OrderMarker;

/// Receives the ordered marker log of a finished run.
pub trait MarkerPort {
    fn write_markers(&mut self, markers: &[OrderMarker]) -> Result<(), EngineError>;
}
