//! Binds a configured indicator to its implementation and publishes its
//! outputs into the step state as `<id>.<output>` series.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::domain::candle::{Candle, OhlcvWindow};
use crate::domain::error::EngineError;
use crate::domain::indicator::{IndicatorFn, IndicatorParams, IndicatorRegistry};
use crate::domain::interval::Interval;
use crate::domain::state::StepState;
use crate::domain::value::{Series, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub id: String,
    pub package: String,
    pub function: String,
    pub interval: Interval,
    pub params: IndicatorParams,
    /// Skip recomputation while a position is open.
    pub suspend_while_open: bool,
    /// Keep the newest (in-progress) bar in the output.
    pub temporary: bool,
}

pub struct IndicatorBinding {
    spec: IndicatorSpec,
    function: Arc<dyn IndicatorFn>,
}

impl IndicatorBinding {
    pub fn new(spec: IndicatorSpec, registry: &IndicatorRegistry) -> Result<Self, EngineError> {
        let function = registry.resolve(&spec.package, &spec.function)?;
        Ok(IndicatorBinding { spec, function })
    }

    pub fn interval(&self) -> Interval {
        self.spec.interval
    }

    /// Step state keys this binding publishes.
    pub fn output_keys(&self) -> Vec<String> {
        self.function
            .outputs()
            .iter()
            .map(|name| format!("{}.{}", self.spec.id, name))
            .collect()
    }

    /// Run the function over `candles`.
    ///
    /// `Ok(None)` when fewer than two bars are available. Every output must
    /// cover the whole window; the newest bar is dropped unless the binding
    /// is temporary.
    pub fn recompute(&self, candles: &[Candle]) -> Result<Option<BTreeMap<String, Series>>, EngineError> {
        if candles.len() < 2 {
            return Ok(None);
        }
        let window = OhlcvWindow::from_candles(candles);
        let output = self
            .function
            .compute(&window, &self.spec.params)
            .map_err(|e| self.failure(e.to_string()))?;

        let keep = if self.spec.temporary {
            window.len()
        } else {
            window.len() - 1
        };
        let index = window.timestamps[..keep].to_vec();

        let mut series = BTreeMap::new();
        for name in self.function.outputs() {
            let values = output
                .get(*name)
                .ok_or_else(|| self.failure(format!("missing output '{}'", name)))?;
            if values.len() != window.len() {
                return Err(self.failure(format!(
                    "output '{}' has {} values for {} bars",
                    name,
                    values.len(),
                    window.len()
                )));
            }
            series.insert(
                name.to_string(),
                Series::numbers(index.clone(), values[..keep].to_vec())?,
            );
        }
        Ok(Some(series))
    }

    /// Recompute and publish into `state`. Returns whether anything was
    /// published; suspended bindings and short windows leave the previous
    /// values in place.
    pub fn refresh(&self, candles: &[Candle], state: &mut StepState) -> Result<bool, EngineError> {
        if self.spec.suspend_while_open && state.position != 0 {
            debug!(indicator = %self.spec.id, "suspended while position is open");
            return Ok(false);
        }
        let Some(outputs) = self.recompute(candles)? else {
            debug!(indicator = %self.spec.id, bars = candles.len(), "insufficient history");
            return Ok(false);
        };
        for (name, series) in outputs {
            state.set_derived(&format!("{}.{}", self.spec.id, name), Value::Series(series))?;
        }
        Ok(true)
    }

    fn failure(&self, reason: String) -> EngineError {
        EngineError::IndicatorFailed {
            id: self.spec.id.clone(),
            reason,
        }
    }
}
