//! The per-tick control loop.
//!
//! Each tick is folded into the aggregator, then indicators, signals and
//! rules are evaluated against a scratch copy of the step state. Intents are
//! applied to the order lifecycle in priority order and the scratch state is
//! committed. A tick that fails anywhere before the lifecycle is touched is
//! abandoned: the committed state keeps its pre-tick values and the run goes
//! on with the next tick.
//!
//! Indicators still short of history are not failures. Signals and rules
//! that read an output nobody has published yet sit the tick out, and every
//! other rule runs as usual.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use crate::domain::aggregator::CandleAggregator;
use crate::domain::backtest::{BacktestSettings, RunReport};
use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::indicator_binding::IndicatorBinding;
use crate::domain::interval::Interval;
use crate::domain::lifecycle::{FillUpdate, OrderLifecycle};
use crate::domain::rule::{Rule, TradeIntent};
use crate::domain::rule_engine::collect_intents;
use crate::domain::signal::SignalBinding;
use crate::domain::state::{StateField, StepState};
use crate::domain::strategy::StrategySpec;
use crate::ports::price_port::PriceSource;

/// Why a tick was abandoned.
#[derive(Debug)]
pub struct TickFailure {
    pub timestamp: NaiveDateTime,
    pub error: EngineError,
}

#[derive(Debug)]
pub enum StepOutcome {
    /// Before the start time: only the aggregator saw the tick.
    Warmup,
    Completed {
        intents: Vec<TradeIntent>,
        fills: Vec<FillUpdate>,
    },
    Abandoned(TickFailure),
}

type FailureCallback = Box<dyn FnMut(&TickFailure)>;

pub struct EventDispatcher {
    symbol: String,
    primary: Interval,
    start_time: Option<NaiveDateTime>,
    aggregator: CandleAggregator,
    indicators: Vec<IndicatorBinding>,
    indicator_keys: BTreeSet<String>,
    signals: Vec<SignalBinding>,
    rules: Vec<Rule>,
    state: StepState,
    lifecycle: OrderLifecycle,
    last_tick: Option<NaiveDateTime>,
    on_failure: Option<FailureCallback>,
    ticks: usize,
    abandoned: usize,
}

impl EventDispatcher {
    /// Bind the strategy and check that every expression only names known
    /// fields, signal ids and declared indicator outputs.
    pub fn new(
        settings: &BacktestSettings,
        strategy: StrategySpec,
        registry: &IndicatorRegistry,
    ) -> Result<Self, EngineError> {
        let symbol = settings.investment.symbol.clone();
        let mut aggregator = CandleAggregator::new(settings.candle_capacity)
            .with_session_offset(settings.investment.session_offset_hours());
        aggregator.subscribe(&symbol, settings.interval);

        let mut known: BTreeSet<String> = StateField::ALL.iter().map(|f| f.name().to_string()).collect();
        let mut ids: BTreeSet<String> = BTreeSet::new();

        let mut indicators = Vec::with_capacity(strategy.indicators.len());
        let mut indicator_keys = BTreeSet::new();
        for spec in strategy.indicators {
            claim_id(&mut ids, "indicator", &spec.id)?;
            let binding = IndicatorBinding::new(spec, registry)?;
            aggregator.subscribe(&symbol, binding.interval());
            indicator_keys.extend(binding.output_keys());
            indicators.push(binding);
        }
        known.extend(indicator_keys.iter().cloned());

        let mut signals = Vec::with_capacity(strategy.signals.len());
        for spec in strategy.signals {
            if spec.id.parse::<StateField>().is_ok() {
                return Err(EngineError::ReservedKey { key: spec.id });
            }
            claim_id(&mut ids, "signal", &spec.id)?;
            known.insert(spec.id.clone());
            let crossing = spec.comparator.is_break();
            let binding = SignalBinding::new(spec)?;
            // Only indicator outputs are series; a crossing needs one.
            if crossing && !binding.identifiers().iter().any(|name| indicator_keys.contains(*name)) {
                return Err(EngineError::ConfigInvalid {
                    section: format!("signal.{}", binding.id()),
                    key: "comparator".to_string(),
                    reason: "UP_BREAK and DOWN_BREAK need an indicator output on one side".to_string(),
                });
            }
            signals.push(binding);
        }

        let unresolved = signals
            .iter()
            .flat_map(|s| s.identifiers())
            .chain(strategy.rules.iter().flat_map(|r| r.identifiers()))
            .find(|name| !known.contains(*name));
        if let Some(name) = unresolved {
            return Err(EngineError::UnresolvedIdentifier {
                name: name.to_string(),
            });
        }
        for rule in &strategy.rules {
            claim_id(&mut ids, "rule", &rule.id)?;
        }

        Ok(EventDispatcher {
            symbol,
            primary: settings.interval,
            start_time: settings.start_time,
            aggregator,
            indicators,
            indicator_keys,
            signals,
            rules: strategy.rules,
            state: StepState::new(settings.initial_cash),
            lifecycle: OrderLifecycle::new(settings.initial_cash),
            last_tick: None,
            on_failure: None,
            ticks: 0,
            abandoned: 0,
        })
    }

    /// Called with every abandoned tick.
    pub fn with_failure_callback(mut self, callback: impl FnMut(&TickFailure) + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    /// Preload completed bars for one interval before the first tick.
    pub fn seed(&mut self, interval: Interval, history: &[Candle]) -> Result<(), EngineError> {
        self.aggregator.seed(&self.symbol, interval, history)
    }

    pub fn state(&self) -> &StepState {
        &self.state
    }

    pub fn lifecycle(&self) -> &OrderLifecycle {
        &self.lifecycle
    }

    pub fn aggregator(&self) -> &CandleAggregator {
        &self.aggregator
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned
    }

    /// Process one tick.
    pub fn step(&mut self, tick: &Candle) -> StepOutcome {
        self.ticks += 1;
        match self.process(tick) {
            Ok(outcome) => outcome,
            Err(error) => {
                let failure = TickFailure {
                    timestamp: tick.timestamp,
                    error,
                };
                warn!(timestamp = %failure.timestamp, error = %failure.error, "tick abandoned");
                self.abandoned += 1;
                if let Some(callback) = self.on_failure.as_mut() {
                    callback(&failure);
                }
                StepOutcome::Abandoned(failure)
            }
        }
    }

    /// Drain `source`. Source errors end the run; tick errors do not.
    pub fn run(&mut self, source: &mut dyn PriceSource) -> Result<RunReport, EngineError> {
        info!(
            symbol = %self.symbol,
            interval = %self.primary,
            indicators = self.indicators.len(),
            signals = self.signals.len(),
            rules = self.rules.len(),
            "run started"
        );
        while let Some(tick) = source.next_bar()? {
            self.step(&tick);
        }
        let report = RunReport {
            markers: self.lifecycle.markers().to_vec(),
            snapshot: self.lifecycle.snapshot(),
            ticks: self.ticks,
            abandoned: self.abandoned,
        };
        info!(
            ticks = report.ticks,
            abandoned = report.abandoned,
            markers = report.markers.len(),
            position = report.snapshot.position,
            cash = report.snapshot.cash,
            "run finished"
        );
        Ok(report)
    }

    fn process(&mut self, tick: &Candle) -> Result<StepOutcome, EngineError> {
        if !tick.is_finite() {
            return Err(EngineError::InvalidTick {
                timestamp: tick.timestamp,
                reason: "non-finite price or volume".to_string(),
            });
        }
        if let Some(newest) = self.last_tick {
            if tick.timestamp < newest {
                return Err(EngineError::CandleOrder {
                    series: format!("{}@{}", self.symbol, self.primary),
                    newest,
                    incoming: tick.timestamp,
                });
            }
        }
        self.aggregator.fold_tick(&self.symbol, tick)?;
        self.last_tick = Some(tick.timestamp);

        if self.start_time.is_some_and(|start| tick.timestamp < start) {
            debug!(timestamp = %tick.timestamp, "warm-up tick");
            return Ok(StepOutcome::Warmup);
        }

        let mut scratch = self.state.clone();
        scratch.apply_bar(tick);
        for binding in &self.indicators {
            let candles = self.aggregator.query(&self.symbol, binding.interval());
            binding.refresh(&candles, &mut scratch)?;
        }

        // Outputs not yet published, and signals waiting on them.
        let mut pending: BTreeSet<&str> = self
            .indicator_keys
            .iter()
            .map(String::as_str)
            .filter(|key| !scratch.has_derived(key))
            .collect();
        for signal in &self.signals {
            if let Some(waiting_on) = first_pending(signal.identifiers(), &pending) {
                debug!(signal = %signal.id(), waiting_on, "signal warming up");
                if !scratch.has_derived(signal.id()) {
                    pending.insert(signal.id());
                }
                continue;
            }
            signal.refresh(&mut scratch)?;
        }
        let ready = self.rules.iter().filter(|rule| {
            match first_pending(rule.identifiers(), &pending) {
                Some(waiting_on) => {
                    debug!(rule = %rule.id, waiting_on, "rule warming up");
                    false
                }
                None => true,
            }
        });
        let intents = collect_intents(ready, &scratch)?;

        let mut fills = Vec::new();
        for intent in &intents {
            if let Some(fill) = self.lifecycle.apply(intent) {
                scratch.apply_fill(&fill);
                fills.push(fill);
            }
        }
        self.state = scratch;
        Ok(StepOutcome::Completed { intents, fills })
    }
}

fn first_pending<'a>(names: Vec<&'a str>, pending: &BTreeSet<&str>) -> Option<&'a str> {
    names.into_iter().find(|name| pending.contains(name))
}

fn claim_id(ids: &mut BTreeSet<String>, kind: &str, id: &str) -> Result<(), EngineError> {
    if id.is_empty() || !ids.insert(id.to_string()) {
        return Err(EngineError::ConfigInvalid {
            section: format!("{}.{}", kind, id),
            key: "id".to_string(),
            reason: "ids must be non-empty and unique".to_string(),
        });
    }
    Ok(())
}
