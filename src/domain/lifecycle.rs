//! Order lifecycle state machine.
//!
//! Owns cash, position and status for the one instrument and turns trade
//! intents into fills. At most one position is open at a time: an Open needs
//! an empty book, and exits need the side opposite to the open position.
//! Every fill appends exactly one [`OrderMarker`]; intents that cannot fill
//! leave everything untouched.

use chrono::NaiveDateTime;
use std::fmt;
use tracing::{debug, info};

use crate::domain::position::{PositionFamily, PositionStatus};
use crate::domain::rule::{RuleType, SizeType, TradeAction, TradeIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerAction {
    LongEntry,
    LongExit,
    ShortEntry,
    ShortExit,
}

impl MarkerAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerAction::LongEntry => "long_entry",
            MarkerAction::LongExit => "long_exit",
            MarkerAction::ShortEntry => "short_entry",
            MarkerAction::ShortExit => "short_exit",
        }
    }
}

impl fmt::Display for MarkerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderMarker {
    pub timestamp: NaiveDateTime,
    pub action: MarkerAction,
    /// Units filled, always positive.
    pub size: i64,
}

/// Which pair of step state fields a fill stamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillLeg {
    /// `buy_time` / `buy_price`, set by entries.
    Buy,
    /// `sell_time` / `sell_price`, set by exits.
    Sell,
}

/// State fragment returned by a fill for the caller to merge.
#[derive(Debug, Clone, PartialEq)]
pub struct FillUpdate {
    pub leg: FillLeg,
    pub time: NaiveDateTime,
    pub price: f64,
    pub position: i64,
    pub cash: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSnapshot {
    pub status: PositionStatus,
    pub position: i64,
    pub cash: f64,
}

/// Units to open: the sizing policy capped by what cash can buy.
pub fn open_size(cash: f64, price: f64, size: f64, size_type: SizeType) -> i64 {
    if !cash.is_finite() || !price.is_finite() || cash <= 0.0 || price <= 0.0 {
        return 0;
    }
    let affordable = (cash / price).floor();
    let wanted = match size_type {
        SizeType::Amount => size,
        SizeType::Value => size / price,
        SizeType::Percent => cash * size / price,
        SizeType::Percent100 => cash * size / 100.0 / price,
    }
    .floor();
    if wanted.is_nan() {
        return 0;
    }
    affordable.min(wanted).max(0.0) as i64
}

/// Units to close: the sizing policy capped by the open position.
pub fn close_size(position: i64, price: f64, size: f64, size_type: SizeType) -> i64 {
    let held = position.abs();
    if held == 0 || !price.is_finite() {
        return 0;
    }
    let wanted = match size_type {
        SizeType::Amount => size,
        SizeType::Value if price > 0.0 => size / price,
        SizeType::Value => 0.0,
        SizeType::Percent => held as f64 * size,
        SizeType::Percent100 => held as f64 * size / 100.0,
    }
    .floor();
    (wanted.max(0.0) as i64).min(held)
}

#[derive(Debug, Clone)]
pub struct OrderLifecycle {
    cash: f64,
    position: i64,
    status: PositionStatus,
    markers: Vec<OrderMarker>,
}

impl OrderLifecycle {
    pub fn new(initial_cash: f64) -> Self {
        OrderLifecycle {
            cash: initial_cash,
            position: 0,
            status: PositionStatus::Empty,
            markers: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn status(&self) -> PositionStatus {
        self.status
    }

    pub fn markers(&self) -> &[OrderMarker] {
        &self.markers
    }

    pub fn snapshot(&self) -> PositionSnapshot {
        PositionSnapshot {
            status: self.status,
            position: self.position,
            cash: self.cash,
        }
    }

    /// Apply one intent. `None` when it does not fill.
    pub fn apply(&mut self, intent: &TradeIntent) -> Option<FillUpdate> {
        let fill = match intent.rule_type {
            RuleType::Open => self.open(intent),
            RuleType::Close => self.close(intent),
            RuleType::StopLoss | RuleType::TakeProfit => self.reduce(intent),
            RuleType::RiskControl | RuleType::Special => None,
        };
        if fill.is_none() {
            debug!(
                rule = %intent.rule_id,
                rule_type = %intent.rule_type,
                action = %intent.action,
                status = %self.status,
                "intent ignored"
            );
        }
        fill
    }

    /// Side that exits the current position, if any.
    fn exit_action(&self) -> Option<TradeAction> {
        match self.status.family() {
            PositionFamily::Long => Some(TradeAction::Sell),
            PositionFamily::Short => Some(TradeAction::Buy),
            PositionFamily::Flat => None,
        }
    }

    fn open(&mut self, intent: &TradeIntent) -> Option<FillUpdate> {
        if self.status != PositionStatus::Empty {
            return None;
        }
        let (direction, status, action) = match intent.action {
            TradeAction::Buy => (1, PositionStatus::LongFilled, MarkerAction::LongEntry),
            TradeAction::Short => (-1, PositionStatus::ShortFilled, MarkerAction::ShortEntry),
            TradeAction::Sell => return None,
        };
        let size = open_size(self.cash, intent.price, intent.size, intent.size_type);
        if size <= 0 {
            return None;
        }
        self.position = direction * size;
        self.cash -= self.position as f64 * intent.price;
        self.status = status;
        Some(self.fill(intent, action, size, FillLeg::Buy))
    }

    fn close(&mut self, intent: &TradeIntent) -> Option<FillUpdate> {
        if self.exit_action() != Some(intent.action) || !intent.price.is_finite() {
            return None;
        }
        let action = match self.status.family() {
            PositionFamily::Short => MarkerAction::ShortExit,
            _ => MarkerAction::LongExit,
        };
        let size = self.position.abs();
        self.cash += self.position as f64 * intent.price;
        self.position = 0;
        self.status = PositionStatus::Empty;
        Some(self.fill(intent, action, size, FillLeg::Sell))
    }

    fn reduce(&mut self, intent: &TradeIntent) -> Option<FillUpdate> {
        if self.exit_action() != Some(intent.action) {
            return None;
        }
        let size = close_size(self.position, intent.price, intent.size, intent.size_type);
        if size <= 0 {
            return None;
        }
        let long = self.status.family() == PositionFamily::Long;
        let signed = if long { size } else { -size };
        self.position -= signed;
        self.cash += signed as f64 * intent.price;
        self.status = match (self.position, long, intent.rule_type) {
            (0, _, _) => PositionStatus::Empty,
            (_, true, RuleType::StopLoss) => PositionStatus::LongStopLossFilled,
            (_, true, _) => PositionStatus::LongTakeProfitFilled,
            (_, false, RuleType::StopLoss) => PositionStatus::ShortStopLossFilled,
            (_, false, _) => PositionStatus::ShortTakeProfitFilled,
        };
        let action = if long {
            MarkerAction::LongExit
        } else {
            MarkerAction::ShortExit
        };
        Some(self.fill(intent, action, size, FillLeg::Sell))
    }

    fn fill(&mut self, intent: &TradeIntent, action: MarkerAction, size: i64, leg: FillLeg) -> FillUpdate {
        let marker = OrderMarker {
            timestamp: intent.timestamp,
            action,
            size,
        };
        info!(
            timestamp = %intent.timestamp,
            rule = %intent.rule_id,
            action = %action,
            size,
            price = intent.price,
            position = self.position,
            cash = self.cash,
            status = %self.status,
            "order filled"
        );
        self.markers.push(marker);
        FillUpdate {
            leg,
            time: intent.timestamp,
            price: intent.price,
            position: self.position,
            cash: self.cash,
        }
    }
}
