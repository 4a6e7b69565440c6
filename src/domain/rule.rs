//! Trading rule data structures.
//!
//! - `RuleType`: what a rule does to the position; its ordinal is the
//!   priority used to order intents raised on the same tick
//! - `TradeAction`: the order side a rule requests
//! - `SizeType`: how a transaction's size is interpreted
//! - `CascadeTransaction` / `Rule`: ordered conditional transactions
//! - `TradeIntent`: what a rule emits when one of its transactions fires

use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::ParseError;
use crate::domain::expr::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    Close = 1,
    StopLoss = 2,
    TakeProfit = 3,
    Open = 4,
    RiskControl = 5,
    Special = 6,
}

impl RuleType {
    /// Lower runs first within a tick.
    pub fn priority(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy = 1,
    Sell = 2,
    Short = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeType {
    /// Number of units.
    Amount = 0,
    /// Cash value; units = value / price.
    Value = 1,
    /// Fraction of the base (0.5 = half).
    Percent = 2,
    /// Percentage of the base (50 = half).
    Percent100 = 3,
}

fn normalize(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn unknown(kind: &str, s: &str) -> ParseError {
    ParseError {
        message: format!("unknown {} '{}'", kind, s.trim()),
        position: 0,
    }
}

impl FromStr for RuleType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "close" | "1" => Ok(RuleType::Close),
            "stoploss" | "2" => Ok(RuleType::StopLoss),
            "takeprofit" | "3" => Ok(RuleType::TakeProfit),
            "open" | "4" => Ok(RuleType::Open),
            "riskcontrol" | "5" => Ok(RuleType::RiskControl),
            "special" | "6" => Ok(RuleType::Special),
            _ => Err(unknown("rule type", s)),
        }
    }
}

impl FromStr for TradeAction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "buy" | "1" => Ok(TradeAction::Buy),
            "sell" | "2" => Ok(TradeAction::Sell),
            "short" | "3" => Ok(TradeAction::Short),
            _ => Err(unknown("trade action", s)),
        }
    }
}

impl FromStr for SizeType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "amount" | "0" => Ok(SizeType::Amount),
            "value" | "1" => Ok(SizeType::Value),
            "percent" | "2" => Ok(SizeType::Percent),
            "percent100" | "3" => Ok(SizeType::Percent100),
            _ => Err(unknown("size type", s)),
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleType::Close => "close",
            RuleType::StopLoss => "stop_loss",
            RuleType::TakeProfit => "take_profit",
            RuleType::Open => "open",
            RuleType::RiskControl => "risk_control",
            RuleType::Special => "special",
        })
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Short => "short",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeTransaction {
    pub expression: Expression,
    pub size: f64,
    pub size_type: SizeType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub rule_type: RuleType,
    pub action: TradeAction,
    pub transactions: Vec<CascadeTransaction>,
}

impl Rule {
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .transactions
            .iter()
            .flat_map(|tx| tx.expression.identifiers())
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub rule_id: String,
    pub rule_type: RuleType,
    pub action: TradeAction,
    pub price: f64,
    pub size: f64,
    pub size_type: SizeType,
    pub priority: u8,
    pub timestamp: NaiveDateTime,
}
