//! Per-run step state: the current bar, position bookkeeping and every
//! derived value (indicator outputs, signals) keyed by name.

use chrono::{DateTime, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::candle::Candle;
use crate::domain::error::EngineError;
use crate::domain::lifecycle::{FillLeg, FillUpdate};
use crate::domain::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateField {
    Time,
    Open,
    High,
    Low,
    Close,
    Volume,
    Position,
    Cash,
    BuyTime,
    BuyPrice,
    LastBuyTime,
    LastBuyPrice,
    SellTime,
    SellPrice,
    LastSellTime,
    LastSellPrice,
}

impl StateField {
    pub const ALL: [StateField; 16] = [
        StateField::Time,
        StateField::Open,
        StateField::High,
        StateField::Low,
        StateField::Close,
        StateField::Volume,
        StateField::Position,
        StateField::Cash,
        StateField::BuyTime,
        StateField::BuyPrice,
        StateField::LastBuyTime,
        StateField::LastBuyPrice,
        StateField::SellTime,
        StateField::SellPrice,
        StateField::LastSellTime,
        StateField::LastSellPrice,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StateField::Time => "time",
            StateField::Open => "open",
            StateField::High => "high",
            StateField::Low => "low",
            StateField::Close => "close",
            StateField::Volume => "volume",
            StateField::Position => "position",
            StateField::Cash => "cash",
            StateField::BuyTime => "buy_time",
            StateField::BuyPrice => "buy_price",
            StateField::LastBuyTime => "last_buy_time",
            StateField::LastBuyPrice => "last_buy_price",
            StateField::SellTime => "sell_time",
            StateField::SellPrice => "sell_price",
            StateField::LastSellTime => "last_sell_time",
            StateField::LastSellPrice => "last_sell_price",
        }
    }
}

impl FromStr for StateField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateField::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| EngineError::UnknownField {
                name: s.to_string(),
            })
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepState {
    pub time: Option<NaiveDateTime>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub position: i64,
    pub cash: f64,
    pub buy_time: Option<NaiveDateTime>,
    pub buy_price: Option<f64>,
    pub last_buy_time: Option<NaiveDateTime>,
    pub last_buy_price: Option<f64>,
    pub sell_time: Option<NaiveDateTime>,
    pub sell_price: Option<f64>,
    pub last_sell_time: Option<NaiveDateTime>,
    pub last_sell_price: Option<f64>,
    derived: BTreeMap<String, Value>,
}

impl StepState {
    pub fn new(cash: f64) -> Self {
        StepState {
            cash,
            ..Default::default()
        }
    }

    pub fn apply_bar(&mut self, bar: &Candle) {
        self.time = Some(bar.timestamp);
        self.open = bar.open;
        self.high = bar.high;
        self.low = bar.low;
        self.close = bar.close;
        self.volume = bar.volume;
    }

    /// Merge the state fragment returned by a fill.
    pub fn apply_fill(&mut self, fill: &FillUpdate) {
        match fill.leg {
            FillLeg::Buy => {
                self.stamp_buy_time(fill.time);
                self.stamp_buy_price(fill.price);
            }
            FillLeg::Sell => {
                self.stamp_sell_time(fill.time);
                self.stamp_sell_price(fill.price);
            }
        }
        self.position = fill.position;
        self.cash = fill.cash;
    }

    /// Set a known field by name. Numeric fields take numbers; time fields
    /// take Unix seconds.
    pub fn set(&mut self, name: &str, value: Value) -> Result<(), EngineError> {
        let field: StateField = name.parse()?;
        self.set_field(field, value)
    }

    pub fn set_field(&mut self, field: StateField, value: Value) -> Result<(), EngineError> {
        let number = value.as_number().ok_or_else(|| EngineError::TypeMismatch {
            reason: format!("{} needs a scalar value", field),
        })?;
        match field {
            StateField::Time => self.time = Some(unix_to_datetime(field, number)?),
            StateField::Open => self.open = number,
            StateField::High => self.high = number,
            StateField::Low => self.low = number,
            StateField::Close => self.close = number,
            StateField::Volume => self.volume = number,
            StateField::Position => self.position = number as i64,
            StateField::Cash => self.cash = number,
            StateField::BuyTime => self.stamp_buy_time(unix_to_datetime(field, number)?),
            StateField::BuyPrice => self.stamp_buy_price(number),
            StateField::LastBuyTime => self.last_buy_time = Some(unix_to_datetime(field, number)?),
            StateField::LastBuyPrice => self.last_buy_price = Some(number),
            StateField::SellTime => self.stamp_sell_time(unix_to_datetime(field, number)?),
            StateField::SellPrice => self.stamp_sell_price(number),
            StateField::LastSellTime => {
                self.last_sell_time = Some(unix_to_datetime(field, number)?)
            }
            StateField::LastSellPrice => self.last_sell_price = Some(number),
        }
        Ok(())
    }

    /// Publish an indicator output or signal value.
    pub fn set_derived(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        if key.parse::<StateField>().is_ok() {
            return Err(EngineError::ReservedKey {
                key: key.to_string(),
            });
        }
        self.derived.insert(key.to_string(), value);
        Ok(())
    }

    /// Current value of a field, `None` when it has not been set yet.
    pub fn field(&self, field: StateField) -> Option<Value> {
        let time = |t: Option<NaiveDateTime>| t.map(|t| Value::Number(t.and_utc().timestamp() as f64));
        match field {
            StateField::Time => time(self.time),
            StateField::Open => Some(Value::Number(self.open)),
            StateField::High => Some(Value::Number(self.high)),
            StateField::Low => Some(Value::Number(self.low)),
            StateField::Close => Some(Value::Number(self.close)),
            StateField::Volume => Some(Value::Number(self.volume)),
            StateField::Position => Some(Value::Number(self.position as f64)),
            StateField::Cash => Some(Value::Number(self.cash)),
            StateField::BuyTime => time(self.buy_time),
            StateField::BuyPrice => self.buy_price.map(Value::Number),
            StateField::LastBuyTime => time(self.last_buy_time),
            StateField::LastBuyPrice => self.last_buy_price.map(Value::Number),
            StateField::SellTime => time(self.sell_time),
            StateField::SellPrice => self.sell_price.map(Value::Number),
            StateField::LastSellTime => time(self.last_sell_time),
            StateField::LastSellPrice => self.last_sell_price.map(Value::Number),
        }
    }

    /// Look up a field or derived key by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        match name.parse::<StateField>() {
            Ok(field) => self.field(field),
            Err(_) => self.derived.get(name).cloned(),
        }
    }

    pub fn has_derived(&self, key: &str) -> bool {
        self.derived.contains_key(key)
    }

    pub fn derived(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.derived.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn stamp_buy_time(&mut self, t: NaiveDateTime) {
        self.last_buy_time = self.buy_time.replace(t);
    }

    fn stamp_buy_price(&mut self, p: f64) {
        self.last_buy_price = self.buy_price.replace(p);
    }

    fn stamp_sell_time(&mut self, t: NaiveDateTime) {
        self.last_sell_time = self.sell_time.replace(t);
    }

    fn stamp_sell_price(&mut self, p: f64) {
        self.last_sell_price = self.sell_price.replace(p);
    }
}

fn unix_to_datetime(field: StateField, secs: f64) -> Result<NaiveDateTime, EngineError> {
    DateTime::from_timestamp(secs as i64, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| EngineError::TypeMismatch {
            reason: format!("{} is not a valid timestamp for {}", secs, field),
        })
}
