//! The traded instrument.

use std::fmt;

/// Exchanges whose trading day rolls over in the previous evening.
const EARLY_SESSION_EXCHANGES: [&str; 4] = ["IDEALPRO", "FX", "CME", "CBOT"];
const EARLY_SESSION_HOURS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Investment {
    pub symbol: String,
    pub sec_type: String,
    pub exchange: String,
    pub currency: String,
}

impl Investment {
    pub fn new(symbol: &str, sec_type: &str, exchange: &str, currency: &str) -> Self {
        Investment {
            symbol: symbol.to_string(),
            sec_type: sec_type.to_string(),
            exchange: exchange.to_string(),
            currency: currency.to_string(),
        }
    }

    /// Offset applied when bucketing ticks into daily or weekly bars.
    pub fn session_offset_hours(&self) -> i64 {
        let exchange = self.exchange.to_ascii_uppercase();
        if EARLY_SESSION_EXCHANGES.contains(&exchange.as_str()) {
            EARLY_SESSION_HOURS
        } else {
            0
        }
    }
}

impl fmt::Display for Investment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)?;
        if !self.exchange.is_empty() {
            write!(f, "@{}", self.exchange)?;
        }
        Ok(())
    }
}
