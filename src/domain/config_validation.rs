//! Configuration validation.
//!
//! Checks run and strategy configs before anything is built and reports the
//! first offending `[section] key`.

use crate::domain::backtest::parse_timestamp;
use crate::domain::candle_series::MAX_CAPACITY;
use crate::domain::error::EngineError;
use crate::domain::interval::Interval;
use crate::domain::rule::{RuleType, SizeType, TradeAction};
use crate::domain::signal::Comparator;
use crate::ports::config_port::ConfigPort;

pub const BACKTEST_SECTION: &str = "backtest";
pub const INVESTMENT_SECTION: &str = "investment";
pub const STRATEGY_SECTION: &str = "strategy";
pub const INDICATOR_PREFIX: &str = "indicator.";
pub const SIGNAL_PREFIX: &str = "signal.";
pub const RULE_PREFIX: &str = "rule.";
pub const PARAM_PREFIX: &str = "param.";
pub const TRANSACTION_PREFIX: &str = "transaction.";

/// Keys outside any section land here.
const DEFAULT_SECTION: &str = "default";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_initial_cash(config)?;
    validate_interval(config, BACKTEST_SECTION)?;
    validate_candle_capacity(config)?;
    validate_start_time(config)?;
    validate_investment(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for section in config.sections() {
        if let Some(id) = section.strip_prefix(INDICATOR_PREFIX) {
            require_id(&section, id)?;
            validate_indicator(config, &section)?;
        } else if let Some(id) = section.strip_prefix(SIGNAL_PREFIX) {
            require_id(&section, id)?;
            validate_signal(config, &section)?;
        } else if let Some(id) = section.strip_prefix(RULE_PREFIX) {
            require_id(&section, id)?;
            validate_rule(config, &section)?;
        } else if section != STRATEGY_SECTION && section != DEFAULT_SECTION {
            return Err(invalid(&section, "", "unknown section"));
        }
    }
    Ok(())
}

/// Split `<expression>, <size>, <size_type>` at its last two commas.
pub fn split_transaction(value: &str) -> Option<(&str, &str, &str)> {
    let mut parts = value.rsplitn(3, ',');
    let size_type = parts.next()?.trim();
    let size = parts.next()?.trim();
    let expression = parts.next()?.trim();
    if expression.is_empty() {
        return None;
    }
    Some((expression, size, size_type))
}

/// `transaction.<n>` keys of a rule section, ordered by `n`.
pub fn transaction_keys(config: &dyn ConfigPort, section: &str) -> Result<Vec<String>, EngineError> {
    let mut numbered = Vec::new();
    for key in config.keys(section) {
        let Some(n) = key.strip_prefix(TRANSACTION_PREFIX) else {
            continue;
        };
        let n: u32 = n
            .parse()
            .map_err(|_| invalid(section, &key, "transaction keys are numbered: transaction.<n>"))?;
        numbered.push((n, key));
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, key)| key).collect())
}

fn invalid(section: &str, key: &str, reason: &str) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, key: &str) -> EngineError {
    EngineError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, EngineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(missing(section, key)),
    }
}

fn require_id(section: &str, id: &str) -> Result<(), EngineError> {
    if id.trim().is_empty() {
        return Err(invalid(section, "", "section needs an id after the prefix"));
    }
    Ok(())
}

/// Parsed value of an optional numeric key.
fn optional_number(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, EngineError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(section, key, "not a number")),
    }
}

fn validate_flag(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EngineError> {
    if config.get_string(section, key).is_none() {
        return Ok(());
    }
    // Unparseable flags fall back to the default, so they answer both ways.
    if config.get_bool(section, key, true) != config.get_bool(section, key, false) {
        return Err(invalid(section, key, "expected true or false"));
    }
    Ok(())
}

fn validate_initial_cash(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(value) = optional_number(config, BACKTEST_SECTION, "initial_cash")? {
        if value <= 0.0 || !value.is_finite() {
            return Err(invalid(BACKTEST_SECTION, "initial_cash", "initial_cash must be positive"));
        }
    }
    Ok(())
}

fn validate_interval(config: &dyn ConfigPort, section: &str) -> Result<(), EngineError> {
    if let Some(s) = config.get_string(section, "interval") {
        s.parse::<Interval>()
            .map_err(|e| invalid(section, "interval", &e.message))?;
    }
    Ok(())
}

fn validate_candle_capacity(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(value) = optional_number(config, BACKTEST_SECTION, "candle_capacity")? {
        if value < 2.0 || value > MAX_CAPACITY as f64 || value.fract() != 0.0 {
            return Err(invalid(
                BACKTEST_SECTION,
                "candle_capacity",
                &format!("candle_capacity must be an integer between 2 and {MAX_CAPACITY}"),
            ));
        }
    }
    Ok(())
}

fn validate_start_time(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(s) = config.get_string(BACKTEST_SECTION, "start_time") {
        if parse_timestamp(&s).is_none() {
            return Err(invalid(
                BACKTEST_SECTION,
                "start_time",
                "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS",
            ));
        }
    }
    Ok(())
}

fn validate_investment(config: &dyn ConfigPort) -> Result<(), EngineError> {
    require(config, INVESTMENT_SECTION, "symbol")?;
    Ok(())
}

fn validate_indicator(config: &dyn ConfigPort, section: &str) -> Result<(), EngineError> {
    require(config, section, "function")?;
    validate_interval(config, section)?;
    validate_flag(config, section, "suspend_while_open")?;
    validate_flag(config, section, "temporary")?;
    for key in config.keys(section) {
        if key.starts_with(PARAM_PREFIX) {
            optional_number(config, section, &key)?;
        }
    }
    Ok(())
}

fn validate_signal(config: &dyn ConfigPort, section: &str) -> Result<(), EngineError> {
    require(config, section, "left")?;
    require(config, section, "right")?;
    require(config, section, "comparator")?
        .parse::<Comparator>()
        .map_err(|e| invalid(section, "comparator", &e.message))?;
    if let Some(value) = optional_number(config, section, "continuous_time")? {
        if value < 1.0 || value.fract() != 0.0 {
            return Err(invalid(
                section,
                "continuous_time",
                "continuous_time must be a positive integer",
            ));
        }
    }
    Ok(())
}

fn validate_rule(config: &dyn ConfigPort, section: &str) -> Result<(), EngineError> {
    require(config, section, "type")?
        .parse::<RuleType>()
        .map_err(|e| invalid(section, "type", &e.message))?;
    require(config, section, "action")?
        .parse::<TradeAction>()
        .map_err(|e| invalid(section, "action", &e.message))?;

    let keys = transaction_keys(config, section)?;
    if keys.is_empty() {
        return Err(missing(section, "transaction.1"));
    }
    for key in keys {
        let value = require(config, section, &key)?;
        let (_, size, size_type) = split_transaction(&value)
            .ok_or_else(|| invalid(section, &key, "expected '<expression>, <size>, <size_type>'"))?;
        match size.parse::<f64>() {
            Ok(s) if s > 0.0 && s.is_finite() => {}
            _ => return Err(invalid(section, &key, "size must be a positive number")),
        }
        size_type
            .parse::<SizeType>()
            .map_err(|e| invalid(section, &key, &e.message))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: EngineError) -> String {
        match err {
            EngineError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_cash = 100000.0
interval = 1h
candle_capacity = 500
start_time = 2024-01-01 09:30:00

[investment]
symbol = EURUSD
sec_type = CASH
exchange = IDEALPRO
currency = USD
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn defaults_only_need_a_symbol() {
        let config = make_config("[investment]\nsymbol = AAPL\n");
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config("[backtest]\ninitial_cash = 100\n");
        let err = validate_backtest_config(&config).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "symbol"));
    }

    #[test]
    fn initial_cash_must_be_positive() {
        for value in ["0", "-100", "lots"] {
            let config = make_config(&format!(
                "[backtest]\ninitial_cash = {value}\n[investment]\nsymbol = A\n"
            ));
            let err = validate_backtest_config(&config).unwrap_err();
            assert_eq!(invalid_key(err), "initial_cash");
        }
    }

    #[test]
    fn bad_interval_fails() {
        let config = make_config("[backtest]\ninterval = 3y\n[investment]\nsymbol = A\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "interval");
    }

    #[test]
    fn candle_capacity_must_be_a_bounded_integer() {
        for value in ["1", "2.5", "100001", "1000000000"] {
            let config = make_config(&format!(
                "[backtest]\ncandle_capacity = {value}\n[investment]\nsymbol = A\n"
            ));
            assert_eq!(
                invalid_key(validate_backtest_config(&config).unwrap_err()),
                "candle_capacity"
            );
        }
    }

    #[test]
    fn bad_start_time_fails() {
        let config = make_config("[backtest]\nstart_time = 01/02/2024\n[investment]\nsymbol = A\n");
        assert_eq!(invalid_key(validate_backtest_config(&config).unwrap_err()), "start_time");
    }

    const STRATEGY: &str = r#"
[strategy]
name = crossover

[indicator.fast]
function = SMA
interval = 1d
param.timeperiod = 5
temporary = true

[signal.cross]
left = fast.real
comparator = up_break
right = close
continuous_time = 2

[rule.entry]
type = open
action = buy
transaction.1 = cross, 100, amount
transaction.2 = close > fast.real * 1.05, 0.5, percent
"#;

    #[test]
    fn valid_strategy_config_passes() {
        assert!(validate_strategy_config(&make_config(STRATEGY)).is_ok());
    }

    #[test]
    fn unknown_section_fails() {
        let config = make_config("[indicators.x]\nfunction = SMA\n");
        assert!(validate_strategy_config(&config).is_err());
    }

    #[test]
    fn indicator_needs_function_and_numeric_params() {
        let config = make_config("[indicator.x]\nparam.timeperiod = 5\n");
        assert!(matches!(
            validate_strategy_config(&config).unwrap_err(),
            EngineError::ConfigMissing { key, .. } if key == "function"
        ));
        let config = make_config("[indicator.x]\nfunction = SMA\nparam.timeperiod = five\n");
        assert_eq!(
            invalid_key(validate_strategy_config(&config).unwrap_err()),
            "param.timeperiod"
        );
    }

    #[test]
    fn invalid_flag_fails() {
        let config = make_config("[indicator.x]\nfunction = SMA\ntemporary = maybe\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "temporary");
    }

    #[test]
    fn signal_checks() {
        let config = make_config("[signal.s]\nleft = close\nright = open\ncomparator = ABOVE\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "comparator");
        let config = make_config(
            "[signal.s]\nleft = close\nright = open\ncomparator = GT\ncontinuous_time = 0\n",
        );
        assert_eq!(
            invalid_key(validate_strategy_config(&config).unwrap_err()),
            "continuous_time"
        );
    }

    #[test]
    fn rule_needs_a_transaction() {
        let config = make_config("[rule.r]\ntype = close\naction = sell\n");
        assert!(matches!(
            validate_strategy_config(&config).unwrap_err(),
            EngineError::ConfigMissing { key, .. } if key == "transaction.1"
        ));
    }

    #[test]
    fn rule_transaction_checks() {
        let cases = [
            ("transaction.1 = close > 1", "transaction.1"),
            ("transaction.1 = close > 1, 0, amount", "transaction.1"),
            ("transaction.1 = close > 1, 5, lots", "transaction.1"),
            ("transaction.x = close > 1, 5, amount", "transaction.x"),
        ];
        for (line, key) in cases {
            let config = make_config(&format!("[rule.r]\ntype = close\naction = sell\n{line}\n"));
            assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), key);
        }
    }

    #[test]
    fn rule_type_and_action_checked() {
        let config = make_config("[rule.r]\ntype = hedge\naction = sell\ntransaction.1 = 1, 1, amount\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "type");
        let config = make_config("[rule.r]\ntype = close\naction = hold\ntransaction.1 = 1, 1, amount\n");
        assert_eq!(invalid_key(validate_strategy_config(&config).unwrap_err()), "action");
    }

    #[test]
    fn transactions_ordered_by_number() {
        let config = make_config(
            "[rule.r]\ntransaction.10 = a, 1, amount\ntransaction.2 = b, 1, amount\ntype = open\n",
        );
        assert_eq!(
            transaction_keys(&config, "rule.r").unwrap(),
            vec!["transaction.2", "transaction.10"]
        );
    }

    #[test]
    fn split_transaction_uses_last_two_commas() {
        assert_eq!(
            split_transaction(" close > 1 , 100 , amount "),
            Some(("close > 1", "100", "amount"))
        );
        assert_eq!(split_transaction("close, amount"), None);
        assert_eq!(split_transaction(", 1, amount"), None);
    }
}
