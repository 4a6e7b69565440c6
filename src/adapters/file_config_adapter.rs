//! INI file configuration adapter.
//!
//! Section and key names are case-sensitive so that indicator and signal ids
//! keep the spelling expressions refer to them by.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new_cs();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new_cs();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }

    fn sections(&self) -> Vec<String> {
        self.config.sections()
    }

    fn keys(&self, section: &str) -> Vec<String> {
        self.config
            .get_map_ref()
            .get(section)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
initial_cash = 100000.0
interval = 1d

[investment]
symbol = EURUSD
exchange = IDEALPRO
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.get_string("backtest", "interval"), Some("1d".to_string()));
        assert_eq!(
            adapter.get_string("investment", "exchange"),
            Some("IDEALPRO".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial_cash = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn names_are_case_sensitive() {
        let adapter = FileConfigAdapter::from_string("[indicator.MA5]\nparam.timePeriod = 5\n").unwrap();
        assert_eq!(adapter.get_int("indicator.MA5", "param.timePeriod", 0), 5);
        assert_eq!(adapter.get_int("indicator.ma5", "param.timePeriod", 0), 0);
    }

    #[test]
    fn get_int_and_double_fall_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\ncandle_capacity = abc\ninitial_cash = x\n").unwrap();
        assert_eq!(adapter.get_int("backtest", "candle_capacity", 42), 42);
        assert_eq!(adapter.get_int("backtest", "missing", 7), 7);
        assert_eq!(adapter.get_double("backtest", "initial_cash", 99.9), 99.9);
    }

    #[test]
    fn get_double_returns_value() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial_cash = 100000.5\n").unwrap();
        assert_eq!(adapter.get_double("backtest", "initial_cash", 0.0), 100000.5);
    }

    #[test]
    fn get_bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[i]\na = true\nb = no\nc = 1\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("i", "a", false));
        assert!(!adapter.get_bool("i", "b", true));
        assert!(adapter.get_bool("i", "c", false));
        assert!(adapter.get_bool("i", "d", true));
        assert!(!adapter.get_bool("i", "missing", false));
    }

    #[test]
    fn sections_and_keys_keep_file_order() {
        let content = r#"
[rule.zeta]
type = open
transaction.2 = close > 1, 1, amount
transaction.1 = close > 2, 1, amount

[rule.alpha]
type = close
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(adapter.sections(), vec!["rule.zeta", "rule.alpha"]);
        assert_eq!(
            adapter.keys("rule.zeta"),
            vec!["type", "transaction.2", "transaction.1"]
        );
        assert!(adapter.keys("missing").is_empty());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[investment]\nsymbol = AAPL\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_string("investment", "symbol"), Some("AAPL".to_string()));
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
