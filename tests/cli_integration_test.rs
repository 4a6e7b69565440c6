//! CLI integration tests for config loading and command orchestration.
//!
//! Tests cover:
//! - Settings parsing (build_settings)
//! - Strategy parsing (build_strategy) and its file-order guarantees
//! - The `run` and `validate` commands over files on disk

mod common;

use common::*;
use std::fs;
use stepwise::adapters::file_config_adapter::FileConfigAdapter;
use stepwise::cli::{self, Command, execute};
use stepwise::domain::error::EngineError;
use stepwise::domain::interval::Interval;
use stepwise::domain::rule::{RuleType, SizeType, TradeAction};
use stepwise::domain::signal::Comparator;

const CONFIG: &str = "[backtest]\ninitial_cash = 100000\ninterval = 1d\n\n[investment]\nsymbol = BHP\nexchange = ASX\n";

const STRATEGY: &str = r#"
[strategy]
name = dip buyer

[indicator.ma]
function = SMA
param.timeperiod = 2
temporary = true

[signal.dip]
left = close
comparator = LT
right = ma.real

[rule.exit]
type = close
action = sell
transaction.1 = position > 0 & close > buy_price * 1.05, 1, amount

[rule.entry]
type = open
action = buy
transaction.1 = dip, 100, amount
"#;

mod settings_parsing {
    use super::*;

    #[test]
    fn reads_backtest_and_investment_sections() {
        let config = FileConfigAdapter::from_string(
            "[backtest]\ninitial_cash = 5000\ninterval = 4h\ncandle_capacity = 50\nstart_time = 2024-02-01\n\n[investment]\nsymbol = EURUSD\nsec_type = CASH\nexchange = IDEALPRO\ncurrency = USD\n",
        )
        .unwrap();
        let settings = cli::build_settings(&config).unwrap();
        assert_eq!(settings.initial_cash, 5000.0);
        assert_eq!(settings.interval, Interval::Hours(4));
        assert_eq!(settings.candle_capacity, 50);
        assert_eq!(
            settings.start_time.map(|t| t.to_string()),
            Some("2024-02-01 00:00:00".to_string())
        );
        assert_eq!(settings.investment.symbol, "EURUSD");
        assert_eq!(settings.investment.exchange, "IDEALPRO");
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config = FileConfigAdapter::from_string("[investment]\nsymbol = BHP\n").unwrap();
        let settings = cli::build_settings(&config).unwrap();
        assert_eq!(settings.initial_cash, 100_000.0);
        assert_eq!(settings.interval, Interval::Days(1));
        assert_eq!(settings.candle_capacity, 300);
        assert_eq!(settings.start_time, None);
    }

    #[test]
    fn missing_symbol_is_reported() {
        let config = FileConfigAdapter::from_string("[backtest]\ninitial_cash = 1\n").unwrap();
        assert!(matches!(
            cli::build_settings(&config),
            Err(EngineError::ConfigMissing { ref key, .. }) if key == "symbol"
        ));
    }

    #[test]
    fn oversized_capacity_is_invalid() {
        for value in ["0", "-1", "1000000000"] {
            let config = FileConfigAdapter::from_string(&format!(
                "[backtest]\ncandle_capacity = {value}\n[investment]\nsymbol = X\n"
            ))
            .unwrap();
            assert!(matches!(
                cli::build_settings(&config),
                Err(EngineError::ConfigInvalid { ref key, .. }) if key == "candle_capacity"
            ));
        }
    }

    #[test]
    fn bad_interval_is_invalid() {
        let config =
            FileConfigAdapter::from_string("[backtest]\ninterval = 3y\n[investment]\nsymbol = X\n").unwrap();
        assert!(matches!(
            cli::build_settings(&config),
            Err(EngineError::ConfigInvalid { ref key, .. }) if key == "interval"
        ));
    }
}

mod strategy_parsing {
    use super::*;

    #[test]
    fn builds_indicators_signals_and_rules() {
        let config = FileConfigAdapter::from_string(STRATEGY).unwrap();
        let strategy = cli::build_strategy(&config, Interval::Hours(1)).unwrap();

        assert_eq!(strategy.name, "dip buyer");
        assert_eq!(strategy.indicators.len(), 1);
        let ma = &strategy.indicators[0];
        assert_eq!(ma.function, "SMA");
        assert_eq!(ma.package, "builtin");
        assert_eq!(ma.interval, Interval::Hours(1));
        assert!(ma.temporary);
        assert!(!ma.suspend_while_open);
        assert_eq!(ma.params.get("timeperiod"), Some(2.0));

        let dip = &strategy.signals[0];
        assert_eq!(dip.id, "dip");
        assert_eq!(dip.comparator, Comparator::Lt);
        assert_eq!(dip.continuous_time, 1);

        let ids: Vec<&str> = strategy.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["exit", "entry"]);
        assert_eq!(strategy.rules[0].rule_type, RuleType::Close);
        assert_eq!(strategy.rules[1].action, TradeAction::Buy);
        assert_eq!(strategy.rules[1].transactions[0].size, 100.0);
        assert_eq!(strategy.rules[1].transactions[0].size_type, SizeType::Amount);
    }

    #[test]
    fn transactions_follow_their_numbers() {
        let config = FileConfigAdapter::from_string(
            "[rule.stop]\ntype = stoploss\naction = sell\ntransaction.10 = close < 5, 1, percent\ntransaction.2 = close < 8, 50, percent100\n",
        )
        .unwrap();
        let strategy = cli::build_strategy(&config, Interval::Days(1)).unwrap();
        let tx = &strategy.rules[0].transactions;
        assert_eq!(tx[0].expression.source(), "close < 8");
        assert_eq!(tx[0].size_type, SizeType::Percent100);
        assert_eq!(tx[1].expression.source(), "close < 5");
    }

    #[test]
    fn malformed_transaction_is_invalid() {
        let config = FileConfigAdapter::from_string(
            "[rule.entry]\ntype = open\naction = buy\ntransaction.1 = close > 5\n",
        )
        .unwrap();
        assert!(matches!(
            cli::build_strategy(&config, Interval::Days(1)),
            Err(EngineError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn expression_syntax_error_is_reported() {
        let config = FileConfigAdapter::from_string(
            "[rule.entry]\ntype = open\naction = buy\ntransaction.1 = close > (5, 1, amount\n",
        )
        .unwrap();
        assert!(matches!(
            cli::build_strategy(&config, Interval::Days(1)),
            Err(EngineError::ExprParse(_))
        ));
    }
}

mod commands {
    use super::*;

    #[test]
    fn run_writes_markers() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(CONFIG);
        let strategy = write_temp_file(STRATEGY);
        let data = write_temp_file(&prices_csv(&daily_bars(&[100.0, 100.0, 90.0, 95.0, 99.0])));
        let output = dir.path().join("markers.csv");

        execute(Command::Run {
            config: config.path().to_path_buf(),
            strategy: strategy.path().to_path_buf(),
            data: data.path().to_path_buf(),
            output: Some(output.clone()),
        })
        .unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,action,size",
                "2024-01-03 00:00:00,long_entry,100",
                "2024-01-04 00:00:00,long_exit,100",
            ]
        );
    }

    #[test]
    fn run_skips_bad_price_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = write_temp_file(CONFIG);
        let strategy = write_temp_file(STRATEGY);
        let clean = prices_csv(&daily_bars(&[100.0, 100.0, 90.0, 95.0, 99.0]));
        let mut lines: Vec<String> = clean.lines().map(str::to_string).collect();
        // after 2024-01-02 and 2024-01-03
        lines.insert(4, "2024-01-03 12:00:00,95,96,94,abc,1000".into());
        lines.insert(4, "2024-01-01 00:00:00,1,1,1,1,1".into());
        lines.insert(3, "yesterday,95,96,94,95,1000".into());
        lines.insert(3, "2024-01-02 12:00:00,95,96,94,NaN,1000".into());
        let data = write_temp_file(&(lines.join("\n") + "\n"));
        let output = dir.path().join("markers.csv");

        execute(Command::Run {
            config: config.path().to_path_buf(),
            strategy: strategy.path().to_path_buf(),
            data: data.path().to_path_buf(),
            output: Some(output.clone()),
        })
        .unwrap();

        let written = fs::read_to_string(&output).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![
                "timestamp,action,size",
                "2024-01-03 00:00:00,long_entry,100",
                "2024-01-04 00:00:00,long_exit,100",
            ]
        );
    }

    #[test]
    fn run_rejects_invalid_backtest_config() {
        let config = write_temp_file("[backtest]\ninitial_cash = -5\n[investment]\nsymbol = BHP\n");
        let strategy = write_temp_file(STRATEGY);
        let data = write_temp_file(&prices_csv(&daily_bars(&[1.0])));
        let err = execute(Command::Run {
            config: config.path().to_path_buf(),
            strategy: strategy.path().to_path_buf(),
            data: data.path().to_path_buf(),
            output: None,
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid { ref key, .. } if key == "initial_cash"));
    }

    #[test]
    fn validate_accepts_good_strategy() {
        let strategy = write_temp_file(STRATEGY);
        assert!(
            execute(Command::Validate {
                strategy: strategy.path().to_path_buf(),
            })
            .is_ok()
        );
    }

    #[test]
    fn validate_rejects_unknown_identifier() {
        let strategy = write_temp_file(
            "[rule.entry]\ntype = open\naction = buy\ntransaction.1 = close > ma.real, 1, amount\n",
        );
        let err = execute(Command::Validate {
            strategy: strategy.path().to_path_buf(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedIdentifier { ref name } if name == "ma.real"));
    }

    #[test]
    fn validate_rejects_unknown_section() {
        let strategy = write_temp_file("[database]\nconninfo = x\n");
        assert!(matches!(
            execute(Command::Validate {
                strategy: strategy.path().to_path_buf(),
            }),
            Err(EngineError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = execute(Command::Validate {
            strategy: "/nonexistent/strategy.ini".into(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse { .. }));
    }
}
