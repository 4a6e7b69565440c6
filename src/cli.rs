//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvMarkerWriter, CsvPriceSource};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{BacktestSettings, RunReport, parse_timestamp};
use crate::domain::candle_series::MAX_CAPACITY;
use crate::domain::config_validation::{
    BACKTEST_SECTION, INDICATOR_PREFIX, INVESTMENT_SECTION, PARAM_PREFIX, RULE_PREFIX,
    SIGNAL_PREFIX, STRATEGY_SECTION, split_transaction, transaction_keys, validate_backtest_config,
    validate_strategy_config,
};
use crate::domain::dispatcher::EventDispatcher;
use crate::domain::error::EngineError;
use crate::domain::expr::Expression;
use crate::domain::expr_parser;
use crate::domain::indicator::{BUILTIN_PACKAGE, IndicatorParams, IndicatorRegistry};
use crate::domain::indicator_binding::IndicatorSpec;
use crate::domain::interval::Interval;
use crate::domain::investment::Investment;
use crate::domain::rule::{CascadeTransaction, Rule, RuleType, SizeType, TradeAction};
use crate::domain::signal::{Comparator, SignalSpec};
use crate::domain::strategy::StrategySpec;
use crate::ports::config_port::ConfigPort;
use crate::ports::marker_port::MarkerPort;

#[derive(Parser, Debug)]
#[command(name = "stepwise", about = "Streaming strategy backtest core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy over a CSV price file
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Marker CSV destination; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: Command) -> Result<(), EngineError> {
    match command {
        Command::Run {
            config,
            strategy,
            data,
            output,
        } => run_backtest(&config, &strategy, &data, output.as_ref()),
        Command::Validate { strategy } => run_validate(&strategy),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, EngineError> {
    FileConfigAdapter::from_file(path).map_err(|e| EngineError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn run_backtest(
    config_path: &PathBuf,
    strategy_path: &PathBuf,
    data_path: &PathBuf,
    output_path: Option<&PathBuf>,
) -> Result<(), EngineError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    validate_backtest_config(&config)?;
    let settings = build_settings(&config)?;

    eprintln!("Loading strategy from {}", strategy_path.display());
    let strategy_config = load_config(strategy_path)?;
    validate_strategy_config(&strategy_config)?;
    let strategy = build_strategy(&strategy_config, settings.interval)?;
    let name = strategy.name.clone();

    let registry = IndicatorRegistry::with_builtins();
    let mut dispatcher = EventDispatcher::new(&settings, strategy, &registry)?;
    let mut source = CsvPriceSource::from_path(data_path)?;

    eprintln!(
        "Running {} on {} ({}) from {}",
        name,
        settings.investment,
        settings.interval,
        data_path.display()
    );
    let report = dispatcher.run(&mut source)?;

    match output_path {
        Some(path) => {
            CsvMarkerWriter::from_path(path)?.write_markers(&report.markers)?;
            eprintln!("Markers written to: {}", path.display());
        }
        None => CsvMarkerWriter::from_writer(io::stdout()).write_markers(&report.markers)?,
    }
    print_summary(&report);
    eprintln!("Skipped rows:     {}", source.skipped());
    Ok(())
}

fn print_summary(report: &RunReport) {
    eprintln!("\n=== Run Summary ===");
    eprintln!("Ticks:            {}", report.ticks);
    eprintln!("Abandoned ticks:  {}", report.abandoned);
    eprintln!("Markers:          {}", report.markers.len());
    eprintln!("Final status:     {}", report.snapshot.status);
    eprintln!("Final position:   {}", report.snapshot.position);
    eprintln!("Final cash:       {:.2}", report.snapshot.cash);
}

fn run_validate(strategy_path: &PathBuf) -> Result<(), EngineError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let config = load_config(strategy_path)?;
    validate_strategy_config(&config)?;
    let strategy = build_strategy(&config, Interval::Days(1))?;

    eprintln!("\nIndicators:");
    for spec in &strategy.indicators {
        eprintln!(
            "  {}: {}.{} @ {}",
            spec.id, spec.package, spec.function, spec.interval
        );
    }
    eprintln!("\nSignals:");
    for spec in &strategy.signals {
        eprintln!(
            "  {}: {} {} {} (x{})",
            spec.id, spec.left, spec.comparator, spec.right, spec.continuous_time
        );
    }
    eprintln!("\nRules:");
    for rule in &strategy.rules {
        eprintln!("  {}: {} {}", rule.id, rule.rule_type, rule.action);
        for (n, tx) in rule.transactions.iter().enumerate() {
            eprintln!("    {}. {}", n + 1, tx.expression);
        }
    }

    // Binding checks every identifier against the declared outputs.
    let settings = BacktestSettings::new(Investment::default());
    EventDispatcher::new(&settings, strategy, &IndicatorRegistry::with_builtins())?;

    eprintln!("\nStrategy configuration is valid.");
    Ok(())
}

pub fn build_settings(config: &dyn ConfigPort) -> Result<BacktestSettings, EngineError> {
    let get = |section: &str, key: &str| config.get_string(section, key).unwrap_or_default();
    let investment = Investment::new(
        get(INVESTMENT_SECTION, "symbol").trim(),
        get(INVESTMENT_SECTION, "sec_type").trim(),
        get(INVESTMENT_SECTION, "exchange").trim(),
        get(INVESTMENT_SECTION, "currency").trim(),
    );
    if investment.symbol.is_empty() {
        return Err(EngineError::ConfigMissing {
            section: INVESTMENT_SECTION.into(),
            key: "symbol".into(),
        });
    }

    let mut settings = BacktestSettings::new(investment);
    settings.initial_cash = config.get_double(BACKTEST_SECTION, "initial_cash", settings.initial_cash);
    let capacity = config.get_int(BACKTEST_SECTION, "candle_capacity", settings.candle_capacity as i64);
    settings.candle_capacity = usize::try_from(capacity)
        .ok()
        .filter(|c| (2..=MAX_CAPACITY).contains(c))
        .ok_or_else(|| EngineError::ConfigInvalid {
            section: BACKTEST_SECTION.into(),
            key: "candle_capacity".into(),
            reason: format!("expected an integer between 2 and {MAX_CAPACITY}"),
        })?;
    if let Some(s) = config.get_string(BACKTEST_SECTION, "interval") {
        settings.interval = parse_field(BACKTEST_SECTION, "interval", &s)?;
    }
    if let Some(s) = config.get_string(BACKTEST_SECTION, "start_time") {
        settings.start_time = Some(parse_timestamp(&s).ok_or_else(|| EngineError::ConfigInvalid {
            section: BACKTEST_SECTION.into(),
            key: "start_time".into(),
            reason: "expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS".into(),
        })?);
    }
    Ok(settings)
}

/// Build the strategy from `[indicator.*]`, `[signal.*]` and `[rule.*]`
/// sections in file order. Indicators without an interval use `primary`.
pub fn build_strategy(config: &dyn ConfigPort, primary: Interval) -> Result<StrategySpec, EngineError> {
    let name = config
        .get_string(STRATEGY_SECTION, "name")
        .unwrap_or_else(|| "Unnamed".to_string());
    let mut strategy = StrategySpec::new(&name);

    for section in config.sections() {
        if let Some(id) = section.strip_prefix(INDICATOR_PREFIX) {
            strategy.indicators.push(build_indicator(config, &section, id, primary)?);
        } else if let Some(id) = section.strip_prefix(SIGNAL_PREFIX) {
            strategy.signals.push(build_signal(config, &section, id)?);
        } else if let Some(id) = section.strip_prefix(RULE_PREFIX) {
            strategy.rules.push(build_rule(config, &section, id)?);
        }
    }
    Ok(strategy)
}

fn build_indicator(
    config: &dyn ConfigPort,
    section: &str,
    id: &str,
    primary: Interval,
) -> Result<IndicatorSpec, EngineError> {
    let mut params = IndicatorParams::new();
    for key in config.keys(section) {
        if let Some(name) = key.strip_prefix(PARAM_PREFIX) {
            let raw = required(config, section, &key)?;
            params.insert(name, parse_field(section, &key, &raw)?);
        }
    }
    let interval = match config.get_string(section, "interval") {
        Some(s) => parse_field(section, "interval", &s)?,
        None => primary,
    };
    Ok(IndicatorSpec {
        id: id.to_string(),
        package: config
            .get_string(section, "package")
            .unwrap_or_else(|| BUILTIN_PACKAGE.to_string()),
        function: required(config, section, "function")?,
        interval,
        params,
        suspend_while_open: config.get_bool(section, "suspend_while_open", false),
        temporary: config.get_bool(section, "temporary", false),
    })
}

fn build_signal(config: &dyn ConfigPort, section: &str, id: &str) -> Result<SignalSpec, EngineError> {
    let left = required(config, section, "left")?;
    let right = required(config, section, "right")?;
    parse_expression(section, "left", &left)?;
    parse_expression(section, "right", &right)?;
    let comparator: Comparator = parse_field(section, "comparator", &required(config, section, "comparator")?)?;
    Ok(SignalSpec {
        id: id.to_string(),
        left,
        comparator,
        right,
        continuous_time: config.get_int(section, "continuous_time", 1).max(0) as usize,
    })
}

fn build_rule(config: &dyn ConfigPort, section: &str, id: &str) -> Result<Rule, EngineError> {
    let rule_type: RuleType = parse_field(section, "type", &required(config, section, "type")?)?;
    let action: TradeAction = parse_field(section, "action", &required(config, section, "action")?)?;

    let mut transactions = Vec::new();
    for key in transaction_keys(config, section)? {
        let value = required(config, section, &key)?;
        let (expression, size, size_type) =
            split_transaction(&value).ok_or_else(|| EngineError::ConfigInvalid {
                section: section.to_string(),
                key: key.clone(),
                reason: "expected '<expression>, <size>, <size_type>'".into(),
            })?;
        let size: f64 = parse_field(section, &key, size)?;
        let size_type: SizeType = parse_field(section, &key, size_type)?;
        transactions.push(CascadeTransaction {
            expression: parse_expression(section, &key, expression)?,
            size,
            size_type,
        });
    }
    Ok(Rule {
        id: id.to_string(),
        rule_type,
        action,
        transactions,
    })
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, EngineError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn parse_field<T>(section: &str, key: &str, raw: &str) -> Result<T, EngineError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    })
}

fn parse_expression(section: &str, key: &str, text: &str) -> Result<Expression, EngineError> {
    expr_parser::parse(text).map_err(|e| {
        eprintln!(
            "error: failed to parse [{}] {}:\n{}",
            section,
            key,
            e.display_with_context(text)
        );
        EngineError::from(e)
    })
}
