//! Core domain types and logic.

pub mod aggregator;
pub mod backtest;
pub mod candle;
pub mod candle_series;
pub mod config_validation;
pub mod dispatcher;
pub mod error;
pub mod expr;
pub mod expr_eval;
pub mod expr_parser;
pub mod indicator;
pub mod indicator_binding;
pub mod interval;
pub mod investment;
pub mod lifecycle;
pub mod position;
pub mod rule;
pub mod rule_engine;
pub mod signal;
pub mod state;
pub mod strategy;
pub mod value;
