//! Domain error types.

use chrono::NaiveDateTime;

/// A parse error with position information for expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for stepwise.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    ExprParse(#[from] ParseError),

    #[error("unresolved identifier '{name}' in expression")]
    UnresolvedIdentifier { name: String },

    #[error("type mismatch: {reason}")]
    TypeMismatch { reason: String },

    #[error("series mismatch: {reason}")]
    SeriesMismatch { reason: String },

    #[error("unknown step state field '{name}'")]
    UnknownField { name: String },

    #[error("derived key '{key}' shadows a step state field")]
    ReservedKey { key: String },

    #[error("unknown indicator {package}.{function}")]
    UnknownIndicator { package: String, function: String },

    #[error("indicator {id} failed: {reason}")]
    IndicatorFailed { id: String, reason: String },

    #[error("candle at {incoming} is older than newest bar {newest} in {series}")]
    CandleOrder {
        series: String,
        newest: NaiveDateTime,
        incoming: NaiveDateTime,
    },

    #[error("tick at {timestamp} rejected: {reason}")]
    InvalidTick {
        timestamp: NaiveDateTime,
        reason: String,
    },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("price source error: {reason}")]
    Source { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::Source { .. }
            | EngineError::Csv(_)
            | EngineError::CandleOrder { .. }
            | EngineError::InvalidTick { .. } => 3,
            EngineError::ExprParse(_)
            | EngineError::UnresolvedIdentifier { .. }
            | EngineError::UnknownField { .. }
            | EngineError::ReservedKey { .. }
            | EngineError::UnknownIndicator { .. } => 4,
            EngineError::TypeMismatch { .. }
            | EngineError::SeriesMismatch { .. }
            | EngineError::IndicatorFailed { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
