//! Signals: a comparison between two expressions, held for a number of
//! consecutive bars.
//!
//! # Evaluation Semantics
//!
//! - Series operands: index `j` is true iff the comparison held for the
//!   `continuous_time` bars ending at `j`
//! - `UP_BREAK`: left was below right `continuous_time` bars ago and has been
//!   above it on every bar since; `DOWN_BREAK` mirrors it
//! - Scalar operands: plain comparison; a break needs history and is false
//! - The published value is the newest element

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::domain::error::{EngineError, ParseError};
use crate::domain::expr::{CompareOp, Expression};
use crate::domain::expr_eval::{Operands, compare, evaluate};
use crate::domain::expr_parser;
use crate::domain::state::StepState;
use crate::domain::value::{Series, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Equal,
    Gt,
    Gte,
    Lt,
    Lte,
    UpBreak,
    DownBreak,
}

impl Comparator {
    /// Crossing comparators need history on at least one side.
    pub fn is_break(self) -> bool {
        matches!(self, Comparator::UpBreak | Comparator::DownBreak)
    }
}

impl FromStr for Comparator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EQUAL" | "EQ" => Ok(Comparator::Equal),
            "GT" => Ok(Comparator::Gt),
            "GTE" => Ok(Comparator::Gte),
            "LT" => Ok(Comparator::Lt),
            "LTE" => Ok(Comparator::Lte),
            "UP_BREAK" | "UPBREAK" => Ok(Comparator::UpBreak),
            "DOWN_BREAK" | "DWN_BREAK" | "DWNBREAK" => Ok(Comparator::DownBreak),
            other => Err(ParseError {
                message: format!("unknown comparator '{}'", other),
                position: 0,
            }),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparator::Equal => "EQUAL",
            Comparator::Gt => "GT",
            Comparator::Gte => "GTE",
            Comparator::Lt => "LT",
            Comparator::Lte => "LTE",
            Comparator::UpBreak => "UP_BREAK",
            Comparator::DownBreak => "DOWN_BREAK",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub id: String,
    pub left: String,
    pub comparator: Comparator,
    pub right: String,
    pub continuous_time: usize,
}

#[derive(Debug, Clone)]
pub struct SignalBinding {
    id: String,
    left: Expression,
    right: Expression,
    comparator: Comparator,
    continuous_time: usize,
}

impl SignalBinding {
    pub fn new(spec: SignalSpec) -> Result<Self, EngineError> {
        if spec.continuous_time == 0 {
            return Err(EngineError::ConfigInvalid {
                section: format!("signal.{}", spec.id),
                key: "continuous_time".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(SignalBinding {
            left: expr_parser::parse(&spec.left)?,
            right: expr_parser::parse(&spec.right)?,
            id: spec.id,
            comparator: spec.comparator,
            continuous_time: spec.continuous_time,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = self.left.identifiers();
        names.extend(self.right.identifiers());
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Boolean series for series operands, a boolean for scalars.
    pub fn evaluate(&self, state: &StepState) -> Result<Value, EngineError> {
        let left = evaluate(&self.left, state)?;
        let right = evaluate(&self.right, state)?;
        match Operands::pair(&left, &right)? {
            Operands::Scalars(l, r) => match self.base_op() {
                Some(op) => Ok(Value::Bool(compare(op, l, r))),
                None => Err(EngineError::TypeMismatch {
                    reason: format!("signal {}: {} needs a series operand", self.id, self.comparator),
                }),
            },
            Operands::Series { index, left, right } => {
                let flags = self.held(&left, &right);
                Ok(Value::Series(Series::bools(index, flags)?))
            }
        }
    }

    /// Evaluate and publish the newest element under the signal id.
    pub fn refresh(&self, state: &mut StepState) -> Result<bool, EngineError> {
        let fired = self.evaluate(state)?.truthy();
        debug!(signal = %self.id, fired, "signal evaluated");
        state.set_derived(&self.id, Value::Bool(fired))?;
        Ok(fired)
    }

    fn base_op(&self) -> Option<CompareOp> {
        match self.comparator {
            Comparator::Equal => Some(CompareOp::Eq),
            Comparator::Gt => Some(CompareOp::Gt),
            Comparator::Gte => Some(CompareOp::Gte),
            Comparator::Lt => Some(CompareOp::Lt),
            Comparator::Lte => Some(CompareOp::Lte),
            Comparator::UpBreak | Comparator::DownBreak => None,
        }
    }

    fn held(&self, left: &[f64], right: &[f64]) -> Vec<bool> {
        let n = self.continuous_time;
        let len = left.len();
        let mut out = vec![false; len];
        match self.base_op() {
            Some(op) => {
                let cmp: Vec<bool> = left.iter().zip(right).map(|(&a, &b)| compare(op, a, b)).collect();
                for j in n.saturating_sub(1)..len {
                    out[j] = cmp[j + 1 - n..=j].iter().all(|&c| c);
                }
            }
            None => {
                let (before, after) = match self.comparator {
                    Comparator::UpBreak => (CompareOp::Lt, CompareOp::Gt),
                    _ => (CompareOp::Gt, CompareOp::Lt),
                };
                for j in n..len {
                    let start = j - n;
                    out[j] = compare(before, left[start], right[start])
                        && (start + 1..=j).all(|k| compare(after, left[k], right[k]));
                }
            }
        }
        out
    }
}
