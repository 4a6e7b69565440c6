//! Expression interpreter.
//!
//! Evaluates an [`Expression`] against the step state.
//!
//! # Evaluation Semantics
//!
//! - Identifiers resolve through [`StepState::get`]; a missing value is
//!   `UnresolvedIdentifier`
//! - Scalar with series: the scalar is broadcast onto the series index
//! - Series with series: both sides are restricted to shared timestamps
//! - `==` / `!=` compare within `EPSILON`; any comparison with NaN is false
//! - `&` / `|` short-circuit when the left side is a scalar

use chrono::NaiveDateTime;

use crate::domain::error::EngineError;
use crate::domain::expr::{ArithOp, CompareOp, Expr, Expression, LogicOp};
use crate::domain::state::StepState;
use crate::domain::value::{Series, Value, bool_to_number, number_to_bool};

pub(crate) const EPSILON: f64 = 1e-9;

pub fn evaluate(expr: &Expression, state: &StepState) -> Result<Value, EngineError> {
    eval(expr.root(), state)
}

/// Evaluate and reduce to the truth of the newest element.
pub fn evaluate_bool(expr: &Expression, state: &StepState) -> Result<bool, EngineError> {
    Ok(evaluate(expr, state)?.truthy())
}

fn eval(expr: &Expr, state: &StepState) -> Result<Value, EngineError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Ident(name) => state
            .get(name)
            .ok_or_else(|| EngineError::UnresolvedIdentifier { name: name.clone() }),
        Expr::Neg(inner) => match eval(inner, state)? {
            Value::Series(s) => {
                let negated = s.to_numbers().into_iter().map(|x| -x).collect();
                Ok(Value::Series(Series::numbers(s.index, negated)?))
            }
            scalar => Ok(Value::Number(-scalar_number(&scalar))),
        },
        Expr::Arith { op, left, right } => {
            let l = eval(left, state)?;
            let r = eval(right, state)?;
            let op = *op;
            Operands::pair(&l, &r)?.map_numbers(|a, b| arith(op, a, b))
        }
        Expr::Compare { op, left, right } => {
            let l = eval(left, state)?;
            let r = eval(right, state)?;
            let op = *op;
            Operands::pair(&l, &r)?.map_bools(|a, b| compare(op, a, b))
        }
        Expr::Logic { op, left, right } => {
            let l = eval(left, state)?;
            if !l.is_series() {
                match (op, l.truthy()) {
                    (LogicOp::And, false) => return Ok(Value::Bool(false)),
                    (LogicOp::Or, true) => return Ok(Value::Bool(true)),
                    _ => {}
                }
            }
            let r = eval(right, state)?;
            let op = *op;
            Operands::pair(&l, &r)?.map_bools(|a, b| {
                let (a, b) = (number_to_bool(a), number_to_bool(b));
                match op {
                    LogicOp::And => a && b,
                    LogicOp::Or => a || b,
                }
            })
        }
    }
}

fn arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
    }
}

pub(crate) fn compare(op: CompareOp, a: f64, b: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return false;
    }
    match op {
        CompareOp::Gt => a > b,
        CompareOp::Gte => a >= b,
        CompareOp::Lt => a < b,
        CompareOp::Lte => a <= b,
        CompareOp::Eq => (a - b).abs() < EPSILON,
        CompareOp::Ne => (a - b).abs() >= EPSILON,
    }
}

fn scalar_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => *n,
        Value::Bool(b) => bool_to_number(*b),
        Value::Series(s) => s.to_numbers().last().copied().unwrap_or(f64::NAN),
    }
}

/// Two operands brought to a common shape.
pub(crate) enum Operands {
    Scalars(f64, f64),
    Series {
        index: Vec<NaiveDateTime>,
        left: Vec<f64>,
        right: Vec<f64>,
    },
}

impl Operands {
    pub(crate) fn pair(left: &Value, right: &Value) -> Result<Operands, EngineError> {
        let (l, r) = match (left, right) {
            (Value::Series(l), Value::Series(r)) => l.align(r)?,
            (Value::Series(l), scalar) => (l.clone(), l.broadcast(scalar)?),
            (scalar, Value::Series(r)) => (r.broadcast(scalar)?, r.clone()),
            (l, r) => return Ok(Operands::Scalars(scalar_number(l), scalar_number(r))),
        };
        Ok(Operands::Series {
            left: l.to_numbers(),
            right: r.to_numbers(),
            index: l.index,
        })
    }

    fn map_numbers(self, f: impl Fn(f64, f64) -> f64) -> Result<Value, EngineError> {
        match self {
            Operands::Scalars(a, b) => Ok(Value::Number(f(a, b))),
            Operands::Series { index, left, right } => {
                let out = left.iter().zip(&right).map(|(&a, &b)| f(a, b)).collect();
                Ok(Value::Series(Series::numbers(index, out)?))
            }
        }
    }

    pub(crate) fn map_bools(self, f: impl Fn(f64, f64) -> bool) -> Result<Value, EngineError> {
        match self {
            Operands::Scalars(a, b) => Ok(Value::Bool(f(a, b))),
            Operands::Series { index, left, right } => {
                let out = left.iter().zip(&right).map(|(&a, &b)| f(a, b)).collect();
                Ok(Value::Series(Series::bools(index, out)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr_parser::parse;
    use crate::domain::value::SeriesData;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i)
    }

    fn state() -> StepState {
        let mut state = StepState::new(1000.0);
        state.close = 105.0;
        state.open = 100.0;
        state
            .set_derived(
                "sma3.real",
                Value::Series(
                    Series::numbers((0..3).map(ts).collect(), vec![100.0, 101.0, 103.0]).unwrap(),
                ),
            )
            .unwrap();
        state
    }

    fn eval_str(input: &str, state: &StepState) -> Result<Value, EngineError> {
        evaluate(&parse(input).unwrap(), state)
    }

    #[test]
    fn scalar_arithmetic() {
        let s = state();
        let v = eval_str("(close - open) * 2 / 4 + -1", &s).unwrap();
        assert_relative_eq!(v.as_number().unwrap(), 1.5);
    }

    #[test]
    fn scalar_comparison() {
        let s = state();
        assert_eq!(eval_str("close > open", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("close <= open", &s).unwrap(), Value::Bool(false));
        assert_eq!(eval_str("close == 105.0000000001", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval_str("close != 105", &s).unwrap(), Value::Bool(false));
    }

    #[test]
    fn division_by_zero_is_ieee() {
        let s = state();
        let v = eval_str("close / 0", &s).unwrap();
        assert!(v.as_number().unwrap().is_infinite());
        assert_eq!(eval_str("0 / 0 > 1", &s).unwrap(), Value::Bool(false));
        assert_eq!(eval_str("0 / 0 == 0 / 0", &s).unwrap(), Value::Bool(false));
    }

    #[test]
    fn scalar_broadcasts_onto_series() {
        let s = state();
        let v = eval_str("sma3.real > 100.5", &s).unwrap();
        match v {
            Value::Series(series) => {
                assert_eq!(series.data, SeriesData::Bool(vec![false, true, true]));
                assert_eq!(series.index.len(), 3);
            }
            other => panic!("expected series, got {:?}", other),
        }
        let v = eval_str("close - sma3.real", &s).unwrap();
        match v {
            Value::Series(series) => assert_eq!(series.to_numbers(), vec![5.0, 4.0, 2.0]),
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn series_operands_align_on_timestamps() {
        let mut s = state();
        s.set_derived(
            "fast.real",
            Value::Series(Series::numbers((1..4).map(ts).collect(), vec![1.0, 2.0, 3.0]).unwrap()),
        )
        .unwrap();
        let v = eval_str("sma3.real + fast.real", &s).unwrap();
        match v {
            Value::Series(series) => {
                assert_eq!(series.index, vec![ts(1), ts(2)]);
                assert_eq!(series.to_numbers(), vec![102.0, 105.0]);
            }
            other => panic!("expected series, got {:?}", other),
        }
    }

    #[test]
    fn unset_field_is_unresolved() {
        let s = state();
        let err = eval_str("close > buy_price + 0.2 * R", &s).unwrap_err();
        assert!(matches!(err, EngineError::UnresolvedIdentifier { name } if name == "buy_price"));
    }

    #[test]
    fn and_short_circuits_guard() {
        let s = state();
        assert_eq!(
            eval_str("position > 0 & close > buy_price", &s).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval_str("close > 1 | missing > 0", &s).unwrap(), Value::Bool(true));
        assert!(eval_str("close > 1 & missing > 0", &s).is_err());
    }

    #[test]
    fn booleans_coerce_in_arithmetic() {
        let s = state();
        let v = eval_str("(close > open) + (close < open) + 1", &s).unwrap();
        assert_relative_eq!(v.as_number().unwrap(), 2.0);
    }

    #[test]
    fn evaluate_bool_reads_newest_element() {
        let s = state();
        assert!(evaluate_bool(&parse("sma3.real > 102").unwrap(), &s).unwrap());
        assert!(!evaluate_bool(&parse("sma3.real - 103").unwrap(), &s).unwrap());
        assert!(evaluate_bool(&parse("cash").unwrap(), &s).unwrap());
    }

    #[test]
    fn negating_a_series() {
        let s = state();
        let v = eval_str("-sma3.real", &s).unwrap();
        assert_eq!(v.latest(), Some(Value::Number(-103.0)));
    }
}
