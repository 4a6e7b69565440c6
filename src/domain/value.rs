//! Values held in the step state and produced by expressions.
//!
//! A value is either a scalar (numeric or boolean) or a time-indexed series
//! of one element type. Mixed scalar/series operations broadcast the scalar
//! onto the series index, coerced to the series' element type.

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::domain::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesData {
    Number(Vec<f64>),
    Bool(Vec<bool>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub index: Vec<NaiveDateTime>,
    pub data: SeriesData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Series(Series),
}

impl Series {
    pub fn numbers(index: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, EngineError> {
        check_len(index.len(), values.len())?;
        Ok(Series {
            index,
            data: SeriesData::Number(values),
        })
    }

    pub fn bools(index: Vec<NaiveDateTime>, values: Vec<bool>) -> Result<Self, EngineError> {
        check_len(index.len(), values.len())?;
        Ok(Series {
            index,
            data: SeriesData::Bool(values),
        })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Newest element as a scalar value.
    pub fn last(&self) -> Option<Value> {
        match &self.data {
            SeriesData::Number(v) => v.last().map(|&n| Value::Number(n)),
            SeriesData::Bool(v) => v.last().map(|&b| Value::Bool(b)),
        }
    }

    /// Elements as numbers; booleans become 1.0 / 0.0.
    pub fn to_numbers(&self) -> Vec<f64> {
        match &self.data {
            SeriesData::Number(v) => v.clone(),
            SeriesData::Bool(v) => v.iter().map(|&b| bool_to_number(b)).collect(),
        }
    }

    /// Broadcast a scalar onto this series' index, coerced to its element type.
    pub fn broadcast(&self, scalar: &Value) -> Result<Series, EngineError> {
        let n = self.len();
        let data = match (&self.data, scalar) {
            (SeriesData::Number(_), Value::Number(x)) => SeriesData::Number(vec![*x; n]),
            (SeriesData::Number(_), Value::Bool(b)) => SeriesData::Number(vec![bool_to_number(*b); n]),
            (SeriesData::Bool(_), Value::Bool(b)) => SeriesData::Bool(vec![*b; n]),
            (SeriesData::Bool(_), Value::Number(x)) => SeriesData::Bool(vec![number_to_bool(*x); n]),
            (_, Value::Series(_)) => {
                return Err(EngineError::TypeMismatch {
                    reason: "cannot broadcast a series".to_string(),
                });
            }
        };
        Ok(Series {
            index: self.index.clone(),
            data,
        })
    }

    /// Restrict both series to their shared timestamps, in `self`'s order.
    pub fn align(&self, other: &Series) -> Result<(Series, Series), EngineError> {
        if self.index == other.index {
            return Ok((self.clone(), other.clone()));
        }
        let positions: HashMap<NaiveDateTime, usize> = other
            .index
            .iter()
            .enumerate()
            .map(|(i, ts)| (*ts, i))
            .collect();
        let pairs: Vec<(usize, usize)> = self
            .index
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| positions.get(ts).map(|&j| (i, j)))
            .collect();
        if pairs.is_empty() {
            return Err(EngineError::SeriesMismatch {
                reason: "operands share no timestamps".to_string(),
            });
        }
        let left: Vec<usize> = pairs.iter().map(|&(i, _)| i).collect();
        let right: Vec<usize> = pairs.iter().map(|&(_, j)| j).collect();
        Ok((self.select(&left), other.select(&right)))
    }

    fn select(&self, positions: &[usize]) -> Series {
        let index = positions.iter().map(|&i| self.index[i]).collect();
        let data = match &self.data {
            SeriesData::Number(v) => SeriesData::Number(positions.iter().map(|&i| v[i]).collect()),
            SeriesData::Bool(v) => SeriesData::Bool(positions.iter().map(|&i| v[i]).collect()),
        };
        Series { index, data }
    }
}

impl Value {
    /// Reduce a series to its newest element; scalars pass through.
    pub fn latest(&self) -> Option<Value> {
        match self {
            Value::Series(s) => s.last(),
            scalar => Some(scalar.clone()),
        }
    }

    /// Truth of the newest element. NaN is false.
    pub fn truthy(&self) -> bool {
        match self.latest() {
            Some(Value::Bool(b)) => b,
            Some(Value::Number(n)) => number_to_bool(n),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.latest()? {
            Value::Number(n) => Some(n),
            Value::Bool(b) => Some(bool_to_number(b)),
            Value::Series(_) => None,
        }
    }

    pub fn is_series(&self) -> bool {
        matches!(self, Value::Series(_))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Series> for Value {
    fn from(s: Series) -> Self {
        Value::Series(s)
    }
}

pub(crate) fn bool_to_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub(crate) fn number_to_bool(n: f64) -> bool {
    n != 0.0 && !n.is_nan()
}

fn check_len(index: usize, values: usize) -> Result<(), EngineError> {
    if index != values {
        return Err(EngineError::SeriesMismatch {
            reason: format!("{} values for {} timestamps", values, index),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(i)
    }

    fn idx(range: std::ops::Range<i64>) -> Vec<NaiveDateTime> {
        range.map(ts).collect()
    }

    #[test]
    fn constructor_rejects_length_mismatch() {
        assert!(Series::numbers(idx(0..3), vec![1.0, 2.0]).is_err());
        assert!(Series::bools(idx(0..2), vec![true, false]).is_ok());
    }

    #[test]
    fn latest_and_truthiness() {
        let s = Series::numbers(idx(0..3), vec![1.0, 0.0, 2.5]).unwrap();
        let v = Value::Series(s);
        assert_eq!(v.latest(), Some(Value::Number(2.5)));
        assert!(v.truthy());
        assert!(!Value::Number(f64::NAN).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Bool(true).truthy());
        assert_eq!(Value::Bool(true).as_number(), Some(1.0));
    }

    #[test]
    fn empty_series_is_falsy() {
        let s = Series::numbers(vec![], vec![]).unwrap();
        assert_eq!(Value::Series(s.clone()).latest(), None);
        assert!(!Value::Series(s).truthy());
    }

    #[test]
    fn broadcast_coerces_to_series_type() {
        let numbers = Series::numbers(idx(0..2), vec![1.0, 2.0]).unwrap();
        let b = numbers.broadcast(&Value::Bool(true)).unwrap();
        assert_eq!(b.data, SeriesData::Number(vec![1.0, 1.0]));
        assert_eq!(b.index, numbers.index);

        let bools = Series::bools(idx(0..2), vec![true, false]).unwrap();
        let b = bools.broadcast(&Value::Number(0.0)).unwrap();
        assert_eq!(b.data, SeriesData::Bool(vec![false, false]));
    }

    #[test]
    fn align_keeps_shared_timestamps() {
        let a = Series::numbers(idx(0..4), vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        let b = Series::numbers(idx(2..6), vec![20.0, 30.0, 40.0, 50.0]).unwrap();
        let (l, r) = a.align(&b).unwrap();
        assert_eq!(l.index, idx(2..4));
        assert_eq!(l.to_numbers(), vec![2.0, 3.0]);
        assert_eq!(r.to_numbers(), vec![20.0, 30.0]);
    }

    #[test]
    fn align_without_overlap_fails() {
        let a = Series::numbers(idx(0..2), vec![0.0, 1.0]).unwrap();
        let b = Series::numbers(idx(5..7), vec![0.0, 1.0]).unwrap();
        assert!(matches!(a.align(&b), Err(EngineError::SeriesMismatch { .. })));
    }
}
