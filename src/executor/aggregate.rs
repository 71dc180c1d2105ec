//! Aggregate accumulators
//!
//! One accumulator per (group, aggregate). NULL operands are ignored by every
//! aggregate except `COUNT(*)`. SUM, AVG, MIN, MAX and PERCENTILE_CONT over
//! no values yield NULL; COUNT yields 0.

use std::collections::HashSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::planner::{AggregateFunc, QueryError, QueryResult};
use crate::types::{DataType, Value};

use super::expression::compare;

#[derive(Debug, Clone)]
enum State {
    Count(i64),
    Sum(Option<Value>),
    Avg { sum: Decimal, count: i64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Percentile { p: Decimal, values: Vec<Decimal> },
}

/// Running state of one aggregate
#[derive(Debug, Clone)]
pub struct Accumulator {
    state: State,
    distinct: bool,
    seen: HashSet<Value>,
}

impl Accumulator {
    /// Fails with `InvalidArgument` for a percentile outside [0, 1]
    pub fn new(func: AggregateFunc, distinct: bool) -> QueryResult<Self> {
        let state = match func {
            AggregateFunc::Count => State::Count(0),
            AggregateFunc::Sum => State::Sum(None),
            AggregateFunc::Avg => State::Avg {
                sum: Decimal::ZERO,
                count: 0,
            },
            AggregateFunc::Min => State::Min(None),
            AggregateFunc::Max => State::Max(None),
            AggregateFunc::PercentileCont(p) => {
                check_percentile(p)?;
                State::Percentile {
                    p,
                    values: Vec::new(),
                }
            }
        };

        Ok(Self {
            state,
            distinct,
            seen: HashSet::new(),
        })
    }

    /// Feeds one row. `None` is the `COUNT(*)` operand: it counts the row
    /// whatever its contents.
    pub fn update(&mut self, value: Option<Value>) -> QueryResult<()> {
        let value = match value {
            None => {
                if let State::Count(n) = &mut self.state {
                    *n += 1;
                }
                return Ok(());
            }
            Some(Value::Null) => return Ok(()),
            Some(v) => v,
        };

        if self.distinct && !self.seen.insert(value.key()) {
            return Ok(());
        }

        match &mut self.state {
            State::Count(n) => *n += 1,
            State::Sum(total) => {
                let next = match total.take() {
                    None => require_numeric("SUM", value)?,
                    Some(current) => add(current, value)?,
                };
                *total = Some(next);
            }
            State::Avg { sum, count } => {
                let d = numeric_operand("AVG", &value)?;
                *sum = sum
                    .checked_add(d)
                    .ok_or_else(|| QueryError::invalid_argument("numeric overflow in AVG"))?;
                *count += 1;
            }
            State::Min(current) => {
                let replace = match current {
                    None => true,
                    Some(c) => compare(&value, c)? == Some(std::cmp::Ordering::Less),
                };
                if replace {
                    *current = Some(value);
                }
            }
            State::Max(current) => {
                let replace = match current {
                    None => true,
                    Some(c) => compare(&value, c)? == Some(std::cmp::Ordering::Greater),
                };
                if replace {
                    *current = Some(value);
                }
            }
            State::Percentile { values, .. } => {
                values.push(numeric_operand("PERCENTILE_CONT", &value)?);
            }
        }
        Ok(())
    }

    /// Current aggregate value; the accumulator keeps accepting rows
    pub fn finish(&self) -> QueryResult<Value> {
        match &self.state {
            State::Count(n) => Ok(Value::Int(*n)),
            State::Sum(total) => Ok(total.clone().unwrap_or(Value::Null)),
            State::Avg { sum, count } => {
                if *count == 0 {
                    return Ok(Value::Null);
                }
                sum.checked_div(Decimal::from(*count))
                    .map(Value::Decimal)
                    .ok_or_else(|| QueryError::invalid_argument("numeric overflow in AVG"))
            }
            State::Min(v) | State::Max(v) => Ok(v.clone().unwrap_or(Value::Null)),
            State::Percentile { p, values } => {
                let mut sorted = values.clone();
                Ok(percentile_cont(&mut sorted, *p)?
                    .map(Value::Decimal)
                    .unwrap_or(Value::Null))
            }
        }
    }
}

/// Result type of an aggregate given its argument type
pub fn result_type(func: AggregateFunc, arg: Option<DataType>) -> DataType {
    match func {
        AggregateFunc::Count => DataType::Int,
        AggregateFunc::Avg | AggregateFunc::PercentileCont(_) => DataType::Decimal,
        AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => {
            arg.unwrap_or(DataType::Any)
        }
    }
}

/// Continuous percentile by linear interpolation.
///
/// Sorts `values` in place. Returns None for an empty input.
pub fn percentile_cont(values: &mut [Decimal], p: Decimal) -> QueryResult<Option<Decimal>> {
    check_percentile(p)?;
    if values.is_empty() {
        return Ok(None);
    }
    values.sort();

    let overflow = || QueryError::invalid_argument("numeric overflow in PERCENTILE_CONT");
    let last = Decimal::from(values.len() - 1);
    let target = p.checked_mul(last).ok_or_else(overflow)?;
    let lower = target.floor();
    let i = lower.to_usize().ok_or_else(overflow)?;

    if i + 1 >= values.len() {
        return Ok(Some(values[values.len() - 1]));
    }

    let fraction = target - lower;
    if fraction.is_zero() {
        return Ok(Some(values[i]));
    }
    let step = values[i + 1]
        .checked_sub(values[i])
        .and_then(|gap| gap.checked_mul(fraction))
        .ok_or_else(overflow)?;
    values[i].checked_add(step).map(Some).ok_or_else(overflow)
}

fn check_percentile(p: Decimal) -> QueryResult<()> {
    if p < Decimal::ZERO || p > Decimal::ONE {
        return Err(QueryError::invalid_argument(format!(
            "PERCENTILE_CONT fraction {} is outside [0, 1]",
            p
        )));
    }
    Ok(())
}

fn numeric_operand(func: &str, value: &Value) -> QueryResult<Decimal> {
    value.as_decimal().ok_or_else(|| {
        QueryError::type_mismatch(format!("{} expects a number, got {}", func, value.type_name()))
    })
}

fn require_numeric(func: &str, value: Value) -> QueryResult<Value> {
    numeric_operand(func, &value)?;
    Ok(value)
}

fn add(current: Value, value: Value) -> QueryResult<Value> {
    match (&current, &value) {
        (Value::Int(a), Value::Int(b)) => match a.checked_add(*b) {
            Some(n) => Ok(Value::Int(n)),
            // widen instead of failing
            None => Ok(Value::Decimal(Decimal::from(*a) + Decimal::from(*b))),
        },
        _ => {
            let a = numeric_operand("SUM", &current)?;
            let b = numeric_operand("SUM", &value)?;
            a.checked_add(b)
                .map(Value::Decimal)
                .ok_or_else(|| QueryError::invalid_argument("numeric overflow in SUM"))
        }
    }
}
