//! Expression evaluator
//!
//! Expressions are bound once per stage against the stage's input schema,
//! turning column references into positions, and then evaluated per row (or
//! per group for inline aggregates in HAVING).
//!
//! Binding priority for a column reference:
//! 1. the stage's input schema
//! 2. enclosing query rows, innermost first (correlated subqueries)
//!
//! Evaluation rules:
//! - arithmetic and comparison propagate NULL
//! - AND / OR use three-valued logic and short-circuit
//! - COALESCE stops at the first non-NULL argument
//! - int op int stays int (division truncates); any decimal operand widens

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::planner::{
    AggregateFunc, BinaryOp, ColumnRef, DateUnit, Expr, Query, QueryError, QueryResult,
};
use crate::types::{DataType, Lookup, Row, RowSet, Schema, Value};

use super::aggregate::{result_type, Accumulator};

/// Rows of the enclosing queries visible to a correlated subquery,
/// innermost first
#[derive(Debug, Clone)]
pub struct OuterRow {
    layers: Vec<(Arc<Schema>, Row)>,
}

impl OuterRow {
    pub fn new(schema: Arc<Schema>, row: Row, parent: Option<&OuterRow>) -> Self {
        let mut layers = vec![(schema, row)];
        if let Some(parent) = parent {
            layers.extend(parent.layers.iter().cloned());
        }
        Self { layers }
    }

    fn lookup(&self, column: &ColumnRef) -> QueryResult<Option<Value>> {
        for (schema, row) in &self.layers {
            match schema.lookup(column.qualifier.as_deref(), &column.name) {
                Lookup::Found(i) => return Ok(Some(row.get(i).cloned().unwrap_or(Value::Null))),
                Lookup::Ambiguous => return Err(QueryError::ambiguous_column(column.to_string())),
                Lookup::Missing => continue,
            }
        }
        Ok(None)
    }
}

/// Runs nested queries on behalf of the evaluator
pub trait SubqueryRunner {
    fn run_subquery(&self, query: &Query, outer: &OuterRow) -> QueryResult<RowSet>;
}

/// Per-evaluation context
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub runner: &'a dyn SubqueryRunner,
    pub outer: Option<&'a OuterRow>,
}

/// Resolves column references of an expression tree against a schema
pub struct Binder<'a> {
    input: Arc<Schema>,
    members: Option<Arc<Schema>>,
    outer: Option<&'a OuterRow>,
}

impl<'a> Binder<'a> {
    pub fn new(input: Arc<Schema>, outer: Option<&'a OuterRow>) -> Self {
        Self {
            input,
            members: None,
            outer,
        }
    }

    /// Allows inline aggregates, evaluated over member rows of this schema
    pub fn with_members(mut self, members: Arc<Schema>) -> Self {
        self.members = Some(members);
        self
    }

    pub fn bind<'q>(&self, expr: &'q Expr) -> QueryResult<BoundExpr<'q>> {
        let bound = match expr {
            Expr::Literal(v) => BoundExpr::Literal(v.clone()),
            Expr::Column(column) => self.resolve(column)?,
            Expr::Binary { op, left, right } => BoundExpr::Binary {
                op: *op,
                left: Box::new(self.bind(left)?),
                right: Box::new(self.bind(right)?),
            },
            Expr::Not(inner) => BoundExpr::Not(Box::new(self.bind(inner)?)),
            Expr::Negate(inner) => BoundExpr::Negate(Box::new(self.bind(inner)?)),
            Expr::IsNull { expr, negated } => BoundExpr::IsNull {
                expr: Box::new(self.bind(expr)?),
                negated: *negated,
            },
            Expr::Coalesce(args) => BoundExpr::Coalesce(
                args.iter().map(|a| self.bind(a)).collect::<QueryResult<_>>()?,
            ),
            Expr::Like {
                expr,
                pattern,
                negated,
            } => BoundExpr::Like {
                expr: Box::new(self.bind(expr)?),
                regex: like_regex(pattern)?,
                negated: *negated,
            },
            Expr::InList {
                expr,
                list,
                negated,
            } => BoundExpr::InList {
                expr: Box::new(self.bind(expr)?),
                list: list.iter().map(|e| self.bind(e)).collect::<QueryResult<_>>()?,
                negated: *negated,
            },
            Expr::Round { expr, scale } => BoundExpr::Round {
                expr: Box::new(self.bind(expr)?),
                scale: *scale,
            },
            Expr::DateTrunc { unit, expr } => BoundExpr::DateTrunc {
                unit: *unit,
                expr: Box::new(self.bind(expr)?),
            },
            Expr::Aggregate(call) => {
                let members = self.members.clone().ok_or_else(|| {
                    QueryError::invalid_argument(format!(
                        "aggregate {} is only allowed in HAVING or as a grouped aggregate",
                        call
                    ))
                })?;
                let arg = match &call.arg {
                    Some(arg) => Some(Box::new(Binder::new(members, self.outer).bind(arg)?)),
                    None => None,
                };
                BoundExpr::Aggregate {
                    func: call.func,
                    distinct: call.distinct,
                    arg,
                }
            }
            Expr::ScalarSubquery(query) => BoundExpr::ScalarSubquery {
                query: query.as_ref(),
                schema: Arc::clone(&self.input),
            },
            Expr::Exists { query, negated } => BoundExpr::Exists {
                query: query.as_ref(),
                schema: Arc::clone(&self.input),
                negated: *negated,
            },
        };
        Ok(bound)
    }

    fn resolve<'q>(&self, column: &ColumnRef) -> QueryResult<BoundExpr<'q>> {
        match self.input.lookup(column.qualifier.as_deref(), &column.name) {
            Lookup::Found(index) => Ok(BoundExpr::Column {
                index,
                data_type: self
                    .input
                    .column(index)
                    .map(|c| c.data_type)
                    .unwrap_or(DataType::Any),
            }),
            Lookup::Ambiguous => Err(QueryError::ambiguous_column(column.to_string())),
            Lookup::Missing => {
                // correlated reference: the outer value is fixed for this binding
                if let Some(outer) = self.outer {
                    if let Some(value) = outer.lookup(column)? {
                        return Ok(BoundExpr::Literal(value));
                    }
                }
                Err(QueryError::unknown_column(column.to_string()))
            }
        }
    }
}

/// Expression with column references resolved to positions
#[derive(Debug)]
pub enum BoundExpr<'q> {
    Literal(Value),
    Column {
        index: usize,
        data_type: DataType,
    },
    Binary {
        op: BinaryOp,
        left: Box<BoundExpr<'q>>,
        right: Box<BoundExpr<'q>>,
    },
    Not(Box<BoundExpr<'q>>),
    Negate(Box<BoundExpr<'q>>),
    IsNull {
        expr: Box<BoundExpr<'q>>,
        negated: bool,
    },
    Coalesce(Vec<BoundExpr<'q>>),
    Like {
        expr: Box<BoundExpr<'q>>,
        regex: Regex,
        negated: bool,
    },
    InList {
        expr: Box<BoundExpr<'q>>,
        list: Vec<BoundExpr<'q>>,
        negated: bool,
    },
    Round {
        expr: Box<BoundExpr<'q>>,
        scale: u32,
    },
    DateTrunc {
        unit: DateUnit,
        expr: Box<BoundExpr<'q>>,
    },
    Aggregate {
        func: AggregateFunc,
        distinct: bool,
        arg: Option<Box<BoundExpr<'q>>>,
    },
    ScalarSubquery {
        query: &'q Query,
        schema: Arc<Schema>,
    },
    Exists {
        query: &'q Query,
        schema: Arc<Schema>,
        negated: bool,
    },
}

impl BoundExpr<'_> {
    /// Evaluates against a single row
    pub fn eval(&self, row: &Row, ctx: &EvalContext<'_>) -> QueryResult<Value> {
        self.eval_in(row, None, ctx)
    }

    /// Evaluates against a group row; inline aggregates range over `members`
    pub fn eval_group(&self, row: &Row, members: &[Row], ctx: &EvalContext<'_>) -> QueryResult<Value> {
        self.eval_in(row, Some(members), ctx)
    }

    /// Predicate evaluation: NULL and false both reject the row
    pub fn matches(&self, row: &Row, ctx: &EvalContext<'_>) -> QueryResult<bool> {
        truth(self.eval(row, ctx)?)
    }

    pub fn matches_group(&self, row: &Row, members: &[Row], ctx: &EvalContext<'_>) -> QueryResult<bool> {
        truth(self.eval_group(row, members, ctx)?)
    }

    /// Static result type; `Any` when only known at run time
    pub fn data_type(&self) -> DataType {
        match self {
            BoundExpr::Literal(v) => v.data_type(),
            BoundExpr::Column { data_type, .. } => *data_type,
            BoundExpr::Binary { op, left, right } => {
                if op.is_arithmetic() {
                    arithmetic_type(left.data_type(), right.data_type())
                } else {
                    DataType::Bool
                }
            }
            BoundExpr::Not(_)
            | BoundExpr::IsNull { .. }
            | BoundExpr::Like { .. }
            | BoundExpr::InList { .. }
            | BoundExpr::Exists { .. } => DataType::Bool,
            BoundExpr::Negate(inner) | BoundExpr::Round { expr: inner, .. } => inner.data_type(),
            BoundExpr::Coalesce(args) => args
                .iter()
                .map(BoundExpr::data_type)
                .find(|t| *t != DataType::Any)
                .unwrap_or(DataType::Any),
            BoundExpr::DateTrunc { .. } => DataType::Timestamp,
            BoundExpr::Aggregate { func, arg, .. } => {
                result_type(*func, arg.as_ref().map(|a| a.data_type()))
            }
            BoundExpr::ScalarSubquery { .. } => DataType::Any,
        }
    }

    fn eval_in(&self, row: &Row, members: Option<&[Row]>, ctx: &EvalContext<'_>) -> QueryResult<Value> {
        match self {
            BoundExpr::Literal(v) => Ok(v.clone()),
            BoundExpr::Column { index, .. } => Ok(row.get(*index).cloned().unwrap_or(Value::Null)),
            BoundExpr::Binary { op, left, right } => match op {
                BinaryOp::And => {
                    let l = logical_operand(left.eval_in(row, members, ctx)?)?;
                    if l == Some(false) {
                        return Ok(Value::Bool(false));
                    }
                    let r = logical_operand(right.eval_in(row, members, ctx)?)?;
                    Ok(match (l, r) {
                        (_, Some(false)) => Value::Bool(false),
                        (Some(true), Some(true)) => Value::Bool(true),
                        _ => Value::Null,
                    })
                }
                BinaryOp::Or => {
                    let l = logical_operand(left.eval_in(row, members, ctx)?)?;
                    if l == Some(true) {
                        return Ok(Value::Bool(true));
                    }
                    let r = logical_operand(right.eval_in(row, members, ctx)?)?;
                    Ok(match (l, r) {
                        (_, Some(true)) => Value::Bool(true),
                        (Some(false), Some(false)) => Value::Bool(false),
                        _ => Value::Null,
                    })
                }
                op if op.is_arithmetic() => arithmetic(
                    *op,
                    left.eval_in(row, members, ctx)?,
                    right.eval_in(row, members, ctx)?,
                ),
                op => {
                    let l = left.eval_in(row, members, ctx)?;
                    let r = right.eval_in(row, members, ctx)?;
                    Ok(match compare(&l, &r)? {
                        None => Value::Null,
                        Some(ordering) => Value::Bool(comparison_holds(*op, ordering)),
                    })
                }
            },
            BoundExpr::Not(inner) => Ok(match logical_operand(inner.eval_in(row, members, ctx)?)? {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            }),
            BoundExpr::Negate(inner) => match inner.eval_in(row, members, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| QueryError::invalid_argument("integer overflow in negation")),
                Value::Decimal(d) => Ok(Value::Decimal(-d)),
                other => Err(QueryError::type_mismatch(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            },
            BoundExpr::IsNull { expr, negated } => {
                let is_null = expr.eval_in(row, members, ctx)?.is_null();
                Ok(Value::Bool(is_null != *negated))
            }
            BoundExpr::Coalesce(args) => {
                for arg in args {
                    let value = arg.eval_in(row, members, ctx)?;
                    if !value.is_null() {
                        return Ok(value);
                    }
                }
                Ok(Value::Null)
            }
            BoundExpr::Like {
                expr,
                regex,
                negated,
            } => match expr.eval_in(row, members, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Text(s) => Ok(Value::Bool(regex.is_match(&s) != *negated)),
                other => Err(QueryError::type_mismatch(format!(
                    "LIKE expects text, got {}",
                    other.type_name()
                ))),
            },
            BoundExpr::InList {
                expr,
                list,
                negated,
            } => {
                let needle = expr.eval_in(row, members, ctx)?;
                if needle.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let candidate = item.eval_in(row, members, ctx)?;
                    match compare(&needle, &candidate)? {
                        Some(Ordering::Equal) => return Ok(Value::Bool(!*negated)),
                        None => saw_null = true,
                        Some(_) => {}
                    }
                }
                Ok(if saw_null {
                    Value::Null
                } else {
                    Value::Bool(*negated)
                })
            }
            BoundExpr::Round { expr, scale } => match expr.eval_in(row, members, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Decimal(d) => Ok(Value::Decimal(
                    d.round_dp_with_strategy(*scale, RoundingStrategy::MidpointAwayFromZero),
                )),
                other => Err(QueryError::type_mismatch(format!(
                    "ROUND expects a number, got {}",
                    other.type_name()
                ))),
            },
            BoundExpr::DateTrunc { unit, expr } => match expr.eval_in(row, members, ctx)? {
                Value::Null => Ok(Value::Null),
                Value::Timestamp(ts) => truncate_timestamp(*unit, ts),
                other => Err(QueryError::type_mismatch(format!(
                    "DATE_TRUNC expects a timestamp, got {}",
                    other.type_name()
                ))),
            },
            BoundExpr::Aggregate { func, distinct, arg } => {
                let members = members.ok_or_else(|| {
                    QueryError::invalid_argument("aggregate evaluated outside a group")
                })?;
                let mut acc = Accumulator::new(*func, *distinct)?;
                for member in members {
                    let value = match arg {
                        Some(arg) => Some(arg.eval(member, ctx)?),
                        None => None,
                    };
                    acc.update(value)?;
                }
                acc.finish()
            }
            BoundExpr::ScalarSubquery { query, schema } => {
                let outer = OuterRow::new(Arc::clone(schema), row.clone(), ctx.outer);
                let result = ctx.runner.run_subquery(query, &outer)?;
                let columns = result.schema().len();
                if result.len() > 1 || columns != 1 {
                    return Err(QueryError::scalar_subquery_cardinality(result.len(), columns));
                }
                Ok(result
                    .rows()
                    .first()
                    .and_then(|r| r.get(0).cloned())
                    .unwrap_or(Value::Null))
            }
            BoundExpr::Exists {
                query,
                schema,
                negated,
            } => {
                let outer = OuterRow::new(Arc::clone(schema), row.clone(), ctx.outer);
                let result = ctx.runner.run_subquery(query, &outer)?;
                Ok(Value::Bool(result.is_empty() == *negated))
            }
        }
    }
}

/// SQL comparison: None when either side is NULL.
///
/// Numbers compare across int/decimal; other types only compare with
/// themselves.
pub fn compare(a: &Value, b: &Value) -> QueryResult<Option<Ordering>> {
    let ordering = match (a, b) {
        (Value::Null, _) | (_, Value::Null) => return Ok(None),
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (x, y) => match (x.as_decimal(), y.as_decimal()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                return Err(QueryError::type_mismatch(format!(
                    "cannot compare {} with {}",
                    a.type_name(),
                    b.type_name()
                )))
            }
        },
    };
    Ok(Some(ordering))
}

fn comparison_holds(op: BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::NotEq => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::GtEq => ordering != Ordering::Less,
        _ => false,
    }
}

fn truth(value: Value) -> QueryResult<bool> {
    Ok(logical_operand(value)?.unwrap_or(false))
}

fn logical_operand(value: Value) -> QueryResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        other => Err(QueryError::type_mismatch(format!(
            "expected a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn arithmetic_type(left: DataType, right: DataType) -> DataType {
    match (left, right) {
        (DataType::Int, DataType::Int) => DataType::Int,
        (DataType::Decimal, _) | (_, DataType::Decimal) => DataType::Decimal,
        _ => DataType::Any,
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> QueryResult<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        return int_arithmetic(op, *a, *b);
    }

    match (left.as_decimal(), right.as_decimal()) {
        (Some(a), Some(b)) => decimal_arithmetic(op, a, b),
        _ => Err(QueryError::type_mismatch(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> QueryResult<Value> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0 {
        return Err(QueryError::division_by_zero());
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        _ => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| QueryError::invalid_argument(format!("integer overflow in {} {} {}", a, op.symbol(), b)))
}

fn decimal_arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> QueryResult<Value> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b.is_zero() {
        return Err(QueryError::division_by_zero());
    }
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        _ => None,
    };
    result
        .map(Value::Decimal)
        .ok_or_else(|| QueryError::invalid_argument(format!("numeric overflow in {} {} {}", a, op.symbol(), b)))
}

fn truncate_timestamp(unit: DateUnit, ts: chrono::NaiveDateTime) -> QueryResult<Value> {
    let date = match unit {
        DateUnit::Year => NaiveDate::from_ymd_opt(ts.year(), 1, 1),
        DateUnit::Month => NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1),
        DateUnit::Day => Some(ts.date()),
    };
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Value::Timestamp)
        .ok_or_else(|| QueryError::invalid_argument(format!("cannot truncate {} to {}", ts, unit.as_str())))
}

/// Anchored regex for a LIKE pattern (`%` any run, `_` one character)
fn like_regex(pattern: &str) -> QueryResult<Regex> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => source.push_str(".*"),
            '_' => source.push('.'),
            other => source.push_str(&regex::escape(&other.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source)
        .map_err(|e| QueryError::invalid_argument(format!("invalid LIKE pattern '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{coalesce, col, dec, lit, QueryErrorCode};
    use crate::types::Column;

    struct NoSubqueries;

    impl SubqueryRunner for NoSubqueries {
        fn run_subquery(&self, _query: &Query, _outer: &OuterRow) -> QueryResult<RowSet> {
            Err(QueryError::invalid_argument("no subqueries in this test"))
        }
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Column::qualified("p", "id", DataType::Int),
            Column::qualified("p", "name", DataType::Text),
            Column::qualified("p", "price", DataType::Decimal),
            Column::qualified("p", "stock", DataType::Int),
        ]))
    }

    fn row() -> Row {
        Row::new(vec![
            Value::Int(7),
            Value::from("Laptop Pro"),
            Value::Decimal(Decimal::new(125050, 2)),
            Value::Null,
        ])
    }

    fn eval(expr: Expr) -> QueryResult<Value> {
        let bound = Binder::new(schema(), None).bind(&expr)?;
        let runner = NoSubqueries;
        let ctx = EvalContext {
            runner: &runner,
            outer: None,
        };
        bound.eval(&row(), &ctx)
    }

    #[test]
    fn test_coalesce() {
        assert_eq!(
            eval(coalesce(vec![lit(Value::Null), lit(Value::Null), lit(5)])).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            eval(coalesce(vec![lit(Value::Null), lit(Value::Null)])).unwrap(),
            Value::Null
        );
        assert_eq!(
            eval(coalesce(vec![col("stock"), col("id")])).unwrap(),
            Value::Int(7)
        );
    }

    #[test]
    fn test_coalesce_short_circuits() {
        // the division would fail if evaluated
        let expr = coalesce(vec![lit(1), lit(1).divide(lit(0))]);
        assert_eq!(eval(expr).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval(col("id").times(lit(3))).unwrap(), Value::Int(21));
        assert_eq!(eval(col("id").divide(lit(2))).unwrap(), Value::Int(3));
        assert_eq!(eval(col("id").modulo(lit(4))).unwrap(), Value::Int(3));
        assert_eq!(
            eval(col("p.price").minus(dec("0.50"))).unwrap(),
            Value::Decimal(Decimal::new(1250, 0))
        );
        assert_eq!(eval(col("stock").plus(lit(1))).unwrap(), Value::Null);
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval(col("id").divide(lit(0))).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlDivisionByZero);
        let err = eval(col("price").divide(dec("0.00"))).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlDivisionByZero);
    }

    #[test]
    fn test_type_mismatch() {
        let err = eval(col("name").plus(lit(1))).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlTypeMismatch);
        let err = eval(col("name").gt(lit(1))).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlTypeMismatch);
    }

    #[test]
    fn test_three_valued_logic() {
        let unknown = col("stock").gt(lit(0));
        assert_eq!(eval(unknown.clone()).unwrap(), Value::Null);
        assert_eq!(
            eval(unknown.clone().and(lit(false))).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(eval(unknown.clone().or(lit(true))).unwrap(), Value::Bool(true));
        assert_eq!(eval(unknown.clone().and(lit(true))).unwrap(), Value::Null);
        assert_eq!(eval(unknown.not()).unwrap(), Value::Null);
    }

    #[test]
    fn test_like_and_in_list() {
        assert_eq!(eval(col("name").like("Lap%")).unwrap(), Value::Bool(true));
        assert_eq!(eval(col("name").like("_aptop Pro")).unwrap(), Value::Bool(true));
        assert_eq!(eval(col("name").like("lap%")).unwrap(), Value::Bool(false));
        assert_eq!(eval(col("name").not_like("%.%")).unwrap(), Value::Bool(true));

        assert_eq!(
            eval(col("id").in_list(vec![lit(1), lit(7)])).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval(col("id").in_list(vec![lit(1), lit(Value::Null)])).unwrap(),
            Value::Null
        );
        assert_eq!(
            eval(col("id").not_in_list(vec![lit(1), lit(2)])).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_round_half_away_from_zero() {
        assert_eq!(
            eval(dec("2.345").round(2)).unwrap(),
            Value::Decimal(Decimal::new(235, 2))
        );
        assert_eq!(
            eval(dec("-2.345").round(2)).unwrap(),
            Value::Decimal(Decimal::new(-235, 2))
        );
    }

    #[test]
    fn test_is_null() {
        assert_eq!(eval(col("stock").is_null()).unwrap(), Value::Bool(true));
        assert_eq!(eval(col("id").is_not_null()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_unknown_and_ambiguous_columns() {
        let err = eval(col("missing")).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlUnknownColumn);

        let joined = Arc::new(schema().concat(&Schema::new(vec![Column::qualified(
            "oi",
            "id",
            DataType::Int,
        )])));
        let err = Binder::new(joined, None).bind(&col("id")).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlAmbiguousColumn);
    }

    #[test]
    fn test_outer_reference_binds_as_constant() {
        let outer_schema = Arc::new(Schema::new(vec![Column::qualified("o", "limit", DataType::Int)]));
        let outer = OuterRow::new(outer_schema, Row::new(vec![Value::Int(10)]), None);
        let predicate = col("p.id").lt(col("o.limit"));
        let bound = Binder::new(schema(), Some(&outer)).bind(&predicate).unwrap();
        let runner = NoSubqueries;
        let ctx = EvalContext {
            runner: &runner,
            outer: Some(&outer),
        };
        assert_eq!(bound.eval(&row(), &ctx).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_inline_aggregate_requires_group() {
        let expr = crate::planner::count_star().expr();
        let err = Binder::new(schema(), None).bind(&expr).unwrap_err();
        assert_eq!(err.code(), QueryErrorCode::StoreqlInvalidArgument);
    }

    #[test]
    fn test_data_type_inference() {
        let binder = Binder::new(schema(), None);
        assert_eq!(binder.bind(&col("id").plus(lit(1))).unwrap().data_type(), DataType::Int);
        assert_eq!(
            binder.bind(&col("id").times(col("price"))).unwrap().data_type(),
            DataType::Decimal
        );
        assert_eq!(binder.bind(&col("id").gt(lit(1))).unwrap().data_type(), DataType::Bool);
    }
}
