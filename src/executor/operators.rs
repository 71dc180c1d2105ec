//! Relational operators
//!
//! Each operator consumes a `Relation` (schema + pull-based row stream) and
//! returns a new one. Scan, filter, project, join probe and limit stay lazy;
//! aggregation, DISTINCT and sorting materialize their input.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::planner::{
    AggregateSpec, BinaryOp, Expr, JoinKind, OrderKey, QueryErrorCode, QueryResult, SelectItem,
    SortDirection,
};
use crate::types::{Column, DataType, Row, RowSet, Schema, Value};

use super::aggregate::{result_type, Accumulator};
use super::expression::{Binder, BoundExpr, EvalContext};
use super::sorter::RowSorter;

/// Lazily produced rows
pub type RowStream<'a> = Box<dyn Iterator<Item = QueryResult<Row>> + 'a>;

/// A schema plus the rows flowing out of a stage
pub struct Relation<'a> {
    pub schema: Arc<Schema>,
    pub rows: RowStream<'a>,
}

impl<'a> Relation<'a> {
    pub fn from_rows(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self {
            schema,
            rows: Box::new(rows.into_iter().map(Ok)),
        }
    }

    /// Drains the stream; the first error aborts
    pub fn collect_rows(self) -> QueryResult<(Arc<Schema>, Vec<Row>)> {
        let rows = self.rows.collect::<QueryResult<Vec<Row>>>()?;
        Ok((self.schema, rows))
    }

    pub fn into_row_set(self) -> QueryResult<RowSet> {
        let (schema, rows) = self.collect_rows()?;
        Ok(RowSet::new(schema.as_ref().clone(), rows))
    }
}

/// Rows of a table, CTE or derived table with columns qualified by `alias`
pub fn scan<'a>(source: Arc<RowSet>, alias: &str, scanned: &'a Cell<u64>) -> Relation<'a> {
    let schema = Arc::new(source.schema().with_qualifier(alias));
    let count = source.len();
    let rows = (0..count).map(move |i| {
        scanned.set(scanned.get() + 1);
        Ok(source.rows()[i].clone())
    });
    Relation {
        schema,
        rows: Box::new(rows),
    }
}

/// Keeps rows whose predicate is true; NULL counts as false
pub fn filter<'a>(input: Relation<'a>, predicate: &'a Expr, ctx: EvalContext<'a>) -> QueryResult<Relation<'a>> {
    let bound = Binder::new(Arc::clone(&input.schema), ctx.outer).bind(predicate)?;
    let rows = input.rows.filter_map(move |row| match row {
        Ok(row) => match bound.matches(&row, &ctx) {
            Ok(true) => Some(Ok(row)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        },
        Err(e) => Some(Err(e)),
    });
    Ok(Relation {
        schema: input.schema,
        rows: Box::new(rows),
    })
}

/// Inner or left join.
///
/// Equality conjuncts between a left and a right column are hashed; the full
/// condition is still checked on every candidate pair. Without such a
/// conjunct every pair is tested.
pub fn join<'a>(
    left: Relation<'a>,
    right: Relation<'a>,
    kind: JoinKind,
    on: &'a Expr,
    ctx: EvalContext<'a>,
) -> QueryResult<Relation<'a>> {
    let left_width = left.schema.len();
    let (right_schema, right_rows) = right.collect_rows()?;
    let right_width = right_schema.len();
    let schema = Arc::new(left.schema.concat(&right_schema));

    let binder = Binder::new(Arc::clone(&schema), ctx.outer);
    let condition = binder.bind(on)?;
    let keys = equi_keys(on, &binder, left_width)?;
    let index = if keys.is_empty() {
        None
    } else {
        Some(build_index(&right_rows, &keys))
    };

    let rows = left.rows.flat_map(move |row| {
        let row = match row {
            Ok(row) => row,
            Err(e) => return vec![Err(e)],
        };

        let candidates: Vec<usize> = match &index {
            Some(index) => match probe_key(&row, &keys) {
                Some(key) => index.get(&key).cloned().unwrap_or_default(),
                None => Vec::new(),
            },
            None => (0..right_rows.len()).collect(),
        };

        let mut out = Vec::new();
        for i in candidates {
            let combined = row.concat(&right_rows[i]);
            match condition.matches(&combined, &ctx) {
                Ok(true) => out.push(Ok(combined)),
                Ok(false) => {}
                Err(e) => return vec![Err(e)],
            }
        }
        if out.is_empty() && kind == JoinKind::Left {
            out.push(Ok(row.pad_nulls(right_width)));
        }
        out
    });

    Ok(Relation {
        schema,
        rows: Box::new(rows),
    })
}

/// (left index, right index) pairs of `l = r` conjuncts
fn equi_keys(on: &Expr, binder: &Binder<'_>, left_width: usize) -> QueryResult<Vec<(usize, usize)>> {
    let mut conjuncts = Vec::new();
    split_conjuncts(on, &mut conjuncts);

    let mut keys = Vec::new();
    for conjunct in conjuncts {
        if let Expr::Binary {
            op: BinaryOp::Eq,
            left,
            right,
        } = conjunct
        {
            if let (Expr::Column(_), Expr::Column(_)) = (left.as_ref(), right.as_ref()) {
                let (l, r) = (binder.bind(left)?, binder.bind(right)?);
                if !hashable_pair(l.data_type(), r.data_type()) {
                    continue;
                }
                match (column_index(&l), column_index(&r)) {
                    (Some(l), Some(r)) if l < left_width && r >= left_width => {
                        keys.push((l, r - left_width))
                    }
                    (Some(l), Some(r)) if r < left_width && l >= left_width => {
                        keys.push((r, l - left_width))
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(keys)
}

/// Hashing is only sound when the pair compares without a type error
fn hashable_pair(left: DataType, right: DataType) -> bool {
    match (left, right) {
        (DataType::Any, _) | (_, DataType::Any) => false,
        (l, r) if l.is_numeric() && r.is_numeric() => true,
        (l, r) => l == r,
    }
}

fn split_conjuncts<'e>(expr: &'e Expr, out: &mut Vec<&'e Expr>) {
    match expr {
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            split_conjuncts(left, out);
            split_conjuncts(right, out);
        }
        other => out.push(other),
    }
}

fn column_index(bound: &BoundExpr<'_>) -> Option<usize> {
    match bound {
        BoundExpr::Column { index, .. } => Some(*index),
        _ => None,
    }
}

fn build_index(rows: &[Row], keys: &[(usize, usize)]) -> HashMap<Vec<Value>, Vec<usize>> {
    let mut index: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key: Option<Vec<Value>> = keys
            .iter()
            .map(|(_, r)| row.get(*r).filter(|v| !v.is_null()).map(Value::key))
            .collect();
        // NULL never equals anything
        if let Some(key) = key {
            index.entry(key).or_default().push(i);
        }
    }
    index
}

fn probe_key(row: &Row, keys: &[(usize, usize)]) -> Option<Vec<Value>> {
    keys.iter()
        .map(|(l, _)| row.get(*l).filter(|v| !v.is_null()).map(Value::key))
        .collect()
}

/// Group key column: aliased keys are unqualified, plain column references
/// keep their source name, other expressions are named by their text
fn key_column(item: &SelectItem, bound: &BoundExpr<'_>, input: &Schema) -> Column {
    let data_type = bound.data_type();
    if let Some(alias) = &item.alias {
        return Column::new(alias.clone(), data_type);
    }
    match (bound, &item.expr) {
        (BoundExpr::Column { index, .. }, Expr::Column(_)) => match input.column(*index) {
            Some(column) => column.clone(),
            None => Column::new(item.expr.to_string(), data_type),
        },
        _ => Column::new(item.expr.to_string(), data_type),
    }
}

struct Group {
    key: Vec<Value>,
    accumulators: Vec<Accumulator>,
    members: Vec<Row>,
}

/// GROUP BY + aggregates + HAVING.
///
/// Groups are emitted in order of first appearance. With no group keys the
/// whole input is one group, so exactly one row is produced even for an
/// empty input. With group keys, an empty input yields no rows.
pub fn group_aggregate<'a>(
    input: Relation<'a>,
    keys: &'a [SelectItem],
    aggregates: &'a [AggregateSpec],
    having: Option<&'a Expr>,
    ctx: EvalContext<'a>,
) -> QueryResult<Relation<'a>> {
    let binder = Binder::new(Arc::clone(&input.schema), ctx.outer);
    let bound_keys = keys
        .iter()
        .map(|k| binder.bind(&k.expr))
        .collect::<QueryResult<Vec<_>>>()?;
    let bound_args = aggregates
        .iter()
        .map(|a| a.call.arg.as_ref().map(|arg| binder.bind(arg)).transpose())
        .collect::<QueryResult<Vec<_>>>()?;

    let mut columns: Vec<Column> = keys
        .iter()
        .zip(bound_keys.iter())
        .map(|(item, bound)| key_column(item, bound, &input.schema))
        .collect();
    for (spec, arg) in aggregates.iter().zip(bound_args.iter()) {
        let data_type = result_type(spec.call.func, arg.as_ref().map(|a| a.data_type()));
        columns.push(Column::new(spec.alias.clone(), data_type));
    }
    let schema = Arc::new(Schema::new(columns));

    let keep_members = having.map(Expr::contains_aggregate).unwrap_or(false);
    let new_accumulators = || {
        aggregates
            .iter()
            .map(|a| Accumulator::new(a.call.func, a.call.distinct))
            .collect::<QueryResult<Vec<_>>>()
    };

    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<Vec<Value>, usize> = HashMap::new();
    if keys.is_empty() {
        groups.push(Group {
            key: Vec::new(),
            accumulators: new_accumulators()?,
            members: Vec::new(),
        });
        positions.insert(Vec::new(), 0);
    }

    for row in input.rows {
        let row = row?;
        let key = bound_keys
            .iter()
            .map(|k| k.eval(&row, &ctx))
            .collect::<QueryResult<Vec<_>>>()?;
        let lookup: Vec<Value> = key.iter().map(Value::key).collect();

        let position = match positions.get(&lookup) {
            Some(&p) => p,
            None => {
                groups.push(Group {
                    key,
                    accumulators: new_accumulators()?,
                    members: Vec::new(),
                });
                positions.insert(lookup, groups.len() - 1);
                groups.len() - 1
            }
        };

        let group = &mut groups[position];
        for (acc, arg) in group.accumulators.iter_mut().zip(bound_args.iter()) {
            let value = match arg {
                Some(arg) => Some(arg.eval(&row, &ctx)?),
                None => None,
            };
            acc.update(value)?;
        }
        if keep_members {
            group.members.push(row);
        }
    }

    let having = match having {
        Some(predicate) => Some(
            Binder::new(Arc::clone(&schema), ctx.outer)
                .with_members(Arc::clone(&input.schema))
                .bind(predicate)?,
        ),
        None => None,
    };

    let mut output = Vec::with_capacity(groups.len());
    for group in groups {
        let mut values = group.key;
        for acc in &group.accumulators {
            values.push(acc.finish()?);
        }
        let row = Row::new(values);
        if let Some(having) = &having {
            if !having.matches_group(&row, &group.members, &ctx)? {
                continue;
            }
        }
        output.push(row);
    }

    Ok(Relation::from_rows(schema, output))
}

/// A projected relation whose rows carry trailing sort key columns
pub struct Projected<'a> {
    pub relation: Relation<'a>,
    /// Number of visible (selected) columns
    pub width: usize,
}

/// Computes the SELECT list and appends one hidden column per ORDER BY key.
///
/// Sort keys resolve against the projected columns first and fall back to
/// the input columns. An empty SELECT list keeps every input column.
pub fn project<'a>(
    input: Relation<'a>,
    items: &'a [SelectItem],
    order_by: &'a [OrderKey],
    ctx: EvalContext<'a>,
) -> QueryResult<Projected<'a>> {
    let input_binder = Binder::new(Arc::clone(&input.schema), ctx.outer);

    let (projections, visible) = if items.is_empty() {
        (None, input.schema.as_ref().clone())
    } else {
        let bound = items
            .iter()
            .map(|item| input_binder.bind(&item.expr))
            .collect::<QueryResult<Vec<_>>>()?;
        let columns = items
            .iter()
            .zip(bound.iter())
            .map(|(item, b)| output_column(item, b, &input.schema))
            .collect();
        (Some(bound), Schema::new(columns))
    };
    let visible = Arc::new(visible);
    let width = visible.len();

    let output_binder = Binder::new(Arc::clone(&visible), None);
    let mut sort_keys = Vec::with_capacity(order_by.len());
    let mut schema = visible.as_ref().clone();
    for (i, key) in order_by.iter().enumerate() {
        let (bound, on_output) = match output_binder.bind(&key.expr) {
            Ok(bound) => (bound, true),
            Err(e) if e.code() == QueryErrorCode::StoreqlUnknownColumn => {
                (input_binder.bind(&key.expr)?, false)
            }
            Err(e) => return Err(e),
        };
        schema = schema.with_column(Column::new(format!("#sort{}", i), bound.data_type()));
        sort_keys.push((bound, on_output));
    }

    let rows = input.rows.map(move |row| {
        let row = row?;
        let visible_row = match &projections {
            Some(bound) => Row::new(
                bound
                    .iter()
                    .map(|b| b.eval(&row, &ctx))
                    .collect::<QueryResult<Vec<_>>>()?,
            ),
            None => row.clone(),
        };
        if sort_keys.is_empty() {
            return Ok(visible_row);
        }
        let mut keys = Vec::with_capacity(sort_keys.len());
        for (bound, on_output) in &sort_keys {
            let source = if *on_output { &visible_row } else { &row };
            keys.push(bound.eval(source, &ctx)?);
        }
        Ok(visible_row.extend(keys))
    });

    Ok(Projected {
        relation: Relation {
            schema: Arc::new(schema),
            rows: Box::new(rows),
        },
        width,
    })
}

fn output_column(item: &SelectItem, bound: &BoundExpr<'_>, input: &Schema) -> Column {
    match &item.alias {
        Some(alias) => Column::new(alias.clone(), bound.data_type()),
        None => key_column(item, bound, input),
    }
}

/// Keeps the first row for each distinct value of the first `width` columns
pub fn distinct<'a>(input: Relation<'a>, width: usize) -> Relation<'a> {
    let mut seen: HashSet<Vec<Value>> = HashSet::new();
    let rows = input.rows.filter_map(move |row| match row {
        Ok(row) => {
            let key: Vec<Value> = row.values().iter().take(width).map(Value::key).collect();
            if seen.insert(key) {
                Some(Ok(row))
            } else {
                None
            }
        }
        Err(e) => Some(Err(e)),
    });
    Relation {
        schema: input.schema,
        rows: Box::new(rows),
    }
}

/// Stable sort on the columns from `key_start` onward
pub fn order_by<'a>(input: Relation<'a>, key_start: usize, directions: Vec<SortDirection>) -> QueryResult<Relation<'a>> {
    let (schema, rows) = input.collect_rows()?;
    let mut keyed: Vec<(Vec<Value>, Row)> = rows
        .into_iter()
        .map(|row| (row.values().iter().skip(key_start).cloned().collect(), row))
        .collect();
    RowSorter::sort(&mut keyed, &directions);
    Ok(Relation::from_rows(
        schema,
        keyed.into_iter().map(|(_, row)| row).collect(),
    ))
}

/// Drops hidden trailing columns
pub fn truncate<'a>(input: Relation<'a>, width: usize) -> Relation<'a> {
    if input.schema.len() == width {
        return input;
    }
    let schema = Arc::new(input.schema.prefix(width));
    let rows = input.rows.map(move |row| row.map(|r| r.prefix(width)));
    Relation {
        schema,
        rows: Box::new(rows),
    }
}

/// Skips `offset` rows, then yields at most `limit`
pub fn limit<'a>(input: Relation<'a>, limit: Option<usize>, offset: usize) -> Relation<'a> {
    let rows = input.rows.skip(offset);
    let rows: RowStream<'a> = match limit {
        Some(n) => Box::new(rows.take(n)),
        None => Box::new(rows),
    };
    Relation {
        schema: input.schema,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::expression::{OuterRow, SubqueryRunner};
    use crate::planner::{col, count_star, lit, sum, Query, QueryError};
    use crate::types::DataType;

    struct NoSubqueries;

    impl SubqueryRunner for NoSubqueries {
        fn run_subquery(&self, _query: &Query, _outer: &OuterRow) -> QueryResult<RowSet> {
            Err(QueryError::invalid_argument("unused"))
        }
    }

    static RUNNER: NoSubqueries = NoSubqueries;

    fn ctx() -> EvalContext<'static> {
        EvalContext {
            runner: &RUNNER,
            outer: None,
        }
    }

    fn products() -> Arc<RowSet> {
        let schema = Schema::new(vec![
            Column::new("id", DataType::Int),
            Column::new("name", DataType::Text),
        ]);
        Arc::new(RowSet::new(
            schema,
            vec![
                Row::new(vec![Value::Int(1), Value::from("desk")]),
                Row::new(vec![Value::Int(2), Value::from("lamp")]),
                Row::new(vec![Value::Int(3), Value::from("chair")]),
            ],
        ))
    }

    fn items() -> Arc<RowSet> {
        let schema = Schema::new(vec![
            Column::new("product_id", DataType::Int),
            Column::new("quantity", DataType::Int),
        ]);
        Arc::new(RowSet::new(
            schema,
            vec![
                Row::new(vec![Value::Int(1), Value::Int(2)]),
                Row::new(vec![Value::Int(1), Value::Int(3)]),
                Row::new(vec![Value::Int(2), Value::Int(1)]),
                Row::new(vec![Value::Null, Value::Int(9)]),
            ],
        ))
    }

    #[test]
    fn test_scan_qualifies_and_counts() {
        let scanned = Cell::new(0);
        let rs = scan(products(), "p", &scanned).into_row_set().unwrap();
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.value(0, "p.name"), Some(&Value::from("desk")));
        assert_eq!(scanned.get(), 3);
    }

    #[test]
    fn test_limit_is_lazy() {
        let scanned = Cell::new(0);
        let rs = limit(scan(products(), "p", &scanned), Some(1), 0)
            .into_row_set()
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(scanned.get(), 1);
    }

    #[test]
    fn test_left_join_pads_unmatched() {
        let scanned = Cell::new(0);
        let on = col("p.id").equals(col("oi.product_id"));
        let rs = join(
            scan(products(), "p", &scanned),
            scan(items(), "oi", &scanned),
            JoinKind::Left,
            &on,
            ctx(),
        )
        .unwrap()
        .into_row_set()
        .unwrap();

        assert_eq!(rs.len(), 4);
        assert_eq!(rs.value(3, "p.name"), Some(&Value::from("chair")));
        assert_eq!(rs.value(3, "oi.quantity"), Some(&Value::Null));
    }

    #[test]
    fn test_inner_join_skips_null_keys() {
        let scanned = Cell::new(0);
        let on = col("p.id").equals(col("oi.product_id"));
        let rs = join(
            scan(products(), "p", &scanned),
            scan(items(), "oi", &scanned),
            JoinKind::Inner,
            &on,
            ctx(),
        )
        .unwrap()
        .into_row_set()
        .unwrap();
        assert_eq!(rs.len(), 3);
    }

    #[test]
    fn test_nested_loop_join() {
        let scanned = Cell::new(0);
        let on = col("p.id").lt(col("oi.quantity"));
        let rs = join(
            scan(products(), "p", &scanned),
            scan(items(), "oi", &scanned),
            JoinKind::Inner,
            &on,
            ctx(),
        )
        .unwrap()
        .into_row_set()
        .unwrap();
        // 1 < {2,3,9}, 2 < {3,9}, 3 < {9}
        assert_eq!(rs.len(), 6);
    }

    #[test]
    fn test_group_aggregate_empty_input_with_keys() {
        let empty = Arc::new(RowSet::empty(items().schema().clone()));
        let scanned = Cell::new(0);
        let keys = vec![SelectItem::from(col("oi.product_id"))];
        let aggs = vec![count_star().alias("n")];
        let rs = group_aggregate(scan(empty, "oi", &scanned), &keys, &aggs, None, ctx())
            .unwrap()
            .into_row_set()
            .unwrap();
        assert!(rs.is_empty());
    }

    #[test]
    fn test_global_aggregate_on_empty_input() {
        let empty = Arc::new(RowSet::empty(items().schema().clone()));
        let scanned = Cell::new(0);
        let aggs = vec![count_star().alias("n"), sum(col("quantity")).alias("total")];
        let rs = group_aggregate(scan(empty, "oi", &scanned), &[], &aggs, None, ctx())
            .unwrap()
            .into_row_set()
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.value(0, "n"), Some(&Value::Int(0)));
        assert_eq!(rs.value(0, "total"), Some(&Value::Null));
    }

    #[test]
    fn test_group_aggregate_null_keys_group_together() {
        let scanned = Cell::new(0);
        let keys = vec![SelectItem::from(col("product_id"))];
        let aggs = vec![sum(col("quantity")).alias("qty")];
        let rs = group_aggregate(scan(items(), "oi", &scanned), &keys, &aggs, None, ctx())
            .unwrap()
            .into_row_set()
            .unwrap();
        assert_eq!(rs.len(), 3);
        assert_eq!(rs.column_values("qty").unwrap(), vec![Value::Int(5), Value::Int(1), Value::Int(9)]);
        assert_eq!(rs.value(2, "oi.product_id"), Some(&Value::Null));
    }

    #[test]
    fn test_having_with_inline_aggregate() {
        let scanned = Cell::new(0);
        let keys = vec![SelectItem::from(col("product_id"))];
        let aggs = vec![sum(col("quantity")).alias("qty")];
        let having = count_star().expr().gt(lit(1));
        let rs = group_aggregate(scan(items(), "oi", &scanned), &keys, &aggs, Some(&having), ctx())
            .unwrap()
            .into_row_set()
            .unwrap();
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.value(0, "qty"), Some(&Value::Int(5)));
    }

    #[test]
    fn test_project_unknown_column() {
        let scanned = Cell::new(0);
        let items = vec![SelectItem::from(col("price"))];
        let err = project(scan(products(), "p", &scanned), &items, &[], ctx())
            .err()
            .unwrap();
        assert_eq!(err.code(), QueryErrorCode::StoreqlUnknownColumn);
    }

    #[test]
    fn test_order_by_non_selected_column() {
        let scanned = Cell::new(0);
        let select = vec![col("name").alias("product")];
        let keys = vec![OrderKey::desc(col("p.id"))];
        let projected = project(scan(products(), "p", &scanned), &select, &keys, ctx()).unwrap();
        let width = projected.width;
        let sorted = order_by(projected.relation, width, vec![SortDirection::Desc]).unwrap();
        let rs = truncate(sorted, width).into_row_set().unwrap();

        assert_eq!(rs.schema().len(), 1);
        assert_eq!(
            rs.column_values("product").unwrap(),
            vec![Value::from("chair"), Value::from("lamp"), Value::from("desk")]
        );
    }

    #[test]
    fn test_distinct_keeps_first() {
        let scanned = Cell::new(0);
        let select = vec![SelectItem::from(col("product_id"))];
        let projected = project(scan(items(), "oi", &scanned), &select, &[], ctx()).unwrap();
        let rs = distinct(projected.relation, projected.width).into_row_set().unwrap();
        assert_eq!(
            rs.column_values("product_id").unwrap(),
            vec![Value::Int(1), Value::Int(2), Value::Null]
        );
    }
}
