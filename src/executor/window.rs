//! Window engine
//!
//! Computes one value per input row from the row's window without
//! collapsing the input. Calls sharing a specification share one
//! partition + sort pass.
//!
//! Per specification:
//! 1. partition rows by the PARTITION BY tuple (NULL is one partition value)
//! 2. stable-sort each partition by ORDER BY; ties keep input order
//! 3. evaluate every call of the group over the ordered partition
//!
//! Output rows keep the input order and gain one column per call, in the
//! order the calls were requested.

use std::collections::HashMap;
use std::sync::Arc;

use crate::planner::{
    AggregateCall, AggregateFunc, QueryResult, SortDirection, WindowCall, WindowFrame,
    WindowFunction, WindowGroup,
};
use crate::types::{Column, DataType, Row, Value};

use super::aggregate::{result_type, Accumulator};
use super::expression::{Binder, BoundExpr, EvalContext};
use super::operators::Relation;
use super::sorter::RowSorter;

/// Rows of one partition, as input positions in window order
struct Partition {
    order: Vec<usize>,
}

/// Half-open ranges of `order` positions holding equal ORDER BY keys
fn peer_groups(order: &[usize], keys: &[Vec<Value>]) -> Vec<(usize, usize)> {
    let mut groups = Vec::new();
    let mut start = 0;
    for pos in 1..=order.len() {
        if pos == order.len() || !RowSorter::is_peer(&keys[order[pos]], &keys[order[start]]) {
            groups.push((start, pos));
            start = pos;
        }
    }
    groups
}

/// Applies every window call of the query to the input relation
pub fn apply_windows<'a>(
    input: Relation<'a>,
    groups: &'a [WindowGroup],
    calls: &'a [WindowCall],
    ctx: EvalContext<'a>,
) -> QueryResult<Relation<'a>> {
    let (schema, rows) = input.collect_rows()?;
    let binder = Binder::new(Arc::clone(&schema), ctx.outer);

    let mut results: Vec<Vec<Value>> = vec![Vec::new(); calls.len()];
    let mut types: Vec<DataType> = vec![DataType::Any; calls.len()];

    for group in groups {
        let partitions = partition(&rows, group, &binder, &ctx)?;
        let order_keys = order_keys(&rows, group, &binder, &ctx)?;
        let mut ordered = Vec::with_capacity(partitions.len());
        let directions: Vec<SortDirection> = group.spec.order_by.iter().map(|k| k.direction).collect();
        for mut members in partitions {
            RowSorter::sort_indices(&mut members, &order_keys, &directions);
            ordered.push(Partition { order: members });
        }

        for &call_index in &group.calls {
            let call = &calls[call_index];
            let mut values = vec![Value::Null; rows.len()];
            let data_type = evaluate_call(
                call,
                group.spec.effective_frame(),
                &rows,
                &ordered,
                &order_keys,
                &binder,
                &ctx,
                &mut values,
            )?;
            results[call_index] = values;
            types[call_index] = data_type;
        }
    }

    let mut out_schema = schema.as_ref().clone();
    for (call, data_type) in calls.iter().zip(types.iter()) {
        out_schema = out_schema.with_column(Column::new(call.alias.clone(), *data_type));
    }

    let output = rows
        .iter()
        .enumerate()
        .map(|(i, row)| row.extend(results.iter().map(|column| column[i].clone())))
        .collect();

    Ok(Relation::from_rows(Arc::new(out_schema), output))
}

/// Input positions per partition, partitions in order of first appearance
fn partition(
    rows: &[Row],
    group: &WindowGroup,
    binder: &Binder<'_>,
    ctx: &EvalContext<'_>,
) -> QueryResult<Vec<Vec<usize>>> {
    if group.spec.partition_by.is_empty() {
        return Ok(if rows.is_empty() {
            Vec::new()
        } else {
            vec![(0..rows.len()).collect()]
        });
    }

    let bound = group
        .spec
        .partition_by
        .iter()
        .map(|e| binder.bind(e))
        .collect::<QueryResult<Vec<_>>>()?;

    let mut partitions: Vec<Vec<usize>> = Vec::new();
    let mut positions: HashMap<Vec<Value>, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        let key = bound
            .iter()
            .map(|b| b.eval(row, ctx).map(|v| v.key()))
            .collect::<QueryResult<Vec<_>>>()?;
        match positions.get(&key) {
            Some(&p) => partitions[p].push(i),
            None => {
                positions.insert(key, partitions.len());
                partitions.push(vec![i]);
            }
        }
    }
    Ok(partitions)
}

fn order_keys(
    rows: &[Row],
    group: &WindowGroup,
    binder: &Binder<'_>,
    ctx: &EvalContext<'_>,
) -> QueryResult<Vec<Vec<Value>>> {
    let bound = group
        .spec
        .order_by
        .iter()
        .map(|k| binder.bind(&k.expr))
        .collect::<QueryResult<Vec<_>>>()?;
    rows.iter()
        .map(|row| {
            bound
                .iter()
                .map(|b| b.eval(row, ctx))
                .collect::<QueryResult<Vec<_>>>()
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn evaluate_call(
    call: &WindowCall,
    frame: WindowFrame,
    rows: &[Row],
    partitions: &[Partition],
    order_keys: &[Vec<Value>],
    binder: &Binder<'_>,
    ctx: &EvalContext<'_>,
    out: &mut [Value],
) -> QueryResult<DataType> {
    match &call.function {
        WindowFunction::RowNumber => {
            for partition in partitions {
                for (pos, &row) in partition.order.iter().enumerate() {
                    out[row] = Value::Int(pos as i64 + 1);
                }
            }
            Ok(DataType::Int)
        }
        WindowFunction::Rank | WindowFunction::DenseRank => {
            let dense = matches!(call.function, WindowFunction::DenseRank);
            for partition in partitions {
                let mut dense_rank = 0i64;
                for (start, end) in peer_groups(&partition.order, order_keys) {
                    dense_rank += 1;
                    let rank = if dense { dense_rank } else { start as i64 + 1 };
                    for &row in &partition.order[start..end] {
                        out[row] = Value::Int(rank);
                    }
                }
            }
            Ok(DataType::Int)
        }
        WindowFunction::Aggregate(agg) => {
            let arg = match &agg.arg {
                Some(arg) => Some(binder.bind(arg)?),
                None => None,
            };
            let operands = rows
                .iter()
                .map(|row| arg.as_ref().map(|a| a.eval(row, ctx)).transpose())
                .collect::<QueryResult<Vec<Option<Value>>>>()?;

            // percentiles always see the whole partition
            let frame = match agg.func {
                AggregateFunc::PercentileCont(_) => WindowFrame::Partition,
                _ => frame,
            };
            for partition in partitions {
                aggregate_frame(agg, frame, partition, order_keys, &operands, out)?;
            }
            Ok(result_type(agg.func, arg.as_ref().map(BoundExpr::data_type)))
        }
        WindowFunction::Lag {
            expr,
            offset,
            default,
        }
        | WindowFunction::Lead {
            expr,
            offset,
            default,
        } => {
            let lag = matches!(call.function, WindowFunction::Lag { .. });
            let bound = binder.bind(expr)?;
            let values = rows
                .iter()
                .map(|row| bound.eval(row, ctx))
                .collect::<QueryResult<Vec<_>>>()?;

            for partition in partitions {
                let len = partition.order.len();
                for (pos, &row) in partition.order.iter().enumerate() {
                    let source = if lag {
                        pos.checked_sub(*offset)
                    } else {
                        pos.checked_add(*offset).filter(|p| *p < len)
                    };
                    out[row] = match source {
                        Some(p) => values[partition.order[p]].clone(),
                        None => default.clone(),
                    };
                }
            }

            let data_type = match bound.data_type() {
                DataType::Any => default.data_type(),
                other => other,
            };
            Ok(data_type)
        }
    }
}

fn aggregate_frame(
    agg: &AggregateCall,
    frame: WindowFrame,
    partition: &Partition,
    order_keys: &[Vec<Value>],
    operands: &[Option<Value>],
    out: &mut [Value],
) -> QueryResult<()> {
    let mut acc = Accumulator::new(agg.func, agg.distinct)?;

    match frame {
        WindowFrame::Partition => {
            for &row in &partition.order {
                acc.update(operands[row].clone())?;
            }
            let value = acc.finish()?;
            for &row in &partition.order {
                out[row] = value.clone();
            }
        }
        WindowFrame::Rows => {
            for &row in &partition.order {
                acc.update(operands[row].clone())?;
                out[row] = acc.finish()?;
            }
        }
        WindowFrame::Range => {
            // peers of the current row are inside its frame
            for (start, end) in peer_groups(&partition.order, order_keys) {
                for &row in &partition.order[start..end] {
                    acc.update(operands[row].clone())?;
                }
                let value = acc.finish()?;
                for &row in &partition.order[start..end] {
                    out[row] = value.clone();
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::expression::{OuterRow, SubqueryRunner};
    use crate::planner::{col, OrderKey, Query, QueryError, WindowSpec};
    use crate::types::{RowSet, Schema};

    struct NoSubqueries;

    impl SubqueryRunner for NoSubqueries {
        fn run_subquery(&self, _query: &Query, _outer: &OuterRow) -> QueryResult<RowSet> {
            Err(QueryError::invalid_argument("unused"))
        }
    }

    fn keys(values: &[i64]) -> Vec<Vec<Value>> {
        values.iter().map(|v| vec![Value::Int(*v)]).collect()
    }

    #[test]
    fn test_peer_groups() {
        let k = keys(&[10, 10, 5, 5, 1]);
        let groups = peer_groups(&[0, 1, 2, 3, 4], &k);
        assert_eq!(groups, vec![(0, 2), (2, 4), (4, 5)]);
    }

    #[test]
    fn test_peer_groups_empty() {
        assert!(peer_groups(&[], &[]).is_empty());
    }

    #[test]
    fn test_peer_groups_without_order_keys() {
        let k: Vec<Vec<Value>> = vec![Vec::new(); 3];
        assert_eq!(peer_groups(&[0, 1, 2], &k), vec![(0, 3)]);
    }

    #[test]
    fn test_running_frames_differ_on_ties() {
        let k = keys(&[1, 2, 2, 3]);
        let partition = Partition {
            order: vec![0, 1, 2, 3],
        };
        let operands: Vec<Option<Value>> =
            [1, 2, 2, 3].iter().map(|v| Some(Value::Int(*v))).collect();
        let agg = crate::planner::sum(crate::planner::col("x"));

        let mut rows_out = vec![Value::Null; 4];
        aggregate_frame(&agg, WindowFrame::Rows, &partition, &k, &operands, &mut rows_out).unwrap();
        assert_eq!(
            rows_out,
            vec![Value::Int(1), Value::Int(3), Value::Int(5), Value::Int(8)]
        );

        let mut range_out = vec![Value::Null; 4];
        aggregate_frame(&agg, WindowFrame::Range, &partition, &k, &operands, &mut range_out).unwrap();
        assert_eq!(
            range_out,
            vec![Value::Int(1), Value::Int(5), Value::Int(5), Value::Int(8)]
        );
    }

    #[test]
    fn test_offsets_past_partition_use_default() {
        let schema = Arc::new(Schema::new(vec![Column::new("id", DataType::Int)]));
        let input = Relation::from_rows(
            schema,
            vec![Row::new(vec![Value::Int(1)]), Row::new(vec![Value::Int(2)])],
        );
        let spec = WindowSpec::new().order_by(OrderKey::asc(col("id")));
        let calls = vec![
            WindowCall {
                function: WindowFunction::lead(col("id"), usize::MAX, -1i64),
                spec: spec.clone(),
                alias: "next".to_string(),
            },
            WindowCall {
                function: WindowFunction::lag(col("id"), usize::MAX, -1i64),
                spec: spec.clone(),
                alias: "prev".to_string(),
            },
        ];
        let groups = vec![WindowGroup {
            spec,
            calls: vec![0, 1],
        }];
        let runner = NoSubqueries;
        let ctx = EvalContext {
            runner: &runner,
            outer: None,
        };

        let rows = apply_windows(input, &groups, &calls, ctx)
            .unwrap()
            .into_row_set()
            .unwrap();
        for column in ["next", "prev"] {
            assert_eq!(
                rows.column_values(column).unwrap(),
                vec![Value::Int(-1), Value::Int(-1)]
            );
        }
    }
}
