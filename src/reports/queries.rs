//! Query descriptions behind the report catalog

use rust_decimal::Decimal;

use crate::planner::{
    avg, coalesce, col, count_star, date_trunc, lit, percentile_cont, scalar_subquery, sum,
    DateUnit, OrderKey, Query, WindowFrame, WindowFunction, WindowSpec,
};
use crate::types::Value;

pub fn top_products_by_orders() -> Query {
    Query::from_aliased("products", "p")
        .inner_join("order_items", "oi", col("p.id").equals(col("oi.product_id")))
        .group_by(col("p.id").alias("product_id"))
        .group_by(col("p.name").alias("product_name"))
        .aggregate(count_star().alias("order_count"))
        .order_by(OrderKey::desc(col("order_count")))
        .order_by(OrderKey::asc(col("product_id")))
        .limit(10)
}

pub fn avg_price_by_category() -> Query {
    Query::from_aliased("products", "p")
        .inner_join("products_categories", "pc", col("p.id").equals(col("pc.product_id")))
        .inner_join("categories", "c", col("pc.category_id").equals(col("c.id")))
        .group_by(col("c.id").alias("category_id"))
        .group_by(col("c.name").alias("category_name"))
        .aggregate(avg(col("p.price")).alias("avg_price"))
        .select(col("category_id"))
        .select(col("category_name"))
        .select(col("avg_price").round(2).alias("avg_price"))
        .order_by(OrderKey::desc(col("avg_price")))
}

pub fn top_spenders() -> Query {
    Query::from_aliased("users", "u")
        .inner_join("orders", "o", col("u.id").equals(col("o.user_id")))
        .inner_join("order_items", "oi", col("o.id").equals(col("oi.order_id")))
        .group_by(col("u.id").alias("user_id"))
        .group_by(col("u.name").alias("user_name"))
        .aggregate(sum(col("oi.quantity").times(col("oi.unit_price"))).alias("total_spent"))
        .order_by(OrderKey::desc(col("total_spent")))
        .order_by(OrderKey::asc(col("user_id")))
        .limit(5)
}

pub fn units_sold_per_product() -> Query {
    Query::from_aliased("products", "p")
        .left_join("order_items", "oi", col("p.id").equals(col("oi.product_id")))
        .group_by(col("p.id").alias("product_id"))
        .group_by(col("p.name").alias("product_name"))
        .aggregate(sum(col("oi.quantity")).alias("units"))
        .select(col("product_id"))
        .select(col("product_name"))
        .select(coalesce(vec![col("units"), lit(0)]).alias("total_sold"))
        .order_by(OrderKey::desc(col("total_sold")))
        .order_by(OrderKey::asc(col("product_id")))
}

pub fn repeat_purchases() -> Query {
    Query::from_aliased("order_items", "oi")
        .inner_join("orders", "o", col("oi.order_id").equals(col("o.id")))
        .group_by(col("o.user_id").alias("user_id"))
        .group_by(col("oi.product_id").alias("product_id"))
        .aggregate(count_star().alias("purchase_count"))
        .having(count_star().expr().gt(lit(1)))
        .order_by(OrderKey::asc(col("user_id")))
        .order_by(OrderKey::asc(col("product_id")))
}

/// Average price of the category the outer `pc` row belongs to
fn category_average() -> Query {
    Query::from_aliased("products", "p2")
        .inner_join("products_categories", "pc2", col("p2.id").equals(col("pc2.product_id")))
        .filter(col("pc2.category_id").equals(col("pc.category_id")))
        .aggregate(avg(col("p2.price")).alias("avg_price"))
}

pub fn above_category_average() -> Query {
    Query::from_aliased("products", "p")
        .inner_join("products_categories", "pc", col("p.id").equals(col("pc.product_id")))
        .filter(col("p.price").gt(scalar_subquery(category_average())))
        .select(col("p.id").alias("product_id"))
        .select(col("p.name").alias("name"))
        .select(col("pc.category_id").alias("category_id"))
        .select(col("p.price").alias("price"))
        .select(scalar_subquery(category_average()).round(2).alias("category_avg"))
        .order_by(OrderKey::asc(col("category_id")))
        .order_by(OrderKey::desc(col("price")))
}

pub fn above_category_average_window() -> Query {
    let priced = Query::from_aliased("products", "p")
        .inner_join("products_categories", "pc", col("p.id").equals(col("pc.product_id")))
        .window(
            WindowFunction::Aggregate(avg(col("p.price"))),
            WindowSpec::new().partition_by(col("pc.category_id")),
            "avg_price_in_category",
        )
        .select(col("p.id").alias("product_id"))
        .select(col("p.name").alias("name"))
        .select(col("pc.category_id").alias("category_id"))
        .select(col("p.price").alias("price"))
        .select(col("avg_price_in_category"));

    Query::from_table("priced")
        .with_cte("priced", priced)
        .filter(col("price").gt(col("avg_price_in_category")))
        .select(col("product_id"))
        .select(col("name"))
        .select(col("category_id"))
        .select(col("price"))
        .select(col("avg_price_in_category").round(2).alias("category_avg"))
        .order_by(OrderKey::asc(col("category_id")))
        .order_by(OrderKey::desc(col("price")))
}

pub fn orders_above_median() -> Query {
    let with_median = Query::from_table("orders")
        .window(
            WindowFunction::Aggregate(percentile_cont(Decimal::new(5, 1), col("total_amount"))),
            WindowSpec::new(),
            "median_total",
        )
        .select(col("id").alias("order_id"))
        .select(col("user_id"))
        .select(col("total_amount"))
        .select(col("median_total"));

    Query::from_table("order_stats")
        .with_cte("order_stats", with_median)
        .filter(col("total_amount").gt(col("median_total")))
        .order_by(OrderKey::desc(col("total_amount")))
        .order_by(OrderKey::asc(col("order_id")))
}

pub fn top3_per_category() -> Query {
    let product_sales = Query::from_aliased("products", "p")
        .inner_join("order_items", "oi", col("p.id").equals(col("oi.product_id")))
        .inner_join("products_categories", "pc", col("p.id").equals(col("pc.product_id")))
        .group_by(col("pc.category_id").alias("category_id"))
        .group_by(col("p.id").alias("product_id"))
        .group_by(col("p.name").alias("product_name"))
        .aggregate(sum(col("oi.quantity")).alias("total_sales"))
        .window(
            WindowFunction::Rank,
            WindowSpec::new()
                .partition_by(col("category_id"))
                .order_by(OrderKey::desc(col("total_sales"))),
            "rank",
        );

    Query::from_table("product_sales")
        .with_cte("product_sales", product_sales)
        .filter(col("rank").lt_eq(lit(3)))
        .order_by(OrderKey::asc(col("category_id")))
        .order_by(OrderKey::asc(col("rank")))
        .order_by(OrderKey::asc(col("product_id")))
}

pub fn monthly_revenue_running() -> Query {
    let by_month = WindowSpec::new().order_by(OrderKey::asc(col("month")));

    Query::from_table("orders")
        .filter(col("status").in_list(vec![lit("paid"), lit("shipped"), lit("delivered")]))
        .group_by(date_trunc(DateUnit::Month, col("created_at")).alias("month"))
        .aggregate(sum(col("total_amount")).alias("revenue"))
        .window(
            WindowFunction::Aggregate(sum(col("revenue"))),
            by_month.clone().frame(WindowFrame::Rows),
            "running_revenue",
        )
        .window(
            WindowFunction::lag(col("revenue"), 1, Value::Null),
            by_month,
            "previous_revenue",
        )
        .order_by(OrderKey::asc(col("month")))
}

pub fn avg_check_per_category() -> Query {
    let category_orders = Query::from_aliased("products_categories", "pc")
        .inner_join("products", "p", col("p.id").equals(col("pc.product_id")))
        .inner_join("order_items", "oi", col("oi.product_id").equals(col("p.id")))
        .select(col("pc.category_id").alias("category_id"))
        .select(col("oi.order_id").alias("order_id"))
        .distinct();

    Query::from_aliased("category_orders", "co")
        .with_cte("category_orders", category_orders)
        .inner_join("orders", "o", col("co.order_id").equals(col("o.id")))
        .inner_join("categories", "c", col("co.category_id").equals(col("c.id")))
        .group_by(col("c.id").alias("category_id"))
        .group_by(col("c.name").alias("category_name"))
        .aggregate(avg(col("o.total_amount")).alias("avg_check"))
        .select(col("category_id"))
        .select(col("category_name"))
        .select(col("avg_check").round(2).alias("avg_check"))
        .order_by(OrderKey::desc(col("avg_check")))
        .limit(10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::execute_query;
    use crate::planner::Query;
    use crate::storage::{seed_store, MemoryStore, SeedConfig};

    fn run(store: &MemoryStore, query: Query) -> crate::types::RowSet {
        execute_query(store, &query).unwrap().rows
    }

    #[test]
    fn test_units_sold_sorted_descending() {
        let store = seed_store(SeedConfig::default()).unwrap();
        let rows = run(&store, units_sold_per_product());
        let sold = rows.column_values("total_sold").unwrap();
        for pair in sold.windows(2) {
            assert!(pair[0].as_decimal() >= pair[1].as_decimal());
        }
    }

    #[test]
    fn test_repeat_purchases_counts_above_one() {
        let store = seed_store(SeedConfig::default()).unwrap();
        let rows = run(&store, repeat_purchases());
        for count in rows.column_values("purchase_count").unwrap() {
            assert!(count.as_int().unwrap() > 1);
        }
    }

    #[test]
    fn test_orders_above_median_is_at_most_half() {
        let store = seed_store(SeedConfig::default()).unwrap();
        let rows = run(&store, orders_above_median());
        assert!(rows.len() * 2 <= store.row_count("orders"));
    }

    #[test]
    fn test_monthly_revenue_first_month_has_no_previous() {
        let store = seed_store(SeedConfig::default()).unwrap();
        let rows = run(&store, monthly_revenue_running());
        assert!(!rows.is_empty());
        assert_eq!(rows.value(0, "previous_revenue"), Some(&Value::Null));
        assert_eq!(rows.value(0, "running_revenue"), rows.value(0, "revenue"));
    }

    #[test]
    fn test_avg_check_categories_distinct() {
        let store = seed_store(SeedConfig::default()).unwrap();
        let rows = run(&store, avg_check_per_category());
        let ids = rows.column_values("category_id").unwrap();
        let unique: std::collections::HashSet<Value> = ids.iter().cloned().collect();
        assert_eq!(unique.len(), ids.len());
    }
}
