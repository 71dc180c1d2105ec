//! Report catalog for storeql
//!
//! Named analytical queries over the e-commerce catalog, each expressed as a
//! query description. Reports are rebuilt on every lookup; a description is
//! plain data and carries no store state.

mod queries;

use crate::planner::Query;

/// A named, documented query description
#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Query,
}

impl Report {
    /// Builds a fresh query description for this report
    pub fn query(&self) -> Query {
        (self.build)()
    }
}

/// All reports, in listing order
pub const REPORTS: &[Report] = &[
    Report {
        name: "top_products_by_orders",
        description: "Ten products appearing in the most order lines",
        build: queries::top_products_by_orders,
    },
    Report {
        name: "avg_price_by_category",
        description: "Average product price per category, highest first",
        build: queries::avg_price_by_category,
    },
    Report {
        name: "top_spenders",
        description: "Five users with the largest total spend across their orders",
        build: queries::top_spenders,
    },
    Report {
        name: "units_sold_per_product",
        description: "Units sold per product, zero for products never ordered",
        build: queries::units_sold_per_product,
    },
    Report {
        name: "repeat_purchases",
        description: "User and product pairs ordered more than once",
        build: queries::repeat_purchases,
    },
    Report {
        name: "above_category_average",
        description: "Products priced above their category average (correlated subquery)",
        build: queries::above_category_average,
    },
    Report {
        name: "above_category_average_window",
        description: "Products priced above their category average (window average)",
        build: queries::above_category_average_window,
    },
    Report {
        name: "orders_above_median",
        description: "Orders whose total exceeds the median order total",
        build: queries::orders_above_median,
    },
    Report {
        name: "top3_per_category",
        description: "Three best-selling products of each category by quantity",
        build: queries::top3_per_category,
    },
    Report {
        name: "monthly_revenue_running",
        description: "Revenue per month with a running total and the previous month",
        build: queries::monthly_revenue_running,
    },
    Report {
        name: "avg_check_per_category",
        description: "Average order total of orders containing each category",
        build: queries::avg_check_per_category,
    },
];

/// Looks up a report by name
pub fn find(name: &str) -> Option<&'static Report> {
    REPORTS.iter().find(|r| r.name == name)
}
