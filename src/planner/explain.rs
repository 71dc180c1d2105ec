//! Explain output
//!
//! Deterministic, human-readable rendering of a composed pipeline, or of the
//! reason a query description was rejected.

use std::fmt;

use serde_json::{json, Value as JsonValue};

use super::errors::QueryError;
use super::planner::{QueryPlan, Stage};

#[derive(Debug, Clone)]
pub struct ExplainPlan {
    pub accepted: bool,
    /// One line per stage, in execution order
    pub stages: Vec<String>,
    pub rejection_code: Option<String>,
    pub rejection_reason: Option<String>,
}

impl ExplainPlan {
    pub fn from_plan(plan: &QueryPlan) -> Self {
        Self {
            accepted: true,
            stages: plan.stages.iter().map(describe).collect(),
            rejection_code: None,
            rejection_reason: None,
        }
    }

    pub fn from_error(err: &QueryError) -> Self {
        Self {
            accepted: false,
            stages: Vec::new(),
            rejection_code: Some(err.code().code().to_string()),
            rejection_reason: Some(err.message().to_string()),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        if self.accepted {
            json!({ "accepted": true, "stages": self.stages })
        } else {
            json!({
                "accepted": false,
                "code": self.rejection_code,
                "reason": self.rejection_reason,
            })
        }
    }
}

fn describe(stage: &Stage) -> String {
    let detail = match stage {
        Stage::MaterializeCtes { names } => names.join(", "),
        Stage::Scan { source } => source.clone(),
        Stage::Join { kind, source, on } => format!("{} {} ON {}", kind.as_str(), source, on),
        Stage::Filter { predicate } | Stage::Having { predicate } => predicate.clone(),
        Stage::Aggregate { keys, aggregates } => {
            if keys.is_empty() {
                format!("GLOBAL [{}]", aggregates.join(", "))
            } else {
                format!("BY {} [{}]", keys.join(", "), aggregates.join(", "))
            }
        }
        Stage::Window { spec, functions } => format!("{} OVER ({})", functions.join(", "), spec),
        Stage::Project { columns } => columns.join(", "),
        Stage::Distinct => String::new(),
        Stage::Sort { keys } => keys.join(", "),
        Stage::Limit { limit, offset } => match limit {
            Some(limit) => format!("{} OFFSET {}", limit, offset),
            None => format!("ALL OFFSET {}", offset),
        },
    };

    if detail.is_empty() {
        stage.name().to_string()
    } else {
        format!("{} {}", stage.name(), detail)
    }
}

impl fmt::Display for ExplainPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;

        if self.accepted {
            writeln!(f, "Status: ACCEPTED")?;
            for (i, stage) in self.stages.iter().enumerate() {
                writeln!(f, "{:>2}. {}", i + 1, stage)?;
            }
        } else {
            writeln!(f, "Status: REJECTED")?;
            if let Some(code) = &self.rejection_code {
                writeln!(f, "Error Code: {}", code)?;
            }
            if let Some(reason) = &self.rejection_reason {
                writeln!(f, "Reason: {}", reason)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ast::{col, count_star, lit, OrderKey, Query};
    use crate::planner::planner::QueryComposer;
    use crate::storage::MemoryStore;

    fn sample_plan() -> QueryPlan {
        let store = MemoryStore::with_catalog();
        let query = Query::from_aliased("products", "p")
            .inner_join("order_items", "oi", col("p.id").equals(col("oi.product_id")))
            .group_by(col("p.name"))
            .aggregate(count_star().alias("orders"))
            .order_by(OrderKey::desc(col("orders")))
            .limit(10);
        QueryComposer::new(&store).compose(&query).unwrap()
    }

    #[test]
    fn test_explain_accepted_plan() {
        let explain = ExplainPlan::from_plan(&sample_plan());
        assert!(explain.accepted);
        assert_eq!(explain.stages[0], "SCAN products AS p");
        assert_eq!(
            explain.stages[1],
            "JOIN INNER order_items AS oi ON (p.id = oi.product_id)"
        );
        assert_eq!(explain.stages[2], "AGGREGATE BY p.name [COUNT(*) AS orders]");
        assert_eq!(explain.stages.last().unwrap(), "LIMIT 10 OFFSET 0");

        let output = explain.to_string();
        assert!(output.contains("ACCEPTED"));
        assert!(output.contains(" 4. SORT orders DESC"));
    }

    #[test]
    fn test_explain_rejected_plan() {
        let store = MemoryStore::with_catalog();
        let err = QueryComposer::new(&store)
            .compose(&Query::from_table("nope").filter(col("a").equals(lit(1))))
            .unwrap_err();
        let explain = ExplainPlan::from_error(&err);

        assert!(!explain.accepted);
        assert_eq!(explain.rejection_code.as_deref(), Some("STOREQL_UNKNOWN_TABLE"));
        assert!(explain.to_string().contains("REJECTED"));
        assert_eq!(explain.to_json()["code"], "STOREQL_UNKNOWN_TABLE");
    }

    #[test]
    fn test_explain_deterministic() {
        let a = ExplainPlan::from_plan(&sample_plan()).to_string();
        let b = ExplainPlan::from_plan(&sample_plan()).to_string();
        assert_eq!(a, b);
    }
}
