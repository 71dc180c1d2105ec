//! Query description structures
//!
//! A query is an immutable value assembled with consuming builder methods and
//! handed whole to the composer. Clause order in the builder does not matter;
//! the composer always evaluates in canonical SQL order.

use std::fmt;

use rust_decimal::Decimal;

use crate::types::Value;

/// Column reference, optionally qualified by a table alias
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    /// Parses `name` or `alias.name`
    pub fn parse(reference: &str) -> Self {
        match reference.split_once('.') {
            Some((qualifier, name)) => Self {
                qualifier: Some(qualifier.to_string()),
                name: name.to_string(),
            },
            None => Self {
                qualifier: None,
                name: reference.to_string(),
            },
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }
}

/// Truncation unit for `DATE_TRUNC`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Month,
    Day,
}

impl DateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateUnit::Year => "year",
            DateUnit::Month => "month",
            DateUnit::Day => "day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    /// Continuous percentile with fraction `p` in [0, 1]
    PercentileCont(Decimal),
}

impl AggregateFunc {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::PercentileCont(_) => "PERCENTILE_CONT",
        }
    }
}

/// Aggregate function applied to an argument (`None` = `COUNT(*)`)
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: AggregateFunc,
    pub arg: Option<Box<Expr>>,
    pub distinct: bool,
}

impl AggregateCall {
    /// Only distinct argument values are aggregated
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Use as a column-producing aggregate in a grouped query
    pub fn alias(self, alias: impl Into<String>) -> AggregateSpec {
        AggregateSpec {
            call: self,
            alias: alias.into(),
        }
    }

    /// Use inline inside a HAVING predicate
    pub fn expr(self) -> Expr {
        Expr::Aggregate(self)
    }
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        match (&self.func, &self.arg) {
            (AggregateFunc::PercentileCont(p), Some(arg)) => {
                write!(f, "PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})", p, arg)
            }
            (func, Some(arg)) => write!(f, "{}({}{})", func.name(), distinct, arg),
            (func, None) => write!(f, "{}(*)", func.name()),
        }
    }
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(ColumnRef),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Negate(Box<Expr>),
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// First non-NULL argument, evaluated left to right
    Coalesce(Vec<Expr>),
    /// `%` matches any run, `_` matches one character
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// Round half away from zero to `scale` decimal places
    Round {
        expr: Box<Expr>,
        scale: u32,
    },
    DateTrunc {
        unit: DateUnit,
        expr: Box<Expr>,
    },
    /// Only valid where a group of rows is in scope (HAVING)
    Aggregate(AggregateCall),
    /// Subquery yielding at most one row and exactly one column
    ScalarSubquery(Box<Query>),
    Exists {
        query: Box<Query>,
        negated: bool,
    },
}

impl Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }

    pub fn equals(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    pub fn not_equals(self, right: Expr) -> Expr {
        self.binary(BinaryOp::NotEq, right)
    }

    pub fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    pub fn lt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::LtEq, right)
    }

    pub fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    pub fn gt_eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::GtEq, right)
    }

    pub fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    pub fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    pub fn plus(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Add, right)
    }

    pub fn minus(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Sub, right)
    }

    pub fn times(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Mul, right)
    }

    pub fn divide(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Div, right)
    }

    pub fn modulo(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Mod, right)
    }

    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn negate(self) -> Expr {
        Expr::Negate(Box::new(self))
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    pub fn like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    pub fn not_like(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    pub fn in_list(self, list: Vec<Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    pub fn not_in_list(self, list: Vec<Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list,
            negated: true,
        }
    }

    pub fn round(self, scale: u32) -> Expr {
        Expr::Round {
            expr: Box::new(self),
            scale,
        }
    }

    /// Attaches an output alias
    pub fn alias(self, alias: impl Into<String>) -> SelectItem {
        SelectItem {
            expr: self,
            alias: Some(alias.into()),
        }
    }

    /// Calls `f` on every subquery nested in this expression
    pub fn for_each_subquery<'q>(&'q self, f: &mut dyn FnMut(&'q Query)) {
        match self {
            Expr::Literal(_) | Expr::Column(_) => {}
            Expr::Binary { left, right, .. } => {
                left.for_each_subquery(f);
                right.for_each_subquery(f);
            }
            Expr::Not(e) | Expr::Negate(e) => e.for_each_subquery(f),
            Expr::IsNull { expr, .. }
            | Expr::Like { expr, .. }
            | Expr::Round { expr, .. }
            | Expr::DateTrunc { expr, .. } => expr.for_each_subquery(f),
            Expr::Coalesce(args) => {
                for arg in args {
                    arg.for_each_subquery(f);
                }
            }
            Expr::InList { expr, list, .. } => {
                expr.for_each_subquery(f);
                for item in list {
                    item.for_each_subquery(f);
                }
            }
            Expr::Aggregate(call) => {
                if let Some(arg) = &call.arg {
                    arg.for_each_subquery(f);
                }
            }
            Expr::ScalarSubquery(q) | Expr::Exists { query: q, .. } => f(q.as_ref()),
        }
    }

    /// Returns true if an aggregate call appears outside any subquery
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate(_) => true,
            Expr::Literal(_) | Expr::Column(_) | Expr::ScalarSubquery(_) | Expr::Exists { .. } => false,
            Expr::Binary { left, right, .. } => left.contains_aggregate() || right.contains_aggregate(),
            Expr::Not(e) | Expr::Negate(e) => e.contains_aggregate(),
            Expr::IsNull { expr, .. }
            | Expr::Like { expr, .. }
            | Expr::Round { expr, .. }
            | Expr::DateTrunc { expr, .. } => expr.contains_aggregate(),
            Expr::Coalesce(args) => args.iter().any(Expr::contains_aggregate),
            Expr::InList { expr, list, .. } => {
                expr.contains_aggregate() || list.iter().any(Expr::contains_aggregate)
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Column(c) => write!(f, "{}", c),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Not(e) => write!(f, "NOT {}", e),
            Expr::Negate(e) => write!(f, "-{}", e),
            Expr::IsNull { expr, negated } => {
                write!(f, "{} IS {}NULL", expr, if *negated { "NOT " } else { "" })
            }
            Expr::Coalesce(args) => {
                write!(f, "COALESCE(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Like { expr, pattern, negated } => write!(
                f,
                "{} {}LIKE '{}'",
                expr,
                if *negated { "NOT " } else { "" },
                pattern
            ),
            Expr::InList { expr, list, negated } => {
                write!(f, "{} {}IN (", expr, if *negated { "NOT " } else { "" })?;
                for (i, e) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
            Expr::Round { expr, scale } => write!(f, "ROUND({}, {})", expr, scale),
            Expr::DateTrunc { unit, expr } => write!(f, "DATE_TRUNC('{}', {})", unit.as_str(), expr),
            Expr::Aggregate(call) => write!(f, "{}", call),
            Expr::ScalarSubquery(_) => write!(f, "(subquery)"),
            Expr::Exists { negated, .. } => {
                write!(f, "{}EXISTS (subquery)", if *negated { "NOT " } else { "" })
            }
        }
    }
}

/// Column reference from `name` or `alias.name`
pub fn col(reference: &str) -> Expr {
    Expr::Column(ColumnRef::parse(reference))
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// Decimal literal from a string such as `"0.5"`; invalid text becomes NULL
pub fn dec(text: &str) -> Expr {
    Expr::Literal(text.parse::<Decimal>().map(Value::Decimal).unwrap_or(Value::Null))
}

pub fn coalesce(args: Vec<Expr>) -> Expr {
    Expr::Coalesce(args)
}

pub fn date_trunc(unit: DateUnit, expr: Expr) -> Expr {
    Expr::DateTrunc {
        unit,
        expr: Box::new(expr),
    }
}

pub fn scalar_subquery(query: Query) -> Expr {
    Expr::ScalarSubquery(Box::new(query))
}

pub fn exists(query: Query) -> Expr {
    Expr::Exists {
        query: Box::new(query),
        negated: false,
    }
}

pub fn not_exists(query: Query) -> Expr {
    Expr::Exists {
        query: Box::new(query),
        negated: true,
    }
}

fn aggregate(func: AggregateFunc, arg: Option<Expr>) -> AggregateCall {
    AggregateCall {
        func,
        arg: arg.map(Box::new),
        distinct: false,
    }
}

pub fn count_star() -> AggregateCall {
    aggregate(AggregateFunc::Count, None)
}

pub fn count(arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::Count, Some(arg))
}

pub fn sum(arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::Sum, Some(arg))
}

pub fn avg(arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::Avg, Some(arg))
}

pub fn min(arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::Min, Some(arg))
}

pub fn max(arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::Max, Some(arg))
}

/// `PERCENTILE_CONT(p) WITHIN GROUP (ORDER BY arg)`
pub fn percentile_cont(p: Decimal, arg: Expr) -> AggregateCall {
    aggregate(AggregateFunc::PercentileCont(p), Some(arg))
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderKey {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.expr, self.direction.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
        }
    }
}

/// A row source: base table or CTE by name, or a derived table
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    Table { name: String, alias: String },
    Subquery { query: Box<Query>, alias: String },
}

impl TableRef {
    pub fn table(name: impl Into<String>, alias: impl Into<String>) -> Self {
        TableRef::Table {
            name: name.into(),
            alias: alias.into(),
        }
    }

    pub fn subquery(query: Query, alias: impl Into<String>) -> Self {
        TableRef::Subquery {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            TableRef::Table { alias, .. } | TableRef::Subquery { alias, .. } => alias,
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Table { name, alias } if name == alias => write!(f, "{}", name),
            TableRef::Table { name, alias } => write!(f, "{} AS {}", name, alias),
            TableRef::Subquery { alias, .. } => write!(f, "(subquery) AS {}", alias),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: TableRef,
    pub on: Expr,
}

/// Output expression with optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl From<Expr> for SelectItem {
    fn from(expr: Expr) -> Self {
        SelectItem { expr, alias: None }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {}", self.expr, alias),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// Aggregate producing a named column of the grouped result
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSpec {
    pub call: AggregateCall,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowFunction {
    RowNumber,
    Rank,
    DenseRank,
    /// COUNT / SUM / AVG / MIN / MAX over the frame, PERCENTILE_CONT over the
    /// whole partition
    Aggregate(AggregateCall),
    Lag {
        expr: Box<Expr>,
        offset: usize,
        default: Value,
    },
    Lead {
        expr: Box<Expr>,
        offset: usize,
        default: Value,
    },
}

impl WindowFunction {
    pub fn lag(expr: Expr, offset: usize, default: impl Into<Value>) -> Self {
        WindowFunction::Lag {
            expr: Box::new(expr),
            offset,
            default: default.into(),
        }
    }

    pub fn lead(expr: Expr, offset: usize, default: impl Into<Value>) -> Self {
        WindowFunction::Lead {
            expr: Box::new(expr),
            offset,
            default: default.into(),
        }
    }
}

impl fmt::Display for WindowFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowFunction::RowNumber => write!(f, "ROW_NUMBER()"),
            WindowFunction::Rank => write!(f, "RANK()"),
            WindowFunction::DenseRank => write!(f, "DENSE_RANK()"),
            WindowFunction::Aggregate(call) => write!(f, "{}", call),
            WindowFunction::Lag { expr, offset, default } => {
                write!(f, "LAG({}, {}, {})", expr, offset, default)
            }
            WindowFunction::Lead { expr, offset, default } => {
                write!(f, "LEAD({}, {}, {})", expr, offset, default)
            }
        }
    }
}

/// Rows of the partition an aggregate window function sees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrame {
    /// Every row of the partition
    Partition,
    /// Partition start through the current row
    Rows,
    /// Partition start through the last peer of the current row
    Range,
}

impl WindowFrame {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowFrame::Partition => "ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING",
            WindowFrame::Rows => "ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW",
            WindowFrame::Range => "RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderKey>,
    pub frame: Option<WindowFrame>,
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, expr: Expr) -> Self {
        self.partition_by.push(expr);
        self
    }

    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order_by.push(key);
        self
    }

    pub fn frame(mut self, frame: WindowFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Explicit frame, or the SQL default: RANGE with ORDER BY, whole
    /// partition without
    pub fn effective_frame(&self) -> WindowFrame {
        match self.frame {
            Some(frame) => frame,
            None if self.order_by.is_empty() => WindowFrame::Partition,
            None => WindowFrame::Range,
        }
    }
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.partition_by.is_empty() {
            let keys: Vec<String> = self.partition_by.iter().map(|e| e.to_string()).collect();
            parts.push(format!("PARTITION BY {}", keys.join(", ")));
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self.order_by.iter().map(|k| k.to_string()).collect();
            parts.push(format!("ORDER BY {}", keys.join(", ")));
        }
        parts.push(self.effective_frame().as_str().to_string());
        write!(f, "{}", parts.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowCall {
    pub function: WindowFunction,
    pub spec: WindowSpec,
    pub alias: String,
}

/// Named, query-scoped intermediate result
#[derive(Debug, Clone, PartialEq)]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

/// Structured query description
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub from: TableRef,
    pub joins: Vec<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<SelectItem>,
    pub aggregates: Vec<AggregateSpec>,
    pub having: Option<Expr>,
    pub windows: Vec<WindowCall>,
    pub select: Vec<SelectItem>,
    pub distinct: bool,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Query {
    /// Query over a base table or CTE, aliased by its own name
    pub fn from_table(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::from_ref(TableRef::table(name.clone(), name))
    }

    /// Query over a base table or CTE with an explicit alias
    pub fn from_aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::from_ref(TableRef::table(name, alias))
    }

    /// Query over a derived table
    pub fn from_subquery(query: Query, alias: impl Into<String>) -> Self {
        Self::from_ref(TableRef::subquery(query, alias))
    }

    fn from_ref(from: TableRef) -> Self {
        Self {
            ctes: Vec::new(),
            from,
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            aggregates: Vec::new(),
            having: None,
            windows: Vec::new(),
            select: Vec::new(),
            distinct: false,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_cte(mut self, name: impl Into<String>, query: Query) -> Self {
        self.ctes.push(Cte {
            name: name.into(),
            query,
        });
        self
    }

    pub fn join(mut self, kind: JoinKind, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join { kind, table, on });
        self
    }

    pub fn inner_join(self, name: &str, alias: &str, on: Expr) -> Self {
        self.join(JoinKind::Inner, TableRef::table(name, alias), on)
    }

    pub fn left_join(self, name: &str, alias: &str, on: Expr) -> Self {
        self.join(JoinKind::Left, TableRef::table(name, alias), on)
    }

    /// Adds a WHERE predicate; repeated calls are ANDed
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, key: impl Into<SelectItem>) -> Self {
        self.group_by.push(key.into());
        self
    }

    pub fn aggregate(mut self, spec: AggregateSpec) -> Self {
        self.aggregates.push(spec);
        self
    }

    /// Adds a HAVING predicate; repeated calls are ANDed
    pub fn having(mut self, predicate: Expr) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    pub fn window(mut self, function: WindowFunction, spec: WindowSpec, alias: impl Into<String>) -> Self {
        self.windows.push(WindowCall {
            function,
            spec,
            alias: alias.into(),
        });
        self
    }

    pub fn select(mut self, item: impl Into<SelectItem>) -> Self {
        self.select.push(item.into());
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn order_by(mut self, key: OrderKey) -> Self {
        self.order_by.push(key);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if the query groups or aggregates
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || !self.aggregates.is_empty()
    }

    /// Calls `f` on every subquery nested directly in this query's clauses
    /// (derived tables and expression subqueries; CTE bodies excluded)
    pub fn for_each_subquery<'q>(&'q self, f: &mut dyn FnMut(&'q Query)) {
        if let TableRef::Subquery { query, .. } = &self.from {
            f(query.as_ref());
        }
        for join in &self.joins {
            if let TableRef::Subquery { query, .. } = &join.table {
                f(query.as_ref());
            }
            join.on.for_each_subquery(f);
        }
        let exprs = self
            .filter
            .iter()
            .chain(self.having.iter())
            .chain(self.group_by.iter().map(|g| &g.expr))
            .chain(self.select.iter().map(|s| &s.expr))
            .chain(self.order_by.iter().map(|k| &k.expr));
        for expr in exprs {
            expr.for_each_subquery(f);
        }
        for spec in &self.aggregates {
            if let Some(arg) = &spec.call.arg {
                arg.for_each_subquery(f);
            }
        }
        for window in &self.windows {
            for expr in &window.spec.partition_by {
                expr.for_each_subquery(f);
            }
            for key in &window.spec.order_by {
                key.expr.for_each_subquery(f);
            }
        }
    }
}
