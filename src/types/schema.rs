//! Column and schema definitions
//!
//! A schema is an ordered list of columns. Columns produced by a table scan
//! carry the table alias as qualifier so that `p.id` and `oi.id` stay
//! distinguishable after a join.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int,
    Decimal,
    Text,
    Timestamp,
    /// Untyped NULL or a type only known at run time
    Any,
}

impl DataType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::Bool => "bool",
            DataType::Int => "int",
            DataType::Decimal => "decimal",
            DataType::Text => "text",
            DataType::Timestamp => "timestamp",
            DataType::Any => "any",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Decimal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Table alias the column belongs to, if any
    pub qualifier: Option<String>,
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
            data_type,
        }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
            data_type,
        }
    }

    /// `qualifier.name` or just `name`
    pub fn display_name(&self) -> String {
        match &self.qualifier {
            Some(q) => format!("{}.{}", q, self.name),
            None => self.name.clone(),
        }
    }

    fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        if self.name != name {
            return false;
        }
        match qualifier {
            Some(q) => self.qualifier.as_deref() == Some(q),
            None => true,
        }
    }
}

/// Outcome of a column lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(usize),
    Missing,
    Ambiguous,
}

/// Ordered column list shared by every row of a row set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Unqualified column names in order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Finds a column by optional qualifier and name.
    ///
    /// A qualified lookup matches exactly. An unqualified lookup matches by
    /// name and is ambiguous if several columns share it.
    pub fn lookup(&self, qualifier: Option<&str>, name: &str) -> Lookup {
        let mut found = None;
        for (i, column) in self.columns.iter().enumerate() {
            if column.matches(qualifier, name) {
                if found.is_some() {
                    return Lookup::Ambiguous;
                }
                found = Some(i);
            }
        }
        match found {
            Some(i) => Lookup::Found(i),
            None => Lookup::Missing,
        }
    }

    /// Returns a copy with every column requalified by `alias`
    pub fn with_qualifier(&self, alias: &str) -> Schema {
        Schema {
            columns: self
                .columns
                .iter()
                .map(|c| Column::qualified(alias, c.name.clone(), c.data_type))
                .collect(),
        }
    }

    /// Columns of `self` followed by columns of `other`
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Schema with one extra column appended
    pub fn with_column(&self, column: Column) -> Schema {
        let mut columns = self.columns.clone();
        columns.push(column);
        Schema { columns }
    }

    /// The first `n` columns
    pub fn prefix(&self, n: usize) -> Schema {
        Schema {
            columns: self.columns.iter().take(n).cloned().collect(),
        }
    }
}
