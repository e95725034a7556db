//! Data
//!
//! Minimal tabular model the engine is driven with: column specs with
//! optional nominal domains, cells, keyed rows and materialized tables.
use crate::errors::ConformalError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Type of the values held by a column.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
pub enum DataType {
    /// Floating point values.
    Numeric,
    /// Whole numbers, such as ranks.
    Integer,
    /// String labels, optionally with an enumerated domain.
    Nominal,
}

/// Description of a single column.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ColumnSpec {
    /// Column name, unique within a table.
    pub name: String,
    /// Type of the column values.
    pub data_type: DataType,
    /// Declared set of possible values, in declaration order.
    /// Only meaningful for nominal columns.
    pub domain: Option<Vec<String>>,
}

impl ColumnSpec {
    /// Create a numeric column.
    pub fn numeric(name: &str) -> Self {
        ColumnSpec {
            name: name.to_string(),
            data_type: DataType::Numeric,
            domain: None,
        }
    }

    /// Create a nominal column.
    ///
    /// * `name` - Column name.
    /// * `domain` - Declared values, `None` when the domain is unknown.
    pub fn nominal(name: &str, domain: Option<Vec<String>>) -> Self {
        ColumnSpec {
            name: name.to_string(),
            data_type: DataType::Nominal,
            domain,
        }
    }

    pub fn integer(name: &str) -> Self {
        ColumnSpec {
            name: name.to_string(),
            data_type: DataType::Integer,
            domain: None,
        }
    }

    /// Integer columns are accepted wherever numeric values are read.
    pub fn is_numeric(&self) -> bool {
        matches!(self.data_type, DataType::Numeric | DataType::Integer)
    }

    /// The declared domain, if present and non-empty.
    pub fn domain_values(&self) -> Option<&[String]> {
        match &self.domain {
            Some(values) if !values.is_empty() => Some(values.as_slice()),
            _ => None,
        }
    }
}

/// Ordered collection of column specs.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct TableSpec {
    columns: Vec<ColumnSpec>,
}

impl TableSpec {
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        TableSpec { columns }
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Append a column to the end of the spec.
    pub fn push(&mut self, column: ColumnSpec) {
        self.columns.push(column);
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.find_column_index(name).is_some()
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Index of a column that must exist.
    ///
    /// * `name` - Column name.
    /// * `table` - Table name used in the error message.
    pub fn column_index(&self, name: &str, table: &str) -> Result<usize, ConformalError> {
        self.find_column_index(name).ok_or_else(|| ConformalError::MissingColumn {
            column: name.to_string(),
            table: table.to_string(),
        })
    }

    /// Index of a column that must exist and hold numeric values.
    pub fn numeric_column_index(&self, name: &str, table: &str) -> Result<usize, ConformalError> {
        let idx = self.column_index(name, table)?;
        if self.columns[idx].is_numeric() {
            Ok(idx)
        } else {
            Err(ConformalError::InvalidColumnType {
                column: name.to_string(),
                expected: "numeric".to_string(),
            })
        }
    }
}

/// A single table value.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum Cell {
    Numeric(f64),
    Integer(i64),
    Nominal(String),
    Missing,
}

impl Cell {
    /// The numeric value, `None` for missing, NaN or nominal cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Numeric(v) if !v.is_nan() => Some(*v),
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The label of a nominal cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Nominal(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Numeric(v) => write!(f, "{}", v),
            Cell::Integer(v) => write!(f, "{}", v),
            Cell::Nominal(s) => write!(f, "{}", s),
            Cell::Missing => write!(f, "?"),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Numeric(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Nominal(s.to_string())
    }
}

/// A keyed table row.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct DataRow {
    /// Row identifier, carried through to the output unchanged.
    pub key: String,
    pub cells: Vec<Cell>,
}

impl DataRow {
    pub fn new(key: &str, cells: Vec<Cell>) -> Self {
        DataRow {
            key: key.to_string(),
            cells,
        }
    }

    pub fn get(&self, idx: usize) -> Option<&Cell> {
        self.cells.get(idx)
    }

    /// Numeric value at `idx`, failing with the column name on a missing value.
    pub fn numeric(&self, idx: usize, column: &str) -> Result<f64, ConformalError> {
        self.get(idx)
            .and_then(Cell::as_f64)
            .ok_or_else(|| self.invalid_value(column))
    }

    /// Nominal value at `idx`, failing with the column name on a missing value.
    pub fn nominal(&self, idx: usize, column: &str) -> Result<&str, ConformalError> {
        self.get(idx)
            .and_then(Cell::as_str)
            .ok_or_else(|| self.invalid_value(column))
    }

    fn invalid_value(&self, column: &str) -> ConformalError {
        ConformalError::InvalidValue {
            column: column.to_string(),
            row: self.key.clone(),
        }
    }
}

/// A fully materialized table.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Table {
    pub spec: TableSpec,
    pub rows: Vec<DataRow>,
}

impl Table {
    /// Create a table, checking every row has one cell per column.
    pub fn new(spec: TableSpec, rows: Vec<DataRow>) -> Result<Self, ConformalError> {
        if let Some(row) = rows.iter().find(|r| r.cells.len() != spec.len()) {
            return Err(ConformalError::InvalidConfiguration(
                format!("row '{}'", row.key),
                format!("{} cells", spec.len()),
                row.cells.len().to_string(),
            ));
        }
        Ok(Table { spec, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
