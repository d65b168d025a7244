use ndarray::{Array2, ArrayView1};
use std::{collections::HashSet, fmt::Display, str::FromStr};

use crate::error::{AppError, AppResult};

/// A single cell of a feature group
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
    /// Dense numeric row, e.g. one row of a similarity matrix
    Vector(Vec<f64>),
}

impl FeatureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Null)
    }

    pub fn kind(&self) -> Option<ColumnKind> {
        match self {
            FeatureValue::Null => None,
            FeatureValue::Bool(_) => Some(ColumnKind::Bool),
            FeatureValue::Integer(_) => Some(ColumnKind::Integer),
            FeatureValue::Float(_) => Some(ColumnKind::Float),
            FeatureValue::Text(_) => Some(ColumnKind::Text),
            FeatureValue::List(_) => Some(ColumnKind::List),
            FeatureValue::Vector(_) => Some(ColumnKind::Vector),
        }
    }

    /// Numeric view of the cell; booleans count as 0/1
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FeatureValue::Integer(i) => Some(*i as f64),
            FeatureValue::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FeatureValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FeatureValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            FeatureValue::Vector(values) => Some(values),
            _ => None,
        }
    }

    fn dedup_key(&self) -> DedupKey {
        match self {
            FeatureValue::Null => DedupKey::Null,
            FeatureValue::Bool(b) => DedupKey::Bool(*b),
            FeatureValue::Integer(i) => DedupKey::Integer(*i),
            FeatureValue::Float(f) if f.is_nan() => DedupKey::Null,
            FeatureValue::Float(f) => DedupKey::Float(f.to_bits()),
            FeatureValue::Text(s) => DedupKey::Text(s.clone()),
            FeatureValue::List(items) => DedupKey::List(items.clone()),
            FeatureValue::Vector(values) => {
                DedupKey::Vector(values.iter().map(|v| v.to_bits()).collect())
            }
        }
    }
}

impl From<Option<i64>> for FeatureValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FeatureValue::Null, FeatureValue::Integer)
    }
}

impl From<Option<String>> for FeatureValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(FeatureValue::Null, FeatureValue::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DedupKey {
    Null,
    Bool(bool),
    Integer(i64),
    Float(u64),
    Text(String),
    List(Vec<String>),
    Vector(Vec<u64>),
}

/// Storage type of a feature group column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Bool,
    Integer,
    Float,
    Text,
    List,
    Vector,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
            ColumnKind::List => "list",
            ColumnKind::Vector => "vector",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnKind::Bool | ColumnKind::Integer | ColumnKind::Float
        )
    }

    /// Widens two kinds seen in the same column, `None` if they cannot share one
    fn unify(self, other: ColumnKind) -> Option<ColumnKind> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                Some(ColumnKind::Float)
            }
            _ => None,
        }
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(ColumnKind::Bool),
            "integer" => Ok(ColumnKind::Integer),
            "float" => Ok(ColumnKind::Float),
            "text" => Ok(ColumnKind::Text),
            "list" => Ok(ColumnKind::List),
            "vector" => Ok(ColumnKind::Vector),
            other => Err(AppError::InvalidInput(format!(
                "Unknown column kind: {}",
                other
            ))),
        }
    }
}

/// Row-major table exchanged with the feature store
///
/// Column order is significant and preserved through every transformation;
/// row order is preserved as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    pub const MATRIX_ROW_COLUMN: &'static str = "row";
    pub const MATRIX_SCORES_COLUMN: &'static str = "scores";

    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Caller guarantees every row is as wide as `columns`
    pub(crate) fn from_rows_unchecked(columns: Vec<String>, rows: Vec<Vec<FeatureValue>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<FeatureValue>) -> AppResult<()> {
        if row.len() != self.columns.len() {
            return Err(AppError::InvalidInput(format!(
                "Row has {} values but table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn require_column(&self, name: &str) -> AppResult<usize> {
        self.column_index(name)
            .ok_or_else(|| AppError::InvalidInput(format!("Missing required column: {}", name)))
    }

    /// Values of one column, top to bottom
    pub fn column(&self, name: &str) -> AppResult<Vec<&FeatureValue>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Infers the kind of a column from its non-null cells
    ///
    /// Returns `Ok(None)` when every cell is null.
    pub fn column_kind(&self, name: &str) -> AppResult<Option<ColumnKind>> {
        let idx = self.require_column(name)?;
        let mut kind: Option<ColumnKind> = None;
        for row in &self.rows {
            let Some(cell_kind) = row[idx].kind() else {
                continue;
            };
            kind = match kind {
                None => Some(cell_kind),
                Some(current) => Some(current.unify(cell_kind).ok_or_else(|| {
                    AppError::InvalidInput(format!(
                        "Column {} mixes {} and {} values",
                        name, current, cell_kind
                    ))
                })?),
            };
        }
        Ok(kind)
    }

    /// Columns whose values are all booleans or numbers
    pub fn numeric_columns(&self) -> AppResult<Vec<String>> {
        let mut numeric = Vec::new();
        for name in &self.columns {
            if self.column_kind(name)?.is_some_and(|k| k.is_numeric()) {
                numeric.push(name.clone());
            }
        }
        Ok(numeric)
    }

    /// Projects the table onto `names`, in that order
    pub fn select(&self, names: &[String]) -> AppResult<FeatureTable> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(FeatureTable {
            columns: names.to_vec(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Drops rows repeating an earlier row on the `subset` columns
    pub fn drop_duplicates(&self, subset: &[String]) -> AppResult<FeatureTable> {
        let indices = subset
            .iter()
            .map(|name| self.require_column(name))
            .collect::<AppResult<Vec<_>>>()?;

        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                let key: Vec<DedupKey> = indices.iter().map(|&i| row[i].dedup_key()).collect();
                seen.insert(key)
            })
            .cloned()
            .collect();

        Ok(FeatureTable {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Gives every column a single concrete type
    ///
    /// Integer cells in a column that also holds floats become floats, and
    /// NaN floats become nulls.
    pub fn normalize_types(&self) -> AppResult<FeatureTable> {
        let mut normalized = self.clone();
        for (idx, name) in self.columns.iter().enumerate() {
            let kind = self.column_kind(name)?;
            for row in normalized.rows.iter_mut() {
                let replacement = match (kind, &row[idx]) {
                    (Some(ColumnKind::Float), FeatureValue::Integer(i)) => {
                        Some(FeatureValue::Float(*i as f64))
                    }
                    (_, FeatureValue::Float(f)) if f.is_nan() => Some(FeatureValue::Null),
                    _ => None,
                };
                if let Some(value) = replacement {
                    row[idx] = value;
                }
            }
        }
        Ok(normalized)
    }

    /// Narrow positional table for a square similarity matrix
    ///
    /// One row per matrix row: its index in `row` and its scores in `scores`.
    /// The width stays at two columns whatever the matrix size.
    pub fn from_matrix(matrix: &Array2<f64>) -> FeatureTable {
        let columns = vec![
            Self::MATRIX_ROW_COLUMN.to_string(),
            Self::MATRIX_SCORES_COLUMN.to_string(),
        ];
        let rows = matrix
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                vec![
                    FeatureValue::Integer(i as i64),
                    FeatureValue::Vector(row.to_vec()),
                ]
            })
            .collect();
        FeatureTable { columns, rows }
    }

    /// Rebuilds the square matrix written by [`FeatureTable::from_matrix`]
    pub fn to_matrix(&self) -> AppResult<Array2<f64>> {
        let positions = self.column(Self::MATRIX_ROW_COLUMN)?;
        let scores = self.column(Self::MATRIX_SCORES_COLUMN)?;

        let size = self.rows.len();
        let mut matrix = Array2::zeros((size, size));
        let mut filled = vec![false; size];

        for (position, cell) in positions.into_iter().zip(scores) {
            let i = position
                .as_i64()
                .and_then(|i| usize::try_from(i).ok())
                .filter(|&i| i < size && !filled[i])
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("Invalid matrix row index {:?}", position))
                })?;
            let values = cell.as_vector().filter(|v| v.len() == size).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Matrix row {} is not a vector of {} scores",
                    i, size
                ))
            })?;

            matrix.row_mut(i).assign(&ArrayView1::from(values));
            filled[i] = true;
        }

        Ok(matrix)
    }
}
