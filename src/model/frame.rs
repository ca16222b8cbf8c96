//! Frame: an ordered table of observation rows with named columns.
//!
//! Values are kept as SQLite values so survey-specific columns pass through
//! the engines untouched. Typed accessors exist for the handful of columns
//! the engines actually interpret.

use rusqlite::types::Value;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("column {column}, row {row}: expected {expected}, found {found}")]
    Type {
        column: String,
        row: usize,
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = core::result::Result<T, FrameError>;

/// An ordered sequence of rows sharing one set of named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Creates an empty frame with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row. The row must have one value per column.
    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width mismatch");
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column that must be present.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    /// Adds `name` filled with `default` if the frame lacks it.
    ///
    /// Returns whether the column was added.
    pub fn add_column(&mut self, name: &str, default: &Value) -> bool {
        if self.column_index(name).is_some() {
            return false;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.clone());
        }
        true
    }

    /// Removes the named columns; names not present are ignored.
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.iter().any(|n| n.as_ref() == c))
            .collect();
        if keep.iter().all(|k| *k) {
            return;
        }
        self.columns = retain_by(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by(std::mem::take(row), &keep);
        }
    }

    /// Appends `other` below `self`, aligning columns by name.
    ///
    /// The result carries `self`'s columns followed by any columns only
    /// `other` has. Cells a side has no column for are `NULL`. Row order
    /// within each side is preserved.
    #[must_use]
    pub fn concat(mut self, other: Frame) -> Frame {
        for name in &other.columns {
            self.add_column(name, &Value::Null);
        }
        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();
        self.rows.reserve(other.rows.len());
        for mut row in other.rows {
            let aligned = mapping
                .iter()
                .map(|source| match source {
                    Some(i) => std::mem::replace(&mut row[*i], Value::Null),
                    None => Value::Null,
                })
                .collect();
            self.rows.push(aligned);
        }
        self
    }

    pub fn get(&self, row: usize, column: usize) -> &Value {
        &self.rows[row][column]
    }

    /// Reads a numeric cell as `f64`. Integers are widened.
    pub fn get_f64(&self, row: usize, column: usize) -> Result<f64> {
        match self.get(row, column) {
            Value::Real(v) => Ok(*v),
            #[allow(clippy::cast_precision_loss)]
            Value::Integer(v) => Ok(*v as f64),
            other => Err(self.type_error(row, column, "a number", other)),
        }
    }

    /// Reads an integral cell as `i64`. Reals with no fractional part are accepted.
    pub fn get_i64(&self, row: usize, column: usize) -> Result<i64> {
        match self.get(row, column) {
            Value::Integer(v) => Ok(*v),
            #[allow(clippy::cast_possible_truncation)]
            Value::Real(v) if v.fract() == 0.0 => Ok(*v as i64),
            other => Err(self.type_error(row, column, "an integer", other)),
        }
    }

    pub fn get_text(&self, row: usize, column: usize) -> Result<String> {
        match self.get(row, column) {
            Value::Text(v) => Ok(v.clone()),
            other => Err(self.type_error(row, column, "text", other)),
        }
    }

    /// Every value of a numeric column, in row order.
    pub fn f64_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.require(name)?;
        (0..self.len()).map(|row| self.get_f64(row, column)).collect()
    }

    /// Largest value of an integral column, `None` for an empty frame.
    pub fn max_i64(&self, name: &str) -> Result<Option<i64>> {
        let column = self.require(name)?;
        let mut max = None;
        for row in 0..self.len() {
            let v = self.get_i64(row, column)?;
            max = Some(max.map_or(v, |m: i64| m.max(v)));
        }
        Ok(max)
    }

    /// Smallest value of a numeric column, `None` for an empty frame.
    pub fn min_f64(&self, name: &str) -> Result<Option<f64>> {
        Ok(self.f64_column(name)?.into_iter().reduce(f64::min))
    }

    fn type_error(
        &self,
        row: usize,
        column: usize,
        expected: &'static str,
        found: &Value,
    ) -> FrameError {
        FrameError::Type {
            column: self.columns[column].clone(),
            row,
            expected,
            found: value_kind(found),
        }
    }
}

fn retain_by<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, k)| k.then_some(item))
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Integer(_) => "integer",
        Value::Real(_) => "real",
        Value::Text(_) => "text",
        Value::Blob(_) => "blob",
    }
}
