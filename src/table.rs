//! Table assembly, sorting and plain-text rendering.

use std::cmp::Ordering;
use std::fmt;

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::columns::ColumnMap;
use crate::error::InventoryError;
use crate::record::InstanceRecord;

/// Rows of display values under lexicographically ordered column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Project `records` through `columns` and sort by the `sort_by` column.
    ///
    /// Every cell is looked up in display mode, so missing values read
    /// `unknown`. The sort is ascending and stable.
    ///
    /// # Errors
    ///
    /// Returns `InventoryError::UnknownSortColumn` if `sort_by` is not a label
    /// in `columns`.
    pub fn render(
        records: &[InstanceRecord],
        columns: &ColumnMap,
        sort_by: &str,
    ) -> Result<Self, InventoryError> {
        let sort_index = columns
            .labels()
            .position(|label| label == sort_by)
            .ok_or_else(|| InventoryError::UnknownSortColumn(sort_by.to_string()))?;

        let mut rows: Vec<Vec<Value>> = records
            .iter()
            .map(|record| columns.iter().map(|(_, path)| record.display(path)).collect())
            .collect();
        rows.sort_by(|a, b| compare_values(&a[sort_index], &b[sort_index]));

        Ok(Self {
            columns: columns.labels().map(str::to_string).collect(),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column label, in column order.
    pub fn to_json(&self) -> Value {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let object: Map<String, Value> =
                    self.columns.iter().cloned().zip(row.iter().cloned()).collect();
                Value::Object(object)
            })
            .collect();
        Value::Array(rows)
    }
}

/// Natural ordering of cell values.
///
/// Values of different kinds order as null < bool < number < string < array
/// < object. Numbers compare numerically. RFC 3339 timestamps sort before
/// other strings and compare chronologically; other strings compare
/// lexicographically.
/// Arrays and objects compare by their compact JSON text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => compare_strings(x, y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Ordering {
    match (integer(x), integer(y)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
    }
}

fn integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

/// RFC 3339 timestamps sort first, by instant and then by text; all other
/// strings follow, lexicographically.
fn compare_strings(x: &str, y: &str) -> Ordering {
    let key = |s: &str| DateTime::parse_from_rfc3339(s).ok();
    match (key(x), key(y)) {
        (Some(tx), Some(ty)) => tx.cmp(&ty).then_with(|| x.cmp(y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => x.cmp(y),
    }
}

/// Text of a cell as printed in the table.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let border = {
            let mut line = String::from("+");
            for width in &widths {
                line.push_str(&"-".repeat(width + 2));
                line.push('+');
            }
            line
        };

        let write_row = |f: &mut fmt::Formatter<'_>, row: &[String]| -> fmt::Result {
            f.write_str("|")?;
            for (cell, width) in row.iter().zip(&widths) {
                let pad = width - cell.chars().count();
                write!(f, " {}{} |", cell, " ".repeat(pad))?;
            }
            writeln!(f)
        };

        writeln!(f, "{}", border)?;
        write_row(f, &self.columns)?;
        writeln!(f, "{}", border)?;
        for row in &cells {
            write_row(f, row)?;
        }
        write!(f, "{}", border)
    }
}
