//! Statement building and batch planning, independent of the driver.
//!
//! A load of `n` rows over `c` bound columns is split into sequential
//! batches of at most `floor(max_params / c)` rows, so no statement carries
//! more placeholders than the backend allows.

use std::ops::Range;

use crate::error::StoreError;
use crate::schema::{ColumnKind, TableSpec};

/// A value ready to bind to one placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Bind {
    Text(String),
    Integer(i64),
    Real(f64),
    Null,
}

/// Map a raw cell to its bind value for `kind`.
///
/// Empty text or the null sentinel becomes `0` / `0.0` for integer and
/// decimal columns and `Null` for nullable decimals. Text that does not
/// parse is logged and falls back the same way.
pub fn normalize(raw: &str, kind: ColumnKind, null_sentinel: &str) -> Bind {
    let value = raw.trim();
    let absent = value.is_empty() || value == null_sentinel;

    match kind {
        ColumnKind::Text => Bind::Text(raw.to_string()),
        ColumnKind::Integer if absent => Bind::Integer(0),
        ColumnKind::Integer => match value.parse::<i64>() {
            Ok(n) => Bind::Integer(n),
            Err(_) => {
                log::warn!("could not parse integer value {value:?}, storing 0");
                Bind::Integer(0)
            }
        },
        ColumnKind::Decimal if absent => Bind::Real(0.0),
        ColumnKind::Decimal => match value.parse::<f64>() {
            Ok(n) => Bind::Real(n),
            Err(_) => {
                log::warn!("could not parse decimal value {value:?}, storing 0.0");
                Bind::Real(0.0)
            }
        },
        ColumnKind::NullableDecimal if absent => Bind::Null,
        ColumnKind::NullableDecimal => match value.parse::<f64>() {
            Ok(n) => Bind::Real(n),
            Err(_) => {
                log::warn!("could not parse decimal value {value:?}, storing NULL");
                Bind::Null
            }
        },
    }
}

pub fn max_rows_per_batch(max_params: usize, columns_per_row: usize) -> usize {
    if columns_per_row == 0 {
        return 0;
    }
    max_params / columns_per_row
}

/// Row ranges for each batch, in order. Empty when `total_rows` is zero.
pub fn plan_batches(total_rows: usize, max_rows: usize) -> Vec<Range<usize>> {
    if max_rows == 0 {
        return Vec::new();
    }
    (0..total_rows)
        .step_by(max_rows)
        .map(|start| start..(start + max_rows).min(total_rows))
        .collect()
}

/// `<insert prefix> (?, …), (?, …) <upsert clause>` for `rows` tuples.
pub fn build_upsert_statement(insert: &str, update: &str, rows: usize, columns: usize) -> String {
    let tuple = format!("({})", vec!["?"; columns].join(", "));
    let mut sql = String::with_capacity(insert.len() + update.len() + rows * (tuple.len() + 2));
    sql.push_str(insert.trim());
    sql.push(' ');
    for i in 0..rows {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(&tuple);
    }
    sql.push(' ');
    sql.push_str(update.trim().trim_end_matches(';').trim_end());
    sql
}

/// One statement's worth of rows, flattened row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Position of the first row in the whole load.
    pub start: usize,
    pub rows: usize,
    pub binds: Vec<Bind>,
}

/// Split and bind `rows` for `spec`.
///
/// When the table has an ordinal key, each row is prefixed with its
/// position in the whole load, so positions keep counting across batches.
pub fn build_batches(
    spec: &TableSpec,
    rows: &[Vec<String>],
    null_sentinel: &str,
    max_params: usize,
) -> Result<Vec<Batch>, StoreError> {
    let columns = spec.column_count();
    let max_rows = max_rows_per_batch(max_params, columns);
    if max_rows == 0 {
        return Err(StoreError::RowTooWide {
            table: spec.name.to_string(),
            columns,
            max_params,
        });
    }

    let data_columns = spec.data_columns();
    let mut batches = Vec::new();
    for range in plan_batches(rows.len(), max_rows) {
        let mut binds = Vec::with_capacity(range.len() * columns);
        for (pos, row) in rows[range.clone()].iter().enumerate().map(|(i, r)| (range.start + i, r)) {
            if row.len() != data_columns.len() {
                return Err(StoreError::RowShape {
                    table: spec.name.to_string(),
                    row: pos,
                    expected: data_columns.len(),
                    found: row.len(),
                });
            }
            if spec.ordinal_key {
                binds.push(Bind::Integer(pos as i64));
            }
            for (cell, column) in row.iter().zip(data_columns) {
                binds.push(normalize(cell, column.kind, null_sentinel));
            }
        }
        batches.push(Batch { start: range.start, rows: range.len(), binds });
    }
    Ok(batches)
}
