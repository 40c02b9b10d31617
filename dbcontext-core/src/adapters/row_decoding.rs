//! Decoding of sqlx rows into backend-neutral values.
//!
//! The sqlx drivers are strictly typed, so each cell is tried against a
//! short chain of Rust types in order of likelihood. Catalog and sample
//! queries cast to text at the source wherever the driver cannot decode a
//! type natively, which keeps the chain short.

use crate::Result;
use crate::error::DbContextError;
use crate::format::{SqlValue, format_value};
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};

/// Decodes one cell.
///
/// # Errors
/// Returns a `Parse` error naming the column and its driver type when none
/// of the supported types match.
pub fn decode_cell<'r, R>(row: &'r R, index: usize) -> Result<SqlValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
    bool: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    let raw = row
        .try_get_raw(index)
        .map_err(|e| DbContextError::query_failed(format!("Failed to read column {}", index), e))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    if let Ok(v) = row.try_get::<String, _>(index) {
        return Ok(SqlValue::Text(v));
    }
    if let Ok(v) = row.try_get::<i64, _>(index) {
        return Ok(SqlValue::Int(v));
    }
    if let Ok(v) = row.try_get::<f64, _>(index) {
        return Ok(SqlValue::Float(v));
    }
    if let Ok(v) = row.try_get::<bool, _>(index) {
        return Ok(SqlValue::Bool(v));
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(SqlValue::Bytes(v));
    }

    let (name, type_name) = row.try_column(index).map_or_else(
        |_| (index.to_string(), "unknown".to_string()),
        |c| (c.name().to_string(), c.type_info().name().to_string()),
    );
    Err(DbContextError::parse(format!(
        "unsupported type {} in column '{}'",
        type_name, name
    )))
}

/// Decodes every cell of a row.
///
/// # Errors
/// See [`decode_cell`].
pub fn decode_row<'r, R>(row: &'r R) -> Result<Vec<SqlValue>>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
    bool: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    (0..row.len()).map(|i| decode_cell(row, i)).collect()
}

/// Decodes and stringifies every cell of a row for a sample document.
///
/// # Errors
/// See [`decode_cell`].
pub fn format_row<'r, R>(row: &'r R) -> Result<Vec<String>>
where
    R: Row,
    usize: ColumnIndex<R>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    f64: Decode<'r, R::Database> + Type<R::Database>,
    bool: Decode<'r, R::Database> + Type<R::Database>,
    Vec<u8>: Decode<'r, R::Database> + Type<R::Database>,
{
    Ok(decode_row(row)?.iter().map(format_value).collect())
}
