//! Entity/asset store: keyed SQLite persistence for every domain record.
//!
//! Each public function runs one unit of work on its own connection through
//! [`Db::with_connection`](crate::db::Db::with_connection) and commits before
//! returning. Synchronous `&Connection` helpers are exposed to the crate so that
//! multi-step writes (check-then-insert) can share a single transaction.

pub mod assets;
pub mod entities;
pub mod positions;
pub mod relationships;

use rusqlite::types::Type;
use rusqlite::Row;
use uuid::Uuid;

/// Read a TEXT column holding a hyphenated UUID.
pub(crate) fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a nullable TEXT column holding JSON.
pub(crate) fn json_at<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Error for a variant column that must be present for the stored discriminator.
pub(crate) fn missing_column(idx: usize, kind: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Null,
        format!("column required for kind '{}' is NULL", kind).into(),
    )
}
