//! Record Repository
//!
//! Read/update/delete access to records holding file references. The
//! Postgres implementation issues one bulk `SELECT` per record type and
//! addresses single records by their primary key cast to text.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::debug;

use crate::models::{FileAttribute, RecordId, RecordType};

/// Record repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Rejected by the record store: {0}")]
    Rejected(String),
}

/// One record's identifier and attribute values, aligned with the
/// attributes passed to [`RecordRepository::bulk_read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: RecordId,
    pub values: Vec<Option<String>>,
}

/// Capability to read and mutate records by identifier
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Read the identifier and the given attributes of every record of a type
    async fn bulk_read(
        &self,
        record_type: &RecordType,
        attributes: &[FileAttribute],
    ) -> Result<Vec<RecordRow>, RepositoryError>;

    /// Overwrite one attribute of one record.
    ///
    /// `Ok(false)` when no record has the identifier any more.
    async fn update(
        &self,
        record_type: &RecordType,
        id: &RecordId,
        attribute: &FileAttribute,
        value: &str,
    ) -> Result<bool, RepositoryError>;

    /// Delete one record. `Ok(false)` when it was already gone, e.g. removed
    /// by a cascade from an earlier delete.
    async fn delete(
        &self,
        record_type: &RecordType,
        id: &RecordId,
    ) -> Result<bool, RepositoryError>;
}

/// Records stored in Postgres tables described by the schema registry
#[derive(Debug, Clone)]
pub struct PgRecordRepository {
    pool: PgPool,
}

impl PgRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Quote an SQL identifier. Schema registration already restricts
/// identifiers to `[A-Za-z_][A-Za-z0-9_]*`.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn select_sql(record_type: &RecordType, attributes: &[FileAttribute]) -> String {
    let mut columns = vec![format!("{}::text", quote_ident(&record_type.id_column))];
    columns.extend(attributes.iter().map(|a| quote_ident(a.column_name())));
    format!(
        "SELECT {} FROM {}",
        columns.join(", "),
        quote_ident(&record_type.table)
    )
}

fn update_sql(record_type: &RecordType, attribute: &FileAttribute) -> String {
    format!(
        "UPDATE {} SET {} = $1 WHERE {}::text = $2",
        quote_ident(&record_type.table),
        quote_ident(attribute.column_name()),
        quote_ident(&record_type.id_column)
    )
}

fn delete_sql(record_type: &RecordType) -> String {
    format!(
        "DELETE FROM {} WHERE {}::text = $1",
        quote_ident(&record_type.table),
        quote_ident(&record_type.id_column)
    )
}

#[async_trait]
impl RecordRepository for PgRecordRepository {
    async fn bulk_read(
        &self,
        record_type: &RecordType,
        attributes: &[FileAttribute],
    ) -> Result<Vec<RecordRow>, RepositoryError> {
        let sql = select_sql(record_type, attributes);
        debug!(record_type = %record_type.label, sql = %sql, "Bulk reading records");

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<RecordRow, RepositoryError> {
                let id: String = row.try_get(0)?;
                let values = (1..=attributes.len())
                    .map(|idx| row.try_get::<Option<String>, _>(idx))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RecordRow {
                    id: RecordId(id),
                    values,
                })
            })
            .collect()
    }

    async fn update(
        &self,
        record_type: &RecordType,
        id: &RecordId,
        attribute: &FileAttribute,
        value: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&update_sql(record_type, attribute))
            .bind(value)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        let affected = result.rows_affected() > 0;
        if !affected {
            debug!(record_type = %record_type.label, id = %id, "Update matched no record");
        }
        Ok(affected)
    }

    async fn delete(
        &self,
        record_type: &RecordType,
        id: &RecordId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(&delete_sql(record_type))
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        let affected = result.rows_affected() > 0;
        if !affected {
            debug!(record_type = %record_type.label, id = %id, "Delete matched no record");
        }
        Ok(affected)
    }
}
