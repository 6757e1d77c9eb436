//! 🔍 Column introspection — "what's in this table, and which table do you mean?"
//!
//! Given a table name and an optional schema, ask `information_schema` for the
//! columns, in ordinal order. Two ways to be disappointed:
//! - nobody has a table by that name → [`IntrospectionError::NotFound`]
//! - several schemas have one and you didn't say which → [`IntrospectionError::Ambiguous`]
//!
//! The deciding logic is [`resolve_columns`], a plain function over catalog rows,
//! so it can be tested without a database in the room. 🦆

use thiserror::Error;
use tokio_postgres::Client;

/// 📋 One column: its name and its Postgres type as `information_schema` spells it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// 📇 A row of `information_schema.columns`, pared down to what we need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub schema: String,
    pub column: Column,
}

#[derive(Debug, Error)]
pub enum IntrospectionError {
    /// `name` is schema-qualified when a schema was given.
    #[error("Table name '{name}' not found.")]
    NotFound { name: String },
    #[error("Table name {name} is not unique; pass a schema to pick one")]
    Ambiguous { name: String },
    #[error("column lookup query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

const COLUMNS_ANY_SCHEMA: &str = "SELECT table_schema::text, column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_name = $1 \
     ORDER BY table_schema, ordinal_position";

const COLUMNS_IN_SCHEMA: &str = "SELECT table_schema::text, column_name::text, data_type::text \
     FROM information_schema.columns \
     WHERE table_name = $1 AND table_schema = $2 \
     ORDER BY table_schema, ordinal_position";

/// 🔍 Describe `table`'s columns, optionally pinned to `schema`.
pub async fn describe_columns(
    client: &Client,
    table: &str,
    schema: Option<&str>,
) -> Result<Vec<Column>, IntrospectionError> {
    let rows = match schema {
        Some(schema) => client.query(COLUMNS_IN_SCHEMA, &[&table, &schema]).await?,
        None => client.query(COLUMNS_ANY_SCHEMA, &[&table]).await?,
    };
    let entries = rows
        .iter()
        .map(|row| CatalogEntry {
            schema: row.get(0),
            column: Column::new(row.get::<_, String>(1), row.get::<_, String>(2)),
        })
        .collect();
    resolve_columns(table, schema, entries)
}

/// ⚖️ Decide what a set of catalog rows means for `table` (and maybe `schema`).
///
/// Entries must already be ordered by schema, then ordinal position.
pub fn resolve_columns(
    table: &str,
    schema: Option<&str>,
    entries: Vec<CatalogEntry>,
) -> Result<Vec<Column>, IntrospectionError> {
    let qualified = match schema {
        Some(schema) => format!("{schema}.{table}"),
        None => table.to_string(),
    };
    let entries: Vec<CatalogEntry> = match schema {
        Some(schema) => entries.into_iter().filter(|e| e.schema == schema).collect(),
        None => entries,
    };

    let Some(first) = entries.first() else {
        return Err(IntrospectionError::NotFound { name: qualified });
    };
    if entries.iter().any(|e| e.schema != first.schema) {
        return Err(IntrospectionError::Ambiguous { name: qualified });
    }
    Ok(entries.into_iter().map(|e| e.column).collect())
}
