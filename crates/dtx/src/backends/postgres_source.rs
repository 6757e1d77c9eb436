//! 🐘 Postgres chunk source — a server-side cursor wearing a `ChunkSource` costume.
//!
//! 🎬 The query runs once. The rows, however, are fetched one page at a time,
//! because loading 40 million sensor descriptions into a `Vec` is how laptops
//! learn to fly (the fans, specifically).
//!
//! 🧠 Knowledge graph:
//! - `open` connects, `BEGIN`s, and `DECLARE`s a `NO SCROLL` cursor over the configured
//!   query with the range bound as `$1` (start) and `$2` (end), both inclusive.
//! - The DECLARE is prepared first so each bound can be sent as whatever the server
//!   inferred for it: `timestamp`, `timestamptz` (the naive bound read as local time)
//!   or `date`.
//! - `next_chunk` issues `FETCH <chunk_size>`. An empty fetch closes the cursor, commits,
//!   and flips `exhausted` so every later call is a cheap `None`.
//! - Rows become [`RawRecord`]s keyed by column name, values converted by column type.
//!
//! ⚠️ Never seek backwards. `NO SCROLL` means it, and so do we. 🦆

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error};

use crate::backends::{ChunkSource, CommonSourceConfig};
use crate::common::{DateRange, RawRecord};

// -- 🏷️ one cursor per connection, so one name is all we'll ever need
const CURSOR_NAME: &str = "dtx_cursor";

/// 📋 How to reach the database and what to ask it.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSourceConfig {
    /// 🔒 libpq-style connection string, e.g. `host=localhost user=etl dbname=lims`.
    pub connection_string: String,
    /// 📜 Must take `$1` (start) and `$2` (end), and ORDER BY the update timestamp.
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(flatten)]
    pub common_config: CommonSourceConfig,
}

fn default_query() -> String {
    "SELECT code, description \
     FROM samples \
     WHERE date_updated BETWEEN $1 AND $2 \
     ORDER BY date_updated"
        .to_string()
}

/// 🐘 The cursor-holding, page-fetching source.
pub struct PostgresSource {
    client: Client,
    fetch_sql: String,
    exhausted: bool,
}

// 🎭 tokio_postgres::Client's Debug is fine but noisy; we only care about progress.
impl std::fmt::Debug for PostgresSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresSource")
            .field("fetch_sql", &self.fetch_sql)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

/// 🔌 Connect and park the connection driver on the runtime.
pub async fn connect(connection_string: &str) -> Result<Client> {
    let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
        .await
        .context("💀 Could not connect to Postgres. Is it running? Is the connection string right?")?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!("💀 Postgres connection dropped: {}", err);
        }
    });
    Ok(client)
}

impl PostgresSource {
    /// 🚀 Connect, open a transaction, declare the cursor. Nothing is fetched yet.
    pub async fn open(config: PostgresSourceConfig, range: &DateRange) -> Result<Self> {
        let client = connect(&config.connection_string).await?;
        Self::open_with_client(client, &config, range).await
    }

    /// 🔧 Same as `open`, for callers that already hold a client.
    pub async fn open_with_client(
        client: Client,
        config: &PostgresSourceConfig,
        range: &DateRange,
    ) -> Result<Self> {
        client
            .batch_execute("BEGIN TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .await
            .context("💀 BEGIN failed. The database won't even start a conversation.")?;

        let declare = format!("DECLARE {} NO SCROLL CURSOR FOR {}", CURSOR_NAME, config.query);
        let statement = client
            .prepare(declare.as_str())
            .await
            .with_context(|| format!("💀 DECLARE CURSOR failed for query: {}", config.query))?;
        let [start_type, end_type] = statement.params() else {
            bail!(
                "💀 The source query takes {} parameter(s); it needs exactly two, $1 (start) and $2 (end): {}",
                statement.params().len(),
                config.query
            );
        };
        let start = RangeBound::for_param(start_type, range.start())?;
        let end = RangeBound::for_param(end_type, range.end())?;
        client
            .execute(&statement, &[start.as_sql(), end.as_sql()])
            .await
            .with_context(|| format!("💀 DECLARE CURSOR failed for query: {}", config.query))?;
        debug!("🐘 Cursor declared over {:?} .. {:?}", start, end);

        Ok(Self {
            client,
            fetch_sql: format!(
                "FETCH {} FROM {}",
                config.common_config.effective_chunk_size(),
                CURSOR_NAME
            ),
            exhausted: false,
        })
    }

    async fn finish(&mut self) -> Result<()> {
        self.exhausted = true;
        self.client
            .batch_execute(&format!("CLOSE {}; COMMIT", CURSOR_NAME))
            .await
            .context("💀 Closing the cursor failed. The rows were read, but the goodbye was awkward.")
    }
}

/// 📅 One end of the range, shaped for the column it gets compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeBound {
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
}

impl RangeBound {
    fn for_param(ty: &Type, at: NaiveDateTime) -> Result<Self> {
        Ok(match *ty {
            Type::TIMESTAMPTZ => {
                let local = Local.from_local_datetime(&at).earliest().with_context(|| {
                    format!("💀 {} does not exist in the local time zone (DST gap?)", at)
                })?;
                Self::TimestampTz(local.with_timezone(&Utc))
            }
            Type::DATE => Self::Date(at.date()),
            // -- anything else gets the naive timestamp and the driver's opinion of it
            _ => Self::Timestamp(at),
        })
    }

    fn as_sql(&self) -> &(dyn ToSql + Sync) {
        match self {
            Self::Timestamp(at) => at,
            Self::TimestampTz(at) => at,
            Self::Date(day) => day,
        }
    }
}

#[async_trait]
impl ChunkSource for PostgresSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.exhausted {
            return Ok(None);
        }
        let rows = self
            .client
            .query(self.fetch_sql.as_str(), &[])
            .await
            .context("💀 FETCH failed mid-run. The cursor has left the building.")?;
        if rows.is_empty() {
            self.finish().await?;
            return Ok(None);
        }
        let records = rows.iter().map(row_to_record).collect::<Result<Vec<_>>>()?;
        Ok(Some(records))
    }
}

/// 🔄 One row → one [`RawRecord`], column names as keys.
pub fn row_to_record(row: &Row) -> Result<RawRecord> {
    let mut fields = Map::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = column_value(row, idx, column.type_())
            .with_context(|| format!("💀 Could not read column '{}'", column.name()))?;
        fields.insert(column.name().to_string(), value);
    }
    Ok(RawRecord::new(fields))
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value> {
    let value = match *ty {
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::from)
        }
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::from(d.to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::from(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::from(t.to_rfc3339())),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        ref other => bail!(
            "unsupported column type '{}'; cast it to text in the query",
            other
        ),
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_default_query_takes_two_bounds() {
        let query = default_query();
        assert!(query.contains("$1") && query.contains("$2"));
        assert!(query.to_lowercase().contains("order by date_updated"));
    }

    #[test]
    fn the_one_where_each_bound_dresses_for_its_column() -> Result<()> {
        let at = NaiveDate::from_ymd_opt(2003, 6, 15)
            .and_then(|day| day.and_hms_opt(12, 30, 0))
            .expect("valid timestamp");

        assert_eq!(RangeBound::for_param(&Type::TIMESTAMP, at)?, RangeBound::Timestamp(at));
        assert_eq!(RangeBound::for_param(&Type::DATE, at)?, RangeBound::Date(at.date()));
        match RangeBound::for_param(&Type::TIMESTAMPTZ, at)? {
            RangeBound::TimestampTz(instant) => {
                assert_eq!(instant.with_timezone(&Local).naive_local(), at);
            }
            honestly_who_knows => panic!("💀 Expected a timestamptz bound, got {honestly_who_knows:?}"),
        }
        Ok(())
    }

    #[test]
    fn the_one_where_config_fills_in_the_blanks() -> Result<()> {
        let config: PostgresSourceConfig = serde_json::from_value(serde_json::json!({
            "connection_string": "host=localhost user=etl",
            "chunk_size": 250
        }))?;
        assert_eq!(config.common_config.chunk_size, 250);
        assert_eq!(config.query, default_query());
        Ok(())
    }
}
