//! 🐘 Tests that need a real Postgres. Skipped unless `DTX_TEST_PG_URL` is set, e.g.
//! `DTX_TEST_PG_URL="host=localhost user=postgres password=postgres dbname=postgres"`.
//!
//! Each test works inside its own schema(s) and drops them afterwards.

use anyhow::Result;
use dtx::backends::postgres_source::connect;
use dtx::backends::{ChunkSource, CommonSourceConfig, PostgresSource, PostgresSourceConfig};
use dtx::common::{DateRange, parse_bound};
use dtx::introspect::{Column, IntrospectionError, describe_columns};
use serde_json::json;

fn pg_url() -> Option<String> {
    std::env::var("DTX_TEST_PG_URL").ok()
}

const SRC_DDL: &str = "(id integer, value double precision, simple_text text, utf8_text text, \
                       day date, date_time timestamp without time zone)";

fn src_columns() -> Vec<Column> {
    vec![
        Column::new("id", "integer"),
        Column::new("value", "double precision"),
        Column::new("simple_text", "text"),
        Column::new("utf8_text", "text"),
        Column::new("day", "date"),
        Column::new("date_time", "timestamp without time zone"),
    ]
}

#[tokio::test]
async fn the_one_where_two_schemas_both_have_a_src() -> Result<()> {
    let Some(url) = pg_url() else {
        eprintln!("⏭️ DTX_TEST_PG_URL not set, skipping");
        return Ok(());
    };
    let client = connect(&url).await?;
    client
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS dtx_one CASCADE; DROP SCHEMA IF EXISTS dtx_two CASCADE;
             CREATE SCHEMA dtx_one; CREATE SCHEMA dtx_two;
             CREATE TABLE dtx_one.dtx_src {SRC_DDL};
             CREATE TABLE dtx_two.dtx_src {SRC_DDL};"
        ))
        .await?;

    let ambiguous = describe_columns(&client, "dtx_src", None).await;
    let pinned = describe_columns(&client, "dtx_src", Some("dtx_one")).await;
    let missing = describe_columns(&client, "dtx_bad_table", Some("dtx_one")).await;

    client
        .batch_execute("DROP SCHEMA dtx_one CASCADE; DROP SCHEMA dtx_two CASCADE;")
        .await?;

    assert!(matches!(ambiguous, Err(IntrospectionError::Ambiguous { ref name }) if name == "dtx_src"));
    assert_eq!(pinned?, src_columns());
    assert!(matches!(missing, Err(IntrospectionError::NotFound { ref name }) if name == "dtx_one.dtx_bad_table"));
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_cursor_pages_through_the_window() -> Result<()> {
    let Some(url) = pg_url() else {
        eprintln!("⏭️ DTX_TEST_PG_URL not set, skipping");
        return Ok(());
    };
    let setup = connect(&url).await?;
    setup
        .batch_execute(
            "DROP SCHEMA IF EXISTS dtx_cursor CASCADE; CREATE SCHEMA dtx_cursor;
             CREATE TABLE dtx_cursor.samples (code text, description text, date_updated timestamp);
             INSERT INTO dtx_cursor.samples VALUES
               ('S-1', 'granite', '2001-01-01'),
               ('S-2', NULL,      '2002-01-01'),
               ('S-3', 'marble',  '2003-01-01'),
               ('S-4', 'slate',   '2010-01-01');",
        )
        .await?;

    let config = PostgresSourceConfig {
        connection_string: url.clone(),
        query: "SELECT code, description FROM dtx_cursor.samples \
                WHERE date_updated BETWEEN $1 AND $2 ORDER BY date_updated"
            .to_string(),
        common_config: CommonSourceConfig { chunk_size: 2 },
    };
    let range = DateRange::new(parse_bound("2000-01-01")?, parse_bound("2005-01-01")?)?;
    let mut source = PostgresSource::open(config, &range).await?;

    let mut chunks = Vec::new();
    while let Some(chunk) = source.next_chunk().await? {
        chunks.push(chunk);
    }
    assert!(source.next_chunk().await?.is_none());

    setup.batch_execute("DROP SCHEMA dtx_cursor CASCADE;").await?;

    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(chunks[0][0].field("code"), Some(&json!("S-1")));
    assert_eq!(chunks[0][1].field("description"), Some(&serde_json::Value::Null));
    assert_eq!(chunks[1][0].field("code"), Some(&json!("S-3")));
    Ok(())
}

/// 🐘 Page through a three-row window where `date_updated` has the given column type.
async fn codes_in_window(url: &str, schema: &str, column_type: &str) -> Result<Vec<String>> {
    let setup = connect(url).await?;
    setup
        .batch_execute(&format!(
            "DROP SCHEMA IF EXISTS {schema} CASCADE; CREATE SCHEMA {schema};
             CREATE TABLE {schema}.samples (code text, description text, date_updated {column_type});
             INSERT INTO {schema}.samples VALUES
               ('S-1', 'granite', '2001-01-01'),
               ('S-2', 'basalt',  '2002-01-01'),
               ('S-3', 'marble',  '2003-01-01'),
               ('S-4', 'slate',   '2010-01-01');"
        ))
        .await?;

    let config = PostgresSourceConfig {
        connection_string: url.to_string(),
        query: format!(
            "SELECT code, description FROM {schema}.samples \
             WHERE date_updated BETWEEN $1 AND $2 ORDER BY date_updated"
        ),
        common_config: CommonSourceConfig { chunk_size: 2 },
    };
    let range = DateRange::new(parse_bound("2000-01-01")?, parse_bound("2005-01-01")?)?;
    let outcome = async {
        let mut source = PostgresSource::open(config, &range).await?;
        let mut codes = Vec::new();
        while let Some(chunk) = source.next_chunk().await? {
            codes.extend(
                chunk
                    .iter()
                    .filter_map(|record| record.field("code").and_then(|v| v.as_str()).map(str::to_string)),
            );
        }
        anyhow::Ok(codes)
    }
    .await;

    setup.batch_execute(&format!("DROP SCHEMA {schema} CASCADE;")).await?;
    outcome
}

#[tokio::test]
async fn the_one_where_the_update_column_has_a_time_zone() -> Result<()> {
    let Some(url) = pg_url() else {
        eprintln!("⏭️ DTX_TEST_PG_URL not set, skipping");
        return Ok(());
    };
    let codes = codes_in_window(&url, "dtx_tstz", "timestamptz").await?;
    assert_eq!(codes, vec!["S-1", "S-2", "S-3"]);
    Ok(())
}

#[tokio::test]
async fn the_one_where_the_update_column_is_just_a_date() -> Result<()> {
    let Some(url) = pg_url() else {
        eprintln!("⏭️ DTX_TEST_PG_URL not set, skipping");
        return Ok(());
    };
    let codes = codes_in_window(&url, "dtx_date", "date").await?;
    assert_eq!(codes, vec!["S-1", "S-2", "S-3"]);
    Ok(())
}
