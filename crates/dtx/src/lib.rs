//! 🚚 dtx — rows in, documents out, one chunk at a time.
//!
//! 🧠 Knowledge graph:
//! - [`app_config`]: figment-loaded config (TOML + `DTX_*` env).
//! - [`backends`]: chunk sources (Postgres, in-memory) and sinks (Elasticsearch, in-memory).
//! - [`transforms`]: row → document.
//! - [`dispatch`]: one chunk, all documents at once, fail-fast fan-in.
//! - [`transfer`]: the sequential loop over chunks.
//! - [`introspect`]: column lookup by table name, schema optional.
//!
//! Logging is the caller's business: this crate only emits `tracing` events and
//! never installs a subscriber. 🦆

pub mod app_config;
pub mod backends;
pub mod common;
pub mod dispatch;
pub mod introspect;
pub mod progress;
pub mod transfer;
pub mod transforms;

use anyhow::{Context, Result, bail};

use crate::app_config::{AppConfig, SinkConfig, SourceConfig};
use crate::backends::{
    ElasticsearchSink, InMemorySink, InMemorySource, PostgresSource, SinkBackend, SourceBackend,
};
use crate::common::DateRange;
use crate::introspect::Column;
use crate::progress::RunSummary;
use crate::transforms::SampleDocumentTransform;

/// 🚰 Build and open the configured source over `range`.
pub async fn open_source(config: &SourceConfig, range: &DateRange) -> Result<SourceBackend> {
    Ok(match config {
        SourceConfig::Postgres(pg) => SourceBackend::Postgres(
            PostgresSource::open(pg.clone(), range)
                .await
                .context("💀 Failed to open the Postgres chunk source")?,
        ),
        SourceConfig::InMemory(mem) => SourceBackend::InMemory(InMemorySource::new(mem.clone())),
    })
}

/// 🕳️ Build the configured sink.
pub fn build_sink(config: &SinkConfig) -> Result<SinkBackend> {
    Ok(match config {
        SinkConfig::Elasticsearch(es) => SinkBackend::Elasticsearch(
            ElasticsearchSink::new(es.clone()).context("💀 Failed to build the Elasticsearch sink")?,
        ),
        SinkConfig::InMemory(mem) => SinkBackend::InMemory(InMemorySink::new(mem.clone())),
    })
}

/// 🚀 Run one transfer over `range` with everything the config describes.
pub async fn run(app_config: AppConfig, range: DateRange) -> Result<RunSummary> {
    let sink = build_sink(&app_config.sink_config)?;
    let mut source = open_source(&app_config.source_config, &range).await?;
    let transform = SampleDocumentTransform::new(app_config.transfer.source_label.clone());
    transfer::copy(&mut source, &sink, &transform, &range).await
}

/// 🔍 Describe a table's columns using the configured Postgres connection.
pub async fn describe(app_config: &AppConfig, table: &str, schema: Option<&str>) -> Result<Vec<Column>> {
    let SourceConfig::Postgres(pg) = &app_config.source_config else {
        bail!("💀 Column lookup needs a Postgres source in the config. RAM has no information_schema.");
    };
    let client = backends::postgres_source::connect(&pg.connection_string).await?;
    introspect::describe_columns(&client, table, schema)
        .await
        .with_context(|| format!("💀 Could not describe table '{}'", table))
}
