//! 🔧 App Configuration — the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." — every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::backends::{
    ElasticsearchSinkConfig, InMemorySinkConfig, InMemorySourceConfig, PostgresSourceConfig,
};
use crate::common::{DateRange, parse_bound};

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 🚰 Where the rows come from.
    pub source_config: SourceConfig,
    /// 🕳️ Where the documents go. Defaults to a local Elasticsearch, `samples` index.
    #[serde(default)]
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// 🎭 Source backends, tagged by name: `[source_config.postgres]` or `[source_config.in_memory]`.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    Postgres(PostgresSourceConfig),
    InMemory(InMemorySourceConfig),
}

/// 🎭 Sink backends, tagged the same way.
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum SinkConfig {
    Elasticsearch(ElasticsearchSinkConfig),
    InMemory(InMemorySinkConfig),
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Elasticsearch(ElasticsearchSinkConfig::default())
    }
}

/// 🚚 Per-run knobs: the source label stamped on every document and the date window.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    #[serde(default = "default_source_label")]
    pub source_label: String,
    /// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`. Defaults to 2000-01-01.
    #[serde(default)]
    pub start: Option<String>,
    /// Same formats. Defaults to the start of today.
    #[serde(default)]
    pub end: Option<String>,
}

fn default_source_label() -> String {
    "ORACLE_DB".to_string()
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source_label: default_source_label(),
            start: None,
            end: None,
        }
    }
}

impl TransferConfig {
    /// 📅 Resolve the configured bounds against `today`, filling gaps with the defaults.
    pub fn date_range(&self, today: NaiveDate) -> Result<DateRange> {
        let default = DateRange::through_start_of(today)?;
        let start = resolve_bound(self.start.as_deref(), default.start())?;
        let end = resolve_bound(self.end.as_deref(), default.end())?;
        DateRange::new(start, end)
    }
}

fn resolve_bound(raw: Option<&str>, fallback: NaiveDateTime) -> Result<NaiveDateTime> {
    match raw {
        Some(raw) => parse_bound(raw),
        None => Ok(fallback),
    }
}

/// 🚀 Load the config — from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges `DTX_*` environment variables (nested with `__`, e.g.
/// `DTX_SOURCE_CONFIG__POSTGRES__CONNECTION_STRING`) with an optional TOML file.
/// TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );
    let figment = Figment::new().merge(Env::prefixed("DTX_").split("__"));
    let figment = match config_file_name {
        Some(file_name) => figment.merge(Toml::file(file_name)),
        None => figment,
    };
    extract(figment, config_file_name)
}

fn extract(figment: Figment, config_file_name: Option<&Path>) -> Result<AppConfig> {
    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (DTX_*). \
             The file exists in our hearts, but apparently not in a shape serde likes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (DTX_*). \
                 No file was provided — this one's all on the environment. Classic."
            .to_string(),
    };
    figment.extract().context(context_msg)
}
