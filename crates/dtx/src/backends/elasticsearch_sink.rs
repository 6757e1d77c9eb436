//! # 📡 THE ELASTICSEARCH SINK
//!
//! 🎬 COLD OPEN — INT. SERVER ROOM — 3:47 AM
//!
//! The monitoring dashboard glows amber. A single document is POSTed to `_doc`.
//! Then another. Then five thousand at once, because someone set the chunk size
//! to 5000 and the dispatcher took that personally.
//!
//! 🚀 This module is pure I/O: build a client, POST a document, report what came
//! back. It does not decide whether a 500 is a problem. (It is. The dispatcher
//! will tell you so, loudly, with the document attached.)
//!
//! 🧠 Knowledge graph:
//! - [`ElasticsearchSink`] owns config + the pre-computed `_doc` URL.
//! - [`ElasticsearchSession`] owns one `reqwest::Client` (and its connection pool)
//!   for the lifetime of ONE chunk. New chunk, new session.
//! - The body of an error response is read right here, at the scene of the crime,
//!   because once the response is dropped that text is gone for good.
//!
//! 🦆

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::trace;

use crate::backends::{Sink, SinkResponse, SinkSession};
use crate::common::Document;

/// 🚰 Where the documents go and how we get past the bouncer.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchSinkConfig {
    /// 📡 Base URL of the cluster, scheme and port included.
    #[serde(default = "default_url")]
    pub url: String,
    /// 📦 Target index. Documents land at `<url>/<index>/_doc`.
    #[serde(default = "default_index")]
    pub index: String,
    /// 🔒 Basic auth. Optional, like flossing.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key — wins over basic auth when both are set. This is not a democracy.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:9200/".to_string()
}

fn default_index() -> String {
    "samples".to_string()
}

// -- ⏱️ if the cluster can't shake hands in 10 seconds, it's not having a good day
fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchSinkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            index: default_index(),
            username: None,
            password: None,
            api_key: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// 📦 The sink side of the pipeline. Cheap to hold; sessions do the heavy lifting.
#[derive(Debug)]
pub struct ElasticsearchSink {
    config: ElasticsearchSinkConfig,
    doc_url: reqwest::Url,
}

impl ElasticsearchSink {
    /// 🚀 Validate the config and pre-compute the `_doc` endpoint.
    ///
    /// No connectivity ping here: the first chunk will find out soon enough, and
    /// an empty range should be able to finish without a cluster in sight.
    pub fn new(config: ElasticsearchSinkConfig) -> Result<Self> {
        // 🔧 trim_end_matches('/') — one slash of difference, infinite suffering of difference.
        let raw = format!(
            "{}/{}/_doc",
            config.url.trim_end_matches('/'),
            config.index.trim_matches('/')
        );
        let doc_url = reqwest::Url::parse(&raw).with_context(|| {
            format!(
                "💀 '{}' is not a URL we can POST to. Check `url` and `index` in the sink config.",
                raw
            )
        })?;
        Ok(Self { config, doc_url })
    }

    pub fn doc_url(&self) -> &reqwest::Url {
        &self.doc_url
    }
}

/// 🔌 One chunk's connection pool, auth, and destination.
#[derive(Debug)]
pub struct ElasticsearchSession {
    client: reqwest::Client,
    doc_url: reqwest::Url,
    config: ElasticsearchSinkConfig,
}

#[async_trait]
impl Sink for ElasticsearchSink {
    type Session = ElasticsearchSession;

    async fn open_session(&self) -> Result<ElasticsearchSession> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.config.connect_timeout_secs))
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .build()
            .context("💀 The HTTP client refused to be born. Probably TLS. It's always TLS.")?;
        Ok(ElasticsearchSession {
            client,
            doc_url: self.doc_url.clone(),
            config: self.config.clone(),
        })
    }
}

#[async_trait]
impl SinkSession for ElasticsearchSession {
    async fn submit(&self, document: &Document) -> Result<SinkResponse> {
        let body = serde_json::to_string(document)
            .context("💀 A document refused to become JSON. That should be impossible, and yet.")?;

        let mut request = self
            .client
            .post(self.doc_url.clone())
            .header(CONTENT_TYPE, "application/json");
        // 🔒 api_key beats basic auth in this club.
        if let Some(ref api_key) = self.config.api_key {
            request = request.header("Authorization", format!("ApiKey {}", api_key));
        } else if let Some(ref username) = self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request.body(body).send().await.with_context(|| {
            format!(
                "💀 The document never made it to {}. The network is giving us the silent treatment.",
                self.doc_url
            )
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            // 📜 Read the diagnostic NOW. It does not survive the response.
            let body = match response.text().await {
                Ok(text) => text,
                Err(err) => format!("<response body unreadable: {err}>"),
            };
            return Ok(SinkResponse { status, body });
        }

        // 🔌 drain the (ignored) success body so the connection goes back to the pool
        if let Err(err) = response.bytes().await {
            trace!("🔌 success body for {} left unread: {}", document.sample_code, err);
        }
        trace!("🚀 {} landed with status {}", document.sample_code, status);
        Ok(SinkResponse {
            status,
            body: String::new(),
        })
    }
}
