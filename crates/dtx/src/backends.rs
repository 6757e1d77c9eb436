//! 🔌 Backends — where the real I/O happens.
//!
//! 🚰 Chunk sources pour rows out of a database, sinks slurp documents into an index.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need rows from Postgres? From a Vec someone
//! typed into a test? Need to ship documents to a search cluster, or into RAM so a
//! test can stare at them afterwards? We've got a backend for that.
//!
//! 🧠 Knowledge graph:
//! - [`ChunkSource`]: lazy, finite, not restartable. `None` means the tap ran dry.
//! - [`Sink`]: a factory for chunk-scoped [`SinkSession`]s. One session per chunk,
//!   shared by every in-flight document of that chunk, dropped when the chunk resolves.
//! - [`SinkSession`]: pure I/O. It reports what the sink said; it does not judge it.
//!   Judging is the dispatcher's job.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;

use crate::common::{Document, RawRecord};

pub mod common_config;
pub mod elasticsearch_sink;
pub mod in_mem_sink;
pub mod in_mem_source;
pub mod postgres_source;

pub use common_config::CommonSourceConfig;
pub use elasticsearch_sink::{ElasticsearchSink, ElasticsearchSinkConfig};
pub use in_mem_sink::{InMemorySink, InMemorySinkConfig};
pub use in_mem_source::{InMemorySource, InMemorySourceConfig};
pub use postgres_source::{PostgresSource, PostgresSourceConfig};

// ===== Source Trait and Backend Enum =====

/// 🚰 A source that produces ordered chunks of raw records.
///
/// # Contract
/// - `next_chunk` yields `Some(chunk)` while rows remain, then `None` forever after.
/// - Chunks arrive in source order. Never seek backwards, never iterate twice.
/// - The whole result set is never buffered; one chunk at a time, like a civilized cursor.
/// - Errors are fatal to the run. There is no "try the next page".
#[async_trait]
pub trait ChunkSource: std::fmt::Debug + Send {
    /// 📦 Fetch the next chunk. `Ok(None)` when exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<RawRecord>>>;
}

/// 🎭 The many faces of a chunk source.
#[derive(Debug)]
pub enum SourceBackend {
    InMemory(InMemorySource),
    Postgres(PostgresSource),
}

#[async_trait]
impl ChunkSource for SourceBackend {
    async fn next_chunk(&mut self) -> Result<Option<Vec<RawRecord>>> {
        match self {
            SourceBackend::InMemory(source) => source.next_chunk().await,
            SourceBackend::Postgres(source) => source.next_chunk().await,
        }
    }
}

// ===== Sink Traits and Backend Enums =====

/// 📬 What the sink said about one document. Raw. Unjudged.
///
/// `body` is only read when the status is an error, because that's the only
/// time anyone reads it, and reading it later is not an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkResponse {
    pub status: u16,
    pub body: String,
}

impl SinkResponse {
    /// ⚠️ Anything 400 and up is a rejection. The sink has spoken.
    pub fn is_rejection(&self) -> bool {
        self.status >= 400
    }
}

/// 🕳️ One chunk's worth of connection to the sink.
///
/// Shared (behind an `Arc`) by every document task of a single chunk, so it must
/// be `Send + Sync`. It performs exactly one write per `submit` call.
#[async_trait]
pub trait SinkSession: Send + Sync {
    /// 📥 Write one document. `Err` only for transport-level failures;
    /// an HTTP error status is still an `Ok(SinkResponse)`.
    async fn submit(&self, document: &Document) -> Result<SinkResponse>;
}

/// 🏭 A sink hands out sessions. Opened per chunk, torn down when the chunk resolves.
#[async_trait]
pub trait Sink: std::fmt::Debug + Send + Sync {
    type Session: SinkSession + 'static;

    /// 🔌 Open a fresh session for one chunk.
    async fn open_session(&self) -> Result<Self::Session>;
}

/// 🎭 The many faces of a sink. Mirrors [`SourceBackend`] because symmetry is comforting.
#[derive(Debug)]
pub enum SinkBackend {
    InMemory(InMemorySink),
    Elasticsearch(ElasticsearchSink),
}

/// 🎭 The sessions those faces hand out.
#[derive(Debug)]
pub enum SinkSessionBackend {
    InMemory(in_mem_sink::InMemorySession),
    Elasticsearch(elasticsearch_sink::ElasticsearchSession),
}

#[async_trait]
impl Sink for SinkBackend {
    type Session = SinkSessionBackend;

    async fn open_session(&self) -> Result<SinkSessionBackend> {
        match self {
            SinkBackend::InMemory(sink) => Ok(SinkSessionBackend::InMemory(sink.open_session().await?)),
            SinkBackend::Elasticsearch(sink) => {
                Ok(SinkSessionBackend::Elasticsearch(sink.open_session().await?))
            }
        }
    }
}

#[async_trait]
impl SinkSession for SinkSessionBackend {
    async fn submit(&self, document: &Document) -> Result<SinkResponse> {
        match self {
            SinkSessionBackend::InMemory(session) => session.submit(document).await,
            SinkSessionBackend::Elasticsearch(session) => session.submit(document).await,
        }
    }
}
