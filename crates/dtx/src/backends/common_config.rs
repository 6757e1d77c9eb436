//! 📦 **Common Backend Configs** — the shared DNA of source configuration.
//!
//! 🧠 Knowledge graph:
//! - `CommonSourceConfig` is flattened into every source config (`PostgresSourceConfig`,
//!   `InMemorySourceConfig`). It answers one question: how many rows per chunk?
//! - Chunk size is also the concurrency bound of the dispatcher. Pick it with that in mind:
//!   5000 rows means up to 5000 in-flight HTTP requests. Your sink has feelings. 🦆

use serde::Deserialize;

/// 📦 Shared knobs embedded by every source backend config.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CommonSourceConfig {
    /// 📦 Rows per chunk. Also: documents in flight at once. Choose wisely.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

// -- 📦 5000 rows: the page size the original ETL helpers used, and nobody got fired for it.
fn default_chunk_size() -> usize {
    5000
}

impl Default for CommonSourceConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

impl CommonSourceConfig {
    /// 🔒 A chunk size of zero would be an infinite loop of nothing. Clamp to at least one.
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}
