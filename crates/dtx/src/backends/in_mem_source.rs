//! # Previously, on dtx...
//!
//! 🎬 The rows were trapped. Not in a database, not on a disk, but in a `Vec`
//! that someone typed into a test at 4pm on a Friday. Someone had to page
//! through them. Someone had to pretend to be a cursor.
//!
//! That someone was this module.
//!
//! [`InMemorySource`] serves a fixed list of records in `chunk_size` pages,
//! in order, exactly once. Great for tests, great for dry runs, great for
//! proving the transfer loop works without summoning a Postgres container.
//!
//! ⚠️ This is NOT for production. If you're deploying this to prod, please
//! also deploy a therapist. 🦆

use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;

use crate::backends::{ChunkSource, CommonSourceConfig};
use crate::common::RawRecord;

/// 📋 Config for the in-memory source: the records themselves, plus chunk sizing.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub records: Vec<RawRecord>,
    #[serde(flatten)]
    pub common_config: CommonSourceConfig,
}

/// 📦 The world's most predictable data source.
#[derive(Debug)]
pub struct InMemorySource {
    pending: VecDeque<RawRecord>,
    chunk_size: usize,
}

impl InMemorySource {
    pub fn new(config: InMemorySourceConfig) -> Self {
        Self::from_records(config.records, config.common_config.effective_chunk_size())
    }

    /// 🏗️ Skip the config ceremony. Tests love this one.
    pub fn from_records(records: Vec<RawRecord>, chunk_size: usize) -> Self {
        Self {
            pending: records.into(),
            chunk_size: chunk_size.max(1),
        }
    }
}

#[async_trait]
impl ChunkSource for InMemorySource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<RawRecord>>> {
        if self.pending.is_empty() {
            // 💀 The well is dry. It will stay dry.
            return Ok(None);
        }
        let take = self.chunk_size.min(self.pending.len());
        let chunk: Vec<RawRecord> = self.pending.drain(..take).collect();
        trace!("📦 InMemorySource served {} records, {} still waiting", chunk.len(), self.pending.len());
        Ok(Some(chunk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn numbered(n: usize) -> Vec<RawRecord> {
        (0..n)
            .map(|i| RawRecord::from_pairs([("code", json!(format!("S-{i}")))]))
            .collect()
    }

    #[tokio::test]
    async fn the_one_where_seven_rows_come_in_threes() -> Result<()> {
        let mut source = InMemorySource::from_records(numbered(7), 3);
        let mut sizes = Vec::new();
        while let Some(chunk) = source.next_chunk().await? {
            sizes.push(chunk.len());
        }
        assert_eq!(sizes, vec![3, 3, 1]);
        // 🔒 exhausted means exhausted. No encore.
        assert!(source.next_chunk().await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_order_survives_the_paging() -> Result<()> {
        let mut source = InMemorySource::from_records(numbered(4), 2);
        let mut codes = Vec::new();
        while let Some(chunk) = source.next_chunk().await? {
            codes.extend(chunk.iter().filter_map(|r| r.field("code").cloned()));
        }
        assert_eq!(codes, vec![json!("S-0"), json!("S-1"), json!("S-2"), json!("S-3")]);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nothing_in_means_nothing_out() -> Result<()> {
        let mut source = InMemorySource::new(InMemorySourceConfig::default());
        assert!(source.next_chunk().await?.is_none());
        Ok(())
    }
}
