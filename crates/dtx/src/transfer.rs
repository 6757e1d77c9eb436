//! 🔁 The Transfer Loop — pull a chunk, transform it, dispatch it, count it, repeat.
//!
//! 🎬 *[narrator voice]* "It was a simple loop. It did one thing at a time.
//! And the one time it failed, it stopped, and told everyone exactly why."
//!
//! 🧠 Knowledge graph:
//! - Chunks go strictly one after another. Chunk i+1 is not fetched until chunk i
//!   is fully accepted.
//! - The row counter moves only after a chunk resolves, by the chunk's full length.
//! - Any failure (source, transform, sink) stops the loop. No retry, no skip.
//!   Chunks already delivered stay delivered.
//! - The error comes back wrapped in [`TransferAborted`], which says how far we got.
//!
//! 🦆

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::backends::{ChunkSource, Sink};
use crate::common::DateRange;
use crate::dispatch::dispatch;
use crate::progress::{RunSummary, TransferProgress};
use crate::transforms::{RecordTransform, transform_chunk};

/// 🛑 The run stopped early. `rows_transferred` counts only fully accepted chunks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "💀 Transfer stopped at chunk {chunk_number} after {rows_transferred} rows were confirmed. \
     Earlier chunks stay delivered; this one and everything after did not count."
)]
pub struct TransferAborted {
    /// 1-based number of the chunk that failed.
    pub chunk_number: u64,
    pub rows_transferred: u64,
}

/// 🚚 Copy everything `source` yields into `sink`.
///
/// `range` is only used for logging here: the source was already opened over it.
pub async fn copy<C, K, T>(
    source: &mut C,
    sink: &K,
    transform: &T,
    range: &DateRange,
) -> Result<RunSummary>
where
    C: ChunkSource + ?Sized,
    K: Sink + ?Sized,
    T: RecordTransform + ?Sized,
{
    info!(
        "Copying samples with timestamps from {} to {}",
        range.start().format("%Y-%m-%dT%H:%M:%S"),
        range.end().format("%Y-%m-%dT%H:%M:%S")
    );
    let mut progress = TransferProgress::new();

    loop {
        let aborted = TransferAborted {
            chunk_number: progress.chunks_completed() + 1,
            rows_transferred: progress.rows_transferred(),
        };

        let Some(chunk) = source.next_chunk().await.context(aborted.clone())? else {
            break;
        };
        debug!("📦 Chunk {} pulled with {} records", aborted.chunk_number, chunk.len());

        let documents = transform_chunk(transform, chunk).context(aborted.clone())?;
        let accepted = dispatch(sink, documents).await.context(aborted)?;
        progress.record_chunk(accepted.len());
    }

    info!("Transfer complete");
    Ok(progress.finish())
}
