//! 🔄 Transforms — the Rosetta Stone between rows and documents 🎭
//!
//! 🎬 COLD OPEN — INT. TRANSLATION BOOTH — 2:47 AM
//!
//! Relational rows on the left screen. Search documents on the right. In between:
//! this module, armed with nothing but a `match` and a wall clock.
//!
//! ```text
//!   RawRecord                      Document
//!  ┌──────────────┐            ┌──────────────────────────┐
//!  │ code         │───────────▶│ sample_code              │
//!  │ description  │───────────▶│ description              │
//!  │ (anything)   │   ignored  │ metadata.source  (const) │
//!  └──────────────┘            │ metadata.transferred_at  │
//!                              └──────────────────────────┘
//! ```
//!
//! ## Knowledge Graph 🧠
//! - Pure per record, except `transferred_at`, which is captured per record, not per
//!   chunk. Two rows in one chunk may disagree by a tick. That is fine. Clocks tick.
//! - A record missing `code` or `description` is a schema-contract violation: the
//!   query and the transform disagree about what a row is. Fatal, no retry.
//!
//! 🦆

use thiserror::Error;

use crate::common::{Document, RawRecord};

pub mod sample_document;

pub use sample_document::SampleDocumentTransform;

/// 💀 The row did not look like the row we were promised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordShapeError {
    #[error("record is missing required field '{field}'")]
    MissingField { field: &'static str },
    #[error("record field '{field}' has unusable value {value}")]
    UnusableValue { field: &'static str, value: String },
}

/// 🔄 RecordTransform — one raw row in, one sink-ready document out.
///
/// # Contract 📜
/// - Same record, same instant → same document.
/// - Never fails on well-shaped input.
/// - `Send + Sync` so a transform can be shared across a run without ceremony.
pub trait RecordTransform: Send + Sync {
    fn transform_record(&self, record: RawRecord) -> Result<Document, RecordShapeError>;
}

/// 🏭 Transform a whole chunk, keeping length and order.
///
/// Stops at the first malformed record. The chunk is then dead, and so is the run.
pub fn transform_chunk<T>(
    transform: &T,
    chunk: Vec<RawRecord>,
) -> Result<Vec<Document>, RecordShapeError>
where
    T: RecordTransform + ?Sized,
{
    chunk
        .into_iter()
        .map(|record| transform.transform_record(record))
        .collect()
}
