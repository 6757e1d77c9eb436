//! 🧪 Sample rows → sample documents.
//!
//! `code` becomes `sample_code`, `description` tags along, and the metadata gets a
//! constant source label plus the local wall-clock time of capture. 🦆

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::common::{Document, DocumentMetadata, RawRecord};
use crate::transforms::{RecordShapeError, RecordTransform};

/// 📦 The sample transform. Holds the run's source label, and a clock.
///
/// The clock is a plain `fn` pointer so tests can freeze time without a
/// trait object or a mocking framework. Production uses local `now`.
#[derive(Debug, Clone)]
pub struct SampleDocumentTransform {
    source_label: String,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl SampleDocumentTransform {
    pub fn new(source_label: impl Into<String>) -> Self {
        Self::with_clock(source_label, local_now)
    }

    pub fn with_clock(source_label: impl Into<String>, clock: fn() -> NaiveDateTime) -> Self {
        Self {
            source_label: source_label.into(),
            clock,
        }
    }

    pub fn source_label(&self) -> &str {
        &self.source_label
    }
}

impl RecordTransform for SampleDocumentTransform {
    fn transform_record(&self, record: RawRecord) -> Result<Document, RecordShapeError> {
        let sample_code = match record.field("code") {
            Some(Value::String(code)) => code.clone(),
            Some(Value::Number(code)) => code.to_string(),
            Some(Value::Null) | None => {
                return Err(RecordShapeError::MissingField { field: "code" });
            }
            Some(other) => {
                return Err(RecordShapeError::UnusableValue {
                    field: "code",
                    value: other.to_string(),
                });
            }
        };
        let description = match record.field("description") {
            Some(Value::String(text)) => Some(text.clone()),
            // -- NULL in the table, null in the index. Honest.
            Some(Value::Null) => None,
            Some(other) => Some(other.to_string()),
            None => return Err(RecordShapeError::MissingField { field: "description" }),
        };

        let document = Document {
            sample_code,
            description,
            metadata: DocumentMetadata {
                source: self.source_label.clone(),
                transferred_at: (self.clock)(),
            },
        };
        debug!("🔄 {:?}", document);
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::transform_chunk;
    use serde_json::json;

    fn frozen() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_opt(3, 4, 5))
            .expect("💀 a valid frozen instant")
    }

    fn row(code: Value, description: Value) -> RawRecord {
        RawRecord::from_pairs([("CODE", code), ("DESCRIPTION", description)])
    }

    #[test]
    fn the_one_where_a_row_becomes_a_document() -> Result<(), RecordShapeError> {
        let transform = SampleDocumentTransform::with_clock("ORACLE_DB", frozen);
        let document = transform.transform_record(row(json!("S-1"), json!("sandstone")))?;

        assert_eq!(document.sample_code, "S-1");
        assert_eq!(document.description.as_deref(), Some("sandstone"));
        assert_eq!(document.metadata.source, "ORACLE_DB");
        assert_eq!(document.metadata.transferred_at, frozen());
        Ok(())
    }

    #[test]
    fn the_one_where_the_same_row_twice_is_the_same_document() -> Result<(), RecordShapeError> {
        // 🧪 idempotence on everything but the clock, using the real clock on purpose
        let transform = SampleDocumentTransform::new("ORACLE_DB");
        let first = transform.transform_record(row(json!("S-9"), json!("shale")))?;
        let second = transform.transform_record(row(json!("S-9"), json!("shale")))?;

        assert_eq!(first.sample_code, second.sample_code);
        assert_eq!(first.description, second.description);
        assert_eq!(first.metadata.source, second.metadata.source);
        assert!(second.metadata.transferred_at >= first.metadata.transferred_at);
        Ok(())
    }

    #[test]
    fn the_one_where_numbers_and_nulls_are_tolerated() -> Result<(), RecordShapeError> {
        let transform = SampleDocumentTransform::with_clock("X", frozen);
        let document = transform.transform_record(row(json!(42), Value::Null))?;
        assert_eq!(document.sample_code, "42");
        assert_eq!(document.description, None);
        Ok(())
    }

    #[test]
    fn the_one_where_a_row_forgot_its_code() {
        let transform = SampleDocumentTransform::with_clock("X", frozen);
        let missing = RawRecord::from_pairs([("description", json!("orphan"))]);
        assert_eq!(
            transform.transform_record(missing),
            Err(RecordShapeError::MissingField { field: "code" })
        );

        let nested = row(json!({"not": "a code"}), json!("weird"));
        assert!(matches!(
            transform.transform_record(nested),
            Err(RecordShapeError::UnusableValue { field: "code", .. })
        ));
    }

    #[test]
    fn the_one_where_a_chunk_keeps_its_shape() -> Result<(), RecordShapeError> {
        let transform = SampleDocumentTransform::with_clock("X", frozen);
        let chunk = vec![
            row(json!("A"), json!("a")),
            row(json!("B"), json!("b")),
            row(json!("C"), json!("c")),
        ];
        let documents = transform_chunk(&transform, chunk)?;
        let codes: Vec<&str> = documents.iter().map(|d| d.sample_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "B", "C"]);
        Ok(())
    }

    #[test]
    fn the_one_where_one_bad_row_spoils_the_chunk() {
        let transform = SampleDocumentTransform::with_clock("X", frozen);
        let chunk = vec![
            row(json!("A"), json!("a")),
            RawRecord::from_pairs([("code", json!("B"))]),
        ];
        assert_eq!(
            transform_chunk(&transform, chunk),
            Err(RecordShapeError::MissingField { field: "description" })
        );
    }
}
