//! 📦 Common data structures — the building blocks of dtx
//!
//! 🎬 COLD OPEN — INT. DATABASE — 2:14 AM
//!
//! A row sits in a table. It has been sitting there since 2003. It has a `code`,
//! a `description`, and a `date_updated` that nobody has touched since the intern
//! left. Tonight, it will become a document. It does not know this yet.
//!
//! This module defines the shapes that data takes on its way through the pipe:
//! a [`RawRecord`] as it leaves the source, a [`Document`] as it arrives at the
//! sink, and the [`DateRange`] that decides which rows get invited to the party.
//!
//! 🦆

use anyhow::{Result, anyhow, bail};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

// -- 📅 the dawn of time, as far as this pipeline is concerned. Y2K survivors only.
const EPOCH_OF_RECORD: (i32, u32, u32) = (2000, 1, 1);

/// 📅 The inclusive window of `date_updated` values a run copies.
///
/// Built once per run and never mutated. `start <= end` is checked at construction,
/// because a range that ends before it starts is a time machine, and we are not
/// licensed to operate those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// 🏗️ Build a range, refusing to go backwards in time.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            bail!(
                "💀 Date range starts at {} but ends at {}. Time flows forwards here, please flip them.",
                start,
                end
            );
        }
        Ok(Self { start, end })
    }

    /// 📅 The default run window: 2000-01-01 00:00:00 through 00:00:00 on `today`.
    pub fn through_start_of(today: NaiveDate) -> Result<Self> {
        let (year, month, day) = EPOCH_OF_RECORD;
        let dawn = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| anyhow!("💀 The calendar no longer contains {year}-{month}-{day}. Y2K finally got us."))?
            .and_time(NaiveTime::MIN);
        Self::new(dawn, today.and_time(NaiveTime::MIN))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }
}

/// 🧾 Parse a user-supplied bound: either `YYYY-MM-DD` (midnight implied) or a full
/// `YYYY-MM-DDTHH:MM:SS[.fff]` timestamp.
pub fn parse_bound(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(stamp);
        }
    }
    bail!(
        "💀 Could not read '{}' as a date. Try YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS.",
        raw
    )
}

/// 🚰 One row, fresh out of the source, fields keyed by column name.
///
/// Opaque on purpose: the source doesn't know what the sink wants, and the
/// transformer is the only one who goes digging in here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// 🏗️ Convenience builder for tests and in-memory sources.
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// 🔍 Look a field up by name, ignoring case.
    ///
    /// Oracle shouts its column names, Postgres whispers them. We listen to both.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value)
        })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for RawRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self::new(Map::deserialize(deserializer)?))
    }
}

/// 📄 A sink-ready document. One per [`RawRecord`], immutable once born.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub sample_code: String,
    /// `None` serializes as JSON `null`, which is what a NULL column deserves.
    pub description: Option<String>,
    pub metadata: DocumentMetadata,
}

/// 🏷️ Where the document came from and when it left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Constant per run. The return address on the envelope.
    pub source: String,
    /// Wall-clock capture time, taken per record. Microsecond precision on the wire.
    #[serde(serialize_with = "serialize_isoformat")]
    pub transferred_at: NaiveDateTime,
}

/// 🕰️ ISO-8601 to the microsecond, and no fraction at all when there isn't one.
fn serialize_isoformat<S>(at: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let format = if at.nanosecond() / 1_000 == 0 {
        "%Y-%m-%dT%H:%M:%S"
    } else {
        "%Y-%m-%dT%H:%M:%S%.6f"
    };
    serializer.collect_str(&at.format(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_time_refuses_to_run_backwards() {
        let later = parse_bound("2020-01-02").expect("valid date");
        let earlier = parse_bound("2020-01-01").expect("valid date");
        assert!(DateRange::new(later, earlier).is_err());
        assert!(DateRange::new(earlier, earlier).is_ok(), "a single instant is still a range");
    }

    #[test]
    fn the_one_where_the_default_window_starts_at_y2k() -> Result<()> {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).expect("valid date");
        let range = DateRange::through_start_of(today)?;
        assert_eq!(range.start().to_string(), "2000-01-01 00:00:00");
        assert_eq!(range.end().to_string(), "2026-10-19 00:00:00");
        Ok(())
    }

    #[test]
    fn the_one_where_bounds_come_in_every_flavor() -> Result<()> {
        assert_eq!(parse_bound("2001-02-03")?.to_string(), "2001-02-03 00:00:00");
        assert_eq!(parse_bound("2001-02-03T04:05:06")?.to_string(), "2001-02-03 04:05:06");
        assert_eq!(parse_bound(" 2001-02-03 04:05:06.5 ")?.to_string(), "2001-02-03 04:05:06.500");
        assert!(parse_bound("last tuesday").is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_oracle_shouts_and_we_still_hear_it() {
        let record = RawRecord::from_pairs([("CODE", json!("S-1")), ("Description", json!("rock"))]);
        assert_eq!(record.field("code"), Some(&json!("S-1")));
        assert_eq!(record.field("description"), Some(&json!("rock")));
        assert_eq!(record.field("date_updated"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn the_one_where_a_document_serializes_like_the_sink_expects() -> Result<()> {
        let document = Document {
            sample_code: "S-1".to_string(),
            description: None,
            metadata: DocumentMetadata {
                source: "ORACLE_DB".to_string(),
                transferred_at: parse_bound("2024-05-06T07:08:09")?,
            },
        };
        let wire = serde_json::to_value(&document)?;
        assert_eq!(
            wire,
            json!({
                "sample_code": "S-1",
                "description": null,
                "metadata": {"source": "ORACLE_DB", "transferred_at": "2024-05-06T07:08:09"}
            })
        );
        Ok(())
    }

    #[test]
    fn the_one_where_nanoseconds_are_politely_ignored() -> Result<()> {
        let at = parse_bound("2024-05-06T07:08:09.123456789")?;
        let metadata = DocumentMetadata {
            source: "ORACLE_DB".to_string(),
            transferred_at: at,
        };
        let wire = serde_json::to_value(&metadata)?;
        assert_eq!(wire["transferred_at"], json!("2024-05-06T07:08:09.123456"));

        // 🔄 the sink's copy still reads back, minus the nanoseconds nobody asked for
        let back: DocumentMetadata = serde_json::from_value(wire)?;
        assert_eq!(back.transferred_at, parse_bound("2024-05-06T07:08:09.123456")?);
        Ok(())
    }
}
