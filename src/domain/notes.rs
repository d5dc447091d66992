//! Project notes.
//!
//! The `comments` column holds either a JSON array of [`NoteEntry`] or, for
//! rows written before notes existed, a raw string. [`StoredNotes::decode`]
//! classifies the column once at the storage boundary so nothing downstream
//! has to sniff the shape again.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::error::{DomainError, DomainResult};

/// Id given to the synthetic note produced from a legacy raw-string column.
pub const LEGACY_NOTE_ID: &str = "legacy";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NoteId(pub String);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        NoteId(s)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        NoteId(s.to_string())
    }
}

// Older rows stored millisecond timestamps as JSON numbers.
impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => NoteId(s),
            RawId::Integer(n) => NoteId(n.to_string()),
            RawId::Float(n) => NoteId(n.to_string()),
        })
    }
}

/// Parse a stored timestamp. Accepts RFC 3339, zoneless date-times and bare
/// dates; zoneless values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized note date {raw:?}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub id: NoteId,
    pub text: String,
    #[serde(deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,
}

impl NoteEntry {
    pub fn new(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: NoteId(now.timestamp_millis().to_string()),
            text: text.into(),
            date: now,
        }
    }
}

/// The decoded `comments` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredNotes {
    #[default]
    Empty,
    NoteList(Vec<NoteEntry>),
    LegacyNote(String),
}

impl StoredNotes {
    /// Classify a raw column value. An array with any entry that is not a
    /// note is kept whole as `LegacyNote` so rewriting it cannot lose text.
    pub fn decode(raw: Option<&str>) -> Self {
        let raw = match raw {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return StoredNotes::Empty,
        };

        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Array(items)) => {
                match items
                    .into_iter()
                    .map(serde_json::from_value::<NoteEntry>)
                    .collect::<Result<Vec<_>, _>>()
                {
                    Ok(notes) => StoredNotes::NoteList(notes),
                    Err(e) => {
                        tracing::warn!("Notes column has an unreadable entry ({}), keeping it as raw text", e);
                        StoredNotes::LegacyNote(raw.to_string())
                    }
                }
            }
            Ok(_) | Err(_) => StoredNotes::LegacyNote(raw.to_string()),
        }
    }

    /// Column value to write back. `Empty` maps to null.
    pub fn encode(&self) -> DomainResult<Option<String>> {
        match self {
            StoredNotes::Empty => Ok(None),
            StoredNotes::NoteList(notes) => serialize_notes(notes).map(Some),
            StoredNotes::LegacyNote(raw) => Ok(Some(raw.clone())),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredNotes::LegacyNote(_))
    }

    /// Materialize the note list, dating a legacy note at `created_at`.
    pub fn resolve(&self, created_at: DateTime<Utc>) -> Vec<NoteEntry> {
        match self {
            StoredNotes::Empty => Vec::new(),
            StoredNotes::NoteList(notes) => notes.clone(),
            StoredNotes::LegacyNote(raw) => vec![legacy_note(raw, created_at)],
        }
    }
}

fn legacy_note(raw: &str, created_at: DateTime<Utc>) -> NoteEntry {
    NoteEntry {
        id: NoteId(LEGACY_NOTE_ID.to_string()),
        text: raw.to_string(),
        date: created_at,
    }
}

/// Parse a stored column value. Never fails.
pub fn parse_notes(raw: Option<&str>, created_at: DateTime<Utc>) -> Vec<NoteEntry> {
    StoredNotes::decode(raw).resolve(created_at)
}

pub fn serialize_notes(notes: &[NoteEntry]) -> DomainResult<String> {
    serde_json::to_string(notes).map_err(|e| DomainError::Serialization(e.to_string()))
}

/// Append a note dated `now`. Text uniqueness is not checked.
pub fn add_note(notes: &mut Vec<NoteEntry>, text: impl Into<String>, now: DateTime<Utc>) -> NoteEntry {
    let entry = NoteEntry::new(text, now);
    notes.push(entry.clone());
    entry
}

/// Remove every note with `id`. Returns whether anything was removed.
pub fn delete_note(notes: &mut Vec<NoteEntry>, id: &NoteId) -> bool {
    let before = notes.len();
    notes.retain(|note| &note.id != id);
    notes.len() != before
}
