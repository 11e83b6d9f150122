use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::encryption::EncryptedPayload;

/// Note category.
///
/// Serialized with the names existing stores and exports already contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    #[serde(rename = "Travail", alias = "Work", alias = "work")]
    Work,
    #[serde(rename = "Perso", alias = "Personal", alias = "personal")]
    Personal,
    #[serde(rename = "Urgent", alias = "urgent")]
    Urgent,
    #[default]
    #[serde(rename = "Autre", alias = "Other", alias = "other")]
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Work, Self::Personal, Self::Urgent, Self::Other];

    /// Name used in stored records and exports
    pub fn stored_name(&self) -> &'static str {
        match self {
            Self::Work => "Travail",
            Self::Personal => "Perso",
            Self::Urgent => "Urgent",
            Self::Other => "Autre",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Work => "Work",
            Self::Personal => "Personal",
            Self::Urgent => "Urgent",
            Self::Other => "Other",
        };
        f.write_str(name)
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "work" | "travail" => Ok(Self::Work),
            "personal" | "perso" => Ok(Self::Personal),
            "urgent" => Ok(Self::Urgent),
            "other" | "autre" => Ok(Self::Other),
            other => Err(format!(
                "unknown category '{}' (expected work, personal, urgent or other)",
                other
            )),
        }
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(0).single().unwrap_or_default()
}

/// Category from a stored value. Empty, unknown or non-string values give `None`.
fn lenient_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn category_or_other<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_category(deserializer)?.unwrap_or_default())
}

/// Positive epoch milliseconds, anything else gives `None`
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()).filter(|ms| *ms > 0))
}

/// Current time at the millisecond precision notes are stored with
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A decrypted shortcut note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Store-assigned record id, absent until the note has been saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub title: String,
    pub content: String,
    #[serde(default, deserialize_with = "category_or_other")]
    pub category: Category,
    #[serde(
        rename = "lastUsed",
        with = "chrono::serde::ts_milliseconds",
        default = "epoch"
    )]
    pub last_used_at: DateTime<Utc>,
}

impl Note {
    pub fn new(title: impl Into<String>, content: impl Into<String>, category: Category) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            category,
            last_used_at: now_millis(),
        }
    }

    /// Copy of this note with the store id dropped, the shape that gets encrypted
    pub fn without_id(&self) -> Self {
        Self {
            id: None,
            ..self.clone()
        }
    }

    /// Same user-visible content, ignoring the store id
    pub fn same_content(&self, other: &Note) -> bool {
        self.title == other.title
            && self.content == other.content
            && self.category == other.category
            && self.last_used_at == other.last_used_at
    }
}

/// Plaintext note as kept by the pre-encryption versions of the app
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNote {
    pub title: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<Category>,
    #[serde(default, rename = "lastUsed", deserialize_with = "lenient_millis")]
    pub last_used: Option<i64>,
}

/// Encrypted body of a stored record, in either of the two on-disk schemas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordBody {
    /// Title and content sealed separately, category and last use in clear
    PerField {
        title: EncryptedPayload,
        content: EncryptedPayload,
        #[serde(default, deserialize_with = "category_or_other")]
        category: Category,
        #[serde(rename = "lastUsed", default)]
        last_used: i64,
    },
    /// The whole note (minus id) sealed as one JSON document
    Whole(EncryptedPayload),
}

impl RecordBody {
    pub fn schema(&self) -> RecordSchema {
        match self {
            Self::PerField { .. } => RecordSchema::PerField,
            Self::Whole(_) => RecordSchema::Whole,
        }
    }
}

/// Which encrypted layout a record uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    PerField,
    Whole,
}

/// A record as held by the record store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    #[serde(flatten)]
    pub body: RecordBody,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_wire_names() {
        assert_eq!(serde_json::to_string(&Category::Work).unwrap(), "\"Travail\"");
        assert_eq!(serde_json::to_string(&Category::Other).unwrap(), "\"Autre\"");
        let parsed: Category = serde_json::from_str("\"Personal\"").unwrap();
        assert_eq!(parsed, Category::Personal);
        assert_eq!("perso".parse::<Category>().unwrap(), Category::Personal);
        assert!("misc".parse::<Category>().is_err());
    }

    #[test]
    fn test_note_defaults_when_fields_missing() {
        let note: Note = serde_json::from_str(r#"{"title":"T","content":"C"}"#).unwrap();
        assert_eq!(note.category, Category::Other);
        assert_eq!(note.last_used_at.timestamp_millis(), 0);
        assert!(note.id.is_none());
    }

    #[test]
    fn test_legacy_note_tolerates_odd_fields() {
        let notes: Vec<LegacyNote> = serde_json::from_str(
            r#"[
                {"title":"A","content":"a","category":"","lastUsed":0},
                {"title":"B","content":"b","category":"Misc","lastUsed":"yesterday"},
                {"title":"C","content":"c","category":null},
                {"title":"D","content":"d","category":"Perso","lastUsed":1700000000000}
            ]"#,
        )
        .unwrap();
        assert_eq!(notes.len(), 4);
        assert!(notes[..3].iter().all(|n| n.category.is_none()));
        assert!(notes[..3].iter().all(|n| n.last_used.is_none()));
        assert_eq!(notes[3].category, Some(Category::Personal));
        assert_eq!(notes[3].last_used, Some(1_700_000_000_000));
    }

    #[test]
    fn test_unknown_category_reads_as_other() {
        let note: Note =
            serde_json::from_str(r#"{"title":"T","content":"C","category":"Misc"}"#).unwrap();
        assert_eq!(note.category, Category::Other);
    }

    #[test]
    fn test_note_serializes_without_id() {
        let note = Note::new("T", "C", Category::Urgent);
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["category"], "Urgent");
        assert!(json["lastUsed"].is_i64());
    }

    #[test]
    fn test_record_schemas_parse() {
        let whole = r#"{"id":3,"iv":[1,2,3,4,5,6,7,8,9,10,11,12],"data":[9,9]}"#;
        let record: StoredRecord = serde_json::from_str(whole).unwrap();
        assert_eq!(record.id, 3);
        assert_eq!(record.body.schema(), RecordSchema::Whole);

        let per_field = r#"{
            "id": 4,
            "title": {"iv":[1,2,3,4,5,6,7,8,9,10,11,12],"data":[1]},
            "content": {"iv":[1,2,3,4,5,6,7,8,9,10,11,12],"data":[2]},
            "category": "Perso",
            "lastUsed": 1700000000000
        }"#;
        let record: StoredRecord = serde_json::from_str(per_field).unwrap();
        match record.body {
            RecordBody::PerField { category, last_used, .. } => {
                assert_eq!(category, Category::Personal);
                assert_eq!(last_used, 1_700_000_000_000);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }
}
