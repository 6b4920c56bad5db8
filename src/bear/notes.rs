//! Typed views over Bear's callback payloads.
//!
//! Bear returns scalar fields as plain query parameters, but lists (`notes`,
//! `tags`) arrive as JSON strings. Depending on the action, a note's `tags`
//! is either a JSON array or a string holding one, so both are accepted.

use serde::{Deserialize, Deserializer, Serialize};

use super::{BearError, CallbackFields};

/// A full note as returned by `open-note`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub note: String,
    pub identifier: String,
    pub title: String,
    pub tags: Vec<String>,
    #[serde(rename = "is_trashed")]
    pub is_trashed: bool,
    pub modification_date: String,
    pub creation_date: String,
}

/// A note entry in listings (`search`, `open-tag`, sidebar items).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteInfo {
    pub title: String,
    pub identifier: String,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub modification_date: String,
    #[serde(default)]
    pub creation_date: String,
    #[serde(default = "default_pin")]
    pub pin: String,
}

fn default_pin() -> String {
    "no".to_string()
}

#[derive(Deserialize)]
struct TagEntry {
    name: Option<String>,
}

impl Note {
    /// Builds a note from an `open-note` callback.
    pub fn from_fields(fields: &CallbackFields) -> Result<Self, BearError> {
        let required = |key: &str| {
            fields.get(key).map(str::to_string).ok_or_else(|| {
                BearError::MalformedResponse(format!("open-note response lacks '{key}'"))
            })
        };

        Ok(Self {
            note: required("note")?,
            identifier: required("identifier")?,
            title: fields.get("title").unwrap_or_default().to_string(),
            tags: fields.get("tags").map(parse_tag_list).transpose()?.unwrap_or_default(),
            is_trashed: fields.get("is_trashed") == Some("yes"),
            modification_date: fields.get("modificationDate").unwrap_or_default().to_string(),
            creation_date: fields.get("creationDate").unwrap_or_default().to_string(),
        })
    }
}

/// Parses the JSON `notes` field of a listing callback.
///
/// A missing field means Bear found nothing.
pub fn notes_from_fields(fields: &CallbackFields) -> Result<Vec<NoteInfo>, BearError> {
    match fields.get("notes") {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| BearError::MalformedResponse(format!("invalid notes JSON: {e}"))),
    }
}

/// Extracts tag names from the `tags` callback (`[{"name": "..."}, ...]`).
pub fn tag_names_from_fields(fields: &CallbackFields) -> Result<Vec<String>, BearError> {
    let Some(raw) = fields.get("tags") else {
        return Ok(Vec::new());
    };
    let entries: Vec<TagEntry> = serde_json::from_str(raw)
        .map_err(|e| BearError::MalformedResponse(format!("invalid tags JSON: {e}")))?;
    Ok(entries.into_iter().filter_map(|t| t.name).collect())
}

/// Parses a JSON array of tag names.
fn parse_tag_list(raw: &str) -> Result<Vec<String>, BearError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| BearError::MalformedResponse(format!("invalid tag list: {e}")))
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Encoded(String),
    }

    match Option::<Tags>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(Tags::List(tags)) => Ok(tags),
        Some(Tags::Encoded(raw)) => parse_tag_list(&raw).map_err(serde::de::Error::custom),
    }
}
