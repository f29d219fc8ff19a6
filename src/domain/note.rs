// src/domain/note.rs
use crate::domain::duplicate::NoteOptions;
use crate::domain::error::DomainError;
use crate::domain::model::ModelInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A note read back from the collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: i64,
    pub model_id: i64,
    pub model_name: String,
    pub fields: Vec<NoteField>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteField {
    pub name: String,
    pub value: String,
}

/// Inbound note payload, in the AnkiConnect `addNote` shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
    pub model_name: String,
    pub deck_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<OneOrMany<MediaAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<OneOrMany<MediaAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<OneOrMany<MediaAttachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<NoteOptions>,
}

impl NoteRequest {
    pub fn new(model_name: impl Into<String>, deck_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            deck_name: deck_name.into(),
            fields: BTreeMap::new(),
            tags: None,
            audio: None,
            video: None,
            picture: None,
            options: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// All attachments in processing order: audio, then video, then picture,
    /// each list in declaration order.
    pub fn media(&self) -> impl Iterator<Item = (MediaKind, &MediaAttachment)> {
        [
            (MediaKind::Audio, &self.audio),
            (MediaKind::Video, &self.video),
            (MediaKind::Picture, &self.picture),
        ]
        .into_iter()
        .flat_map(|(kind, media)| {
            media
                .iter()
                .flat_map(|m| m.as_slice())
                .map(move |attachment| (kind, attachment))
        })
    }
}

/// Accepts either a single object or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Picture,
}

impl MediaKind {
    pub fn markup(&self, filename: &str) -> String {
        match self {
            MediaKind::Picture => format!(r#"<img src="{}">"#, filename),
            MediaKind::Audio | MediaKind::Video => format!("[sound:{}]", filename),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAttachment {
    pub filename: String,
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_existing: Option<bool>,
}

/// Where the bytes of an attachment come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSource<'a> {
    Path(&'a str),
    Data(&'a str),
    Url(&'a str),
}

impl MediaAttachment {
    pub fn source(&self) -> Result<MediaSource<'_>, DomainError> {
        let provided: Vec<MediaSource<'_>> = [
            self.path.as_deref().map(MediaSource::Path),
            self.data.as_deref().map(MediaSource::Data),
            self.url.as_deref().map(MediaSource::Url),
        ]
        .into_iter()
        .flatten()
        .collect();

        match provided.as_slice() {
            [source] => Ok(*source),
            [] => Err(DomainError::MediaSource(
                r#"you must provide a "data", "path", or "url" field"#.to_string(),
            )),
            _ => Err(DomainError::MediaSource(
                r#"only one of "data", "path", or "url" may be provided"#.to_string(),
            )),
        }
    }

    pub fn delete_existing(&self) -> bool {
        self.delete_existing.unwrap_or(true)
    }
}

/// In-flight note: bound to a model and deck, fields in model order.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub id: Option<i64>,
    pub model_id: i64,
    pub deck_id: i64,
    pub fields: Vec<NoteField>,
    pub tags: Vec<String>,
}

impl NoteDraft {
    pub fn new(model: &ModelInfo, deck_id: i64) -> Self {
        Self {
            id: None,
            model_id: model.id,
            deck_id,
            fields: model
                .fields
                .iter()
                .map(|name| NoteField {
                    name: name.clone(),
                    value: String::new(),
                })
                .collect(),
            tags: vec![],
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Append to a field's current value. Returns false if the note has no such field.
    pub fn append_to_field(&mut self, name: &str, text: &str) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.value.push_str(text);
                true
            }
            None => false,
        }
    }

    /// First declared field, the uniqueness key.
    pub fn primary_field(&self) -> &str {
        self.fields.first().map(|f| f.value.as_str()).unwrap_or("")
    }

    pub fn values(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.value.clone()).collect()
    }

    /// Assign request fields after matching them case-insensitively to the
    /// model's declared names. Unknown names are dropped; two input names that
    /// land on the same model field are rejected.
    pub fn assign_fields(&mut self, input: &BTreeMap<String, String>) -> Result<(), DomainError> {
        let mut canonical: BTreeMap<usize, Vec<(&str, &str)>> = BTreeMap::new();
        for (name, value) in input {
            let lowered = name.to_lowercase();
            if let Some(idx) = self
                .fields
                .iter()
                .position(|f| f.name.to_lowercase() == lowered)
            {
                canonical
                    .entry(idx)
                    .or_default()
                    .push((name.as_str(), value.as_str()));
            }
        }

        for (idx, candidates) in canonical {
            match candidates.as_slice() {
                [(_, value)] => self.fields[idx].value = value.to_string(),
                _ => {
                    return Err(DomainError::FieldCollision {
                        field: self.fields[idx].name.clone(),
                        names: candidates.iter().map(|(n, _)| n.to_string()).collect(),
                    })
                }
            }
        }
        Ok(())
    }
}
