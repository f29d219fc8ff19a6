// src/domain/error.rs
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{kind} was not found: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("cannot create note because it is empty")]
    EmptyNote,
    #[error("cannot create note because it is a duplicate")]
    DuplicateNote,
    #[error("the field values you have provided would make an empty question on all cards")]
    EmptyQuestion,
    #[error("{0}")]
    Fetch(String),
    #[error("invalid media data: {0}")]
    Decode(String),
    #[error("collection storage failed: {0}")]
    Storage(String),
    #[error("{0}")]
    Protocol(String),
    #[error("remote call failed: {0}")]
    Transport(String),
    #[error("{0}")]
    MediaSource(String),
    #[error("fields {names:?} all map to model field '{field}'")]
    FieldCollision { field: String, names: Vec<String> },
    #[error("Note not found: {0}")]
    NoteNotFound(i64),
    #[error("Profile error: {0}")]
    ProfileError(String),
    #[error("Collection error: {0}")]
    CollectionError(String),
}

impl DomainError {
    pub fn model_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "model",
            name: name.to_string(),
        }
    }

    pub fn deck_not_found(name: &str) -> Self {
        Self::NotFound {
            kind: "deck",
            name: name.to_string(),
        }
    }
}
