// src/domain/mod.rs
pub mod duplicate;
pub mod error;
pub mod model;
pub mod note;

pub use duplicate::{DuplicateScope, DuplicateStatus, NoteOptions, ScopeKind};
pub use error::DomainError;
pub use model::{DeckInfo, ModelInfo};
pub use note::{MediaAttachment, MediaKind, MediaSource, Note, NoteDraft, NoteField, NoteRequest};
