// src/domain/duplicate.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStatus {
    Unique,
    Empty,
    Duplicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeKind {
    /// Whole collection.
    #[default]
    Collection,
    /// A single deck, optionally with its subtree.
    Deck,
}

/// Where to look for duplicates of a candidate note.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DuplicateScope {
    pub kind: ScopeKind,
    pub deck_name: Option<String>,
    pub check_children: bool,
    pub check_all_models: bool,
}

/// Per-note `options` object as sent by AnkiConnect clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteOptions {
    #[serde(default)]
    pub allow_duplicate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_scope: Option<String>,
    #[serde(default)]
    pub duplicate_scope_options: DuplicateScopeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateScopeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_name: Option<String>,
    #[serde(default)]
    pub check_children: bool,
    #[serde(default)]
    pub check_all_models: bool,
}

impl NoteOptions {
    pub fn scope(&self) -> DuplicateScope {
        let kind = match self.duplicate_scope.as_deref() {
            Some("deck") => ScopeKind::Deck,
            _ => ScopeKind::Collection,
        };
        DuplicateScope {
            kind,
            deck_name: self.duplicate_scope_options.deck_name.clone(),
            check_children: self.duplicate_scope_options.check_children,
            check_all_models: self.duplicate_scope_options.check_all_models,
        }
    }
}
