// src/domain/model.rs
use serde::Serialize;

/// A note type: declared field names and card templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
    pub templates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeckInfo {
    pub id: i64,
    pub name: String,
}

/// Separator between deck name components, e.g. `Languages::French`.
pub const DECK_SEPARATOR: &str = "::";

impl DeckInfo {
    /// True if this deck sits anywhere below `parent` in the deck tree.
    pub fn is_descendant_of(&self, parent: &str) -> bool {
        self.name
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with(DECK_SEPARATOR))
    }
}
