// src/application/collection.rs
use crate::domain::{DeckInfo, DomainError, DuplicateStatus, ModelInfo, Note, NoteDraft};
use crate::util::text::strip_html_preserving_media_filenames;
use std::collections::BTreeMap;

/// Lookup of notes whose primary field equals `text` once markup is stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateQuery {
    pub text: String,
    /// Restrict to notes of this model.
    pub model_id: Option<i64>,
    /// Leave this note out (the candidate itself when updating).
    pub exclude_note: Option<i64>,
}

/// Result of committing a new note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedNote {
    pub id: i64,
    pub card_count: usize,
}

/// Access to the note collection, its decks, models and media folder.
pub trait CollectionStore {
    fn list_models(&mut self) -> Result<Vec<ModelInfo>, DomainError>;

    fn list_decks(&mut self) -> Result<Vec<DeckInfo>, DomainError>;

    /// Model names match case-insensitively.
    fn find_model(&mut self, name: &str) -> Result<Option<ModelInfo>, DomainError> {
        let name = name.to_lowercase();
        Ok(self
            .list_models()?
            .into_iter()
            .find(|m| m.name.to_lowercase() == name))
    }

    /// Deck names match case-insensitively.
    fn find_deck(&mut self, name: &str) -> Result<Option<DeckInfo>, DomainError> {
        let name = name.to_lowercase();
        Ok(self
            .list_decks()?
            .into_iter()
            .find(|d| d.name.to_lowercase() == name))
    }

    /// Ids of every deck below `deck_id` in the deck tree.
    fn deck_children(&mut self, deck_id: i64) -> Result<Vec<i64>, DomainError> {
        let decks = self.list_decks()?;
        let Some(parent) = decks.iter().find(|d| d.id == deck_id) else {
            return Ok(vec![]);
        };
        Ok(decks
            .iter()
            .filter(|d| d.is_descendant_of(&parent.name))
            .map(|d| d.id)
            .collect())
    }

    fn duplicate_note_ids(&mut self, query: &DuplicateQuery) -> Result<Vec<i64>, DomainError>;

    /// Deck ids of all cards generated from a note.
    fn card_deck_ids(&mut self, note_id: i64) -> Result<Vec<i64>, DomainError>;

    fn get_note(&mut self, note_id: i64) -> Result<Note, DomainError>;

    /// The collection's own duplicate/empty check for a single note: empty
    /// when the stripped primary field is blank, duplicate when another note of
    /// the same model has an equal stripped primary field.
    fn duplicate_or_empty(&mut self, note: &NoteDraft) -> Result<DuplicateStatus, DomainError> {
        let primary = strip_html_preserving_media_filenames(note.primary_field());
        if primary.trim().is_empty() {
            return Ok(DuplicateStatus::Empty);
        }

        let query = DuplicateQuery {
            text: note.primary_field().to_string(),
            model_id: Some(note.model_id),
            exclude_note: note.id,
        };
        if self.duplicate_note_ids(&query)?.is_empty() {
            Ok(DuplicateStatus::Unique)
        } else {
            Ok(DuplicateStatus::Duplicate)
        }
    }

    fn add_note(&mut self, note: &NoteDraft) -> Result<AddedNote, DomainError>;

    fn update_note_fields(
        &mut self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), DomainError>;

    /// Store media bytes under `filename`, returning the name actually used.
    fn write_media(&mut self, filename: &str, data: &[u8]) -> Result<String, DomainError>;

    /// Remove a media file; a missing file is not an error.
    fn delete_media(&mut self, filename: &str) -> Result<(), DomainError>;

    /// Flush pending changes and release the collection.
    fn close(self) -> Result<(), DomainError>
    where
        Self: Sized;
}

/// Opens a fresh collection handle per operation.
pub trait StoreOpener {
    type Store: CollectionStore;

    fn open(&self) -> Result<Self::Store, DomainError>;
}

impl<T: StoreOpener + ?Sized> StoreOpener for &T {
    type Store = T::Store;

    fn open(&self) -> Result<Self::Store, DomainError> {
        (**self).open()
    }
}

/// Run `operation` against a freshly opened store and close it on every path.
/// An error from the operation takes precedence over an error from closing.
pub fn with_store<O, T, F>(opener: &O, operation: F) -> Result<T, DomainError>
where
    O: StoreOpener,
    F: FnOnce(&mut O::Store) -> Result<T, DomainError>,
{
    let mut store = opener.open()?;
    let outcome = operation(&mut store);
    let closed = store.close();
    let value = outcome?;
    closed?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::{MockCollectionStore, MockOpener};

    #[test]
    fn given_failing_operation_when_using_store_then_still_closes_and_returns_operation_error() {
        // Arrange
        let opener = MockOpener::new(MockCollectionStore::builder().build());

        // Act
        let result: Result<(), DomainError> =
            with_store(&opener, |_| Err(DomainError::DuplicateNote));

        // Assert
        assert_eq!(result, Err(DomainError::DuplicateNote));
        assert_eq!(opener.close_count(), 1);
    }

    #[test]
    fn given_successful_operation_when_using_store_then_closes_once() {
        let opener = MockOpener::new(MockCollectionStore::builder().build());

        let result = with_store(&opener, |store| store.list_decks());

        assert!(result.is_ok());
        assert_eq!(opener.close_count(), 1);
    }

    #[test]
    fn given_nested_decks_when_listing_children_then_returns_whole_subtree() {
        let mut store = MockCollectionStore::builder()
            .with_deck(1, "Lang")
            .with_deck(2, "Lang::French")
            .with_deck(3, "Lang::French::Verbs")
            .with_deck(4, "Languages")
            .build();

        let children = store.deck_children(1).unwrap();

        assert_eq!(children, vec![2, 3]);
    }

    #[test]
    fn given_same_model_note_with_equal_front_when_checking_natively_then_reports_duplicate() {
        // Arrange
        let mut store = MockCollectionStore::builder()
            .with_basic_model(10)
            .with_deck(1, "Default")
            .with_note(100, 10, &["<b>hi</b>", "bye"], &[1])
            .build();
        let model = store.find_model("Basic").unwrap().unwrap();
        let mut draft = NoteDraft::new(&model, 1);
        draft.append_to_field("Front", "hi");

        // Act
        let status = store.duplicate_or_empty(&draft).unwrap();

        // Assert
        assert_eq!(status, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_differently_cased_names_when_finding_then_matches() {
        let mut store = MockCollectionStore::builder()
            .with_basic_model(10)
            .with_deck(1, "Default")
            .build();

        let model = store.find_model("basic").unwrap();
        let deck = store.find_deck("DEFAULT").unwrap();

        assert_eq!(model.map(|m| m.id), Some(10));
        assert_eq!(deck.map(|d| d.id), Some(1));
    }

    #[test]
    fn given_blank_markup_only_front_when_checking_natively_then_reports_empty() {
        let mut store = MockCollectionStore::builder().with_basic_model(10).build();
        let model = store.find_model("Basic").unwrap().unwrap();
        let mut draft = NoteDraft::new(&model, 1);
        draft.append_to_field("Front", "<div> </div>");

        let status = store.duplicate_or_empty(&draft).unwrap();

        assert_eq!(status, DuplicateStatus::Empty);
    }
}
