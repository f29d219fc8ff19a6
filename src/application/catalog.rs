// src/application/catalog.rs
use crate::application::collection::{with_store, CollectionStore, StoreOpener};
use crate::domain::DomainError;
use std::collections::BTreeMap;
use tracing::instrument;

/// Read-only listings of the collection's models and decks.
pub struct Catalog<O: StoreOpener> {
    opener: O,
}

impl<O: StoreOpener> Catalog<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }

    /// Model names mapped to their field names in order.
    #[instrument(level = "debug", skip(self))]
    pub fn list_models(&self) -> Result<BTreeMap<String, Vec<String>>, DomainError> {
        with_store(&self.opener, |store| {
            Ok(store
                .list_models()?
                .into_iter()
                .map(|m| (m.name, m.fields))
                .collect())
        })
    }

    /// Deck names with their ids, sorted by name.
    #[instrument(level = "debug", skip(self))]
    pub fn list_decks(&self) -> Result<Vec<(String, i64)>, DomainError> {
        let mut decks: Vec<_> = with_store(&self.opener, |store| store.list_decks())?
            .into_iter()
            .map(|d| (d.name, d.id))
            .collect();
        decks.sort();
        Ok(decks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::{MockCollectionStore, MockOpener};

    #[test]
    fn given_models_when_listing_then_maps_names_to_fields() {
        // Arrange
        let opener = MockOpener::new(
            MockCollectionStore::builder()
                .with_basic_model(10)
                .with_model(20, "Cloze", &["Text", "Back Extra"])
                .build(),
        );

        // Act
        let models = Catalog::new(&opener).list_models().unwrap();

        // Assert
        assert_eq!(models["Basic"], vec!["Front", "Back"]);
        assert_eq!(models["Cloze"], vec!["Text", "Back Extra"]);
        assert_eq!(opener.close_count(), 1);
    }

    #[test]
    fn given_decks_when_listing_then_returns_sorted_names_with_ids() {
        let opener = MockOpener::new(
            MockCollectionStore::builder()
                .with_deck(5, "Zoology")
                .with_deck(1, "Default")
                .build(),
        );

        let decks = Catalog::new(&opener).list_decks().unwrap();

        assert_eq!(
            decks,
            vec![("Default".to_string(), 1), ("Zoology".to_string(), 5)]
        );
    }
}
