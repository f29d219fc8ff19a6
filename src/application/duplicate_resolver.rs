// src/application/duplicate_resolver.rs
use crate::application::collection::{CollectionStore, DuplicateQuery};
use crate::domain::{DeckInfo, DomainError, DuplicateScope, DuplicateStatus, NoteDraft, ScopeKind};
use crate::util::text::strip_html_preserving_media_filenames;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Decide whether `note` is empty, a duplicate within `scope`, or unique.
#[instrument(level = "debug", skip(store, note, deck), fields(deck = %deck.name))]
pub fn classify<S: CollectionStore>(
    store: &mut S,
    note: &NoteDraft,
    deck: &DeckInfo,
    scope: &DuplicateScope,
) -> Result<DuplicateStatus, DomainError> {
    if scope.kind != ScopeKind::Deck && !scope.check_all_models {
        return store.duplicate_or_empty(note);
    }

    let primary = note.primary_field();
    if strip_html_preserving_media_filenames(primary).trim().is_empty() {
        return Ok(DuplicateStatus::Empty);
    }

    let target_decks = match scope.kind {
        ScopeKind::Deck => match deck_scope(store, deck, scope)? {
            Some(decks) => Some(decks),
            None => return Ok(DuplicateStatus::Unique),
        },
        ScopeKind::Collection => None,
    };

    let query = DuplicateQuery {
        text: primary.to_string(),
        model_id: (!scope.check_all_models).then_some(note.model_id),
        exclude_note: note.id,
    };
    let candidates = store.duplicate_note_ids(&query)?;
    debug!(candidates = candidates.len(), "Checking duplicate candidates");

    for note_id in candidates {
        let Some(decks) = &target_decks else {
            return Ok(DuplicateStatus::Duplicate);
        };
        if store
            .card_deck_ids(note_id)?
            .iter()
            .any(|did| decks.contains(did))
        {
            debug!(note_id, "Found duplicate within deck scope");
            return Ok(DuplicateStatus::Duplicate);
        }
    }

    Ok(DuplicateStatus::Unique)
}

/// Deck ids to search, or `None` when the override deck does not exist and
/// no duplicate is possible.
fn deck_scope<S: CollectionStore>(
    store: &mut S,
    deck: &DeckInfo,
    scope: &DuplicateScope,
) -> Result<Option<HashSet<i64>>, DomainError> {
    let root = match &scope.deck_name {
        Some(name) => match store.find_deck(name)? {
            Some(found) => found.id,
            None => {
                warn!(deck = %name, "Duplicate scope deck not found, treating note as unique");
                return Ok(None);
            }
        },
        None => deck.id,
    };

    let mut decks = HashSet::from([root]);
    if scope.check_children {
        decks.extend(store.deck_children(root)?);
    }
    Ok(Some(decks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::MockCollectionStore;

    const BASIC: i64 = 10;
    const OTHER_MODEL: i64 = 20;

    fn store() -> MockCollectionStore {
        MockCollectionStore::builder()
            .with_basic_model(BASIC)
            .with_model(OTHER_MODEL, "Other", &["Question", "Answer"])
            .with_deck(1, "Default")
            .with_deck(2, "Lang")
            .with_deck(3, "Lang::French")
            .with_deck(4, "Science")
            .with_note(100, BASIC, &["bonjour", "hello"], &[3])
            .with_note(200, OTHER_MODEL, &["atom", "small"], &[4])
            .build()
    }

    fn draft(store: &mut MockCollectionStore, deck_id: i64, front: &str) -> (NoteDraft, DeckInfo) {
        let model = store.find_model("Basic").unwrap().unwrap();
        let deck = store
            .list_decks()
            .unwrap()
            .into_iter()
            .find(|d| d.id == deck_id)
            .unwrap();
        let mut note = NoteDraft::new(&model, deck_id);
        note.append_to_field("Front", front);
        (note, deck)
    }

    fn deck_scope(check_children: bool) -> DuplicateScope {
        DuplicateScope {
            kind: ScopeKind::Deck,
            check_children,
            ..Default::default()
        }
    }

    #[test]
    fn given_blank_primary_field_when_classifying_then_returns_empty_in_every_scope() {
        let mut store = store();
        let (note, deck) = draft(&mut store, 1, "   ");
        let scopes = [
            DuplicateScope::default(),
            deck_scope(false),
            deck_scope(true),
            DuplicateScope {
                check_all_models: true,
                ..Default::default()
            },
        ];

        for scope in scopes {
            let status = classify(&mut store, &note, &deck, &scope).unwrap();
            assert_eq!(status, DuplicateStatus::Empty, "scope {:?}", scope);
        }
    }

    #[test]
    fn given_existing_front_when_classifying_collection_wide_then_returns_duplicate() {
        let mut store = store();
        let (note, deck) = draft(&mut store, 1, "bonjour");

        let status = classify(&mut store, &note, &deck, &DuplicateScope::default()).unwrap();

        assert_eq!(status, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_existing_front_in_disjoint_deck_when_classifying_deck_scope_then_returns_unique() {
        // Arrange
        let mut store = store();
        let (note, deck) = draft(&mut store, 4, "bonjour");

        // Act
        let status = classify(&mut store, &note, &deck, &deck_scope(true)).unwrap();

        // Assert
        assert_eq!(status, DuplicateStatus::Unique);
    }

    #[test]
    fn given_existing_front_in_same_deck_when_classifying_deck_scope_then_returns_duplicate() {
        let mut store = store();
        let (note, deck) = draft(&mut store, 3, "bonjour");

        let status = classify(&mut store, &note, &deck, &deck_scope(false)).unwrap();

        assert_eq!(status, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_existing_front_in_child_deck_when_classifying_with_children_then_returns_duplicate() {
        // Arrange
        let mut store = store();
        let (note, deck) = draft(&mut store, 2, "bonjour");

        // Act
        let without_children = classify(&mut store, &note, &deck, &deck_scope(false)).unwrap();
        let with_children = classify(&mut store, &note, &deck, &deck_scope(true)).unwrap();

        // Assert
        assert_eq!(without_children, DuplicateStatus::Unique);
        assert_eq!(with_children, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_override_deck_name_when_classifying_then_scopes_to_that_deck() {
        let mut store = store();
        let (note, deck) = draft(&mut store, 4, "bonjour");
        let scope = DuplicateScope {
            kind: ScopeKind::Deck,
            deck_name: Some("Lang".to_string()),
            check_children: true,
            ..Default::default()
        };

        let status = classify(&mut store, &note, &deck, &scope).unwrap();

        assert_eq!(status, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_unknown_override_deck_name_when_classifying_then_returns_unique() {
        let mut store = store();
        let (note, deck) = draft(&mut store, 3, "bonjour");
        let scope = DuplicateScope {
            kind: ScopeKind::Deck,
            deck_name: Some("Typo".to_string()),
            ..Default::default()
        };

        let status = classify(&mut store, &note, &deck, &scope).unwrap();

        assert_eq!(status, DuplicateStatus::Unique);
    }

    #[test]
    fn given_front_used_by_other_model_when_checking_all_models_then_returns_duplicate() {
        // Arrange
        let mut store = store();
        let (note, deck) = draft(&mut store, 1, "atom");
        let all_models = DuplicateScope {
            check_all_models: true,
            ..Default::default()
        };

        // Act
        let same_model_only = classify(&mut store, &note, &deck, &DuplicateScope::default()).unwrap();
        let across_models = classify(&mut store, &note, &deck, &all_models).unwrap();

        // Assert
        assert_eq!(same_model_only, DuplicateStatus::Unique);
        assert_eq!(across_models, DuplicateStatus::Duplicate);
    }

    #[test]
    fn given_note_compared_with_itself_when_classifying_update_then_excludes_own_id() {
        let mut store = store();
        let (mut note, deck) = draft(&mut store, 3, "bonjour");
        note.id = Some(100);

        let status = classify(&mut store, &note, &deck, &deck_scope(false)).unwrap();

        assert_eq!(status, DuplicateStatus::Unique);
    }
}
