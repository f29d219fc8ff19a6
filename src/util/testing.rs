// src/util/testing.rs

use anyhow::Result;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::application::{
    Action, AddedNote, CollectionStore, DuplicateQuery, MediaFetcher, RemoteError, RemoteInvoker,
    StoreOpener,
};
use crate::domain::{DeckInfo, DomainError, ModelInfo, Note, NoteDraft, NoteField};
use crate::util::text::{field_checksum, strip_html_preserving_media_filenames};

struct MockNote {
    model_id: i64,
    fields: Vec<String>,
    tags: Vec<String>,
    deck_ids: Vec<i64>,
}

#[derive(Default)]
struct MockState {
    models: Vec<ModelInfo>,
    decks: Vec<DeckInfo>,
    notes: BTreeMap<i64, MockNote>,
    cardless_models: HashSet<i64>,
    media: BTreeMap<String, Vec<u8>>,
    media_log: Vec<String>,
    next_note_id: i64,
    closes: usize,
}

/// In-memory collection for testing use cases that depend on CollectionStore
///
/// Clones share the same state, so a store handed out by [`MockOpener`] keeps
/// what earlier handles wrote.
///
/// # Examples
///
/// ```
/// use ankisubmit::application::CollectionStore;
/// use ankisubmit::util::testing::MockCollectionStore;
///
/// let mut store = MockCollectionStore::builder()
///     .with_basic_model(10)
///     .with_deck(1, "Default")
///     .with_note(100, 10, &["Question", "Answer"], &[1])
///     .build();
///
/// assert_eq!(store.card_deck_ids(100).unwrap(), vec![1]);
/// ```
#[derive(Clone)]
pub struct MockCollectionStore {
    state: Arc<Mutex<MockState>>,
}

impl MockCollectionStore {
    pub fn builder() -> MockCollectionStoreBuilder {
        MockCollectionStoreBuilder::new()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Media operations in call order, e.g. `"delete a.png"`, `"write a.png"`.
    pub fn media_log(&self) -> Vec<String> {
        self.state().media_log.clone()
    }

    pub fn media(&self, filename: &str) -> Option<Vec<u8>> {
        self.state().media.get(filename).cloned()
    }
}

impl CollectionStore for MockCollectionStore {
    fn list_models(&mut self) -> Result<Vec<ModelInfo>, DomainError> {
        Ok(self.state().models.clone())
    }

    fn list_decks(&mut self) -> Result<Vec<DeckInfo>, DomainError> {
        Ok(self.state().decks.clone())
    }

    fn duplicate_note_ids(&mut self, query: &DuplicateQuery) -> Result<Vec<i64>, DomainError> {
        let stripped = strip_html_preserving_media_filenames(&query.text);
        let checksum = field_checksum(&query.text);
        Ok(self
            .state()
            .notes
            .iter()
            .filter(|(id, note)| {
                Some(**id) != query.exclude_note
                    && query.model_id.map_or(true, |mid| mid == note.model_id)
                    && note
                        .fields
                        .first()
                        .is_some_and(|f| {
                            field_checksum(f) == checksum
                                && strip_html_preserving_media_filenames(f) == stripped
                        })
            })
            .map(|(id, _)| *id)
            .collect())
    }

    fn card_deck_ids(&mut self, note_id: i64) -> Result<Vec<i64>, DomainError> {
        Ok(self
            .state()
            .notes
            .get(&note_id)
            .map(|n| n.deck_ids.clone())
            .unwrap_or_default())
    }

    fn get_note(&mut self, note_id: i64) -> Result<Note, DomainError> {
        let state = self.state();
        let note = state
            .notes
            .get(&note_id)
            .ok_or(DomainError::NoteNotFound(note_id))?;
        let model = state
            .models
            .iter()
            .find(|m| m.id == note.model_id)
            .ok_or_else(|| DomainError::CollectionError("Notetype not found".to_string()))?;

        Ok(Note {
            id: note_id,
            model_id: model.id,
            model_name: model.name.clone(),
            fields: model
                .fields
                .iter()
                .zip(&note.fields)
                .map(|(name, value)| NoteField {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
            tags: note.tags.clone(),
        })
    }

    fn add_note(&mut self, note: &NoteDraft) -> Result<AddedNote, DomainError> {
        let mut state = self.state();
        state.next_note_id += 1;
        let id = state.next_note_id;

        if state.cardless_models.contains(&note.model_id) {
            return Ok(AddedNote { id, card_count: 0 });
        }
        let card_count = state
            .models
            .iter()
            .find(|m| m.id == note.model_id)
            .map(|m| m.templates.len())
            .unwrap_or(1);

        state.notes.insert(
            id,
            MockNote {
                model_id: note.model_id,
                fields: note.values(),
                tags: note.tags.clone(),
                deck_ids: vec![note.deck_id; card_count],
            },
        );
        Ok(AddedNote { id, card_count })
    }

    fn update_note_fields(
        &mut self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), DomainError> {
        let mut state = self.state();
        let model_fields = {
            let note = state
                .notes
                .get(&note_id)
                .ok_or(DomainError::NoteNotFound(note_id))?;
            state
                .models
                .iter()
                .find(|m| m.id == note.model_id)
                .map(|m| m.fields.clone())
                .unwrap_or_default()
        };
        let note = state
            .notes
            .get_mut(&note_id)
            .ok_or(DomainError::NoteNotFound(note_id))?;
        for (name, value) in fields {
            if let Some(idx) = model_fields.iter().position(|f| f == name) {
                note.fields[idx] = value.clone();
            }
        }
        Ok(())
    }

    fn write_media(&mut self, filename: &str, data: &[u8]) -> Result<String, DomainError> {
        let mut state = self.state();
        state.media_log.push(format!("write {}", filename));

        let stored = match state.media.get(filename) {
            None => filename.to_string(),
            Some(existing) if existing.as_slice() == data => filename.to_string(),
            Some(_) => {
                let (stem, ext) = filename.rsplit_once('.').unwrap_or((filename, ""));
                (1..)
                    .map(|n| format!("{}-{}.{}", stem, n, ext))
                    .find(|candidate| !state.media.contains_key(candidate))
                    .unwrap_or_default()
            }
        };
        state.media.insert(stored.clone(), data.to_vec());
        Ok(stored)
    }

    fn delete_media(&mut self, filename: &str) -> Result<(), DomainError> {
        let mut state = self.state();
        state.media_log.push(format!("delete {}", filename));
        state.media.remove(filename);
        Ok(())
    }

    fn close(self) -> Result<(), DomainError> {
        self.state().closes += 1;
        Ok(())
    }
}

/// Builder for MockCollectionStore
///
/// Provides a fluent interface for configuring the mock collection.
pub struct MockCollectionStoreBuilder {
    state: MockState,
}

impl MockCollectionStoreBuilder {
    pub fn new() -> Self {
        Self {
            state: MockState {
                next_note_id: 1000,
                ..Default::default()
            },
        }
    }

    /// Add a model with one card template
    pub fn with_model(mut self, id: i64, name: &str, fields: &[&str]) -> Self {
        self.state.models.push(ModelInfo {
            id,
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            templates: vec!["Card 1".to_string()],
        });
        self
    }

    /// Add the stock "Basic" model with Front/Back fields
    pub fn with_basic_model(self, id: i64) -> Self {
        self.with_model(id, "Basic", &["Front", "Back"])
    }

    /// Make notes of this model generate no cards
    pub fn with_cardless_model(mut self, id: i64) -> Self {
        self.state.cardless_models.insert(id);
        self
    }

    pub fn with_deck(mut self, id: i64, name: &str) -> Self {
        self.state.decks.push(DeckInfo {
            id,
            name: name.to_string(),
        });
        self
    }

    /// Add an existing note with one card in each of `deck_ids`
    pub fn with_note(mut self, id: i64, model_id: i64, fields: &[&str], deck_ids: &[i64]) -> Self {
        self.state.notes.insert(
            id,
            MockNote {
                model_id,
                fields: fields.iter().map(|f| f.to_string()).collect(),
                tags: vec![],
                deck_ids: deck_ids.to_vec(),
            },
        );
        self
    }

    pub fn with_media(mut self, filename: &str, data: &[u8]) -> Self {
        self.state.media.insert(filename.to_string(), data.to_vec());
        self
    }

    pub fn build(self) -> MockCollectionStore {
        MockCollectionStore {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

impl Default for MockCollectionStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands out handles to one shared MockCollectionStore and counts opens/closes.
pub struct MockOpener {
    store: MockCollectionStore,
    opens: AtomicUsize,
}

impl MockOpener {
    pub fn new(store: MockCollectionStore) -> Self {
        Self {
            store,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.store.state().closes
    }
}

impl StoreOpener for MockOpener {
    type Store = MockCollectionStore;

    fn open(&self) -> Result<Self::Store, DomainError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.clone())
    }
}

/// Serves canned bodies by URL; unknown URLs fail like a 404.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }
}

impl MediaFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError> {
        self.bodies.get(url).cloned().ok_or_else(|| {
            DomainError::Fetch(format!("{} download failed with return code 404", url))
        })
    }
}

/// Remote endpoint returning a fixed result and recording calls.
pub struct MockRemote {
    response: Result<Value, RemoteError>,
    calls: Mutex<Vec<(Action, Value)>>,
}

impl MockRemote {
    pub fn returning(result: Value) -> Self {
        Self {
            response: Ok(result),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn failing(error: RemoteError) -> Self {
        Self {
            response: Err(error),
            calls: Mutex::new(vec![]),
        }
    }

    pub fn last_call(&self) -> Option<(Action, Value)> {
        self.calls.lock().expect("mock calls poisoned").last().cloned()
    }
}

impl RemoteInvoker for MockRemote {
    fn invoke(&self, action: Action, params: Value) -> Result<Value, RemoteError> {
        self.calls
            .lock()
            .expect("mock calls poisoned")
            .push((action, params));
        self.response.clone()
    }
}

pub fn init_test_setup() -> Result<()> {
    // Set up logging first
    setup_test_logging();

    info!("Test Setup complete");
    Ok(())
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "trace");
    }

    // Create a filter for noisy modules
    let noisy_modules = ["anki", "hyper", "reqwest", "mio", "mockito"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    // Set up the subscriber with environment filter
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    // Build and set the subscriber
    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}
