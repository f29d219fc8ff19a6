// src/application/note_ingestor.rs
use crate::application::collection::{with_store, CollectionStore, StoreOpener};
use crate::application::duplicate_resolver::classify;
use crate::application::media_attacher::attach_media;
use crate::application::media_resolver::{MediaFetcher, MediaResolver};
use crate::application::remote::{
    choose_strategy, Action, BatchStrategy, NoteOutcome, RemoteInvoker, RemoteOutcome,
};
use crate::domain::{DomainError, DuplicateStatus, NoteDraft, NoteRequest};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// Adds notes to an open collection.
pub struct NoteIngestor<'a, S: CollectionStore, F: MediaFetcher> {
    store: &'a mut S,
    fetcher: &'a F,
}

impl<'a, S: CollectionStore, F: MediaFetcher> NoteIngestor<'a, S, F> {
    pub fn new(store: &'a mut S, fetcher: &'a F) -> Self {
        Self { store, fetcher }
    }

    #[instrument(level = "debug", skip(self, request), fields(model = %request.model_name, deck = %request.deck_name))]
    pub fn add_note(&mut self, request: &NoteRequest) -> Result<i64, DomainError> {
        let model = self
            .store
            .find_model(&request.model_name)?
            .ok_or_else(|| DomainError::model_not_found(&request.model_name))?;
        let deck = self
            .store
            .find_deck(&request.deck_name)?
            .ok_or_else(|| DomainError::deck_not_found(&request.deck_name))?;

        let mut note = NoteDraft::new(&model, deck.id);
        if let Some(tags) = &request.tags {
            note.tags = tags.clone();
        }
        note.assign_fields(&request.fields)?;

        let mut resolver = MediaResolver::new(&mut *self.store, self.fetcher);
        attach_media(&mut resolver, &mut note, request);

        let options = request.options.clone().unwrap_or_default();
        match classify(self.store, &note, &deck, &options.scope())? {
            DuplicateStatus::Empty => return Err(DomainError::EmptyNote),
            DuplicateStatus::Duplicate if !options.allow_duplicate => {
                return Err(DomainError::DuplicateNote)
            }
            DuplicateStatus::Duplicate => debug!("Adding duplicate note as requested"),
            DuplicateStatus::Unique => {}
        }

        let added = self.store.add_note(&note)?;
        if added.card_count < 1 {
            return Err(DomainError::EmptyQuestion);
        }

        info!(note_id = added.id, cards = added.card_count, "Added note");
        Ok(added.id)
    }
}

/// Which path a batch took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "route")]
pub enum Route {
    Remote,
    Local { reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    #[serde(flatten)]
    pub route: Route,
    pub outcomes: Vec<NoteOutcome>,
}

/// Entry point for note submission: remote-first batches with a local
/// fallback, and local single notes.
pub struct NoteSubmitter<R: RemoteInvoker, O: StoreOpener, F: MediaFetcher> {
    remote: R,
    opener: O,
    fetcher: F,
}

impl<R: RemoteInvoker, O: StoreOpener, F: MediaFetcher> NoteSubmitter<R, O, F> {
    pub fn new(remote: R, opener: O, fetcher: F) -> Self {
        Self {
            remote,
            opener,
            fetcher,
        }
    }

    /// Add one note to the local collection.
    pub fn add_note(&self, request: &NoteRequest) -> Result<i64, DomainError> {
        with_store(&self.opener, |store| {
            NoteIngestor::new(store, &self.fetcher).add_note(request)
        })
    }

    /// Send the whole batch to the remote service; if that fails, add each
    /// note locally and report every note on its own.
    pub fn add_notes(&self, requests: &[NoteRequest]) -> BatchReport {
        let outcome = RemoteOutcome::from(
            self.remote
                .invoke(Action::AddNotes, json!({ "notes": requests })),
        );

        match choose_strategy(outcome, requests.len()) {
            BatchStrategy::Remote(outcomes) => {
                info!(notes = outcomes.len(), "Batch handled by remote service");
                BatchReport {
                    route: Route::Remote,
                    outcomes,
                }
            }
            BatchStrategy::LocalFallback { reason } => {
                warn!(%reason, "Remote service unavailable, adding notes locally");
                BatchReport {
                    route: Route::Local {
                        reason: Some(reason),
                    },
                    outcomes: self.add_notes_locally(requests),
                }
            }
        }
    }

    /// Add every note locally, each failure isolated to its own note.
    pub fn add_notes_locally(&self, requests: &[NoteRequest]) -> Vec<NoteOutcome> {
        let mut store = match self.opener.open() {
            Ok(store) => store,
            Err(e) => {
                warn!(error = %e, "Cannot open collection");
                return requests
                    .iter()
                    .map(|_| NoteOutcome::Failed(e.to_string()))
                    .collect();
            }
        };

        let mut ingestor = NoteIngestor::new(&mut store, &self.fetcher);
        let outcomes = requests
            .iter()
            .map(|request| NoteOutcome::from(ingestor.add_note(request)))
            .collect();

        if let Err(e) = store.close() {
            warn!(error = %e, "Failed to close collection after batch");
        }
        outcomes
    }
}
