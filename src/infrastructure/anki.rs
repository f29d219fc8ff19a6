// src/infrastructure/anki.rs
use crate::application::{AddedNote, CollectionStore, DuplicateQuery, StoreOpener};
use crate::domain::{
    DeckInfo, DomainError, DuplicateStatus, ModelInfo, Note, NoteDraft, NoteField,
};
use crate::util::process::check_anki_not_running;
use anki::card::CardId;
use anki::collection::{Collection, CollectionBuilder};
use anki::decks::DeckId;
use anki::notes::NoteId;
use anki::notetype::{Notetype, NotetypeId};
use anki::search::{SearchNode, SortMode};
use anki::text::{normalize_to_nfc, strip_html_preserving_media_filenames};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

fn storage_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::Storage(e.to_string())
}

fn model_info(notetype: &Notetype) -> ModelInfo {
    ModelInfo {
        id: notetype.id.0,
        name: notetype.name.clone(),
        fields: notetype.fields.iter().map(|f| f.name.clone()).collect(),
        templates: notetype.templates.iter().map(|t| t.name.clone()).collect(),
    }
}

pub struct AnkiRepository {
    collection: Collection,
    media_dir: PathBuf,
}

impl AnkiRepository {
    pub fn new<P: AsRef<Path>>(collection_path: P) -> Result<Self> {
        let path = PathBuf::from(collection_path.as_ref());
        debug!(?path, "Opening AnkiRepository");

        // Check if file exists
        if !path.exists() {
            return Err(DomainError::CollectionError(format!(
                "Collection file not found: {}",
                path.display()
            ))
            .into());
        }

        let metadata = fs::metadata(&path).map_err(|e| {
            DomainError::CollectionError(format!("Failed to read collection metadata: {}", e))
        })?;
        if metadata.permissions().readonly() {
            return Err(DomainError::CollectionError(format!(
                "No write permission for collection: {}",
                path.display()
            ))
            .into());
        }

        let parent = path
            .parent()
            .context("Collection path has no parent directory")?;
        let media_dir = parent.join("collection.media");
        let media_db = parent.join("collection.media.db2");

        let collection = CollectionBuilder::new(path.clone())
            .set_media_paths(media_dir.clone(), media_db)
            .build()
            .with_context(|| "Failed to open Anki collection. Is Anki currently running?")?;

        info!(?path, "Opened Anki collection");
        Ok(Self {
            collection,
            media_dir,
        })
    }

    fn load_note(&mut self, note_id: i64) -> Result<anki::notes::Note, DomainError> {
        self.collection
            .storage
            .get_note(NoteId(note_id))
            .map_err(|_| DomainError::NoteNotFound(note_id))?
            .ok_or(DomainError::NoteNotFound(note_id))
    }

    /// Search one model for notes whose stripped primary field equals `text`.
    fn notes_with_primary(
        &mut self,
        notetype_id: NotetypeId,
        text: &str,
    ) -> Result<Vec<NoteId>, DomainError> {
        self.collection
            .search_notes_unordered(SearchNode::Duplicates {
                notetype_id,
                text: text.to_string(),
            })
            .map_err(storage_error)
    }

    fn media_path(&self, filename: &str) -> Result<PathBuf, DomainError> {
        // Only bare file names; anything else could escape the media folder.
        match Path::new(filename).file_name() {
            Some(name) if name == filename => Ok(self.media_dir.join(filename)),
            _ => Err(DomainError::MediaSource(format!(
                "invalid media filename: {}",
                filename
            ))),
        }
    }

    fn card_ids(&mut self, note_id: i64) -> Result<Vec<CardId>, DomainError> {
        self.collection
            .search_cards(format!("nid:{}", note_id).as_str(), SortMode::NoOrder)
            .map_err(storage_error)
    }
}

impl CollectionStore for AnkiRepository {
    fn list_models(&mut self) -> Result<Vec<ModelInfo>, DomainError> {
        let notetypes = self.collection.get_all_notetypes().map_err(storage_error)?;
        Ok(notetypes.iter().map(|nt| model_info(nt)).collect())
    }

    fn list_decks(&mut self) -> Result<Vec<DeckInfo>, DomainError> {
        let decks = self
            .collection
            .get_all_deck_names(false)
            .map_err(storage_error)?;
        Ok(decks
            .into_iter()
            .map(|(id, name)| DeckInfo { id: id.0, name })
            .collect())
    }

    fn find_model(&mut self, name: &str) -> Result<Option<ModelInfo>, DomainError> {
        let notetype = self
            .collection
            .get_notetype_by_name(name)
            .map_err(storage_error)?;
        Ok(notetype.map(|nt| model_info(&nt)))
    }

    fn find_deck(&mut self, name: &str) -> Result<Option<DeckInfo>, DomainError> {
        let Some(deck_id) = self.collection.get_deck_id(name).map_err(storage_error)? else {
            return Ok(None);
        };
        let deck = self.collection.get_deck(deck_id).map_err(storage_error)?;
        Ok(deck.map(|d| DeckInfo {
            id: d.id.0,
            name: d.human_name(),
        }))
    }

    #[instrument(level = "debug", skip(self))]
    fn duplicate_note_ids(&mut self, query: &DuplicateQuery) -> Result<Vec<i64>, DomainError> {
        let notetype_ids = match query.model_id {
            Some(mid) => vec![NotetypeId(mid)],
            None => self
                .collection
                .get_all_notetypes()
                .map_err(storage_error)?
                .iter()
                .map(|nt| nt.id)
                .collect(),
        };
        let text = normalize_to_nfc(&query.text).into_owned();

        let mut matches = Vec::new();
        for notetype_id in notetype_ids {
            matches.extend(
                self.notes_with_primary(notetype_id, &text)?
                    .into_iter()
                    .map(|nid| nid.0)
                    .filter(|nid| Some(*nid) != query.exclude_note),
            );
        }
        debug!(matches = matches.len(), "Duplicate lookup complete");
        Ok(matches)
    }

    fn duplicate_or_empty(&mut self, note: &NoteDraft) -> Result<DuplicateStatus, DomainError> {
        let primary = normalize_to_nfc(note.primary_field());
        if strip_html_preserving_media_filenames(&primary).trim().is_empty() {
            return Ok(DuplicateStatus::Empty);
        }

        let duplicates = self.duplicate_note_ids(&DuplicateQuery {
            text: primary.into_owned(),
            model_id: Some(note.model_id),
            exclude_note: note.id,
        })?;
        if duplicates.is_empty() {
            Ok(DuplicateStatus::Unique)
        } else {
            Ok(DuplicateStatus::Duplicate)
        }
    }

    fn card_deck_ids(&mut self, note_id: i64) -> Result<Vec<i64>, DomainError> {
        let mut deck_ids = Vec::new();
        for cid in self.card_ids(note_id)? {
            if let Some(card) = self.collection.storage.get_card(cid).map_err(storage_error)? {
                deck_ids.push(card.deck_id().0);
            }
        }
        Ok(deck_ids)
    }

    #[instrument(level = "debug", skip(self))]
    fn get_note(&mut self, note_id: i64) -> Result<Note, DomainError> {
        let note = self.load_note(note_id)?;

        let model = self
            .collection
            .get_notetype(note.notetype_id)
            .map_err(|e| DomainError::CollectionError(e.to_string()))?
            .ok_or_else(|| DomainError::CollectionError("Notetype not found".to_string()))?;

        let fields = model
            .fields
            .iter()
            .zip(note.fields())
            .map(|(field, value)| NoteField {
                name: field.name.clone(),
                value: value.clone(),
            })
            .collect();

        Ok(Note {
            id: note.id.0,
            model_id: model.id.0,
            model_name: model.name.clone(),
            fields,
            tags: note.tags.to_vec(),
        })
    }

    #[instrument(level = "debug", skip(self, note), fields(model_id = note.model_id, deck_id = note.deck_id))]
    fn add_note(&mut self, note: &NoteDraft) -> Result<AddedNote, DomainError> {
        let notetype = self
            .collection
            .get_notetype(NotetypeId(note.model_id))
            .map_err(storage_error)?
            .ok_or_else(|| DomainError::model_not_found(&note.model_id.to_string()))?;

        let mut anki_note = notetype.new_note();
        for (idx, value) in note.values().into_iter().enumerate() {
            anki_note.set_field(idx, value).map_err(storage_error)?;
        }
        anki_note.tags = note.tags.clone();

        self.collection
            .add_note(&mut anki_note, DeckId(note.deck_id))
            .map_err(storage_error)?;

        let id = anki_note.id.0;
        let card_count = self.card_ids(id)?.len();
        debug!(note_id = id, card_count, "Committed note");
        Ok(AddedNote { id, card_count })
    }

    fn update_note_fields(
        &mut self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), DomainError> {
        let mut note = self.load_note(note_id)?;
        let model = self
            .collection
            .get_notetype(note.notetype_id)
            .map_err(storage_error)?
            .ok_or_else(|| DomainError::CollectionError("Notetype not found".to_string()))?;

        for (name, value) in fields {
            if let Some(idx) = model.fields.iter().position(|f| &f.name == name) {
                note.set_field(idx, value.as_str()).map_err(storage_error)?;
            } else {
                debug!(field = %name, "Ignoring unknown field on update");
            }
        }

        self.collection
            .update_note(&mut note)
            .map_err(storage_error)?;
        info!(note_id, "Updated note fields");
        Ok(())
    }

    /// Stored through the collection's media manager, which normalizes the
    /// name and renames on a content clash.
    fn write_media(&mut self, filename: &str, data: &[u8]) -> Result<String, DomainError> {
        self.media_path(filename)?;
        fs::create_dir_all(&self.media_dir).map_err(storage_error)?;

        let media = self.collection.media().map_err(storage_error)?;
        let stored = media
            .add_file(filename, data)
            .map_err(storage_error)?
            .into_owned();
        debug!(%stored, "Wrote media file");
        Ok(stored)
    }

    /// Moves the file to the media trash.
    fn delete_media(&mut self, filename: &str) -> Result<(), DomainError> {
        if !self.media_path(filename)?.exists() {
            return Ok(());
        }
        self.collection
            .media()
            .map_err(storage_error)?
            .remove_files(&[filename])
            .map_err(storage_error)?;
        debug!(%filename, "Trashed media file");
        Ok(())
    }

    fn close(self) -> Result<(), DomainError> {
        self.collection.close(None).map_err(storage_error)?;
        debug!("Closed Anki collection");
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum CollectionLocation {
    File(PathBuf),
    Profile(Option<String>),
}

/// Opens the collection file anew for each scoped operation.
#[derive(Debug, Clone)]
pub struct AnkiOpener {
    location: CollectionLocation,
    refuse_while_running: bool,
}

impl AnkiOpener {
    pub fn new(collection_path: impl Into<PathBuf>) -> Self {
        Self {
            location: CollectionLocation::File(collection_path.into()),
            refuse_while_running: false,
        }
    }

    /// Locate the collection through the Anki profile folder on each open;
    /// without a profile name the first profile holding a collection is used.
    pub fn for_profile(profile: Option<String>) -> Self {
        Self {
            location: CollectionLocation::Profile(profile),
            refuse_while_running: false,
        }
    }

    /// Fail every open while the Anki desktop app is running.
    pub fn refusing_while_anki_runs(mut self) -> Self {
        self.refuse_while_running = true;
        self
    }

    pub fn collection_path(&self) -> Result<PathBuf, DomainError> {
        match &self.location {
            CollectionLocation::File(path) => Ok(path.clone()),
            CollectionLocation::Profile(profile) => find_collection_path(profile.as_deref()),
        }
    }
}

impl StoreOpener for AnkiOpener {
    type Store = AnkiRepository;

    fn open(&self) -> Result<Self::Store, DomainError> {
        let path = self.collection_path()?;
        if self.refuse_while_running {
            check_anki_not_running().map_err(|e| DomainError::CollectionError(e.to_string()))?;
        }
        AnkiRepository::new(&path).map_err(|e| DomainError::CollectionError(format!("{:#}", e)))
    }
}

pub fn find_collection_path(profile: Option<&str>) -> Result<PathBuf, DomainError> {
    let home = dirs::home_dir()
        .ok_or_else(|| DomainError::ProfileError("Could not find home directory".to_string()))?;

    // Get the Anki base directory
    #[cfg(target_os = "macos")]
    let anki_path = home.join("Library/Application Support/Anki2");
    #[cfg(target_os = "linux")]
    let anki_path = home.join(".local/share/Anki2");
    #[cfg(target_os = "windows")]
    let anki_path = home.join("AppData/Roaming/Anki2");

    // If profile is specified, use it directly
    if let Some(profile_name) = profile {
        return Ok(anki_path.join(profile_name).join("collection.anki2"));
    }

    // Otherwise, find the first valid profile
    let entries = fs::read_dir(&anki_path)
        .map_err(|e| DomainError::ProfileError(format!("{}: {}", anki_path.display(), e)))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() && path.join("collection.anki2").exists() {
            return Ok(path.join("collection.anki2"));
        }
    }

    Err(DomainError::ProfileError("No valid Anki profile found".to_string()))
}
