// src/application/session.rs
use crate::application::CollectionStore;
use crate::domain::{DeckInfo, DomainError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Commands accepted by the session-control listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum SessionCommand {
    GetAllDecks,
    ReviewerState,
    CurrentCardData,
    UpdateNote {
        nid: Option<i64>,
        #[serde(default)]
        data: Option<BTreeMap<String, String>>,
    },
    RefreshReviewer,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewerState {
    Question,
    Answer,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentCard {
    pub mid: i64,
    pub mname: String,
    pub field_values: BTreeMap<String, String>,
    pub nid: i64,
    pub card_type: String,
}

/// The review session the listener inspects and mutates.
pub trait ReviewSession {
    fn decks(&mut self) -> Result<Vec<DeckInfo>, DomainError>;

    fn reviewer_state(&self) -> Option<ReviewerState>;

    fn current_card(&mut self) -> Result<Option<CurrentCard>, DomainError>;

    /// Update fields of the note shown on the current card. Returns false
    /// when `note_id` is not that note.
    fn update_note(
        &mut self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> Result<bool, DomainError>;

    fn refresh(&mut self) -> Result<(), DomainError>;
}

pub struct SessionDispatcher<S: ReviewSession> {
    session: S,
    running: bool,
}

impl<S: ReviewSession> SessionDispatcher<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            running: true,
        }
    }

    /// False once an `exit` command has been handled.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Answer one raw request. Never fails: errors become `nok` replies.
    pub fn handle(&mut self, request: &Value) -> Value {
        let command = match SessionCommand::deserialize(request) {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "Unrecognized session command");
                return status("nok", "not understood");
            }
        };
        debug!(?command, "Handling session command");

        self.execute(command)
            .unwrap_or_else(|e| status("nok", &e.to_string()))
    }

    fn execute(&mut self, command: SessionCommand) -> Result<Value, DomainError> {
        let reply = match command {
            SessionCommand::GetAllDecks => json!({ "decks": self.session.decks()? }),
            SessionCommand::ReviewerState => {
                json!({ "reviewer_state": self.session.reviewer_state() })
            }
            SessionCommand::CurrentCardData => match self.session.current_card()? {
                Some(card) => json!({ "data": card }),
                None => json!({ "word": "none" }),
            },
            SessionCommand::UpdateNote { nid, data } => {
                let (Some(nid), Some(data)) = (nid, data.filter(|d| !d.is_empty())) else {
                    return Ok(status("nok", "nothing to update"));
                };
                if self.session.update_note(nid, &data)? {
                    status("ok", "updated note")
                } else {
                    status("nok", "note is not on the current card")
                }
            }
            SessionCommand::RefreshReviewer => {
                self.session.refresh()?;
                status("ok", "refreshing")
            }
            SessionCommand::Exit => {
                info!("Session listener asked to exit");
                self.running = false;
                status("ok", "exiting")
            }
        };
        Ok(reply)
    }
}

fn status(status: &str, info: &str) -> Value {
    json!({ "status": status, "info": info })
}

/// Headless reviewer over a collection, showing at most one note.
pub struct CollectionSession<S: CollectionStore> {
    store: S,
    current: Option<i64>,
    state: Option<ReviewerState>,
}

impl<S: CollectionStore> CollectionSession<S> {
    pub fn new(store: S, current: Option<i64>) -> Self {
        Self {
            store,
            current,
            state: current.map(|_| ReviewerState::Question),
        }
    }

    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: CollectionStore> ReviewSession for CollectionSession<S> {
    fn decks(&mut self) -> Result<Vec<DeckInfo>, DomainError> {
        self.store.list_decks()
    }

    fn reviewer_state(&self) -> Option<ReviewerState> {
        self.state
    }

    fn current_card(&mut self) -> Result<Option<CurrentCard>, DomainError> {
        let Some(note_id) = self.current else {
            return Ok(None);
        };
        let note = self.store.get_note(note_id)?;
        let card_type = self
            .store
            .list_models()?
            .into_iter()
            .find(|m| m.id == note.model_id)
            .and_then(|m| m.templates.into_iter().next())
            .unwrap_or_default();

        Ok(Some(CurrentCard {
            mid: note.model_id,
            mname: note.model_name,
            field_values: note
                .fields
                .into_iter()
                .map(|f| (f.name, f.value))
                .collect(),
            nid: note.id,
            card_type,
        }))
    }

    fn update_note(
        &mut self,
        note_id: i64,
        fields: &BTreeMap<String, String>,
    ) -> Result<bool, DomainError> {
        if self.current != Some(note_id) {
            return Ok(false);
        }
        self.store.update_note_fields(note_id, fields)?;
        Ok(true)
    }

    fn refresh(&mut self) -> Result<(), DomainError> {
        if let Some(note_id) = self.current {
            if let Err(DomainError::NoteNotFound(_)) = self.store.get_note(note_id) {
                info!(note_id, "Current note is gone, clearing reviewer");
                self.current = None;
            }
        }
        self.state = self.current.map(|_| ReviewerState::Question);
        Ok(())
    }
}
