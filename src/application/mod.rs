// src/application/mod.rs
pub mod catalog;
pub mod collection;
pub mod duplicate_resolver;
pub mod media_attacher;
pub mod media_resolver;
pub mod note_ingestor;
pub mod remote;
pub mod session;

pub use catalog::Catalog;
pub use collection::{with_store, AddedNote, CollectionStore, DuplicateQuery, StoreOpener};
pub use media_resolver::{MediaFetcher, MediaResolver};
pub use note_ingestor::{BatchReport, NoteIngestor, NoteSubmitter, Route};
pub use remote::{Action, NoteOutcome, RemoteError, RemoteInvoker};
pub use session::{CollectionSession, ReviewSession, SessionCommand, SessionDispatcher};
