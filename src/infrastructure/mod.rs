// src/infrastructure/mod.rs
pub mod anki;
pub mod config;
pub mod downloader;
pub mod envelope;
pub mod session_server;

pub use self::anki::{find_collection_path, AnkiOpener, AnkiRepository};
pub use config::Config;
pub use downloader::HttpFetcher;
pub use envelope::EnvelopeClient;
pub use session_server::SessionServer;
