use anki::collection::CollectionBuilder;
use ankisubmit::infrastructure::{AnkiOpener, AnkiRepository};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tempfile::TempDir;

/// Test fixture for working with a fresh Anki collection in a temporary directory
#[allow(dead_code)]
pub struct TestCollection {
    _temp_dir: TempDir,
    pub collection_path: PathBuf,
    pub media_dir: PathBuf,
}

#[allow(dead_code)]
impl TestCollection {
    /// Create a new collection with the stock note types and the Default deck
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let collection_path = temp_dir.path().join("collection.anki2");

        let col = CollectionBuilder::new(&collection_path)
            .build()
            .context("Failed to create test collection")?;
        col.close(None).context("Failed to close test collection")?;

        let media_dir = temp_dir.path().join("collection.media");
        std::fs::create_dir_all(&media_dir).context("Failed to create media directory")?;

        Ok(Self {
            _temp_dir: temp_dir,
            collection_path,
            media_dir,
        })
    }

    /// Open repository for this test collection
    pub fn open_repository(&self) -> Result<AnkiRepository> {
        AnkiRepository::new(&self.collection_path)
    }

    pub fn opener(&self) -> AnkiOpener {
        AnkiOpener::new(&self.collection_path)
    }
}
