// src/application/media_resolver.rs
use crate::application::CollectionStore;
use crate::domain::{DomainError, MediaAttachment, MediaSource};
use base64::Engine;
use tracing::{debug, instrument};

/// Downloads remote media.
pub trait MediaFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError>;
}

impl<T: MediaFetcher + ?Sized> MediaFetcher for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, DomainError> {
        (**self).fetch(url)
    }
}

/// Turns an attachment into a stored media filename.
pub struct MediaResolver<'a, S: CollectionStore, F: MediaFetcher> {
    store: &'a mut S,
    fetcher: &'a F,
}

impl<'a, S: CollectionStore, F: MediaFetcher> MediaResolver<'a, S, F> {
    pub fn new(store: &'a mut S, fetcher: &'a F) -> Self {
        Self { store, fetcher }
    }

    /// Returns the filename to reference from the note, or `None` when the
    /// content matches `skipHash` and nothing needs to be attached.
    #[instrument(level = "debug", skip(self, attachment), fields(filename = %attachment.filename))]
    pub fn resolve(&mut self, attachment: &MediaAttachment) -> Result<Option<String>, DomainError> {
        let data = match attachment.source()? {
            MediaSource::Path(path) => return Ok(Some(path.to_string())),
            MediaSource::Data(encoded) => decode_base64(encoded)?,
            MediaSource::Url(url) => self.fetcher.fetch(url)?,
        };

        if let Some(skip_hash) = &attachment.skip_hash {
            let digest = format!("{:x}", md5::compute(&data));
            if digest.eq_ignore_ascii_case(skip_hash) {
                debug!(%digest, "Media content unchanged, skipping");
                return Ok(None);
            }
        }

        if attachment.delete_existing() {
            self.store.delete_media(&attachment.filename)?;
        }

        let stored = self.store.write_media(&attachment.filename, &data)?;
        debug!(%stored, bytes = data.len(), "Stored media file");
        Ok(Some(stored))
    }
}

/// Line breaks and other whitespace inside the payload are ignored.
fn decode_base64(encoded: &str) -> Result<Vec<u8>, DomainError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| DomainError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::testing::{MockCollectionStore, StaticFetcher};

    fn attachment(filename: &str) -> MediaAttachment {
        MediaAttachment {
            filename: filename.to_string(),
            fields: vec!["Front".to_string()],
            data: None,
            url: None,
            path: None,
            skip_hash: None,
            delete_existing: None,
        }
    }

    #[test]
    fn given_path_source_when_resolving_then_returns_path_without_io() {
        // Arrange
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("ignored.png");
        media.path = Some("already.png".to_string());

        // Act
        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        // Assert
        assert_eq!(result, Ok(Some("already.png".to_string())));
        assert!(store.media_log().is_empty());
    }

    #[test]
    fn given_inline_data_when_resolving_then_deletes_then_stores_decoded_bytes() {
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("hello.txt");
        media.data = Some("aGVsbG8=".to_string());

        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        assert_eq!(result, Ok(Some("hello.txt".to_string())));
        assert_eq!(store.media_log(), &["delete hello.txt", "write hello.txt"]);
        assert_eq!(store.media("hello.txt"), Some(b"hello".to_vec()));
    }

    #[test]
    fn given_line_wrapped_base64_when_resolving_then_decodes_ignoring_whitespace() {
        // Arrange
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("wrapped.txt");
        media.data = Some("aGVs\r\nbG8=\n".to_string());

        // Act
        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        // Assert
        assert_eq!(result, Ok(Some("wrapped.txt".to_string())));
        assert_eq!(store.media("wrapped.txt"), Some(b"hello".to_vec()));
    }

    #[test]
    fn given_delete_existing_false_when_resolving_then_skips_delete() {
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("hello.txt");
        media.data = Some("aGVsbG8=".to_string());
        media.delete_existing = Some(false);

        MediaResolver::new(&mut store, &fetcher)
            .resolve(&media)
            .unwrap();

        assert_eq!(store.media_log(), &["write hello.txt"]);
    }

    #[test]
    fn given_matching_skip_hash_when_resolving_then_returns_none_without_write() {
        // Arrange
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new().with_body("http://example.com/a.mp3", b"hello");
        let mut media = attachment("a.mp3");
        media.url = Some("http://example.com/a.mp3".to_string());
        media.skip_hash = Some("5D41402ABC4B2A76B9719D911017C592".to_string());

        // Act
        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        // Assert
        assert_eq!(result, Ok(None));
        assert!(store.media_log().is_empty());
    }

    #[test]
    fn given_stale_skip_hash_when_resolving_then_stores_content() {
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new().with_body("http://example.com/a.mp3", b"hello");
        let mut media = attachment("a.mp3");
        media.url = Some("http://example.com/a.mp3".to_string());
        media.skip_hash = Some("00000000000000000000000000000000".to_string());

        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        assert_eq!(result, Ok(Some("a.mp3".to_string())));
    }

    #[test]
    fn given_malformed_base64_when_resolving_then_returns_decode_error() {
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("broken.bin");
        media.data = Some("not base64!!".to_string());

        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        assert!(matches!(result, Err(DomainError::Decode(_))));
        assert!(store.media_log().is_empty());
    }

    #[test]
    fn given_unreachable_url_when_resolving_then_propagates_fetch_error() {
        let mut store = MockCollectionStore::builder().build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("gone.png");
        media.url = Some("http://example.com/gone.png".to_string());

        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        assert!(matches!(result, Err(DomainError::Fetch(_))));
    }

    #[test]
    fn given_store_renames_on_collision_when_resolving_then_returns_stored_name() {
        let mut store = MockCollectionStore::builder()
            .with_media("dup.txt", b"old")
            .build();
        let fetcher = StaticFetcher::new();
        let mut media = attachment("dup.txt");
        media.data = Some("aGVsbG8=".to_string());
        media.delete_existing = Some(false);

        let result = MediaResolver::new(&mut store, &fetcher).resolve(&media);

        assert_eq!(result, Ok(Some("dup-1.txt".to_string())));
    }
}
