// src/application/media_attacher.rs
use crate::application::media_resolver::{MediaFetcher, MediaResolver};
use crate::application::CollectionStore;
use crate::domain::{NoteDraft, NoteRequest};
use crate::util::text::escape_error_text;
use tracing::warn;

/// Resolve every attachment of `request` and append its markup to the target
/// fields of `note`.
///
/// A failing attachment writes its escaped error message into its target
/// fields instead and does not stop the remaining attachments.
pub fn attach_media<S, F>(resolver: &mut MediaResolver<'_, S, F>, note: &mut NoteDraft, request: &NoteRequest)
where
    S: CollectionStore,
    F: MediaFetcher,
{
    for (kind, attachment) in request.media() {
        if attachment.fields.is_empty() {
            continue;
        }

        let text = match resolver.resolve(attachment) {
            Ok(Some(filename)) => kind.markup(&filename),
            Ok(None) => continue,
            Err(e) => {
                warn!(filename = %attachment.filename, error = %e, "Failed to attach media");
                escape_error_text(&e.to_string())
            }
        };

        for field in &attachment.fields {
            note.append_to_field(field, &text);
        }
    }
}
