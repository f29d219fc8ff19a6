// src/util/text.rs
use html_escape::{decode_html_entities, encode_text};
use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};

lazy_static! {
    static ref HTML_COMMENT_REGEX: Regex =
        Regex::new(r"(?s)<!--.*?-->").expect("Failed to compile HTML comment regex");

    // Media references survive stripping so that notes differing only in
    // their image are not considered equal.
    static ref HTML_MEDIA_REGEX: Regex = Regex::new(
        r#"(?i)<(?:img|audio|source|object)\b[^>]*?\b(?:src|data)=["']?([^"'>\s]+)["']?[^>]*>"#
    )
    .expect("Failed to compile HTML media regex");

    static ref HTML_TAG_REGEX: Regex =
        Regex::new(r"(?s)<[^>]+>").expect("Failed to compile HTML tag regex");
}

/// Strip HTML from a field value, keeping media filenames as plain words.
///
/// # Examples
///
/// ```
/// use ankisubmit::util::text::strip_html_preserving_media_filenames;
///
/// let html = r#"<b>Tree</b> <img src="tree.png">"#;
/// assert_eq!(strip_html_preserving_media_filenames(html), "Tree  tree.png ");
/// ```
pub fn strip_html_preserving_media_filenames(html: &str) -> String {
    let without_comments = HTML_COMMENT_REGEX.replace_all(html, "");
    let with_media = HTML_MEDIA_REGEX.replace_all(&without_comments, " ${1} ");
    let without_tags = HTML_TAG_REGEX.replace_all(&with_media, "");
    decode_html_entities(&without_tags)
        .replace('\u{a0}', " ")
}

/// Checksum of a field as stored in the collection's `csum` column:
/// the first 32 bits of the SHA-1 of the stripped text.
pub fn field_checksum(text: &str) -> u32 {
    let stripped = strip_html_preserving_media_filenames(text);
    let digest = Sha1::digest(stripped.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Escape `&`, `<` and `>` so a message can be embedded in a field.
pub fn escape_error_text(message: &str) -> String {
    encode_text(message).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_plain_text_when_stripping_then_returns_unchanged() {
        assert_eq!(strip_html_preserving_media_filenames("What is a Tree?"), "What is a Tree?");
    }

    #[test]
    fn given_nested_tags_when_stripping_then_removes_all_tags() {
        let html = "<div><strong>Bold</strong> and <em>italic</em></div>";
        assert_eq!(strip_html_preserving_media_filenames(html), "Bold and italic");
    }

    #[test]
    fn given_html_entities_when_stripping_then_decodes_entities() {
        assert_eq!(
            strip_html_preserving_media_filenames("Trees &amp; Graphs&nbsp;!"),
            "Trees & Graphs !"
        );
    }

    #[test]
    fn given_comment_when_stripping_then_drops_comment() {
        assert_eq!(strip_html_preserving_media_filenames("a<!-- hidden -->b"), "ab");
    }

    #[test]
    fn given_same_text_with_different_markup_when_checksumming_then_matches() {
        assert_eq!(field_checksum("<b>hello</b>"), field_checksum("hello"));
    }

    #[test]
    fn given_different_images_when_checksumming_then_differs() {
        assert_ne!(
            field_checksum(r#"<img src="a.png">"#),
            field_checksum(r#"<img src="b.png">"#)
        );
    }

    #[test]
    fn given_known_text_when_checksumming_then_uses_leading_sha1_bytes() {
        // sha1("hello") = aaf4c61d dcc5e8a2 ...
        assert_eq!(field_checksum("hello"), 0xaaf4_c61d);
    }

    #[test]
    fn given_markup_in_error_when_escaping_then_encodes_angle_brackets_and_ampersand() {
        assert_eq!(
            escape_error_text("<url> failed & stopped"),
            "&lt;url&gt; failed &amp; stopped"
        );
    }
}
