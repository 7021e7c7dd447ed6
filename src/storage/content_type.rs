//! Content-type resolution

/// MIME type for a stored file, guessed from its extension.
///
/// Unknown or missing extensions fall back to `application/octet-stream`.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
