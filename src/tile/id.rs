//! Image identifiers.
//!
//! An identifier is the upload's file name without its extension. It names a
//! directory under the tiles root and appears in URLs, so it must be a single
//! safe path segment: ASCII letters, digits, `.`, `_` and `-`, at most
//! [`MAX_IMAGE_ID_LEN`] bytes, and never `.`, `..` or [`STAGING_DIR`].

use std::path::Path;

use crate::error::StoreError;

/// Longest accepted identifier in bytes.
pub const MAX_IMAGE_ID_LEN: usize = 128;

/// Directory under the tiles root where pyramids are built before they are
/// moved into place. Reserved, never an identifier.
pub const STAGING_DIR: &str = ".staging";

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// Derive an identifier from an upload file name by stripping the extension.
///
/// Only the final path component is considered. The result is validated with
/// [`validate_image_id`].
pub fn derive_image_id(filename: &str) -> Result<String, StoreError> {
    let id = Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    validate_image_id(&id)?;
    Ok(id)
}

/// Check that `id` is safe to use as a directory name and URL segment.
pub fn validate_image_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_IMAGE_ID_LEN
        && id != "."
        && id != ".."
        && id != STAGING_DIR
        && id.chars().all(is_id_char);

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidImageId { id: id.to_string() })
    }
}

/// Make a client-supplied file stem usable as an identifier.
///
/// Disallowed characters become `_`, the result is truncated to leave room
/// for an upload suffix, and an empty stem becomes `image`.
pub fn sanitize_file_stem(stem: &str) -> String {
    let mut clean: String = stem
        .chars()
        .map(|c| if is_id_char(c) { c } else { '_' })
        .take(MAX_IMAGE_ID_LEN / 2)
        .collect();

    // Leading dots would turn "..foo" into a hidden or traversal-looking name
    while clean.starts_with('.') {
        clean.remove(0);
    }

    if clean.is_empty() {
        "image".to_string()
    } else {
        clean
    }
}
