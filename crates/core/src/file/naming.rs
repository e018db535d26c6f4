//! File names: extension derivation, validation and URL synthesis.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::error::FileError;
use super::types::MAX_NAME_LENGTH;

/// Characters `encodeURIComponent` leaves alone: `A-Z a-z 0-9 - _ . ! ~ * ' ( )`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Last `.`-separated segment of `name`, uppercased.
///
/// Returns `None` when the name has no dot. A trailing dot yields an empty
/// extension, a leading dot (`.env`) counts as one.
#[must_use]
pub fn extract_extension(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_uppercase())
}

/// Percent-encode a name for use as a single path segment.
#[must_use]
pub fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, URI_COMPONENT).to_string()
}

/// `/files/{attachment_id}/{encoded name}`.
#[must_use]
pub fn file_path(attachment_id: &str, name: &str) -> String {
    format!("/files/{attachment_id}/{}", encode_name(name))
}

/// Check a name against the length limits, reporting `field` on failure.
///
/// # Errors
///
/// Returns `FileError::InvalidName` for empty names or names longer than
/// the limit.
pub fn validate_name(field: &str, name: &str) -> Result<(), FileError> {
    if name.is_empty() {
        return Err(FileError::invalid_name(field, "minimum length: 1 character"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(FileError::invalid_name(
            field,
            format!("maximum length: {MAX_NAME_LENGTH} characters"),
        ));
    }
    Ok(())
}
