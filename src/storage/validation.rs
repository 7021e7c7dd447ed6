//! Name validation
//!
//! A stored file name is used directly as a path segment under the storage
//! root, so it must be exactly one plain component. It is also echoed on
//! protocol lines, so control characters are refused.

use crate::error::StorageError;

/// Reject names that are empty or could resolve outside the storage root.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidArgument(
            "Filename cannot be empty".into(),
        ));
    }

    if name.chars().any(char::is_control) {
        return Err(StorageError::InvalidArgument(
            "Filename cannot contain control characters".into(),
        ));
    }

    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(StorageError::InvalidArgument(format!(
            "Invalid filename: {name}"
        )));
    }

    Ok(())
}
