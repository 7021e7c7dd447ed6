//! Error handlers
//!
//! Maps storage errors onto reply codes and logs server-side faults.

use crate::error::types::StorageError;
use crate::protocol::responses::{
    BAD_REQUEST, CONFLICT, INTERNAL_ERROR, NOT_FOUND, format_response,
};
use log::error;

/// Convert a storage error to its reply code
pub fn status_for(err: &StorageError) -> u16 {
    match err {
        StorageError::InvalidArgument(_) => BAD_REQUEST,
        StorageError::AlreadyExists(_) => CONFLICT,
        StorageError::NotFound(_) => NOT_FOUND,
        StorageError::Io(_) => INTERNAL_ERROR,
    }
}

/// Build the reply line sent to the client for a failed operation.
///
/// Client errors carry their detail. Unexpected I/O failures are logged with
/// full context and the client only sees a generic message.
pub fn error_reply(context: &str, err: &StorageError) -> String {
    let code = status_for(err);
    match err {
        StorageError::InvalidArgument(detail) => format_response(code, detail),
        StorageError::AlreadyExists(_) | StorageError::NotFound(_) => {
            format_response(code, &err.to_string())
        }
        StorageError::Io(e) => {
            error!("{context} failed: {e}");
            format_response(code, "Internal server error")
        }
    }
}
