//! Protocol replies
//!
//! Reply codes and formatting. Codes follow their HTTP namesakes where one
//! exists.

pub const TRANSFER_STARTING: u16 = 150;
pub const OK: u16 = 200;
pub const CREATED: u16 = 201;
pub const HELP: u16 = 214;
pub const READY: u16 = 220;
pub const GOODBYE: u16 = 221;
pub const TRANSFER_COMPLETE: u16 = 226;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const TOO_MANY_CONNECTIONS: u16 = 421;
pub const INTERNAL_ERROR: u16 = 500;

/// Format a reply line
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\r\n", code, message)
}

/// Format an intermediate line of a multi-line reply
pub fn format_continuation(code: u16, message: &str) -> String {
    format!("{}-{}\r\n", code, message)
}

/// Header sent before the raw bytes of a download
pub fn download_header(size: u64, content_type: &str, name: &str) -> String {
    let quoted = name.replace('"', "\\\"");
    format_response(
        TRANSFER_STARTING,
        &format!("{size} {content_type} attachment; filename=\"{quoted}\""),
    )
}
