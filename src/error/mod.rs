//! Error handling
//!
//! Defines error types and their mapping onto protocol replies.

pub mod handlers;
pub mod types;

pub use handlers::{error_reply, status_for};
pub use types::*;
