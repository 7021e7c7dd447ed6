//! file-depot
//!
//! A networked file store: clients upload, list, download and delete named
//! files over a line-oriented TCP protocol. Files live as plain entries in a
//! single storage directory and are streamed in fixed-size chunks in both
//! directions, so no transfer ever holds a whole file in memory.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;
pub mod storage;

pub use config::Settings;
pub use error::{ServerError, StorageError};
pub use server::Server;
pub use service::FileService;
pub use storage::{Download, IncomingFile, LocalStorage, Storage};
