//! Server core functionality
//!
//! Accept loop, connection limit and session spawning.

pub mod core;

pub use core::Server;
