//! Client connections
//!
//! Per-connection session loop, session bookkeeping and the registry of
//! active connections.

pub mod handler;
pub mod registry;
pub mod session;

pub use handler::handle_client;
pub use registry::ConnectionRegistry;
pub use session::ClientSession;
