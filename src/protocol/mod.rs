//! Wire protocol
//!
//! Line-oriented command parsing, reply formatting, upload body framing and
//! the command handlers that call into the file service.

pub mod body;
pub mod commands;
pub mod handlers;
pub mod lines;
pub mod responses;

pub use commands::{Command, CommandResult, CommandStatus, parse_command};
pub use handlers::handle_command;
pub use lines::{LineRead, read_line_bounded};
