//! Module `commands`
//!
//! Defines the command set understood by the server, the result type every
//! handler returns, and the parsing of raw command lines.

/// Most files a single `MSTOR` batch may announce
pub const MAX_BATCH_FILES: usize = 256;

/// A command parsed from one client line.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Upload one file; the line is followed by `size` raw bytes
    Stor { size: u64, name: String },
    /// Upload `count` files, each introduced by a `<size> <name>` line
    Mstor(usize),
    List,
    Retr(String),
    Dele(String),
    Help,
    Noop,
    Quit,
    /// A known command with malformed arguments
    Invalid(String),
    Unknown(String),
}

/// Represents the outcome status of executing a command.
#[derive(Debug, PartialEq)]
pub enum CommandStatus {
    Success,
    Failure(String),
    CloseConnection,
}

/// Struct encapsulating the full result of a command execution.
#[derive(Debug)]
pub struct CommandResult {
    pub status: CommandStatus,
    pub message: Option<String>,
}

impl CommandResult {
    pub fn success(message: String) -> Self {
        Self {
            status: CommandStatus::Success,
            message: Some(message),
        }
    }

    pub fn failure(reason: impl Into<String>, message: String) -> Self {
        Self {
            status: CommandStatus::Failure(reason.into()),
            message: Some(message),
        }
    }

    pub fn close(message: Option<String>) -> Self {
        Self {
            status: CommandStatus::CloseConnection,
            message,
        }
    }
}

/// Parses a raw command line into a [`Command`].
///
/// The command word is case-insensitive. File names are taken verbatim from
/// the rest of the line, so they may contain spaces.
pub fn parse_command(raw: &str) -> Command {
    let line = raw.trim_end_matches(['\r', '\n']);
    let trimmed = line.trim_start();
    let (word, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim_start()),
        None => (trimmed, ""),
    };

    match word.to_ascii_uppercase().as_str() {
        "STOR" => match parse_upload_header(arg) {
            Ok((size, name)) => Command::Stor { size, name },
            Err(reason) => Command::Invalid(reason),
        },
        "MSTOR" => match arg.trim().parse::<usize>() {
            Ok(count) if count > MAX_BATCH_FILES => Command::Invalid(format!(
                "Too many files in batch: {count} (max {MAX_BATCH_FILES})"
            )),
            Ok(count) if count > 0 => Command::Mstor(count),
            _ => Command::Invalid(format!("Invalid file count: {}", arg.trim())),
        },
        "LIST" => Command::List,
        "RETR" => Command::Retr(arg.to_string()),
        "DELE" => Command::Dele(arg.to_string()),
        "HELP" => Command::Help,
        "NOOP" => Command::Noop,
        "QUIT" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

/// Parses `<size> <name>`, the header introducing every uploaded file.
///
/// A missing name parses as an empty one; rejecting it is up to storage.
pub fn parse_upload_header(raw: &str) -> Result<(u64, String), String> {
    let line = raw.trim_end_matches(['\r', '\n']).trim_start();
    let (size, name) = match line.split_once(' ') {
        Some((size, name)) => (size, name),
        None => (line, ""),
    };

    let size = size
        .parse::<u64>()
        .map_err(|_| format!("Invalid upload size: {size}"))?;

    Ok((size, name.to_string()))
}
