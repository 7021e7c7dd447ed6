//! Bounded line reads
//!
//! Command lines and batch headers are read through a length cap, so a
//! client that never sends a newline cannot make the server buffer without
//! limit.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Outcome of reading one line from the connection
#[derive(Debug, PartialEq)]
pub enum LineRead {
    /// The peer closed the connection before sending anything
    Closed,
    /// A complete line, terminator included (or cut short by EOF)
    Line(String),
    /// More than the allowed number of bytes arrived without a complete line
    TooLong,
}

/// Read one `\n`-terminated line of at most `max_len` bytes.
///
/// Never buffers more than `max_len + 1` bytes. After `TooLong` the rest of
/// the oversized line is still unread, so the caller should drop the
/// connection.
pub async fn read_line_bounded<R>(reader: &mut R, max_len: usize) -> io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let limit = (max_len as u64).saturating_add(1);
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut raw)
        .await?;

    if read == 0 {
        return Ok(LineRead::Closed);
    }
    if read > max_len {
        return Ok(LineRead::TooLong);
    }

    String::from_utf8(raw)
        .map(LineRead::Line)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
