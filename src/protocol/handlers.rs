//! Command handlers
//!
//! One handler per command. Handlers that move file content read upload
//! bodies from, or write download bodies to, the connection directly; the
//! final reply line goes back to the session loop in the [`CommandResult`].
//!
//! An `Err` from a handler means the connection itself failed and the
//! session must end.

use futures::StreamExt;
use log::{debug, error, info, warn};
use std::io;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::client::ClientSession;
use crate::error::{StorageError, error_reply};
use crate::protocol::body::ExactBody;
use crate::protocol::commands::{Command, CommandResult, parse_upload_header};
use crate::protocol::lines::{LineRead, read_line_bounded};
use crate::protocol::responses::{
    BAD_REQUEST, CREATED, GOODBYE, HELP, NOT_FOUND, OK, TRANSFER_COMPLETE, download_header,
    format_continuation, format_response,
};
use crate::service::FileService;
use crate::storage::{Download, IncomingFile};

const HELP_LINES: [&str; 8] = [
    "Commands:",
    "STOR <size> <name>   upload a file, followed by <size> raw bytes",
    "MSTOR <count>        upload <count> files, each a \"<size> <name>\" line plus bytes",
    "LIST                 list stored files",
    "RETR <name>          download a file",
    "DELE <name>          delete a file",
    "NOOP                 do nothing",
    "QUIT                 close the connection",
];

/// Dispatches a parsed command to its handler.
///
/// `max_line` bounds every extra line read while handling the command.
pub async fn handle_command<R, W>(
    session: &mut ClientSession,
    command: Command,
    reader: &mut R,
    writer: &mut W,
    service: &FileService,
    max_line: usize,
) -> io::Result<CommandResult>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    match command {
        Command::Stor { size, name } => handle_cmd_stor(session, service, reader, size, name).await,
        Command::Mstor(count) => {
            handle_cmd_mstor(session, service, reader, count, max_line).await
        }
        Command::List => handle_cmd_list(service, writer).await,
        Command::Retr(name) => handle_cmd_retr(session, service, writer, name).await,
        Command::Dele(name) => Ok(handle_cmd_dele(service, name).await),
        Command::Help => Ok(handle_cmd_help()),
        Command::Noop => Ok(CommandResult::success(format_response(OK, "OK"))),
        Command::Quit => Ok(CommandResult::close(Some(format_response(
            GOODBYE, "Goodbye",
        )))),
        Command::Invalid(reason) => {
            let message = format_response(BAD_REQUEST, &reason);
            Ok(CommandResult::failure(reason, message))
        }
        Command::Unknown(raw) => Ok(CommandResult::failure(
            format!("Unknown command: {raw}"),
            format_response(BAD_REQUEST, "Unknown command"),
        )),
    }
}

fn storage_failure(context: &str, err: StorageError) -> CommandResult {
    let message = error_reply(context, &err);
    CommandResult::failure(err.to_string(), message)
}

/// Saves one upload body, then drains whatever storage did not consume so
/// the next command line starts where the client expects it.
async fn receive_file<R>(
    service: &FileService,
    reader: &mut R,
    size: u64,
    name: String,
) -> io::Result<Result<String, StorageError>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut body = ExactBody::new(&mut *reader, size);
    let outcome = service
        .upload_file(IncomingFile::new(name, &mut body))
        .await;

    let leftover = body.drain().await?;
    if leftover > 0 {
        debug!("Discarded {} unread upload bytes", leftover);
    }

    Ok(outcome)
}

/// Handles STOR: stores a single file.
async fn handle_cmd_stor<R>(
    session: &mut ClientSession,
    service: &FileService,
    reader: &mut R,
    size: u64,
    name: String,
) -> io::Result<CommandResult>
where
    R: AsyncRead + Unpin + Send,
{
    match receive_file(service, reader, size, name.clone()).await? {
        Ok(stored) => {
            session.record_upload(size);
            info!(
                "Client {} uploaded file: {} ({} bytes)",
                session.addr(),
                stored,
                size
            );
            Ok(CommandResult::success(format_response(
                CREATED,
                &format!("File uploaded successfully: {stored}"),
            )))
        }
        Err(e) => Ok(storage_failure(&format!("Upload of {name}"), e)),
    }
}

/// Handles MSTOR: stores several files sent back to back.
///
/// Files are saved in order. After the first failure the remaining bodies
/// are still read off the connection but not stored, and that failure is the
/// reply. Files saved before it stay saved.
async fn handle_cmd_mstor<R>(
    session: &mut ClientSession,
    service: &FileService,
    reader: &mut R,
    count: usize,
    max_line: usize,
) -> io::Result<CommandResult>
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut stored = Vec::new();
    let mut first_failure = None;

    for _ in 0..count {
        let header = match read_line_bounded(reader, max_line).await? {
            LineRead::Line(header) => header,
            LineRead::TooLong => {
                warn!("Client {} sent an oversized batch header", session.addr());
                return Ok(CommandResult::close(Some(format_response(
                    BAD_REQUEST,
                    "Command too long",
                ))));
            }
            LineRead::Closed => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during batch upload",
                ));
            }
        };

        let (size, name) = match parse_upload_header(&header) {
            Ok(parsed) => parsed,
            Err(reason) => {
                // Without a size the rest of the batch cannot be framed
                warn!("Client {} sent a bad batch header: {}", session.addr(), reason);
                return Ok(CommandResult::close(Some(format_response(
                    BAD_REQUEST,
                    &reason,
                ))));
            }
        };

        if first_failure.is_some() {
            ExactBody::new(&mut *reader, size).drain().await?;
            continue;
        }

        match receive_file(service, reader, size, name.clone()).await? {
            Ok(name) => {
                session.record_upload(size);
                info!(
                    "Client {} uploaded file: {} ({} bytes)",
                    session.addr(),
                    name,
                    size
                );
                stored.push(name);
            }
            Err(e) => first_failure = Some(storage_failure(&format!("Upload of {name}"), e)),
        }
    }

    if let Some(failure) = first_failure {
        return Ok(failure);
    }

    Ok(CommandResult::success(format_response(
        CREATED,
        &format!("Uploaded {} files: {}", stored.len(), stored.join(", ")),
    )))
}

/// Handles LIST: one line per stored file.
async fn handle_cmd_list<W>(service: &FileService, writer: &mut W) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin + Send,
{
    let files = match service.list_files().await {
        Ok(files) => files,
        Err(e) => return Ok(storage_failure("List", e)),
    };

    let mut listing = format_response(OK, &format!("{} files", files.len()));
    for name in &files {
        listing.push_str(name);
        listing.push_str("\r\n");
    }
    writer.write_all(listing.as_bytes()).await?;

    info!("Listed files: {:?}", files);

    Ok(CommandResult::success(format_response(
        TRANSFER_COMPLETE,
        "End of list",
    )))
}

/// Handles RETR: streams a stored file chunk by chunk.
///
/// Dropping the download stream closes the file, which happens on every
/// return path, including a client that disconnects mid-transfer.
async fn handle_cmd_retr<W>(
    session: &mut ClientSession,
    service: &FileService,
    writer: &mut W,
    name: String,
) -> io::Result<CommandResult>
where
    W: AsyncWrite + Unpin + Send,
{
    let Download {
        mut stream,
        content_type,
        size,
    } = match service.download_file(&name).await {
        Ok(download) => download,
        Err(e) => return Ok(storage_failure(&format!("Download of {name}"), e)),
    };

    writer
        .write_all(download_header(size, &content_type, &name).as_bytes())
        .await?;

    let mut sent = 0u64;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                writer.write_all(&bytes).await?;
                sent += bytes.len() as u64;
            }
            Err(e) => {
                // The header already promised `size` bytes, so the
                // connection cannot be resynchronised
                error!("Read error while sending {}: {}", name, e);
                return Ok(CommandResult::close(None));
            }
        }
    }

    if sent != size {
        error!(
            "File {} changed while being sent: announced {} bytes, sent {}",
            name, size, sent
        );
        return Ok(CommandResult::close(None));
    }

    writer.flush().await?;
    session.record_download(sent);
    info!("Downloaded file: {} ({} bytes)", name, sent);

    Ok(CommandResult::success(format_response(
        TRANSFER_COMPLETE,
        "Transfer complete",
    )))
}

/// Handles DELE: removing a missing file is reported as not found.
async fn handle_cmd_dele(service: &FileService, name: String) -> CommandResult {
    match service.delete_file(&name).await {
        Ok(true) => {
            info!("Deleted file: {}", name);
            CommandResult::success(format_response(
                OK,
                &format!("File deleted successfully: {name}"),
            ))
        }
        Ok(false) => {
            warn!("File not found for deletion: {}", name);
            CommandResult::failure(
                "File not found",
                format_response(NOT_FOUND, &format!("File not found: {name}")),
            )
        }
        Err(e) => storage_failure(&format!("Delete of {name}"), e),
    }
}

fn handle_cmd_help() -> CommandResult {
    let mut message: String = HELP_LINES
        .iter()
        .map(|line| format_continuation(HELP, line))
        .collect();
    message.push_str(&format_response(HELP, "End of help"));
    CommandResult::success(message)
}
