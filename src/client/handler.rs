use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::client::ClientSession;
use crate::config::ServerSettings;
use crate::protocol::responses::{BAD_REQUEST, READY, format_response};
use crate::protocol::{Command, CommandStatus, LineRead, handle_command, parse_command, read_line_bounded};
use crate::service::FileService;

/// Most input discarded after an oversized line before the socket is closed
const LINGER_BYTES: u64 = 64 * 1024;
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);

/// Reads and drops what the client already sent, so closing the socket does
/// not reset the connection before the last reply is delivered.
async fn discard_pending<R>(reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let mut limited = (&mut *reader).take(LINGER_BYTES);
    let mut sink = tokio::io::sink();
    let drain = tokio::io::copy(&mut limited, &mut sink);
    let _ = tokio::time::timeout(LINGER_TIMEOUT, drain).await;
}

/// Runs one client session until it quits, disconnects or fails.
///
/// - Uses BufReader to read length-capped command lines from the client.
/// - Dispatches commands using `handle_command`.
/// - Upload and download bodies share the connection with command lines.
pub async fn handle_client<S>(
    stream: S,
    client_addr: SocketAddr,
    service: FileService,
    settings: &ServerSettings,
) -> ClientSession
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    let mut session = ClientSession::new(client_addr);

    let greeting = format_response(READY, "file-depot ready");
    if let Err(e) = write_half.write_all(greeting.as_bytes()).await {
        warn!("Failed to greet client {}: {}", client_addr, e);
        return session;
    }

    loop {
        let line = match read_line_bounded(&mut reader, settings.max_command_length).await {
            Ok(LineRead::Line(line)) => line,
            Ok(LineRead::Closed) => {
                info!("Connection closed by client {}", client_addr);
                break;
            }
            Ok(LineRead::TooLong) => {
                // The rest of the line is still unread, so the session cannot continue
                warn!("Client {} sent an oversized command line", client_addr);
                let reply = format_response(BAD_REQUEST, "Command too long");
                if write_half.write_all(reply.as_bytes()).await.is_ok() {
                    let _ = write_half.shutdown().await;
                    discard_pending(&mut reader).await;
                }
                break;
            }
            Err(e) => {
                error!("Failed to read from {}: {}", client_addr, e);
                break;
            }
        };

        let command = parse_command(&line);
        debug!("Received from {}: {:?}", client_addr, command);
        session.record_command();
        let quitting = command == Command::Quit;

        let result = match handle_command(
            &mut session,
            command,
            &mut reader,
            &mut write_half,
            &service,
            settings.max_command_length,
        )
        .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Connection to {} failed: {}", client_addr, e);
                break;
            }
        };

        if let CommandStatus::Failure(reason) = &result.status {
            debug!("Command from {} failed: {}", client_addr, reason);
        }

        if let Some(msg) = &result.message {
            if let Err(e) = write_half.write_all(msg.as_bytes()).await {
                warn!("Failed to reply to {}: {}", client_addr, e);
                break;
            }
        }

        if result.status == CommandStatus::CloseConnection {
            info!("Closing connection to {}", client_addr);
            if !quitting {
                let _ = write_half.shutdown().await;
                discard_pending(&mut reader).await;
            }
            break;
        }
    }

    let _ = write_half.shutdown().await;
    info!("Client {} disconnected: {}", client_addr, session.summary());
    session
}
