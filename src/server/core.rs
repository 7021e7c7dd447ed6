use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::client::{ConnectionRegistry, handle_client};
use crate::config::ServerSettings;
use crate::error::ServerError;
use crate::protocol::responses::{TOO_MANY_CONNECTIONS, format_response};
use crate::service::FileService;

pub struct Server {
    listener: TcpListener,
    registry: Arc<Mutex<ConnectionRegistry>>,
    service: FileService,
    settings: Arc<ServerSettings>,
}

impl Server {
    /// Bind the command listener. Port 0 picks a free port.
    pub async fn bind(settings: ServerSettings, service: FileService) -> Result<Self, ServerError> {
        let addr = settings.listen_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!("Failed to bind to {}: {}", addr, e);
            e
        })?;

        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            registry: Arc::new(Mutex::new(ConnectionRegistry::new())),
            service,
            settings: Arc::new(settings),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve clients forever
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Serve clients until `shutdown` completes.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting file-depot on {} (max {} clients)",
            self.settings.listen_addr(),
            self.settings.max_clients
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let registry = Arc::clone(&self.registry);
                            let service = self.service.clone();
                            let settings = Arc::clone(&self.settings);

                            // Spawn a task for each client so accept loop doesn't block
                            tokio::spawn(async move {
                                if let Err(e) =
                                    serve_connection(stream, addr, registry, service, settings).await
                                {
                                    warn!("Failed to handle client {}: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}

/// Registers a new client, runs its session and unregisters it afterwards.
async fn serve_connection(
    mut stream: TcpStream,
    client_addr: SocketAddr,
    registry: Arc<Mutex<ConnectionRegistry>>,
    service: FileService,
    settings: Arc<ServerSettings>,
) -> io::Result<()> {
    {
        let mut clients = registry.lock().await;
        if clients.len() >= settings.max_clients {
            drop(clients);
            warn!("Rejecting {}: connection limit reached", client_addr);
            let reply = format_response(TOO_MANY_CONNECTIONS, "Too many connections. Try again later.");
            stream.write_all(reply.as_bytes()).await?;
            stream.shutdown().await?;
            return Ok(());
        }

        clients.insert(client_addr);
        info!(
            "Accepted client {} ({}/{} clients)",
            client_addr,
            clients.len(),
            settings.max_clients
        );
    }

    handle_client(stream, client_addr, service, &settings).await;

    if let Some(duration) = registry.lock().await.remove(&client_addr) {
        info!("Client {} session lasted {:.1?}", client_addr, duration);
    }

    Ok(())
}
