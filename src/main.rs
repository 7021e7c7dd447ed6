//! file-depot - Entry Point
//!
//! Loads configuration, opens the storage backend and serves clients until
//! interrupted.

use log::{error, info};

use file_depot::config::Settings;
use file_depot::storage::open_backend;
use file_depot::{FileService, Server, ServerError};

#[tokio::main]
async fn main() {
    // Initialize the logger (env_logger picks up RUST_LOG environment variable)
    env_logger::init();

    info!("Launching file-depot...");

    if let Err(e) = run().await {
        error!("Server startup failed: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ServerError> {
    let (server_settings, storage_config) = Settings::load()?.split();

    let storage = open_backend(&storage_config).await?;
    let service = FileService::new(storage);
    let server = Server::bind(server_settings, service).await?;

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl-C"),
                Err(e) => {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await;

    info!("file-depot stopped");
    Ok(())
}
