use std::net::SocketAddr;

use clap::Parser;
use tracing::info;

use chfs::application::services::direct_transfer_service::DirectTransferService;
use chfs::common::cli::Cli;
use chfs::common::{errors::DomainError, logging};
use chfs::infrastructure::config_store::ConfigStore;
use chfs::infrastructure::stores::transfer_store::TransferStore;
use chfs::interfaces::api::router;
use chfs::interfaces::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    if let Err(e) = run(cli).await {
        tracing::error!(error = %e.message, "fatal error during startup");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<(), DomainError> {
    // Persistent state is relative to the process working directory
    // regardless of where `--config`/`CHFS_CONFIG` points (spec.md §6).
    let data_dir = std::env::current_dir()
        .map(|cwd| cwd.join("data"))
        .unwrap_or_else(|_| std::path::PathBuf::from("data"));

    let config = ConfigStore::load(cli.config.clone(), data_dir).await?;
    let snapshot = config.current();

    let transfer_store = TransferStore::new(config.data_dir());
    let state = AppState::new(config.clone(), DirectTransferService::new(transfer_store));

    {
        let state = state.clone();
        config.on_change(move |_old, new| {
            let state = state.clone();
            let new = new.clone();
            tokio::spawn(async move { state.apply_config_change(&new).await });
        });
    }

    if cli.reload || snapshot.hot_reload.enabled {
        config.spawn_hot_reload(tokio::runtime::Handle::current());
    }

    let host = cli.host.unwrap_or_else(|| snapshot.host.clone());
    let port = cli.port.unwrap_or(snapshot.port);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| DomainError::internal_error("main", format!("invalid bind address: {e}")))?;

    let app = router::build(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DomainError::internal_error("main", format!("cannot bind {addr}: {e}")))?;

    info!(%addr, "chfs listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|e| DomainError::internal_error("main", e.to_string()))?;

    Ok(())
}
