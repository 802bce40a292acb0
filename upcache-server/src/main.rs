mod config;
mod error;
mod logging;
mod routes;
mod server;

use std::process::ExitCode;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use upcache_lib::GatewayConfig;
use upcache_lib::RedditGateway;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<(), ServerError> {
    let server_config = ServerConfig::from_env()?;
    logging::init(&server_config)?;

    let gateway_config = GatewayConfig::from_env()?;
    log::debug!("{:?}", gateway_config);
    let gateway = RedditGateway::new(gateway_config)?;

    let addr = server_config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    log::info!("listening on http://{}", addr);

    if server_config.admin_token.is_none() {
        log::info!("cache invalidation disabled, {} is not set", config::ENV_ADMIN_TOKEN);
    }
    let state = AppState::new(gateway, server_config.admin_token);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    server::serve(listener, state, cancel).await;
    log::info!("shut down");
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("ctrl-c received, shutting down"),
        Err(e) => {
            log::error!("failed to listen for ctrl-c: {}", e);
            return;
        }
    }
    cancel.cancel();
}
