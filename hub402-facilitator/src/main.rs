//! x402 facilitator HTTP server for EVM chains.
//!
//! # Usage
//!
//! ```bash
//! EVM_PRIVATE_KEY=0x... cargo run -p hub402-facilitator --release
//!
//! # Custom chain alongside the built-in networks
//! CHAIN_ID=31337 CHAIN_NAME="Local Dev" CHAIN_RPC_URL=http://127.0.0.1:8545 \
//!     cargo run -p hub402-facilitator
//! ```
//!
//! See [`hub402_facilitator::config`] for every variable. A `.env` file in
//! the working directory is loaded first.

use std::sync::Arc;

use axum::http::{Method, header};
use clap::Parser;
use hub402_evm::ExactEvmFacilitator;
use hub402_evm::chain::{AlloyConnector, SignerContext};
use hub402_evm::networks::NetworkRegistry;
use tower_http::cors::{self, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use hub402_facilitator::config::FacilitatorConfig;
use hub402_facilitator::handlers::{AppState, facilitator_router};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    let config = FacilitatorConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(&config.log_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    if let Err(e) = run(config).await {
        tracing::error!("Facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: FacilitatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = NetworkRegistry::new(config.custom_chain()?);
    registry.resolve(&config.network)?;
    tracing::info!(
        default_network = %config.network,
        networks = ?registry.list_supported(),
        "Loaded network registry"
    );

    let signer = SignerContext::from_hex_key(&config.private_key, AlloyConnector)?;
    let facilitator = ExactEvmFacilitator::new(registry, signer)
        .with_gas_policy(config.gas_policy()?)
        .with_timeouts(config.timeouts())
        .with_default_network(config.network.clone());
    let address = facilitator.signer_address();
    tracing::info!(signer = %address, "Facilitator account ready");

    let state = AppState {
        facilitator: Arc::new(facilitator),
        address,
    };

    let app = facilitator_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE]),
        );

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Facilitator shut down gracefully");
    Ok(())
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
        () = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
