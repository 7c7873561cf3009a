//! Gateway process entry point: configuration, wiring, serving.
//!
//! Every configuration problem is fatal here, before the listener binds.
//! A gateway that starts is a gateway whose signature secret, issuer
//! address, and ledger endpoint all validated.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use openvend_gateway::{build_router, AppState, GatewayConfig};
use openvend_issuance::{ClaimLedger, IssuanceCoordinator, JournalClaimLedger, MemoryClaimLedger};
use openvend_ledger::{LedgerClient, RetryPolicy, RpcLedgerClient, SerialLedger};
use openvend_types::{constants, Result};
use openvend_verifier::EventVerifier;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = GatewayConfig::from_env()?;

    let rpc = RpcLedgerClient::new(&config.ledger)?;
    let ledger: Arc<dyn LedgerClient> = Arc::new(SerialLedger::new(rpc));

    let claims: Arc<dyn ClaimLedger> = match &config.journal_path {
        Some(path) => {
            let journal = JournalClaimLedger::open(path)?;
            info!(path = %journal.path().display(), "using journal claim ledger");
            Arc::new(journal)
        }
        None => {
            warn!("no journal path configured; claims will not survive a restart");
            Arc::new(MemoryClaimLedger::new())
        }
    };

    let coordinator = IssuanceCoordinator::new(
        claims,
        ledger,
        config.issuance.clone(),
        RetryPolicy::from_config(&config.ledger),
    );
    let state = Arc::new(AppState {
        verifier: EventVerifier::new(config.verifier.clone()),
        coordinator,
    });

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        version = constants::VERSION,
        "gateway listening"
    );
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
