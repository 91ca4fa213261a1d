//! Setcode Activator - sends one EIP-7702 activation transaction
//!
//! Reads the deployer key from the environment, delegates the deployer's
//! account to the configured contract and calls its initializer in the same
//! transaction.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use setcode_activator::chain::ChainProvider;
use setcode_activator::config::Settings;
use setcode_activator::crypto::{selector, EcdsaSigner};
use setcode_activator::tx::{ActivationSender, ActivationTarget, GasEstimator};
use setcode_activator::ActivatorError;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Setcode Activator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    let network = settings.network()?.clone();
    info!(
        "Using network {} (chain {}, {} endpoint(s))",
        settings.activation.network,
        network.chain_id,
        network.rpc_urls.len()
    );

    // Load the signer; the key itself is never logged
    let signer = EcdsaSigner::from_env(&settings.wallet.private_key_env)
        .with_context(|| format!("Failed to load key from ${}", settings.wallet.private_key_env))?;

    // Calldata: selector followed by any configured arguments
    let mut calldata = selector(&settings.activation.call_signature).to_vec();
    calldata.extend(settings.activation.call_args()?);

    let target = ActivationTarget {
        expected_chain_id: network.chain_id,
        delegate: settings.activation.delegate()?,
        calldata,
        gas_limit: settings.activation.gas_limit.into(),
        value: settings.activation.value()?,
    };

    let provider = Arc::new(ChainProvider::new(
        network,
        settings.fees.default_priority_fee(),
    )?);

    let sender = ActivationSender::new(
        provider.clone(),
        provider,
        GasEstimator::new(settings.fees.buffer_percent, settings.fees.max_fee_cap()),
        signer,
        Duration::from_secs(settings.activation.send_timeout_secs),
    );

    // Cancellable until the bytes are handed to the node, never after
    let envelope = tokio::select! {
        result = sender.prepare(&target) => result.map_err(report)?,
        _ = shutdown_signal() => {
            warn!("Shutdown signal received before the transaction was sent");
            return Ok(());
        }
    };
    info!("Raw transaction: {}", envelope.raw_hex());

    let tx_hash = sender.broadcast(&envelope).await.map_err(report)?;
    info!("tx sent: {:?}", tx_hash);

    Ok(())
}

/// Log a failed attempt with what the operator should do next
fn report(e: ActivatorError) -> anyhow::Error {
    match &e {
        ActivatorError::BroadcastUnknown { tx_hash, reason } => {
            error!(
                "Broadcast outcome unknown ({}), check tx {:?} before rerunning",
                reason, tx_hash
            );
        }
        e if e.is_retryable() => error!("Activation failed, safe to rerun: {}", e),
        e => error!("Activation failed: {}", e),
    }
    e.into()
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,setcode_activator=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
}
