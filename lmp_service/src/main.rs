// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]

use std::{str::FromStr, sync::Arc, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use anyhow::Result;
use clap::Parser;
use lmp_core::{
    context::memory::InMemoryContext,
    contract::ClaimRegistry,
    orchestrator::{ClaimConfig, Orchestrator},
};
use lmp_service::{metrics, server};
use log::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on for REST requests.
    /// Defaults to 8080.
    #[arg(long, default_value_t = 8080, env = "LMP_PORT")]
    port: u16,

    /// Custodian private key for signing mint vouchers, as a hex string.
    #[arg(long, env = "LMP_PRIVATE_KEY")]
    private_key: String,

    /// Chain ID the claim registry is deployed on; part of the EIP-712
    /// domain every voucher signature is bound to.
    #[arg(long, default_value_t = 1, env = "LMP_CHAIN_ID")]
    chain_id: u64,

    /// Address of the claim registry; the other half of the EIP-712 domain.
    #[arg(long, env = "LMP_REGISTRY_ADDRESS")]
    registry_address: Option<Address>,

    /// Metrics server port.
    /// Defaults to 5000.
    #[arg(long, default_value_t = 5000, env = "LMP_METRICS_PORT")]
    metrics_port: u16,

    /// How long a claim request waits for chain confirmation before
    /// returning a pending outcome, in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "LMP_CLAIM_TIMEOUT_MS")]
    claim_timeout_ms: u64,

    /// Interval between ledger/chain reconciliation passes, in seconds.
    #[arg(long, default_value_t = 60, env = "LMP_RECONCILE_INTERVAL_SECS")]
    reconcile_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger.
    // Set the log level by setting the RUST_LOG environment variable.
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    debug!(
        "settings: port={} chain_id={} metrics_port={} claim_timeout_ms={} reconcile_interval_secs={}",
        args.port, args.chain_id, args.metrics_port, args.claim_timeout_ms,
        args.reconcile_interval_secs
    );

    // Start the metrics server.
    // We just let it gracelessly get killed at the end of main()
    tokio::spawn(metrics::run_server(args.metrics_port));

    let wallet = PrivateKeySigner::from_str(&args.private_key)?;
    info!("Custodian wallet address: {:#x}", wallet.address());

    // The custodian key deploys the registry, so it holds the admin and
    // minter roles from the start.
    let registry = Arc::new(ClaimRegistry::new(
        args.chain_id,
        args.registry_address.unwrap_or_default(),
        wallet.address(),
    ));
    let context = InMemoryContext::new(registry);
    let orchestrator = Arc::new(Orchestrator::new(
        context.registry().domain_separator().clone(),
        context.clone(),
        wallet,
        ClaimConfig {
            confirmation_timeout: Duration::from_millis(args.claim_timeout_ms),
        },
    ));

    // Periodic repair task: chain truth flows back into the ledger without
    // any request handler involvement.
    {
        let orchestrator = orchestrator.clone();
        let every = Duration::from_secs(args.reconcile_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // the first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match orchestrator.reconcile().await {
                    Ok(report) if report.repaired + report.divergent > 0 => {
                        info!(
                            "reconcile: examined={} repaired={} divergent={}",
                            report.examined, report.repaired, report.divergent
                        );
                    }
                    Ok(_) => {}
                    Err(err) => log::error!("reconcile pass failed: {err}"),
                }
            }
        });
    }

    let state = server::AppState::new(orchestrator, context);
    let (handle, addr) = server::run_server(args.port, state).await?;
    info!("Server started. Listening on port {}.", addr.port());

    let _ = handle.await;

    // If we're here, we've received a signal to exit.
    info!("Shutting down...");
    Ok(())
}
