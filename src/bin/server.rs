// Federation Gateway - Main Server
// The production entrypoint for the e-commerce federation gateway
// Run with: cargo run --bin server

//! # Federation Gateway Server Binary
//!
//! Starts the gateway in front of the three subgraph services:
//!
//! - **products** (default port 4001)
//! - **users** (default port 4002)
//! - **orders** (default port 4003)
//!
//! Each subgraph's address is resolved from the environment
//! (`PRODUCTS_URL` / `PRODUCTS_HOSTPORT` / compose-network DNS, and so on),
//! then the startup orchestrator acquires schemas with bounded retries and
//! backoff before binding the listener on `0.0.0.0:PORT`.
//!
//! Exit codes: 0 after a signal-triggered graceful shutdown, 1 on a
//! terminal startup failure.

use dotenv::dotenv;
use federation_gateway::{
    bootstrap::is_transient, GatewayConfig, GatewayServer, LifecycleController,
    StartupOrchestrator,
};
use std::sync::Arc;
use tracing::{error, info};

/// The subgraphs this gateway fronts, with their compose-network ports
const SUBGRAPHS: &[(&str, u16)] = &[("products", 4001), ("users", 4002), ("orders", 4003)];

#[tokio::main]
async fn main() {
    // Load environment variables from .env file - optional, the deployment
    // system sets them in production
    if let Err(e) = dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize structured logging for the application
    tracing_subscriber::fmt::init();

    info!("🔄 Starting E-Commerce Federation Gateway...");

    if let Err(e) = run().await {
        error!("💥 Failed to start federation gateway: {}", e);
        if is_transient(&e.to_string()) {
            error!("💡 Check subgraph URLs (env vars) and that services are reachable.");
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;
    info!(
        "⚙️ Listen port {}, subgraph path '{}', up to {} startup attempts",
        config.port, config.subgraph_path, config.retry.max_attempts
    );

    let mut endpoints = Vec::with_capacity(SUBGRAPHS.len());
    for (name, default_port) in SUBGRAPHS {
        endpoints.push(federation_gateway::resolve(
            name,
            *default_port,
            &config.subgraph_path,
        )?);
    }

    let orchestrator = StartupOrchestrator::new(config.retry.clone());
    let server = GatewayServer::new(config, endpoints.clone());
    let gateway = orchestrator.run(|_attempt| server.build()).await?;

    info!("✅ Federation Gateway Successfully Started!");
    info!("🚀 Gateway ready at http://{}", gateway.local_addr());
    info!("📋 Connected Services:");
    for endpoint in &endpoints {
        info!(
            "  • {} (default port {}): {}",
            endpoint.name, endpoint.port, endpoint.url
        );
    }

    let lifecycle = Arc::new(LifecycleController::new());
    let shutdown = lifecycle.clone();
    gateway
        .serve(async move { shutdown.shutdown_requested().await })
        .await?;
    Ok(())
}
