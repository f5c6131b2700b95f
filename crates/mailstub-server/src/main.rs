//! Mailstub - Disposable mail capture server entry point

use anyhow::Result;
use mailstub_common::Config;
use mailstub_core::{Pop3Server, Pop3ServerConfig, SmtpServer, SmtpServerConfig};
use mailstub_store::FixedSizeMailStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Mailstub capture server...");

    // Load configuration
    let config = Config::load()?;

    // One shared store for both protocol servers
    let store = Arc::new(FixedSizeMailStore::new(config.store.capacity));
    info!("Mail store ready, capacity {}", config.store.capacity);

    // Start SMTP server
    let smtp_server = Arc::new(SmtpServer::new(
        SmtpServerConfig {
            bind_address: config.server.bind_address.clone(),
            port: config.smtp.port,
            hostname: config.server.hostname.clone(),
            greeting: config.server.greeting.clone(),
        },
        store.clone(),
    ));
    smtp_server.start().await?;

    // Start POP3 server
    let pop3_server = Arc::new(Pop3Server::new(
        Pop3ServerConfig {
            bind_address: config.server.bind_address.clone(),
            port: config.pop3.port,
            hostname: config.server.hostname.clone(),
            greeting: config.server.greeting.clone(),
        },
        store.clone(),
    ));
    pop3_server.start().await?;

    info!(
        "Mailstub started: SMTP on {}:{}, POP3 on {}:{}",
        config.server.bind_address, config.smtp.port, config.server.bind_address, config.pop3.port
    );

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    smtp_server.stop();
    pop3_server.stop();

    info!("Mailstub shutdown complete");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,mailstub=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
