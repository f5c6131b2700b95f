//! SMTP capture server
//!
//! Accept loop plus per-connection session driver. The server can be
//! started and stopped repeatedly; stopping cancels the accept loop and
//! every open session through one cancellation token.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use mailstub_common::ServerStats;
use mailstub_store::SharedMailStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::response::SmtpReply;
use super::session::SmtpSession;

/// SMTP server configuration
#[derive(Debug, Clone)]
pub struct SmtpServerConfig {
    /// Bind address (without port)
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// Hostname announced in the EHLO reply
    pub hostname: String,
    /// Greeting name used in the banner
    pub greeting: String,
}

impl Default for SmtpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 1025,
            hostname: "localhost".to_string(),
            greeting: "Mailstub".to_string(),
        }
    }
}

/// SMTP capture server bound to a shared mail store.
pub struct SmtpServer {
    config: SmtpServerConfig,
    port: AtomicU16,
    store: SharedMailStore,
    stats: Arc<ServerStats>,
    running: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl SmtpServer {
    /// Create a new server. Nothing is bound until `start`.
    pub fn new(config: SmtpServerConfig, store: SharedMailStore) -> Self {
        let port = config.port;
        Self {
            config,
            port: AtomicU16::new(port),
            store,
            stats: Arc::new(ServerStats::new()),
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Whether the accept loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of currently open client connections.
    pub fn connections(&self) -> usize {
        self.stats.connections()
    }

    /// The store this server captures into.
    pub fn store(&self) -> &SharedMailStore {
        &self.store
    }

    /// The configured listen port.
    pub fn port(&self) -> u16 {
        self.port.load(Ordering::SeqCst)
    }

    /// Change the listen port. Only honored while the server is
    /// stopped; while running the request is logged and ignored.
    pub fn set_port(&self, port: u16) {
        if self.is_running() {
            warn!("Attempted to change SMTP port while server is running! Port not changed.");
        } else {
            self.port.store(port, Ordering::SeqCst);
        }
    }

    /// The actual bound address, available while running. Differs from
    /// the configured port when port 0 was requested.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap()
    }

    /// Bind the listener and spawn the accept loop. A no-op if the
    /// server is already running.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("SMTP server already running");
            return Ok(());
        }

        let addr = format!("{}:{}", self.config.bind_address, self.port());
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        *self.local_addr.lock().unwrap() = listener.local_addr().ok();

        let token = CancellationToken::new();
        *self.shutdown.lock().unwrap() = Some(token.clone());

        info!("SMTP server listening on {}", addr);

        let server = self.clone();
        tokio::spawn(async move {
            server.accept_loop(listener, token).await;
        });

        Ok(())
    }

    /// Stop the server: the listener closes and every open session is
    /// cancelled, which unblocks any pending read. Idempotent.
    pub fn stop(&self) {
        if let Some(token) = self.shutdown.lock().unwrap().take() {
            info!("SMTP server shutting down");
            token.cancel();
        }
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, token: CancellationToken) {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                result = listener.accept() => match result {
                    Ok((stream, peer_addr)) => {
                        self.stats.connection_opened();
                        let server = self.clone();
                        let session_token = token.child_token();

                        tokio::spawn(async move {
                            if let Err(e) =
                                server.handle_connection(stream, peer_addr, session_token).await
                            {
                                error!("SMTP session error from {}: {}", peer_addr, e);
                            }
                            server.stats.connection_closed();
                        });
                    }
                    Err(e) => {
                        error!("SMTP accept error: {}", e);
                    }
                },
            }
        }

        *self.local_addr.lock().unwrap() = None;
        self.running.store(false, Ordering::SeqCst);
        info!("SMTP server stopped");
    }

    /// Drive one client connection through the session state machine.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        token: CancellationToken,
    ) -> Result<()> {
        info!("New SMTP connection from {}", peer_addr);

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut session = SmtpSession::new(
            self.store.clone(),
            self.config.hostname.clone(),
            self.config.greeting.clone(),
        );

        // synthetic connect event produces the banner
        if let SmtpReply::Reply(banner) = session.connect() {
            writer.write_all(banner.as_bytes()).await?;
            writer.write_all(b"\r\n").await?;
            writer.flush().await?;
        }

        let mut line = String::new();

        loop {
            line.clear();

            let bytes_read = tokio::select! {
                _ = token.cancelled() => {
                    debug!("SMTP session cancelled for {}", peer_addr);
                    break;
                }
                result = reader.read_line(&mut line) => result?,
            };

            if bytes_read == 0 {
                debug!("SMTP connection closed by client {}", peer_addr);
                break;
            }

            let input = line.trim_end_matches(['\r', '\n']);
            match session.handle_line(input).await {
                SmtpReply::Reply(text) => {
                    writer.write_all(text.as_bytes()).await?;
                    writer.write_all(b"\r\n").await?;
                    writer.flush().await?;
                }
                SmtpReply::NoReply => {}
            }

            if session.is_closed() {
                break;
            }
        }

        info!("SMTP connection closed for {}", peer_addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SmtpServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 1025);
        assert_eq!(config.greeting, "Mailstub");
    }

    #[tokio::test]
    async fn test_set_port_only_while_stopped() {
        let store = Arc::new(mailstub_store::FixedSizeMailStore::new(10));
        let server = Arc::new(SmtpServer::new(
            SmtpServerConfig {
                port: 0,
                ..Default::default()
            },
            store,
        ));

        server.set_port(2525);
        assert_eq!(server.port(), 2525);

        server.set_port(0);
        server.start().await.unwrap();
        assert!(server.is_running());

        server.set_port(4242);
        assert_ne!(server.port(), 4242);

        server.stop();
    }
}
