//! POP3 retrieval server
//!
//! Same accept-loop shape as the SMTP side: one listener, one
//! cancellation token shared with every session, start/stop any number
//! of times.

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

use super::command::Pop3Command;
use super::session::Pop3Session;

/// POP3 server configuration
#[derive(Debug, Clone)]
pub struct Pop3ServerConfig {
    /// Bind address (without port)
    pub bind_address: String,
    /// Listen port
    pub port: u16,
    /// Hostname used in the greeting banner
    pub hostname: String,
    /// Greeting name used in the banner
    pub greeting: String,
}

impl Default for Pop3ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 1110,
            hostname: "localhost".to_string(),
            greeting: "Mailstub".to_string(),
        }
    }
}

/// POP3 server reading from a shared mail store.
pub struct Pop3Server {
    config: Pop3ServerConfig,
    port: AtomicU16,
    store: SharedMailStore,
    stats: Arc<ServerStats>,
    running: AtomicBool,
    shutdown: Mutex<Option<CancellationToken>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Pop3Server {
    /// Create a new server. Nothing is bound until `start`.
    pub fn new(config: Pop3ServerConfig, store: SharedMailStore) -> Self {
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

    /// The store this server serves messages from.
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
            warn!("Attempted to change POP3 port while server is running! Port not changed.");
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
            debug!("POP3 server already running");
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

        info!("POP3 server listening on {}", addr);

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
            info!("POP3 server shutting down");
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
                                error!("POP3 session error from {}: {}", peer_addr, e);
                            }
                            server.stats.connection_closed();
                        });
                    }
                    Err(e) => {
                        error!("POP3 accept error: {}", e);
                    }
                },
            }
        }

        *self.local_addr.lock().unwrap() = None;
        self.running.store(false, Ordering::SeqCst);
        info!("POP3 server stopped");
    }

    /// Drive one client connection through the session state machine.
    async fn handle_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        token: CancellationToken,
    ) -> Result<()> {
        info!("New POP3 connection from {}", peer_addr);

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let mut session = Pop3Session::new(
            self.store.clone(),
            self.config.greeting.clone(),
            self.config.hostname.clone(),
        );

        writer.write_all(session.banner().as_bytes()).await?;
        writer.flush().await?;

        let mut line = String::new();

        loop {
            line.clear();

            let bytes_read = tokio::select! {
                _ = token.cancelled() => {
                    debug!("POP3 session cancelled for {}", peer_addr);
                    break;
                }
                result = reader.read_line(&mut line) => result?,
            };

            if bytes_read == 0 {
                debug!("POP3 connection closed by client {}", peer_addr);
                break;
            }

            let command = Pop3Command::parse(line.trim_end_matches(['\r', '\n']));
            let response = session.handle(command).await;
            writer.write_all(response.as_bytes()).await?;
            writer.flush().await?;

            if session.is_closed() {
                break;
            }
        }

        info!("POP3 connection closed for {}", peer_addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Pop3ServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.port, 1110);
        assert_eq!(config.greeting, "Mailstub");
    }

    #[tokio::test]
    async fn test_set_port_only_while_stopped() {
        let store = Arc::new(mailstub_store::FixedSizeMailStore::new(10));
        let server = Arc::new(Pop3Server::new(
            Pop3ServerConfig {
                port: 0,
                ..Default::default()
            },
            store,
        ));

        server.set_port(9910);
        assert_eq!(server.port(), 9910);

        server.set_port(0);
        server.start().await.unwrap();
        assert!(server.is_running());

        server.set_port(4242);
        assert_ne!(server.port(), 4242);

        server.stop();
    }
}
