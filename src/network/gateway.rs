//! The listener set: plain TCP, TLS, and WebSocket accept loops.
//!
//! Binding and TLS configuration happen up front so a bad key pair or an
//! unbindable address aborts startup. Accepted sockets get a connection id
//! and their own [`Connection`] task pair.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use limelight_proto::Transport;
use rustls_pemfile::certs;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig as TlsServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::{error, info, warn};

use super::Connection;
use crate::config::{Config, TlsBlock};
use crate::server::ServerEvent;

/// Fatal listener-setup errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bad TLS key pair for {addr}: {reason}")]
    Tls { addr: String, reason: String },
}

/// The bound listener set.
pub struct Gateway {
    plain: Vec<TcpListener>,
    tls: Vec<(TcpListener, TlsAcceptor)>,
    ws: Option<TcpListener>,
}

impl Gateway {
    /// Bind every configured listener. Any failure here is fatal.
    pub async fn bind(config: &Config) -> Result<Self, GatewayError> {
        let mut plain = Vec::new();
        for addr in &config.server.listen {
            let listener = TcpListener::bind(addr.as_str()).await.map_err(|source| {
                GatewayError::Bind {
                    addr: addr.clone(),
                    source,
                }
            })?;
            info!(%addr, "listening");
            plain.push(listener);
        }

        let mut tls = Vec::new();
        for (addr, block) in &config.tls {
            let acceptor = load_acceptor(addr, block)?;
            let listener = TcpListener::bind(addr.as_str()).await.map_err(|source| {
                GatewayError::Bind {
                    addr: addr.clone(),
                    source,
                }
            })?;
            info!(%addr, "listening (tls)");
            tls.push((listener, acceptor));
        }

        let ws = match &config.server.wslisten {
            Some(addr) => {
                let listener = TcpListener::bind(addr.as_str()).await.map_err(|source| {
                    GatewayError::Bind {
                        addr: addr.clone(),
                        source,
                    }
                })?;
                info!(%addr, "listening (websocket)");
                Some(listener)
            }
            None => None,
        };

        Ok(Gateway { plain, tls, ws })
    }

    /// The actual plain-listener addresses, after ephemeral-port resolution.
    pub fn plain_addrs(&self) -> Vec<SocketAddr> {
        self.plain
            .iter()
            .filter_map(|l| l.local_addr().ok())
            .collect()
    }

    /// The actual WebSocket listener address, if configured.
    pub fn ws_addr(&self) -> Option<SocketAddr> {
        self.ws.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Spawn one accept loop per listener.
    pub fn spawn(self, events: mpsc::Sender<ServerEvent>) {
        let ids = Arc::new(AtomicU64::new(1));
        for listener in self.plain {
            tokio::spawn(accept_plain(listener, events.clone(), Arc::clone(&ids)));
        }
        for (listener, acceptor) in self.tls {
            tokio::spawn(accept_tls(listener, acceptor, events.clone(), Arc::clone(&ids)));
        }
        if let Some(listener) = self.ws {
            tokio::spawn(accept_ws(listener, events.clone(), Arc::clone(&ids)));
        }
    }
}

fn load_acceptor(addr: &str, block: &TlsBlock) -> Result<TlsAcceptor, GatewayError> {
    let tls_err = |reason: String| GatewayError::Tls {
        addr: addr.to_string(),
        reason,
    };

    let cert_data = std::fs::read(&block.cert).map_err(|e| tls_err(e.to_string()))?;
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut Cursor::new(&cert_data))
        .filter_map(|r| r.ok())
        .collect();
    if cert_chain.is_empty() {
        return Err(tls_err("no certificates in cert file".to_string()));
    }

    let key_data = std::fs::read(&block.key).map_err(|e| tls_err(e.to_string()))?;
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut Cursor::new(&key_data))
        .map_err(|e| tls_err(e.to_string()))?
        .ok_or_else(|| tls_err("no private key in key file".to_string()))?;

    let tls_config = TlsServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| tls_err(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

async fn accept_plain(
    listener: TcpListener,
    events: mpsc::Sender<ServerEvent>,
    ids: Arc<AtomicU64>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = ids.fetch_add(1, Ordering::Relaxed);
                let events = events.clone();
                tokio::spawn(async move {
                    Connection::new(id, Transport::tcp(stream), addr, events)
                        .run()
                        .await;
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn accept_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    events: mpsc::Sender<ServerEvent>,
    ids: Arc<AtomicU64>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = ids.fetch_add(1, Ordering::Relaxed);
                let events = events.clone();
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            Connection::new(id, Transport::tls(tls_stream), addr, events)
                                .run()
                                .await;
                        }
                        Err(e) => warn!(%addr, error = %e, "TLS handshake failed"),
                    }
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}

async fn accept_ws(
    listener: TcpListener,
    events: mpsc::Sender<ServerEvent>,
    ids: Arc<AtomicU64>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let id = ids.fetch_add(1, Ordering::Relaxed);
                let events = events.clone();
                tokio::spawn(async move {
                    match tokio_tungstenite::accept_async(stream).await {
                        Ok(ws_stream) => {
                            Connection::new(id, Transport::websocket(ws_stream), addr, events)
                                .run()
                                .await;
                        }
                        Err(e) => warn!(%addr, error = %e, "WebSocket handshake failed"),
                    }
                });
            }
            Err(e) => error!(error = %e, "accept failed"),
        }
    }
}
