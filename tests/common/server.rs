//! Test server management.
//!
//! Spawns an in-process limelightd on an ephemeral port, with its config
//! and index database in a temporary directory.

#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::sync::mpsc;

use limelightd::config::Config;
use limelightd::network::Gateway;
use limelightd::server::{Server, ServerEvent};
use limelightd::state::ClientIndex;

/// A running test server.
pub struct TestServer {
    addr: SocketAddr,
    ws_addr: Option<SocketAddr>,
    events: mpsc::Sender<ServerEvent>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    /// Spawn with the default test configuration.
    pub async fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with("", "").await
    }

    /// Spawn with extra lines in the `[server]` section and extra TOML
    /// sections appended after it.
    pub async fn spawn_with(server_extra: &str, sections: &str) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("index.db");
        let config_path = dir.path().join("limelight.toml");

        let content = format!(
            r#"
[server]
name = "irc.test"
database = "{}"
listen = ["127.0.0.1:0"]
{server_extra}

{sections}
"#,
            db_path.display()
        );
        std::fs::write(&config_path, content)?;

        let config = Config::load(&config_path)?;
        ClientIndex::init(&config.server.database).await?;
        let index = ClientIndex::open(&config.server.database).await?;

        let gateway = Gateway::bind(&config).await?;
        let addr = gateway
            .plain_addrs()
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no bound listener"))?;
        let ws_addr = gateway.ws_addr();

        let (events_tx, events_rx) = mpsc::channel(1024);
        gateway.spawn(events_tx.clone());
        tokio::spawn(Server::new(&config, index).run(events_rx));

        Ok(TestServer {
            addr,
            ws_addr,
            events: events_tx,
            _dir: dir,
        })
    }

    /// The plain listener address.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// The WebSocket listener address, when configured.
    pub fn ws_address(&self) -> Option<String> {
        self.ws_addr.map(|a| a.to_string())
    }

    /// Connect and register a client in one step.
    pub async fn client(&self, nick: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = super::client::TestClient::connect(&self.address(), nick).await?;
        client.register().await?;
        client.drain().await;
        Ok(client)
    }
}
