//! limelightd - a theater-capable IRC daemon.
//!
//! Subcommands: `initdb` creates the userhost-index database, `run` starts
//! the server, `genpasswd <password>` prints the stored credential form.

use anyhow::{anyhow, bail, Context as _};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use limelightd::config::Config;
use limelightd::network::Gateway;
use limelightd::password;
use limelightd::server::{Server, ServerEvent};
use limelightd::state::ClientIndex;

const USAGE: &str = "usage: limelightd [--config <path>] <initdb|run|genpasswd <password>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut config_path = "limelight.toml".to_string();
    let mut command = None;
    let mut command_arg = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = args.next().ok_or_else(|| anyhow!("--config requires a path"))?;
            }
            other if command.is_none() => command = Some(other.to_string()),
            other if command_arg.is_none() => command_arg = Some(other.to_string()),
            other => bail!("unexpected argument {other:?}\n{USAGE}"),
        }
    }

    match command.as_deref() {
        Some("genpasswd") => {
            let plain = command_arg.ok_or_else(|| anyhow!(USAGE))?;
            println!("{}", password::generate_encoded(&plain)?);
            Ok(())
        }
        Some("initdb") => {
            let config = Config::load(&config_path)?;
            ClientIndex::init(&config.server.database)
                .await
                .with_context(|| format!("creating {}", config.server.database))?;
            info!(path = %config.server.database, "lookup index created");
            Ok(())
        }
        Some("run") | None => run(&config_path).await,
        Some(other) => bail!("unknown command {other:?}\n{USAGE}"),
    }
}

async fn run(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading {config_path}"))?;
    info!(server = %config.server.name, "starting limelightd");

    let index = ClientIndex::open(&config.server.database).await.with_context(|| {
        format!(
            "opening database {} (run `limelightd initdb` first)",
            config.server.database
        )
    })?;

    let gateway = Gateway::bind(&config).await?;
    let (events_tx, events_rx) = mpsc::channel(1024);
    gateway.spawn(events_tx.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = events_tx.send(ServerEvent::Shutdown).await;
        }
    });

    Server::new(&config, index).run(events_rx).await;
    Ok(())
}
