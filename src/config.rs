//! Configuration loading and validation.

use std::collections::HashMap;
use std::path::Path;

use limelight_proto::Name;
use serde::Deserialize;
use thiserror::Error;

use crate::password::{self, CredentialError};

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("server.listen must name at least one address")]
    NoListeners,

    #[error("bad stored credential for {0}: {1}")]
    BadCredential(String, CredentialError),

    #[error("theater {0} is not a channel name")]
    TheaterNotChannel(String),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and listeners.
    pub server: ServerConfig,
    /// Operator credentials, keyed by operator name.
    #[serde(default)]
    pub oper: HashMap<String, PassBlock>,
    /// Theater credentials, keyed by channel name.
    #[serde(default)]
    pub theater: HashMap<String, PassBlock>,
    /// TLS listeners, keyed by bind address.
    #[serde(default)]
    pub tls: HashMap<String, TlsBlock>,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Advertised server name (e.g. "irc.example.com").
    pub name: String,
    /// Path to the userhost-index database.
    pub database: String,
    /// Plain-TCP bind addresses.
    pub listen: Vec<String>,
    /// Optional WebSocket bind address.
    pub wslisten: Option<String>,
    /// Optional path to the MOTD file.
    pub motd: Option<String>,
    /// Optional server password (stored form).
    pub password: Option<String>,
    /// Seconds of silence before a client is dropped; a PING goes out at
    /// half this.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout: u64,
}

fn default_idle_timeout() -> u64 {
    240
}

/// A credential block: one stored password.
#[derive(Debug, Clone, Deserialize)]
pub struct PassBlock {
    /// Stored form: base64 of a bcrypt digest.
    pub password: String,
}

/// Certificate/key pair for one TLS listener.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsBlock {
    /// PEM certificate chain path.
    pub cert: String,
    /// PEM private key path.
    pub key: String,
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.listen.is_empty() {
            return Err(ConfigError::NoListeners);
        }
        if let Some(encoded) = &self.server.password {
            password::decode_stored(encoded)
                .map_err(|e| ConfigError::BadCredential("server.password".into(), e))?;
        }
        for (name, block) in &self.oper {
            password::decode_stored(&block.password)
                .map_err(|e| ConfigError::BadCredential(format!("oper.{name}"), e))?;
        }
        for (chan, block) in &self.theater {
            if !Name::new(chan.as_str()).is_channel() {
                return Err(ConfigError::TheaterNotChannel(chan.clone()));
            }
            password::decode_stored(&block.password)
                .map_err(|e| ConfigError::BadCredential(format!("theater.{chan}"), e))?;
        }
        Ok(())
    }

    /// Decoded server password, if one is configured.
    pub fn server_password(&self) -> Option<Vec<u8>> {
        self.server
            .password
            .as_deref()
            .and_then(|p| password::decode_stored(p).ok())
    }

    /// Operator credentials keyed by folded name.
    pub fn operators(&self) -> HashMap<String, Vec<u8>> {
        self.oper
            .iter()
            .filter_map(|(name, block)| {
                let digest = password::decode_stored(&block.password).ok()?;
                Some((Name::new(name.as_str()).folded().to_string(), digest))
            })
            .collect()
    }

    /// Theater credentials keyed by folded channel name.
    pub fn theaters(&self) -> HashMap<String, Vec<u8>> {
        self.theater
            .iter()
            .filter_map(|(chan, block)| {
                let digest = password::decode_stored(&block.password).ok()?;
                Some((Name::new(chan.as_str()).folded().to_string(), digest))
            })
            .collect()
    }

    /// MOTD lines, read from the configured file. No file or an unreadable
    /// file yields no MOTD (clients get 422).
    pub fn motd_lines(&self) -> Vec<String> {
        let Some(path) = &self.server.motd else {
            return Vec::new();
        };
        match std::fs::read_to_string(path) {
            Ok(content) => content.lines().map(str::to_string).collect(),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "failed to read MOTD file");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::generate_encoded;

    fn base() -> String {
        r#"
[server]
name = "irc.test"
database = "test.db"
listen = ["127.0.0.1:6667"]
"#
        .to_string()
    }

    #[test]
    fn parses_minimal_config() {
        let config: Config = toml::from_str(&base()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.name, "irc.test");
        assert_eq!(config.server.idle_timeout, 240);
        assert!(config.oper.is_empty());
        assert!(config.server.wslisten.is_none());
    }

    #[test]
    fn rejects_empty_listen() {
        let toml = r#"
[server]
name = "irc.test"
database = "test.db"
listen = []
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoListeners)));
    }

    #[test]
    fn rejects_bad_credential() {
        // "dG9vc2hvcnQ=" decodes to "tooshort", well under digest length.
        let toml = base() + "\n[oper.admin]\npassword = \"dG9vc2hvcnQ=\"\n";
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadCredential(_, _))
        ));
    }

    #[test]
    fn rejects_non_channel_theater() {
        let stored = generate_encoded("secret").unwrap();
        let toml = base() + &format!("\n[theater.notachannel]\npassword = \"{stored}\"\n");
        let config: Config = toml::from_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TheaterNotChannel(_))
        ));
    }

    #[test]
    fn operator_map_is_folded() {
        let stored = generate_encoded("secret").unwrap();
        let toml = base() + &format!("\n[oper.AdMiN]\npassword = \"{stored}\"\n");
        let config: Config = toml::from_str(&toml).unwrap();
        config.validate().unwrap();
        assert!(config.operators().contains_key("admin"));
    }
}
