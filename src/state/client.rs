//! Per-connection client state.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Instant;

use chrono::{DateTime, Utc};
use limelight_proto::{Message, Name, Prefix};
use tokio::sync::mpsc;

/// Identifies one connection for its whole lifetime.
pub type ClientId = u64;

/// Registration phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Connected, nothing negotiated yet.
    New,
    /// Inside CAP LS .. CAP END.
    CapNegotiating,
    /// Server password accepted, registration incomplete.
    Authenticating,
    /// Fully registered.
    Registered,
    /// QUIT processed or connection lost, teardown in progress.
    Quitting,
    /// Gone; the record is about to be dropped.
    Dead,
}

/// User mode bits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UserModes {
    /// +i - hidden from WHO by non-members.
    pub invisible: bool,
    /// +o - server operator.
    pub operator: bool,
    /// +w - receives WALLOPS.
    pub wallops: bool,
    /// +s - receives server notices.
    pub server_notice: bool,
    /// +r - restricted connection.
    pub restricted: bool,
}

impl UserModes {
    /// Render as a `+...` mode string.
    pub fn to_mode_string(self) -> String {
        let mut s = String::from("+");
        if self.invisible {
            s.push('i');
        }
        if self.operator {
            s.push('o');
        }
        if self.restricted {
            s.push('r');
        }
        if self.server_notice {
            s.push('s');
        }
        if self.wallops {
            s.push('w');
        }
        s
    }
}

/// One connected client. Owned by the server event loop; the connection's
/// reader/writer task pair only ever sees the other end of `outgoing`.
pub struct Client {
    /// Connection id.
    pub id: ClientId,
    /// Registration phase.
    pub phase: Phase,
    /// Nickname, once NICK has been accepted.
    pub nick: Option<Name>,
    /// Username from USER.
    pub username: Option<String>,
    /// Realname from USER.
    pub realname: Option<String>,
    /// Hostname shown in prefixes and masks.
    pub hostname: String,
    /// Peer address.
    pub addr: SocketAddr,
    /// Whether the transport is TLS.
    pub secure: bool,
    /// User modes.
    pub modes: UserModes,
    /// Folded names of joined channels.
    pub channels: HashSet<String>,
    /// Enabled capabilities.
    pub caps: HashSet<String>,
    /// Away message, when set.
    pub away: Option<String>,
    /// Last inbound activity.
    pub last_activity: Instant,
    /// Whether an idle PING is outstanding.
    pub ping_sent: bool,
    /// When registration completed.
    pub registered_at: Option<DateTime<Utc>>,
    /// Whether PASS matched the server password.
    pub authenticated: bool,
    /// Folded channel names this client may narrate in.
    pub theater_grants: HashSet<String>,
    /// Send queue feeding the connection's writer task.
    pub outgoing: mpsc::Sender<Message>,
    /// Set when the client must be disconnected at the next sweep.
    pub doomed: Option<String>,
}

impl Client {
    /// A freshly accepted, unregistered client.
    pub fn new(
        id: ClientId,
        outgoing: mpsc::Sender<Message>,
        addr: SocketAddr,
        secure: bool,
    ) -> Self {
        Client {
            id,
            phase: Phase::New,
            nick: None,
            username: None,
            realname: None,
            hostname: addr.ip().to_string(),
            addr,
            secure,
            modes: UserModes::default(),
            channels: HashSet::new(),
            caps: HashSet::new(),
            away: None,
            last_activity: Instant::now(),
            ping_sent: false,
            registered_at: None,
            authenticated: false,
            theater_grants: HashSet::new(),
            outgoing,
            doomed: None,
        }
    }

    /// The nickname, or `*` before one is set.
    pub fn nick_str(&self) -> &str {
        self.nick.as_ref().map_or("*", Name::as_str)
    }

    /// Whether registration has completed.
    pub fn is_registered(&self) -> bool {
        self.phase == Phase::Registered
    }

    /// `nick!user@host`, once nick and username are known.
    pub fn userhost(&self) -> Option<String> {
        let nick = self.nick.as_ref()?;
        let user = self.username.as_deref()?;
        Some(format!("{}!{}@{}", nick.as_str(), user, self.hostname))
    }

    /// The message prefix for lines this client originates.
    pub fn prefix(&self) -> Option<Prefix> {
        let nick = self.nick.as_ref()?;
        let user = self.username.as_deref()?;
        Some(Prefix::user(nick.as_str(), user, self.hostname.as_str()))
    }

    /// Record inbound activity, clearing any outstanding idle PING.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.ping_sent = false;
    }

    /// Whether registration can complete right now. CAP negotiation blocks
    /// completion until CAP END.
    pub fn ready_to_register(&self, password_required: bool) -> bool {
        matches!(self.phase, Phase::New | Phase::Authenticating)
            && self.nick.is_some()
            && self.username.is_some()
            && (!password_required || self.authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> Client {
        let (tx, _rx) = mpsc::channel(8);
        Client::new(1, tx, "127.0.0.1:50000".parse().unwrap(), false)
    }

    #[test]
    fn userhost_requires_nick_and_user() {
        let mut client = test_client();
        assert_eq!(client.userhost(), None);
        client.nick = Some(Name::new("alice"));
        assert_eq!(client.userhost(), None);
        client.username = Some("ali".into());
        assert_eq!(client.userhost().unwrap(), "alice!ali@127.0.0.1");
    }

    #[test]
    fn registration_readiness() {
        let mut client = test_client();
        assert!(!client.ready_to_register(false));
        client.nick = Some(Name::new("alice"));
        client.username = Some("ali".into());
        assert!(client.ready_to_register(false));
        assert!(!client.ready_to_register(true));
        client.authenticated = true;
        assert!(client.ready_to_register(true));
        client.phase = Phase::CapNegotiating;
        assert!(!client.ready_to_register(false));
    }

    #[test]
    fn mode_string() {
        let mut modes = UserModes::default();
        assert_eq!(modes.to_mode_string(), "+");
        modes.invisible = true;
        modes.operator = true;
        assert_eq!(modes.to_mode_string(), "+io");
    }
}
