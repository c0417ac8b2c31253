//! The server: one event loop owning all shared state.
//!
//! Every piece of mutable shared state (clients, channels, the lookup set)
//! is owned by [`Server::run`]. Connection tasks feed it through a bounded
//! event channel and never touch state directly, which serializes command
//! execution and gives each broadcast target a single consistent ordering.

mod replies;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use limelight_proto::{Message, Name, Prefix, Response};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::HandlerError;
use crate::handlers::{Context, Registry};
use crate::state::{Channel, Client, ClientId, ClientIndex, ClientLookupSet, LookupError, Phase};

/// Server software version string.
pub const VERSION: &str = concat!("limelight-", env!("CARGO_PKG_VERSION"));

/// How long writers get to flush after shutdown begins.
const WRITER_GRACE: Duration = Duration::from_secs(3);

/// Events feeding the server loop.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection finished its transport handshake and is ready.
    Attach {
        /// Connection id, assigned by the gateway.
        id: ClientId,
        /// Send queue feeding the connection's writer task.
        outgoing: mpsc::Sender<Message>,
        /// Peer address.
        addr: SocketAddr,
        /// Whether the transport is TLS.
        secure: bool,
    },
    /// A parsed command from a connection's reader task.
    Command {
        /// Originating connection.
        id: ClientId,
        /// The parsed line.
        message: Message,
    },
    /// A connection's reader saw EOF or a read error.
    Hangup {
        /// The affected connection.
        id: ClientId,
        /// Human-readable cause.
        reason: String,
    },
    /// Stop serving.
    Shutdown,
}

/// The daemon core. Owns all shared state; mutated only from [`Server::run`].
pub struct Server {
    /// Advertised server name.
    pub name: String,
    /// MOTD lines, possibly empty.
    pub motd: Vec<String>,
    /// Operator credentials by folded name.
    pub operators: HashMap<String, Vec<u8>>,
    /// Theater credentials by folded channel name.
    pub theaters: HashMap<String, Vec<u8>>,
    /// Decoded server password, when one is required.
    pub password: Option<Vec<u8>>,
    /// Idle timeout; a PING goes out at half this.
    pub idle_timeout: Duration,
    /// All connected clients.
    pub clients: HashMap<ClientId, Client>,
    /// Channels by folded name.
    pub channels: HashMap<String, Channel>,
    /// Nick map and userhost index.
    pub lookup: ClientLookupSet,
    /// Startup time, reported in RPL_CREATED.
    pub created: DateTime<Utc>,
}

impl Server {
    /// Build a server from a validated config and an opened index.
    pub fn new(config: &Config, index: ClientIndex) -> Self {
        Server {
            name: config.server.name.clone(),
            motd: config.motd_lines(),
            operators: config.operators(),
            theaters: config.theaters(),
            password: config.server_password(),
            idle_timeout: Duration::from_secs(config.server.idle_timeout),
            clients: HashMap::new(),
            channels: HashMap::new(),
            lookup: ClientLookupSet::new(index),
            created: Utc::now(),
        }
    }

    /// Run the event loop until shutdown or until every event sender drops.
    pub async fn run(mut self, mut events: mpsc::Receiver<ServerEvent>) {
        let registry = Registry::new();
        let mut tick = tokio::time::interval(Duration::from_secs(1));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe = events.recv() => {
                    match maybe {
                        Some(ServerEvent::Attach { id, outgoing, addr, secure }) => {
                            self.attach(id, outgoing, addr, secure);
                        }
                        Some(ServerEvent::Command { id, message }) => {
                            self.execute(&registry, id, message).await;
                        }
                        Some(ServerEvent::Hangup { id, reason }) => {
                            self.quit_client(id, &reason).await;
                        }
                        Some(ServerEvent::Shutdown) | None => {
                            self.shutdown().await;
                            return;
                        }
                    }
                }
                _ = tick.tick() => self.check_idle().await,
            }
            self.sweep_doomed().await;
        }
    }

    fn attach(&mut self, id: ClientId, outgoing: mpsc::Sender<Message>, addr: SocketAddr, secure: bool) {
        info!(id, %addr, secure, "client connected");
        self.clients.insert(id, Client::new(id, outgoing, addr, secure));
    }

    async fn execute(&mut self, registry: &Registry, id: ClientId, message: Message) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.touch();
        } else {
            return;
        }
        debug!(id, command = %message.command, "executing");

        let result = {
            let mut ctx = Context {
                server: &mut *self,
                id,
            };
            registry.dispatch(&mut ctx, &message).await
        };
        match result {
            Ok(()) => {}
            Err(HandlerError::Quit(reason)) => self.quit_client(id, &reason).await,
            Err(e) => {
                let nick = self.nick_of(id);
                if let Some(reply) = e.to_reply(&self.name, &nick, &message.command) {
                    self.send_to(id, reply);
                }
            }
        }
    }

    /// Idle sweep: PING at half the timeout, drop at the full timeout.
    async fn check_idle(&mut self) {
        let now = Instant::now();
        let half = self.idle_timeout / 2;
        let mut to_ping = Vec::new();
        let mut timed_out = Vec::new();
        for (&id, client) in &self.clients {
            let idle = now.duration_since(client.last_activity);
            if idle >= self.idle_timeout {
                timed_out.push(id);
            } else if idle >= half && !client.ping_sent {
                to_ping.push(id);
            }
        }
        for id in to_ping {
            let ping = Message::cmd("PING", &[self.name.as_str()]);
            self.send_to(id, ping);
            if let Some(client) = self.clients.get_mut(&id) {
                client.ping_sent = true;
            }
        }
        for id in timed_out {
            self.quit_client(id, "Ping timeout").await;
        }
    }

    /// Disconnect clients marked during this iteration (send-queue overflow
    /// or writer loss). Marking instead of disconnecting inline keeps
    /// enqueue non-blocking for handlers mid-broadcast.
    async fn sweep_doomed(&mut self) {
        loop {
            let next = self
                .clients
                .iter()
                .find_map(|(&id, c)| c.doomed.clone().map(|reason| (id, reason)));
            match next {
                Some((id, reason)) => self.quit_client(id, &reason).await,
                None => break,
            }
        }
    }

    async fn shutdown(&mut self) {
        info!("server shutting down");
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            self.quit_client(id, "Server shutting down").await;
        }
        tokio::time::sleep(WRITER_GRACE).await;
    }

    /// Enqueue a message for one client. Never blocks: a full queue marks
    /// the client for disconnection at the next sweep.
    pub fn send_to(&mut self, id: ClientId, msg: Message) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        if client.doomed.is_some() || matches!(client.phase, Phase::Dead) {
            return;
        }
        match client.outgoing.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(id, "send queue overflow");
                client.doomed = Some("Send queue exceeded".to_string());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                client.doomed = Some("Connection closed".to_string());
            }
        }
    }

    /// Send a numeric reply, prefixed with the server name and the client's
    /// nick (or `*`).
    pub fn numeric(&mut self, id: ClientId, response: Response, params: &[&str]) {
        let mut all = vec![self.nick_of(id)];
        all.extend(params.iter().map(|s| s.to_string()));
        let msg = Message::new(response.token(), all)
            .with_prefix(Prefix::ServerName(self.name.clone()));
        self.send_to(id, msg);
    }

    /// Send a message to every member of a channel, optionally skipping one.
    pub fn broadcast_to_channel(&mut self, folded: &str, msg: Message, skip: Option<ClientId>) {
        let Some(chan) = self.channels.get(folded) else {
            return;
        };
        let members: Vec<ClientId> = chan
            .members
            .keys()
            .copied()
            .filter(|&m| Some(m) != skip)
            .collect();
        for member in members {
            self.send_to(member, msg.clone());
        }
    }

    /// The client's nick for reply purposes; `*` before registration.
    pub fn nick_of(&self, id: ClientId) -> String {
        self.clients
            .get(&id)
            .map_or_else(|| "*".to_string(), |c| c.nick_str().to_string())
    }

    /// Immutable client access.
    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    /// Mutable client access.
    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    /// Remove a membership link from both sides, destroying the channel if
    /// it empties.
    pub fn detach_member(&mut self, id: ClientId, folded: &str) {
        if let Some(client) = self.clients.get_mut(&id) {
            client.channels.remove(folded);
        }
        let destroy = match self.channels.get_mut(folded) {
            Some(chan) => {
                chan.members.remove(&id);
                chan.invited.remove(&id);
                chan.members.is_empty()
            }
            None => false,
        };
        if destroy {
            debug!(channel = folded, "destroying empty channel");
            self.channels.remove(folded);
        }
    }

    /// Complete registration if every requirement is satisfied: NICK, USER,
    /// a finished CAP negotiation, and the server password when configured.
    pub async fn try_register(&mut self, id: ClientId) {
        let password_required = self.password.is_some();
        let Some(client) = self.clients.get(&id) else {
            return;
        };
        if client.is_registered() {
            return;
        }

        // NICK and USER are in but PASS never matched: reject and drop.
        if matches!(client.phase, Phase::New | Phase::Authenticating)
            && client.nick.is_some()
            && client.username.is_some()
            && password_required
            && !client.authenticated
        {
            self.numeric(id, Response::ERR_PASSWDMISMATCH, &["Password incorrect"]);
            self.quit_client(id, "Bad password").await;
            return;
        }

        if !client.ready_to_register(password_required) {
            return;
        }
        let Some(nick) = client.nick.clone() else {
            return;
        };
        let Some(userhost) = client.userhost() else {
            return;
        };

        match self.lookup.add(id, &nick, &userhost).await {
            Ok(()) => {}
            Err(LookupError::NicknameInUse) => {
                let taken = nick.as_str().to_string();
                if let Some(client) = self.clients.get_mut(&id) {
                    client.nick = None;
                }
                self.numeric(
                    id,
                    Response::ERR_NICKNAMEINUSE,
                    &[&taken, "Nickname is already in use"],
                );
                return;
            }
            Err(e) => {
                warn!(id, error = %e, "lookup add failed");
                return;
            }
        }

        if let Some(client) = self.clients.get_mut(&id) {
            client.phase = Phase::Registered;
            client.registered_at = Some(Utc::now());
        }
        info!(id, nick = %nick, "client registered");
        self.send_welcome_burst(id);
    }

    /// Tear a client down: detach from channels, broadcast QUIT, drop the
    /// lookup entries, send a final ERROR line, and release the record.
    /// Dropping the record closes the send queue, which lets the writer
    /// drain and close the socket.
    pub async fn quit_client(&mut self, id: ClientId, reason: &str) {
        let Some(client) = self.clients.get_mut(&id) else {
            return;
        };
        if matches!(client.phase, Phase::Quitting | Phase::Dead) {
            return;
        }
        client.phase = Phase::Quitting;
        let prefix = client.prefix();
        let registered = client.registered_at.is_some();
        let nick = client.nick.clone();
        let joined: Vec<String> = client.channels.drain().collect();

        let mut peers: HashSet<ClientId> = HashSet::new();
        for folded in &joined {
            if let Some(chan) = self.channels.get_mut(folded) {
                chan.members.remove(&id);
                chan.invited.remove(&id);
                peers.extend(chan.members.keys().copied());
            }
        }
        self.channels.retain(|_, c| !c.members.is_empty());

        if let Some(prefix) = prefix {
            let quit = Message::cmd("QUIT", &[reason]).with_prefix(prefix);
            for peer in peers {
                self.send_to(peer, quit.clone());
            }
        }

        if registered {
            if let Some(nick) = &nick {
                if let Err(e) = self.lookup.remove(id, nick).await {
                    warn!(id, nick = %nick.as_str(), error = %e, "lookup remove failed");
                }
            }
        }

        self.send_to(id, Message::cmd("ERROR", &[reason]));
        if let Some(mut client) = self.clients.remove(&id) {
            client.phase = Phase::Dead;
            info!(id, %reason, "client disconnected");
        }
    }

    /// Whether the given nick resolves to a registered client.
    pub fn find_nick(&self, nick: &Name) -> Option<ClientId> {
        self.lookup.get(nick)
    }
}
