//! Command handlers and dispatch.
//!
//! The [`Registry`] maps uppercase command names to handler objects. Every
//! handler runs on the server event loop and may freely mutate shared state
//! through [`Context::server`]; replies are enqueued, never awaited.

mod channel;
mod connection;
mod messaging;
mod mode;
mod oper;
mod query;

pub use channel::{InviteHandler, JoinHandler, KickHandler, ListHandler, NamesHandler, PartHandler, TopicHandler};
pub use connection::{CapHandler, NickHandler, PassHandler, PingHandler, PongHandler, QuitHandler, UserHandler};
pub use messaging::{NoticeHandler, PrivmsgHandler};
pub use mode::ModeHandler;
pub use oper::{OperHandler, TheaterHandler};
pub use query::{AwayHandler, IsonHandler, LusersHandler, MotdHandler, TimeHandler, VersionHandler, WhoHandler, WhoisHandler};

use std::collections::HashMap;

use async_trait::async_trait;
use limelight_proto::{Message, Prefix};

use crate::error::{HandlerError, HandlerResult};
use crate::server::Server;
use crate::state::{Client, ClientId};

/// Commands legal before registration completes. Everything else gets 451.
const PRE_REGISTRATION: &[&str] = &["PASS", "CAP", "NICK", "USER", "QUIT", "PING", "PONG"];

/// Handler context: the server state and the originating client.
pub struct Context<'a> {
    /// All shared state; handlers run on the event loop and own it for the
    /// duration of the call.
    pub server: &'a mut Server,
    /// The client the command came from.
    pub id: ClientId,
}

impl Context<'_> {
    /// The originating client.
    pub fn client(&self) -> Result<&Client, HandlerError> {
        self.server.client(self.id).ok_or(HandlerError::NotRegistered)
    }

    /// The originating client, mutably.
    pub fn client_mut(&mut self) -> Result<&mut Client, HandlerError> {
        self.server
            .client_mut(self.id)
            .ok_or(HandlerError::NotRegistered)
    }

    /// The client's nick, or `*`.
    pub fn nick(&self) -> String {
        self.server.nick_of(self.id)
    }

    /// The client's `nick!user@host` message prefix. Only present once
    /// registered.
    pub fn prefix(&self) -> Result<Prefix, HandlerError> {
        self.client()?.prefix().ok_or(HandlerError::NotRegistered)
    }
}

/// Trait implemented by all command handlers.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Execute one command for one client.
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;
}

/// Registry of command handlers, keyed by uppercase command name.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    /// A registry with the full command set.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        // Connection and registration
        handlers.insert("PASS", Box::new(PassHandler));
        handlers.insert("CAP", Box::new(CapHandler));
        handlers.insert("NICK", Box::new(NickHandler));
        handlers.insert("USER", Box::new(UserHandler));
        handlers.insert("QUIT", Box::new(QuitHandler));
        handlers.insert("PING", Box::new(PingHandler));
        handlers.insert("PONG", Box::new(PongHandler));

        // Channels
        handlers.insert("JOIN", Box::new(JoinHandler));
        handlers.insert("PART", Box::new(PartHandler));
        handlers.insert("KICK", Box::new(KickHandler));
        handlers.insert("TOPIC", Box::new(TopicHandler));
        handlers.insert("NAMES", Box::new(NamesHandler));
        handlers.insert("LIST", Box::new(ListHandler));
        handlers.insert("INVITE", Box::new(InviteHandler));
        handlers.insert("MODE", Box::new(ModeHandler));

        // Messaging
        handlers.insert("PRIVMSG", Box::new(PrivmsgHandler));
        handlers.insert("NOTICE", Box::new(NoticeHandler));

        // Presence and queries
        handlers.insert("AWAY", Box::new(AwayHandler));
        handlers.insert("WHO", Box::new(WhoHandler));
        handlers.insert("WHOIS", Box::new(WhoisHandler));
        handlers.insert("ISON", Box::new(IsonHandler));
        handlers.insert("MOTD", Box::new(MotdHandler));
        handlers.insert("LUSERS", Box::new(LusersHandler));
        handlers.insert("VERSION", Box::new(VersionHandler));
        handlers.insert("TIME", Box::new(TimeHandler));

        // Authentication
        handlers.insert("OPER", Box::new(OperHandler));
        handlers.insert("THEATER", Box::new(TheaterHandler));

        Self { handlers }
    }

    /// Dispatch one message, enforcing the registration gate.
    pub async fn dispatch(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let cmd = msg.command.as_str();
        let registered = ctx
            .server
            .client(ctx.id)
            .is_some_and(Client::is_registered);

        if !registered && !PRE_REGISTRATION.contains(&cmd) {
            return Err(HandlerError::NotRegistered);
        }
        match self.handlers.get(cmd) {
            Some(handler) => handler.handle(ctx, msg).await,
            None => Err(HandlerError::UnknownCommand(cmd.to_string())),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
