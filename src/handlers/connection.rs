//! Connection and registration commands: PASS, CAP, NICK, USER, QUIT,
//! PING, PONG.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Prefix, Response};
use tracing::debug;

use super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::password;
use crate::state::Phase;

/// Capabilities this server offers.
pub const SUPPORTED_CAPS: &[&str] = &["multi-prefix", "userhost-in-names"];

/// PASS - authenticate against the server password.
pub struct PassHandler;

#[async_trait]
impl Handler for PassHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let supplied = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        if ctx.client()?.is_registered() {
            return Err(HandlerError::AlreadyRegistered);
        }
        let Some(digest) = ctx.server.password.clone() else {
            // No server password configured; PASS is a no-op.
            return Ok(());
        };
        if password::verify(&digest, &supplied) {
            let client = ctx.client_mut()?;
            client.authenticated = true;
            if client.phase == Phase::New {
                client.phase = Phase::Authenticating;
            }
            Ok(())
        } else {
            ctx.server
                .numeric(ctx.id, Response::ERR_PASSWDMISMATCH, &["Password incorrect"]);
            Err(HandlerError::Quit("Bad password".to_string()))
        }
    }
}

/// CAP - capability negotiation: LS, LIST, REQ, END.
pub struct CapHandler;

impl CapHandler {
    fn cap_reply(ctx: &Context<'_>, sub: &str, caps: &str) -> Message {
        Message::cmd("CAP", &[&ctx.nick(), sub, caps])
            .with_prefix(Prefix::ServerName(ctx.server.name.clone()))
    }
}

#[async_trait]
impl Handler for CapHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let sub = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_ascii_uppercase();
        let registered = ctx.client()?.is_registered();

        match sub.as_str() {
            "LS" => {
                if !registered {
                    ctx.client_mut()?.phase = Phase::CapNegotiating;
                }
                let reply = Self::cap_reply(ctx, "LS", &SUPPORTED_CAPS.join(" "));
                ctx.server.send_to(ctx.id, reply);
                Ok(())
            }
            "LIST" => {
                let enabled: Vec<String> = ctx.client()?.caps.iter().cloned().collect();
                let reply = Self::cap_reply(ctx, "LIST", &enabled.join(" "));
                ctx.server.send_to(ctx.id, reply);
                Ok(())
            }
            "REQ" => {
                if !registered {
                    ctx.client_mut()?.phase = Phase::CapNegotiating;
                }
                let requested = msg.param(1).unwrap_or("").to_string();
                let wanted: Vec<&str> = requested.split_whitespace().collect();
                let acceptable = wanted
                    .iter()
                    .all(|cap| SUPPORTED_CAPS.contains(&cap.trim_start_matches('-')));
                if acceptable && !wanted.is_empty() {
                    {
                        let client = ctx.client_mut()?;
                        for cap in &wanted {
                            match cap.strip_prefix('-') {
                                Some(removed) => {
                                    client.caps.remove(removed);
                                }
                                None => {
                                    client.caps.insert((*cap).to_string());
                                }
                            }
                        }
                    }
                    let reply = Self::cap_reply(ctx, "ACK", &requested);
                    ctx.server.send_to(ctx.id, reply);
                } else {
                    let reply = Self::cap_reply(ctx, "NAK", &requested);
                    ctx.server.send_to(ctx.id, reply);
                }
                Ok(())
            }
            "END" => {
                if !registered {
                    {
                        let client = ctx.client_mut()?;
                        if client.phase == Phase::CapNegotiating {
                            client.phase = if client.authenticated {
                                Phase::Authenticating
                            } else {
                                Phase::New
                            };
                        }
                    }
                    ctx.server.try_register(ctx.id).await;
                }
                Ok(())
            }
            other => {
                debug!(subcommand = other, "ignoring unknown CAP subcommand");
                Ok(())
            }
        }
    }
}

/// NICK - set or change the nickname.
pub struct NickHandler;

#[async_trait]
impl Handler for NickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let supplied = msg.param(0).ok_or(HandlerError::NoNicknameGiven)?;
        let name = Name::new(supplied);
        if !name.is_nickname() {
            return Err(HandlerError::ErroneousNickname(supplied.to_string()));
        }
        if let Some(holder) = ctx.server.find_nick(&name) {
            if holder != ctx.id {
                return Err(HandlerError::NicknameInUse(supplied.to_string()));
            }
        }

        if ctx.client()?.is_registered() {
            // Rename: update the lookup set, then tell the client and every
            // channel peer under the old prefix.
            let old_prefix = ctx.prefix()?;
            let (old_nick, channels) = {
                let client = ctx.client()?;
                (client.nick.clone(), client.channels.clone())
            };
            let Some(old_nick) = old_nick else {
                return Err(HandlerError::NotRegistered);
            };

            if let Err(e) = ctx.server.lookup.remove(ctx.id, &old_nick).await {
                debug!(error = %e, "lookup remove during rename");
            }
            {
                let client = ctx.client_mut()?;
                client.nick = Some(name.clone());
            }
            let userhost = ctx
                .client()?
                .userhost()
                .ok_or(HandlerError::NotRegistered)?;
            if let Err(e) = ctx.server.lookup.add(ctx.id, &name, &userhost).await {
                debug!(error = %e, "lookup add during rename");
            }

            let change = Message::cmd("NICK", &[name.as_str()]).with_prefix(old_prefix);
            let mut recipients = std::collections::HashSet::new();
            recipients.insert(ctx.id);
            for folded in &channels {
                if let Some(chan) = ctx.server.channels.get(folded) {
                    recipients.extend(chan.members.keys().copied());
                }
            }
            for peer in recipients {
                ctx.server.send_to(peer, change.clone());
            }
            Ok(())
        } else {
            ctx.client_mut()?.nick = Some(name);
            ctx.server.try_register(ctx.id).await;
            Ok(())
        }
    }
}

/// USER - supply username and realname.
pub struct UserHandler;

#[async_trait]
impl Handler for UserHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.params.len() < 4 {
            return Err(HandlerError::NeedMoreParams);
        }
        if ctx.client()?.is_registered() {
            return Err(HandlerError::AlreadyRegistered);
        }
        {
            let client = ctx.client_mut()?;
            client.username = Some(msg.params[0].clone());
            client.realname = Some(msg.params[3].clone());
        }
        ctx.server.try_register(ctx.id).await;
        Ok(())
    }
}

/// QUIT - leave the server.
pub struct QuitHandler;

#[async_trait]
impl Handler for QuitHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let reason = msg.param(0).unwrap_or("Client Quit").to_string();
        Err(HandlerError::Quit(reason))
    }
}

/// PING - keepalive probe from the client.
pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let token = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let server_name = ctx.server.name.clone();
        let pong = Message::cmd("PONG", &[server_name.as_str(), token.as_str()])
            .with_prefix(Prefix::ServerName(server_name.clone()));
        ctx.server.send_to(ctx.id, pong);
        Ok(())
    }
}

/// PONG - reply to our idle PING. Activity bookkeeping happens for every
/// inbound line, so nothing is left to do.
pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    async fn handle(&self, _ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        Ok(())
    }
}
