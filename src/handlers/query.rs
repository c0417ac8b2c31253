//! Presence and informational queries: AWAY, WHO, WHOIS, ISON, MOTD,
//! LUSERS, VERSION, TIME.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Response};

use super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::server::VERSION;

/// AWAY - set or clear the away message.
pub struct AwayHandler;

#[async_trait]
impl Handler for AwayHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        match msg.param(0).filter(|t| !t.is_empty()) {
            Some(text) => {
                let text = text.to_string();
                ctx.client_mut()?.away = Some(text);
                ctx.server.numeric(
                    ctx.id,
                    Response::RPL_NOWAWAY,
                    &["You have been marked as being away"],
                );
            }
            None => {
                ctx.client_mut()?.away = None;
                ctx.server.numeric(
                    ctx.id,
                    Response::RPL_UNAWAY,
                    &["You are no longer marked as being away"],
                );
            }
        }
        Ok(())
    }
}

/// WHO - list clients by channel or by userhost mask.
pub struct WhoHandler;

struct WhoEntry {
    channel: String,
    user: String,
    host: String,
    nick: String,
    flags: String,
    realname: String,
}

impl WhoHandler {
    fn entry(ctx: &Context<'_>, peer: crate::state::ClientId, channel: &str) -> Option<WhoEntry> {
        let client = ctx.server.client(peer)?;
        let mut flags = String::from(if client.away.is_some() { "G" } else { "H" });
        if client.modes.operator {
            flags.push('*');
        }
        if let Some(chan) = ctx
            .server
            .channels
            .get(Name::new(channel).folded())
        {
            if let Some(modes) = chan.members.get(&peer) {
                if let Some(prefix) = modes.prefix_char() {
                    flags.push(prefix);
                }
            }
        }
        Some(WhoEntry {
            channel: channel.to_string(),
            user: client.username.clone()?,
            host: client.hostname.clone(),
            nick: client.nick_str().to_string(),
            flags,
            realname: client.realname.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Handler for WhoHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let mask = match msg.param(0) {
            None | Some("0") => "*".to_string(),
            Some(m) => m.to_string(),
        };
        let name = Name::new(mask.as_str());

        let mut entries = Vec::new();
        if name.is_channel() {
            if let Some(chan) = ctx.server.channels.get(name.folded()) {
                if chan.is_member(ctx.id) || !chan.modes.secret {
                    let chan_name = chan.name.as_str().to_string();
                    let members: Vec<_> = chan.members.keys().copied().collect();
                    for peer in members {
                        if let Some(entry) = Self::entry(ctx, peer, &chan_name) {
                            entries.push(entry);
                        }
                    }
                }
            }
        } else {
            for peer in ctx.server.lookup.find_all(&mask).await {
                if let Some(entry) = Self::entry(ctx, peer, "*") {
                    entries.push(entry);
                }
            }
        }

        let server_name = ctx.server.name.clone();
        for e in entries {
            ctx.server.numeric(
                ctx.id,
                Response::RPL_WHOREPLY,
                &[
                    &e.channel,
                    &e.user,
                    &e.host,
                    &server_name,
                    &e.nick,
                    &e.flags,
                    &format!("0 {}", e.realname),
                ],
            );
        }
        ctx.server
            .numeric(ctx.id, Response::RPL_ENDOFWHO, &[&mask, "End of WHO list"]);
        Ok(())
    }
}

/// WHOIS - detailed information on a nickname.
pub struct WhoisHandler;

#[async_trait]
impl Handler for WhoisHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let targets = msg.param(0).ok_or(HandlerError::NoNicknameGiven)?.to_string();
        let server_name = ctx.server.name.clone();

        for target in targets.split(',') {
            let Some(peer_id) = ctx.server.find_nick(&Name::new(target)) else {
                ctx.server.numeric(
                    ctx.id,
                    Response::ERR_NOSUCHNICK,
                    &[target, "No such nick/channel"],
                );
                continue;
            };

            struct Info {
                nick: String,
                user: String,
                host: String,
                realname: String,
                oper: bool,
                away: Option<String>,
                idle: u64,
                signon: i64,
                channels: Vec<String>,
            }
            let Some(info) = ctx.server.client(peer_id).map(|peer| Info {
                nick: peer.nick_str().to_string(),
                user: peer.username.clone().unwrap_or_default(),
                host: peer.hostname.clone(),
                realname: peer.realname.clone().unwrap_or_default(),
                oper: peer.modes.operator,
                away: peer.away.clone(),
                idle: peer.last_activity.elapsed().as_secs(),
                signon: peer.registered_at.map_or(0, |t| t.timestamp()),
                channels: peer.channels.iter().cloned().collect(),
            }) else {
                continue;
            };

            ctx.server.numeric(
                ctx.id,
                Response::RPL_WHOISUSER,
                &[&info.nick, &info.user, &info.host, "*", &info.realname],
            );

            let mut visible = Vec::new();
            for folded in &info.channels {
                if let Some(chan) = ctx.server.channels.get(folded) {
                    if chan.modes.secret && !chan.is_member(ctx.id) {
                        continue;
                    }
                    let mut entry = chan
                        .members
                        .get(&peer_id)
                        .and_then(|m| m.prefix_char())
                        .map(String::from)
                        .unwrap_or_default();
                    entry.push_str(chan.name.as_str());
                    visible.push(entry);
                }
            }
            if !visible.is_empty() {
                ctx.server.numeric(
                    ctx.id,
                    Response::RPL_WHOISCHANNELS,
                    &[&info.nick, &visible.join(" ")],
                );
            }
            ctx.server.numeric(
                ctx.id,
                Response::RPL_WHOISSERVER,
                &[&info.nick, &server_name, "limelight"],
            );
            if info.oper {
                ctx.server.numeric(
                    ctx.id,
                    Response::RPL_WHOISOPERATOR,
                    &[&info.nick, "is an IRC operator"],
                );
            }
            if let Some(away) = &info.away {
                ctx.server
                    .numeric(ctx.id, Response::RPL_AWAY, &[&info.nick, away]);
            }
            ctx.server.numeric(
                ctx.id,
                Response::RPL_WHOISIDLE,
                &[
                    &info.nick,
                    &info.idle.to_string(),
                    &info.signon.to_string(),
                    "seconds idle, signon time",
                ],
            );
            ctx.server.numeric(
                ctx.id,
                Response::RPL_ENDOFWHOIS,
                &[&info.nick, "End of WHOIS list"],
            );
        }
        Ok(())
    }
}

/// ISON - which of these nicks are online.
pub struct IsonHandler;

#[async_trait]
impl Handler for IsonHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        if msg.params.is_empty() {
            return Err(HandlerError::NeedMoreParams);
        }
        let mut present = Vec::new();
        for nick in msg.params.iter().flat_map(|p| p.split_whitespace()) {
            if let Some(peer) = ctx.server.find_nick(&Name::new(nick)) {
                if let Some(client) = ctx.server.client(peer) {
                    present.push(client.nick_str().to_string());
                }
            }
        }
        ctx.server
            .numeric(ctx.id, Response::RPL_ISON, &[&present.join(" ")]);
        Ok(())
    }
}

/// MOTD - replay the message of the day.
pub struct MotdHandler;

#[async_trait]
impl Handler for MotdHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        ctx.server.send_motd(ctx.id);
        Ok(())
    }
}

/// LUSERS - user and channel counts.
pub struct LusersHandler;

#[async_trait]
impl Handler for LusersHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        ctx.server.send_lusers(ctx.id);
        Ok(())
    }
}

/// VERSION - server software version.
pub struct VersionHandler;

#[async_trait]
impl Handler for VersionHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let server_name = ctx.server.name.clone();
        ctx.server
            .numeric(ctx.id, Response::RPL_VERSION, &[VERSION, &server_name]);
        Ok(())
    }
}

/// TIME - server local time.
pub struct TimeHandler;

#[async_trait]
impl Handler for TimeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, _msg: &Message) -> HandlerResult {
        let server_name = ctx.server.name.clone();
        let now = chrono::Utc::now().to_rfc2822();
        ctx.server
            .numeric(ctx.id, Response::RPL_TIME, &[&server_name, &now]);
        Ok(())
    }
}
