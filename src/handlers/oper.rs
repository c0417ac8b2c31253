//! Authentication commands: OPER and THEATER.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Prefix, Response};
use tracing::info;

use super::{Context, Handler};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::password;

/// OPER - claim server operator status.
pub struct OperHandler;

#[async_trait]
impl Handler for OperHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let oper_name = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let supplied = msg.param(1).ok_or(HandlerError::NeedMoreParams)?.to_string();

        let folded = Name::new(oper_name.as_str()).folded().to_string();
        // An unknown name still burns a verification so failures take the
        // same time either way.
        let ok = match ctx.server.operators.get(&folded) {
            Some(digest) => password::verify(digest, &supplied),
            None => {
                password::verify(password::burn_digest(), &supplied);
                false
            }
        };
        if !ok {
            return Err(HandlerError::PasswordMismatch);
        }

        let nick = ctx.nick();
        if let Some(client) = ctx.server.client_mut(ctx.id) {
            client.modes.operator = true;
        }
        info!(nick = %nick, oper = %oper_name, "operator authenticated");
        ctx.server
            .numeric(ctx.id, Response::RPL_YOUREOPER, &["You are now an IRC operator"]);
        let server_name = ctx.server.name.clone();
        let mode = Message::cmd("MODE", &[&nick, "+o"])
            .with_prefix(Prefix::ServerName(server_name));
        ctx.server.send_to(ctx.id, mode);
        Ok(())
    }
}

/// THEATER - authenticate for a theater channel, then send lines under
/// arbitrary nicks there.
///
/// `THEATER IDENTIFY <#chan> <password>` grants narration rights;
/// `THEATER PRIVMSG <#chan> <nick> :<text>` and
/// `THEATER ACTION <#chan> <nick> :<text>` deliver under the spoofed nick.
/// Channel access checks run against the real client, not the spoofed
/// prefix.
pub struct TheaterHandler;

#[async_trait]
impl Handler for TheaterHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let sub = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_ascii_uppercase();
        match sub.as_str() {
            "IDENTIFY" => identify(ctx, msg),
            "PRIVMSG" => narrate(ctx, msg, false),
            "ACTION" => narrate(ctx, msg, true),
            _ => Err(HandlerError::NeedMoreParams),
        }
    }
}

fn identify(ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
    let chan = msg.param(1).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let supplied = msg.param(2).ok_or(HandlerError::NeedMoreParams)?.to_string();

    let name = Name::new(chan.as_str());
    if !name.is_channel() {
        return Err(HandlerError::NoSuchChannel(chan));
    }
    let folded = name.folded().to_string();
    let ok = match ctx.server.theaters.get(&folded) {
        Some(digest) => password::verify(digest, &supplied),
        None => {
            password::verify(password::burn_digest(), &supplied);
            false
        }
    };
    if !ok {
        return Err(HandlerError::PasswordMismatch);
    }

    let nick = ctx.nick();
    if let Some(client) = ctx.server.client_mut(ctx.id) {
        client.theater_grants.insert(folded);
    }
    info!(nick = %nick, theater = %chan, "theater authenticated");
    let server_name = ctx.server.name.clone();
    let notice = Message::cmd("NOTICE", &[&nick, &format!("You are now authorized for {chan}")])
        .with_prefix(Prefix::ServerName(server_name));
    ctx.server.send_to(ctx.id, notice);
    Ok(())
}

fn narrate(ctx: &mut Context<'_>, msg: &Message, action: bool) -> HandlerResult {
    let chan = msg.param(1).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let spoof = msg.param(2).ok_or(HandlerError::NeedMoreParams)?.to_string();
    let text = msg.param(3).ok_or(HandlerError::NeedMoreParams)?.to_string();

    let folded = Name::new(chan.as_str()).folded().to_string();
    if !ctx.client()?.theater_grants.contains(&folded) {
        return Err(HandlerError::PasswordMismatch);
    }
    let chan_record = ctx
        .server
        .channels
        .get(&folded)
        .ok_or_else(|| HandlerError::NoSuchChannel(chan.clone()))?;

    // The spoofed prefix never bypasses access control: bans and send
    // gates apply to the authenticated client.
    let userhost = ctx.client()?.userhost().unwrap_or_default();
    if chan_record.bans.matches(&userhost) && !chan_record.excepts.matches(&userhost) {
        return Err(ChannelError::CannotSendToChan.on(&chan));
    }
    if let Err(e) = chan_record.check_send(Some(ctx.id)) {
        return Err(e.on(&chan));
    }

    let chan_name = chan_record.name.as_str().to_string();
    let body = if action {
        format!("\u{1}ACTION {text}\u{1}")
    } else {
        text
    };
    let server_name = ctx.server.name.clone();
    let relay = Message::cmd("PRIVMSG", &[&chan_name, &body])
        .with_prefix(Prefix::user(spoof, "theater", server_name));
    ctx.server.broadcast_to_channel(&folded, relay, Some(ctx.id));
    Ok(())
}
