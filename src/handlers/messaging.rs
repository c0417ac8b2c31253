//! PRIVMSG and NOTICE.
//!
//! Targets may be nicknames, channels, or (for operators) userhost masks.
//! NOTICE follows the same routing but never generates automatic replies,
//! error numerics included.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Response};

use super::{Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use crate::state::masks::has_wildcards;

/// PRIVMSG - deliver a message.
pub struct PrivmsgHandler;

#[async_trait]
impl Handler for PrivmsgHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        send_message(ctx, msg, false).await
    }
}

/// NOTICE - deliver a notice.
pub struct NoticeHandler;

#[async_trait]
impl Handler for NoticeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        send_message(ctx, msg, true).await
    }
}

async fn send_message(ctx: &mut Context<'_>, msg: &Message, notice: bool) -> HandlerResult {
    let Some(targets) = msg.param(0).map(str::to_string) else {
        return if notice { Ok(()) } else { Err(HandlerError::NeedMoreParams) };
    };
    let Some(text) = msg.param(1).filter(|t| !t.is_empty()).map(str::to_string) else {
        return if notice { Ok(()) } else { Err(HandlerError::NeedMoreParams) };
    };

    let command = if notice { "NOTICE" } else { "PRIVMSG" };
    let prefix = ctx.prefix()?;
    let nick = ctx.nick();
    let server_name = ctx.server.name.clone();

    for target in targets.split(',') {
        let name = Name::new(target);
        let relay = Message::cmd(command, &[target, &text]).with_prefix(prefix.clone());

        if name.is_channel() {
            let folded = name.folded().to_string();
            let Some(chan) = ctx.server.channels.get(&folded) else {
                if !notice {
                    ctx.server.numeric(
                        ctx.id,
                        Response::ERR_NOSUCHCHANNEL,
                        &[target, "No such channel"],
                    );
                }
                continue;
            };
            if let Err(e) = chan.check_send(Some(ctx.id)) {
                if !notice {
                    let reply = e.to_reply(&server_name, &nick, target);
                    ctx.server.send_to(ctx.id, reply);
                }
                continue;
            }
            ctx.server.broadcast_to_channel(&folded, relay, Some(ctx.id));
        } else if has_wildcards(target) {
            // Mask delivery is an operator facility.
            if !ctx.client()?.modes.operator {
                if !notice {
                    return Err(HandlerError::NoPrivileges);
                }
                continue;
            }
            let matches = ctx.server.lookup.find_all(target).await;
            for peer in matches {
                if peer != ctx.id {
                    ctx.server.send_to(peer, relay.clone());
                }
            }
        } else {
            let Some(peer) = ctx.server.find_nick(&name) else {
                if !notice {
                    ctx.server.numeric(
                        ctx.id,
                        Response::ERR_NOSUCHNICK,
                        &[target, "No such nick/channel"],
                    );
                }
                continue;
            };
            ctx.server.send_to(peer, relay);
            if !notice {
                let away = ctx.server.client(peer).and_then(|c| c.away.clone());
                if let Some(away) = away {
                    ctx.server.numeric(ctx.id, Response::RPL_AWAY, &[target, &away]);
                }
            }
        }
    }
    Ok(())
}
