//! MODE - channel and user mode changes.
//!
//! Mode strings are sequences of `+`/`-` prefixed flag characters with
//! positional parameters: key, limit, and mask modes take a parameter, and
//! member modes take a nick. A list mode given without a parameter returns
//! the list instead of changing it.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Response};

use super::{Context, Handler};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::state::masks::expand_userhost;

/// MODE - dispatches to channel or user handling by target shape.
pub struct ModeHandler;

#[async_trait]
impl Handler for ModeHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let name = Name::new(target.as_str());
        if name.is_channel() {
            channel_mode(ctx, msg, &name)
        } else {
            user_mode(ctx, msg, &name)
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Dir {
    Add,
    Remove,
}

/// One applied change, kept in order for the broadcast echo.
struct Applied {
    dir: Dir,
    flag: char,
    arg: Option<String>,
}

fn render_applied(applied: &[Applied]) -> (String, Vec<String>) {
    let mut flags = String::new();
    let mut args = Vec::new();
    let mut current: Option<Dir> = None;
    for change in applied {
        if current != Some(change.dir) {
            flags.push(match change.dir {
                Dir::Add => '+',
                Dir::Remove => '-',
            });
            current = Some(change.dir);
        }
        flags.push(change.flag);
        if let Some(arg) = &change.arg {
            args.push(arg.clone());
        }
    }
    (flags, args)
}

fn channel_mode(ctx: &mut Context<'_>, msg: &Message, name: &Name) -> HandlerResult {
    let folded = name.folded().to_string();
    let target = name.as_str().to_string();
    {
        let chan = ctx
            .server
            .channels
            .get(&folded)
            .ok_or_else(|| HandlerError::NoSuchChannel(target.clone()))?;

        // Bare MODE #chan reports the current modes.
        if msg.params.len() < 2 {
            let (flags, params) = chan.modes.to_mode_string(chan.is_member(ctx.id));
            let chan_name = chan.name.as_str().to_string();
            let mut reply = vec![chan_name.as_str(), flags.as_str()];
            reply.extend(params.iter().map(String::as_str));
            ctx.server.numeric(ctx.id, Response::RPL_CHANNELMODEIS, &reply);
            return Ok(());
        }
    }

    let modestring = msg.params[1].clone();
    let mut args = msg.params[2..].iter().cloned();
    let mut dir = Dir::Add;
    let mut applied: Vec<Applied> = Vec::new();
    let nick = ctx.nick();
    let server_name = ctx.server.name.clone();

    // Channel changes need +o; list queries do not.
    let is_op = ctx
        .server
        .channels
        .get(&folded)
        .is_some_and(|c| c.is_operator(ctx.id));
    let require_op = |is_op: bool, target: &str| -> HandlerResult {
        if is_op {
            Ok(())
        } else {
            Err(ChannelError::ChanOpPrivsNeeded.on(target))
        }
    };

    for flag in modestring.chars() {
        match flag {
            '+' => dir = Dir::Add,
            '-' => dir = Dir::Remove,
            'i' | 'm' | 'n' | 's' | 't' => {
                require_op(is_op, &target)?;
                let on = dir == Dir::Add;
                if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                    match flag {
                        'i' => chan.modes.invite_only = on,
                        'm' => chan.modes.moderated = on,
                        'n' => chan.modes.no_outside = on,
                        's' => chan.modes.secret = on,
                        't' => chan.modes.topic_lock = on,
                        _ => unreachable!("gated by the match arm"),
                    }
                }
                applied.push(Applied { dir, flag, arg: None });
            }
            'k' => {
                require_op(is_op, &target)?;
                match dir {
                    Dir::Add => {
                        let key = args.next().ok_or(HandlerError::NeedMoreParams)?;
                        if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                            chan.modes.key = Some(key.clone());
                        }
                        applied.push(Applied { dir, flag, arg: Some(key) });
                    }
                    Dir::Remove => {
                        let arg = args.next().unwrap_or_else(|| "*".to_string());
                        if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                            chan.modes.key = None;
                        }
                        applied.push(Applied { dir, flag, arg: Some(arg) });
                    }
                }
            }
            'l' => match dir {
                Dir::Add => {
                    require_op(is_op, &target)?;
                    let raw = args.next().ok_or(HandlerError::NeedMoreParams)?;
                    let Ok(limit) = raw.parse::<usize>() else {
                        continue;
                    };
                    if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                        chan.modes.limit = Some(limit);
                    }
                    applied.push(Applied { dir, flag, arg: Some(raw) });
                }
                Dir::Remove => {
                    require_op(is_op, &target)?;
                    if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                        chan.modes.limit = None;
                    }
                    applied.push(Applied { dir, flag, arg: None });
                }
            },
            'o' | 'v' => {
                let member_nick = args.next().ok_or(HandlerError::NeedMoreParams)?;
                require_op(is_op, &target)?;
                let member_name = Name::new(member_nick.as_str());
                let Some(member_id) = ctx.server.find_nick(&member_name) else {
                    ctx.server.numeric(
                        ctx.id,
                        Response::ERR_NOSUCHNICK,
                        &[&member_nick, "No such nick/channel"],
                    );
                    continue;
                };
                let Some(chan) = ctx.server.channels.get_mut(&folded) else {
                    continue;
                };
                let Some(modes) = chan.members.get_mut(&member_id) else {
                    let reply = ChannelError::UserNotInChannel(member_nick.clone())
                        .to_reply(&server_name, &nick, &target);
                    ctx.server.send_to(ctx.id, reply);
                    continue;
                };
                let on = dir == Dir::Add;
                match flag {
                    'o' => modes.operator = on,
                    'v' => modes.voice = on,
                    _ => unreachable!("gated by the match arm"),
                }
                applied.push(Applied { dir, flag, arg: Some(member_nick) });
            }
            'b' | 'e' | 'I' => match args.next() {
                None => send_mask_list(ctx, &folded, flag),
                Some(raw) => {
                    require_op(is_op, &target)?;
                    let mask = Name::new(expand_userhost(&raw));
                    if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                        let set = match flag {
                            'b' => &mut chan.bans,
                            'e' => &mut chan.excepts,
                            _ => &mut chan.invite_excepts,
                        };
                        let changed = match dir {
                            Dir::Add => set.add(mask.clone()),
                            Dir::Remove => set.remove(&mask),
                        };
                        if changed {
                            applied.push(Applied {
                                dir,
                                flag,
                                arg: Some(mask.as_str().to_string()),
                            });
                        }
                    }
                }
            },
            other => {
                let reply = ChannelError::UnknownMode(other).to_reply(&server_name, &nick, &target);
                ctx.server.send_to(ctx.id, reply);
            }
        }
    }

    if !applied.is_empty() {
        let (flags, args) = render_applied(&applied);
        let mut params = vec![target.clone(), flags];
        params.extend(args);
        let change = Message::new("MODE", params).with_prefix(ctx.prefix()?);
        ctx.server.broadcast_to_channel(&folded, change, None);
    }
    Ok(())
}

fn send_mask_list(ctx: &mut Context<'_>, folded: &str, flag: char) {
    let (entry, end, end_text) = match flag {
        'b' => (
            Response::RPL_BANLIST,
            Response::RPL_ENDOFBANLIST,
            "End of channel ban list",
        ),
        'e' => (
            Response::RPL_EXCEPTLIST,
            Response::RPL_ENDOFEXCEPTLIST,
            "End of channel exception list",
        ),
        _ => (
            Response::RPL_INVITELIST,
            Response::RPL_ENDOFINVITELIST,
            "End of channel invite list",
        ),
    };
    let Some(chan) = ctx.server.channels.get(folded) else {
        return;
    };
    let chan_name = chan.name.as_str().to_string();
    let set = match flag {
        'b' => &chan.bans,
        'e' => &chan.excepts,
        _ => &chan.invite_excepts,
    };
    let masks: Vec<String> = set.masks().map(|m| m.as_str().to_string()).collect();
    for mask in masks {
        ctx.server.numeric(ctx.id, entry, &[&chan_name, &mask]);
    }
    ctx.server.numeric(ctx.id, end, &[&chan_name, end_text]);
}

fn user_mode(ctx: &mut Context<'_>, msg: &Message, name: &Name) -> HandlerResult {
    let own = ctx
        .client()?
        .nick
        .as_ref()
        .is_some_and(|n| n == name);
    if !own {
        ctx.server.numeric(
            ctx.id,
            Response::ERR_USERSDONTMATCH,
            &["Cannot change mode for other users"],
        );
        return Ok(());
    }

    if msg.params.len() < 2 {
        let modes = ctx.client()?.modes.to_mode_string();
        ctx.server.numeric(ctx.id, Response::RPL_UMODEIS, &[&modes]);
        return Ok(());
    }

    let mut dir = Dir::Add;
    let mut applied: Vec<Applied> = Vec::new();
    for flag in msg.params[1].chars() {
        match flag {
            '+' => dir = Dir::Add,
            '-' => dir = Dir::Remove,
            'i' | 'w' | 's' => {
                let on = dir == Dir::Add;
                let client = ctx.client_mut()?;
                match flag {
                    'i' => client.modes.invisible = on,
                    'w' => client.modes.wallops = on,
                    's' => client.modes.server_notice = on,
                    _ => unreachable!("gated by the match arm"),
                }
                applied.push(Applied { dir, flag, arg: None });
            }
            // Operator status is only ever granted through OPER.
            'o' if dir == Dir::Remove => {
                if ctx.client()?.modes.operator {
                    ctx.client_mut()?.modes.operator = false;
                    applied.push(Applied { dir, flag, arg: None });
                }
            }
            // Restriction can be taken on, never shed.
            'r' if dir == Dir::Add => {
                ctx.client_mut()?.modes.restricted = true;
                applied.push(Applied { dir, flag, arg: None });
            }
            'o' | 'r' => {}
            _ => {
                ctx.server.numeric(
                    ctx.id,
                    Response::ERR_UMODEUNKNOWNFLAG,
                    &["Unknown MODE flag"],
                );
            }
        }
    }

    if !applied.is_empty() {
        let (flags, _) = render_applied(&applied);
        let nick = ctx.nick();
        let change = Message::cmd("MODE", &[&nick, &flags]).with_prefix(ctx.prefix()?);
        ctx.server.send_to(ctx.id, change);
    }
    Ok(())
}
