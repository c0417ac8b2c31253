//! Channel commands: JOIN, PART, KICK, TOPIC, NAMES, LIST, INVITE.

use async_trait::async_trait;
use limelight_proto::{Message, Name, Response};

use super::{Context, Handler};
use crate::error::{ChannelError, HandlerError, HandlerResult};
use crate::state::{Channel, MemberModes, Topic};

/// JOIN - enter channels, creating them as needed.
pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let targets = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();

        // JOIN 0 parts everything.
        if targets == "0" {
            let joined: Vec<String> = ctx.client()?.channels.iter().cloned().collect();
            let prefix = ctx.prefix()?;
            for folded in joined {
                let chan_name = match ctx.server.channels.get(&folded) {
                    Some(chan) => chan.name.as_str().to_string(),
                    None => continue,
                };
                let part = Message::cmd("PART", &[&chan_name]).with_prefix(prefix.clone());
                ctx.server.broadcast_to_channel(&folded, part, None);
                ctx.server.detach_member(ctx.id, &folded);
            }
            return Ok(());
        }

        let keys: Vec<String> = msg
            .param(1)
            .map(|k| k.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        let prefix = ctx.prefix()?;
        let userhost = ctx
            .client()?
            .userhost()
            .ok_or(HandlerError::NotRegistered)?;
        let nick = ctx.nick();

        for (i, target) in targets.split(',').enumerate() {
            let name = Name::new(target);
            if !name.is_channel() {
                ctx.server
                    .numeric(ctx.id, Response::ERR_NOSUCHCHANNEL, &[target, "No such channel"]);
                continue;
            }
            let folded = name.folded().to_string();

            let creating = !ctx.server.channels.contains_key(&folded);
            if !creating {
                let chan = match ctx.server.channels.get(&folded) {
                    Some(chan) => chan,
                    None => continue,
                };
                if chan.is_member(ctx.id) {
                    continue;
                }
                if let Err(e) = chan.check_join(ctx.id, &userhost, keys.get(i).map(String::as_str)) {
                    let reply = e.to_reply(&ctx.server.name, &nick, name.as_str());
                    ctx.server.send_to(ctx.id, reply);
                    continue;
                }
            }

            let chan = ctx
                .server
                .channels
                .entry(folded.clone())
                .or_insert_with(|| Channel::new(name.clone()));
            chan.members.insert(
                ctx.id,
                MemberModes {
                    operator: creating,
                    voice: false,
                },
            );
            chan.invited.remove(&ctx.id);
            if let Some(client) = ctx.server.client_mut(ctx.id) {
                client.channels.insert(folded.clone());
            }

            let join = Message::cmd("JOIN", &[name.as_str()]).with_prefix(prefix.clone());
            ctx.server.broadcast_to_channel(&folded, join, None);
            ctx.server.send_topic_reply(ctx.id, &folded);
            ctx.server.send_names(ctx.id, &folded);
        }
        Ok(())
    }
}

/// PART - leave channels.
pub struct PartHandler;

#[async_trait]
impl Handler for PartHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let targets = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let reason = msg.param(1).map(str::to_string);
        let prefix = ctx.prefix()?;
        let nick = ctx.nick();

        for target in targets.split(',') {
            let name = Name::new(target);
            let folded = name.folded().to_string();
            match ctx.server.channels.get(&folded) {
                None => {
                    ctx.server.numeric(
                        ctx.id,
                        Response::ERR_NOSUCHCHANNEL,
                        &[target, "No such channel"],
                    );
                    continue;
                }
                Some(chan) if !chan.is_member(ctx.id) => {
                    let reply = ChannelError::NotOnChannel.to_reply(&ctx.server.name, &nick, target);
                    ctx.server.send_to(ctx.id, reply);
                    continue;
                }
                Some(chan) => {
                    let chan_name = chan.name.as_str().to_string();
                    let mut params = vec![chan_name];
                    if let Some(reason) = &reason {
                        params.push(reason.clone());
                    }
                    let part = Message::new("PART", params).with_prefix(prefix.clone());
                    ctx.server.broadcast_to_channel(&folded, part, None);
                    ctx.server.detach_member(ctx.id, &folded);
                }
            }
        }
        Ok(())
    }
}

/// KICK - eject a member. Requires channel operator.
pub struct KickHandler;

#[async_trait]
impl Handler for KickHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let victim = msg.param(1).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let reason = msg.param(2).map_or_else(|| ctx.nick(), str::to_string);

        let name = Name::new(target.as_str());
        let folded = name.folded().to_string();
        let chan = ctx
            .server
            .channels
            .get(&folded)
            .ok_or_else(|| HandlerError::NoSuchChannel(target.clone()))?;
        if !chan.is_member(ctx.id) {
            return Err(ChannelError::NotOnChannel.on(&target));
        }
        if !chan.is_operator(ctx.id) {
            return Err(ChannelError::ChanOpPrivsNeeded.on(&target));
        }
        let victim_name = Name::new(victim.as_str());
        let victim_id = ctx
            .server
            .find_nick(&victim_name)
            .ok_or_else(|| HandlerError::NoSuchNick(victim.clone()))?;
        if !ctx
            .server
            .channels
            .get(&folded)
            .is_some_and(|c| c.is_member(victim_id))
        {
            return Err(ChannelError::UserNotInChannel(victim.clone()).on(&target));
        }

        let chan_name = ctx
            .server
            .channels
            .get(&folded)
            .map(|c| c.name.as_str().to_string())
            .unwrap_or(target);
        let kick = Message::cmd("KICK", &[&chan_name, &victim, &reason]).with_prefix(ctx.prefix()?);
        ctx.server.broadcast_to_channel(&folded, kick, None);
        ctx.server.detach_member(victim_id, &folded);
        Ok(())
    }
}

/// TOPIC - read or set the topic.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let target = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let name = Name::new(target.as_str());
        let folded = name.folded().to_string();
        let chan = ctx
            .server
            .channels
            .get(&folded)
            .ok_or_else(|| HandlerError::NoSuchChannel(target.clone()))?;
        let member = chan.is_member(ctx.id);

        match msg.param(1) {
            None => {
                // Reading is open unless the channel hides itself.
                if !member && chan.modes.secret {
                    return Err(ChannelError::NotOnChannel.on(&target));
                }
                ctx.server.send_topic_reply(ctx.id, &folded);
                Ok(())
            }
            Some(text) => {
                if !member {
                    return Err(ChannelError::NotOnChannel.on(&target));
                }
                if chan.modes.topic_lock && !chan.is_operator(ctx.id) {
                    return Err(ChannelError::ChanOpPrivsNeeded.on(&target));
                }
                let text = text.to_string();
                let nick = ctx.nick();
                let chan_name = chan.name.as_str().to_string();
                if let Some(chan) = ctx.server.channels.get_mut(&folded) {
                    chan.topic = if text.is_empty() {
                        None
                    } else {
                        Some(Topic {
                            text: text.clone(),
                            set_by: nick,
                            set_at: chrono::Utc::now().timestamp(),
                        })
                    };
                }
                let change = Message::cmd("TOPIC", &[&chan_name, &text]).with_prefix(ctx.prefix()?);
                ctx.server.broadcast_to_channel(&folded, change, None);
                Ok(())
            }
        }
    }
}

/// NAMES - list channel members.
pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        match msg.param(0) {
            None => {
                ctx.server
                    .numeric(ctx.id, Response::RPL_ENDOFNAMES, &["*", "End of NAMES list"]);
            }
            Some(targets) => {
                for target in targets.split(',').map(str::to_string).collect::<Vec<_>>() {
                    let folded = Name::new(target.as_str()).folded().to_string();
                    if ctx.server.channels.contains_key(&folded) {
                        ctx.server.send_names(ctx.id, &folded);
                    } else {
                        ctx.server.numeric(
                            ctx.id,
                            Response::RPL_ENDOFNAMES,
                            &[&target, "End of NAMES list"],
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

/// LIST - enumerate visible channels.
pub struct ListHandler;

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let filter: Option<Vec<String>> = msg
            .param(0)
            .map(|t| t.split(',').map(|c| Name::new(c).folded().to_string()).collect());

        ctx.server
            .numeric(ctx.id, Response::RPL_LISTSTART, &["Channel", "Users  Name"]);
        let entries: Vec<(String, usize, String)> = ctx
            .server
            .channels
            .iter()
            .filter(|(folded, chan)| {
                let wanted = filter
                    .as_ref()
                    .is_none_or(|list| list.contains(folded));
                wanted && (!chan.modes.secret || chan.is_member(ctx.id))
            })
            .map(|(_, chan)| {
                (
                    chan.name.as_str().to_string(),
                    chan.members.len(),
                    chan.topic.as_ref().map(|t| t.text.clone()).unwrap_or_default(),
                )
            })
            .collect();
        for (chan_name, count, topic) in entries {
            ctx.server.numeric(
                ctx.id,
                Response::RPL_LIST,
                &[&chan_name, &count.to_string(), &topic],
            );
        }
        ctx.server
            .numeric(ctx.id, Response::RPL_LISTEND, &["End of LIST"]);
        Ok(())
    }
}

/// INVITE - invite a user, recording the invitation for +i checks.
pub struct InviteHandler;

#[async_trait]
impl Handler for InviteHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let invitee = msg.param(0).ok_or(HandlerError::NeedMoreParams)?.to_string();
        let target = msg.param(1).ok_or(HandlerError::NeedMoreParams)?.to_string();

        let invitee_name = Name::new(invitee.as_str());
        let invitee_id = ctx
            .server
            .find_nick(&invitee_name)
            .ok_or_else(|| HandlerError::NoSuchNick(invitee.clone()))?;

        let folded = Name::new(target.as_str()).folded().to_string();
        if let Some(chan) = ctx.server.channels.get(&folded) {
            if !chan.is_member(ctx.id) {
                return Err(ChannelError::NotOnChannel.on(&target));
            }
            if chan.modes.invite_only && !chan.is_operator(ctx.id) {
                return Err(ChannelError::ChanOpPrivsNeeded.on(&target));
            }
            if chan.is_member(invitee_id) {
                return Err(ChannelError::UserOnChannel(invitee.clone()).on(&target));
            }
        }
        if let Some(chan) = ctx.server.channels.get_mut(&folded) {
            chan.invited.insert(invitee_id);
        }

        ctx.server
            .numeric(ctx.id, Response::RPL_INVITING, &[&invitee, &target]);
        let invite = Message::cmd("INVITE", &[&invitee, &target]).with_prefix(ctx.prefix()?);
        ctx.server.send_to(invitee_id, invite);

        let away = ctx
            .server
            .client(invitee_id)
            .and_then(|c| c.away.clone());
        if let Some(away) = away {
            ctx.server
                .numeric(ctx.id, Response::RPL_AWAY, &[&invitee, &away]);
        }
        Ok(())
    }
}
