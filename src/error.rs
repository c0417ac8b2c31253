//! Error types for command handling.
//!
//! Handlers fail with [`HandlerError`]; channel operations fail with
//! [`ChannelError`]. Both map onto the numeric replies the originating
//! client should see, and the event loop sends those replies without
//! dropping the connection (except for [`HandlerError::Quit`]).

use limelight_proto::{Message, Prefix, Response};
use thiserror::Error;

/// Errors that can occur during command handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("no nickname given")]
    NoNicknameGiven,

    #[error("erroneous nickname: {0}")]
    ErroneousNickname(String),

    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("no such nick: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("password mismatch")]
    PasswordMismatch,

    #[error("not an operator")]
    NoPrivileges,

    #[error("{source} ({channel})")]
    Channel {
        channel: String,
        source: ChannelError,
    },

    /// The client quit; the event loop tears the connection down.
    #[error("client quit: {0}")]
    Quit(String),
}

impl HandlerError {
    /// The numeric reply for this error, or `None` when no reply is owed.
    pub fn to_reply(&self, server_name: &str, nick: &str, cmd: &str) -> Option<Message> {
        let (response, params) = match self {
            Self::NeedMoreParams => (
                Response::ERR_NEEDMOREPARAMS,
                vec![cmd.to_string(), "Not enough parameters".into()],
            ),
            Self::NotRegistered => (
                Response::ERR_NOTREGISTERED,
                vec!["You have not registered".into()],
            ),
            Self::AlreadyRegistered => (
                Response::ERR_ALREADYREGISTRED,
                vec!["You may not reregister".into()],
            ),
            Self::UnknownCommand(bad) => (
                Response::ERR_UNKNOWNCOMMAND,
                vec![bad.clone(), "Unknown command".into()],
            ),
            Self::NoNicknameGiven => (
                Response::ERR_NONICKNAMEGIVEN,
                vec!["No nickname given".into()],
            ),
            Self::ErroneousNickname(bad) => (
                Response::ERR_ERRONEUSNICKNAME,
                vec![bad.clone(), "Erroneous nickname".into()],
            ),
            Self::NicknameInUse(bad) => (
                Response::ERR_NICKNAMEINUSE,
                vec![bad.clone(), "Nickname is already in use".into()],
            ),
            Self::NoSuchNick(target) => (
                Response::ERR_NOSUCHNICK,
                vec![target.clone(), "No such nick/channel".into()],
            ),
            Self::NoSuchChannel(chan) => (
                Response::ERR_NOSUCHCHANNEL,
                vec![chan.clone(), "No such channel".into()],
            ),
            Self::PasswordMismatch => (
                Response::ERR_PASSWDMISMATCH,
                vec!["Password incorrect".into()],
            ),
            Self::NoPrivileges => (
                Response::ERR_NOPRIVILEGES,
                vec!["Permission Denied - You're not an IRC operator".into()],
            ),
            Self::Channel { channel, source } => return Some(source.to_reply(server_name, nick, channel)),
            Self::Quit(_) => return None,
        };

        let mut all = vec![nick.to_string()];
        all.extend(params);
        Some(Message::new(response.token(), all).with_prefix(Prefix::ServerName(server_name.to_string())))
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Channel operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("you're not on that channel")]
    NotOnChannel,

    #[error("you're not channel operator")]
    ChanOpPrivsNeeded,

    #[error("user {0} is not on that channel")]
    UserNotInChannel(String),

    #[error("user {0} is already on that channel")]
    UserOnChannel(String),

    #[error("cannot join channel (+b)")]
    BannedFromChan,

    #[error("cannot join channel (+i)")]
    InviteOnlyChan,

    #[error("cannot join channel (+l)")]
    ChannelIsFull,

    #[error("cannot join channel (+k)")]
    BadChannelKey,

    #[error("cannot send to channel")]
    CannotSendToChan,

    #[error("unknown mode char {0}")]
    UnknownMode(char),
}

impl ChannelError {
    /// The numeric reply for this error.
    pub fn to_reply(&self, server_name: &str, nick: &str, channel: &str) -> Message {
        let (response, params) = match self {
            Self::NotOnChannel => (
                Response::ERR_NOTONCHANNEL,
                vec![channel.to_string(), "You're not on that channel".into()],
            ),
            Self::ChanOpPrivsNeeded => (
                Response::ERR_CHANOPRIVSNEEDED,
                vec![channel.to_string(), "You're not channel operator".into()],
            ),
            Self::UserNotInChannel(target) => (
                Response::ERR_USERNOTINCHANNEL,
                vec![
                    target.clone(),
                    channel.to_string(),
                    "They aren't on that channel".into(),
                ],
            ),
            Self::UserOnChannel(target) => (
                Response::ERR_USERONCHANNEL,
                vec![
                    target.clone(),
                    channel.to_string(),
                    "is already on channel".into(),
                ],
            ),
            Self::BannedFromChan => (
                Response::ERR_BANNEDFROMCHAN,
                vec![channel.to_string(), "Cannot join channel (+b)".into()],
            ),
            Self::InviteOnlyChan => (
                Response::ERR_INVITEONLYCHAN,
                vec![channel.to_string(), "Cannot join channel (+i)".into()],
            ),
            Self::ChannelIsFull => (
                Response::ERR_CHANNELISFULL,
                vec![channel.to_string(), "Cannot join channel (+l)".into()],
            ),
            Self::BadChannelKey => (
                Response::ERR_BADCHANNELKEY,
                vec![channel.to_string(), "Cannot join channel (+k)".into()],
            ),
            Self::CannotSendToChan => (
                Response::ERR_CANNOTSENDTOCHAN,
                vec![channel.to_string(), "Cannot send to channel".into()],
            ),
            Self::UnknownMode(c) => (
                Response::ERR_UNKNOWNMODE,
                vec![c.to_string(), "is unknown mode char to me".into()],
            ),
        };

        let mut all = vec![nick.to_string()];
        all.extend(params);
        Message::new(response.token(), all).with_prefix(Prefix::ServerName(server_name.to_string()))
    }

    /// Attach the channel name, producing a [`HandlerError`].
    pub fn on(self, channel: &str) -> HandlerError {
        HandlerError::Channel {
            channel: channel.to_string(),
            source: self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_carry_server_prefix_and_numeric() {
        let reply = HandlerError::NeedMoreParams
            .to_reply("irc.test", "alice", "JOIN")
            .unwrap();
        assert_eq!(reply.prefix, Some(Prefix::ServerName("irc.test".into())));
        assert_eq!(reply.command, "461");
        assert_eq!(reply.params[0], "alice");
        assert_eq!(reply.params[1], "JOIN");
    }

    #[test]
    fn quit_has_no_reply() {
        assert!(HandlerError::Quit("bye".into())
            .to_reply("irc.test", "alice", "QUIT")
            .is_none());
    }

    #[test]
    fn channel_error_numeric() {
        let reply = ChannelError::BannedFromChan.to_reply("irc.test", "bob", "#room");
        assert_eq!(reply.command, "474");
        assert_eq!(reply.params, vec!["bob", "#room", "Cannot join channel (+b)"]);
    }
}
