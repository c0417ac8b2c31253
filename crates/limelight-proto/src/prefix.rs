//! Message prefix: the origin of an IRC line.
//!
//! A prefix is either a server name or a user's `nick!user@host` identifier.
//! Servers set their own name as the prefix on everything they originate;
//! user-originated lines are relayed with the full userhost triple.

use std::fmt;

/// The origin of an IRC message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Prefix {
    /// A server name, e.g. `irc.example.com`.
    ServerName(String),
    /// A user: (nickname, username, hostname).
    Nickname(String, String, String),
}

impl Prefix {
    /// Build a user prefix from its three components.
    pub fn user(nick: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Prefix::Nickname(nick.into(), user.into(), host.into())
    }

    /// Lenient parse of prefix text. A name containing a dot and neither
    /// `!` nor `@` is taken to be a server name.
    pub fn parse(s: &str) -> Self {
        let (nick, rest) = match s.split_once('!') {
            Some((n, r)) => (n, Some(r)),
            None => (s, None),
        };
        match rest {
            Some(r) => {
                let (user, host) = r.split_once('@').unwrap_or((r, ""));
                Prefix::Nickname(nick.to_string(), user.to_string(), host.to_string())
            }
            None => match s.split_once('@') {
                Some((n, h)) => Prefix::Nickname(n.to_string(), String::new(), h.to_string()),
                None if s.contains('.') => Prefix::ServerName(s.to_string()),
                None => Prefix::Nickname(s.to_string(), String::new(), String::new()),
            },
        }
    }

    /// The nickname, for user prefixes.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }

    /// The hostname: the server name, or the host part of a user prefix.
    pub fn host(&self) -> Option<&str> {
        match self {
            Prefix::ServerName(name) => Some(name),
            Prefix::Nickname(_, _, host) if !host.is_empty() => Some(host),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => f.write_str(name),
            Prefix::Nickname(nick, user, host) => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}
