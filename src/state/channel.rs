//! Channel state: membership, modes, topic, and mask lists.

use std::collections::{HashMap, HashSet};

use limelight_proto::Name;

use super::client::ClientId;
use super::masks::UserMaskSet;
use crate::error::ChannelError;

/// Per-member channel modes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberModes {
    /// +o - channel operator.
    pub operator: bool,
    /// +v - voice.
    pub voice: bool,
}

impl MemberModes {
    /// The highest prefix character, `@` before `+`.
    pub fn prefix_char(self) -> Option<char> {
        if self.operator {
            Some('@')
        } else if self.voice {
            Some('+')
        } else {
            None
        }
    }

    /// All prefix characters, highest first, for `multi-prefix` clients.
    pub fn all_prefix_chars(self) -> String {
        let mut s = String::with_capacity(2);
        if self.operator {
            s.push('@');
        }
        if self.voice {
            s.push('+');
        }
        s
    }

    /// Whether this member may speak on a moderated channel.
    pub fn has_voice_or_op(self) -> bool {
        self.operator || self.voice
    }
}

/// Channel topic with provenance.
#[derive(Debug, Clone)]
pub struct Topic {
    /// The topic text.
    pub text: String,
    /// Nick of the setter.
    pub set_by: String,
    /// Unix time the topic was set.
    pub set_at: i64,
}

/// Channel mode flags and their parameters.
#[derive(Debug, Default, Clone)]
pub struct ChannelModes {
    /// +i - joining requires an invitation.
    pub invite_only: bool,
    /// +m - only voiced members may speak.
    pub moderated: bool,
    /// +n - no messages from outside the channel.
    pub no_outside: bool,
    /// +s - hidden from LIST and NAMES for non-members.
    pub secret: bool,
    /// +t - only operators may set the topic.
    pub topic_lock: bool,
    /// +k - join key.
    pub key: Option<String>,
    /// +l - member limit.
    pub limit: Option<usize>,
}

impl ChannelModes {
    /// Render for RPL_CHANNELMODEIS: the flag string and its parameters.
    /// The key itself is only disclosed to members.
    pub fn to_mode_string(&self, show_params: bool) -> (String, Vec<String>) {
        let mut flags = String::from("+");
        let mut params = Vec::new();
        if self.invite_only {
            flags.push('i');
        }
        if self.moderated {
            flags.push('m');
        }
        if self.no_outside {
            flags.push('n');
        }
        if self.secret {
            flags.push('s');
        }
        if self.topic_lock {
            flags.push('t');
        }
        if let Some(key) = &self.key {
            flags.push('k');
            if show_params {
                params.push(key.clone());
            }
        }
        if let Some(limit) = self.limit {
            flags.push('l');
            if show_params {
                params.push(limit.to_string());
            }
        }
        (flags, params)
    }
}

/// A channel. Exists only while it has members; the creator becomes its
/// first operator.
pub struct Channel {
    /// Channel name, `#`- or `&`-prefixed.
    pub name: Name,
    /// Current topic.
    pub topic: Option<Topic>,
    /// Members and their modes.
    pub members: HashMap<ClientId, MemberModes>,
    /// Channel modes.
    pub modes: ChannelModes,
    /// +b masks.
    pub bans: UserMaskSet,
    /// +e masks: exceptions to the ban list.
    pub excepts: UserMaskSet,
    /// +I masks: exceptions to invite-only.
    pub invite_excepts: UserMaskSet,
    /// Clients invited via INVITE.
    pub invited: HashSet<ClientId>,
    /// Unix time of creation.
    pub created_at: i64,
}

impl Channel {
    /// A new empty channel.
    pub fn new(name: Name) -> Self {
        Channel {
            name,
            topic: None,
            members: HashMap::new(),
            modes: ChannelModes::default(),
            bans: UserMaskSet::new(),
            excepts: UserMaskSet::new(),
            invite_excepts: UserMaskSet::new(),
            invited: HashSet::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Whether the client is a member.
    pub fn is_member(&self, id: ClientId) -> bool {
        self.members.contains_key(&id)
    }

    /// Whether the client holds +o here.
    pub fn is_operator(&self, id: ClientId) -> bool {
        self.members.get(&id).is_some_and(|m| m.operator)
    }

    /// Gate a join attempt. Checked in order: key, limit, invite-only,
    /// bans (with the except list overriding).
    pub fn check_join(
        &self,
        id: ClientId,
        userhost: &str,
        key: Option<&str>,
    ) -> Result<(), ChannelError> {
        if let Some(wanted) = &self.modes.key {
            if key != Some(wanted.as_str()) {
                return Err(ChannelError::BadChannelKey);
            }
        }
        if let Some(limit) = self.modes.limit {
            if self.members.len() >= limit {
                return Err(ChannelError::ChannelIsFull);
            }
        }
        if self.modes.invite_only
            && !self.invited.contains(&id)
            && !self.invite_excepts.matches(userhost)
        {
            return Err(ChannelError::InviteOnlyChan);
        }
        if self.bans.matches(userhost) && !self.excepts.matches(userhost) {
            return Err(ChannelError::BannedFromChan);
        }
        Ok(())
    }

    /// Gate a PRIVMSG/NOTICE from `sender`. `None` means the sender is not
    /// a member.
    pub fn check_send(&self, sender: Option<ClientId>) -> Result<(), ChannelError> {
        let membership = sender.and_then(|id| self.members.get(&id).copied());
        if self.modes.no_outside && membership.is_none() {
            return Err(ChannelError::CannotSendToChan);
        }
        if self.modes.moderated && !membership.is_some_and(MemberModes::has_voice_or_op) {
            return Err(ChannelError::CannotSendToChan);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> Channel {
        Channel::new(Name::new("#room"))
    }

    #[test]
    fn join_gates_in_order() {
        let mut chan = channel();
        chan.modes.key = Some("sesame".into());
        chan.modes.limit = Some(1);
        chan.modes.invite_only = true;

        // Wrong key fails first.
        assert_eq!(
            chan.check_join(1, "a!b@c", None),
            Err(ChannelError::BadChannelKey)
        );
        // Right key, but the channel is invite-only.
        assert_eq!(
            chan.check_join(1, "a!b@c", Some("sesame")),
            Err(ChannelError::InviteOnlyChan)
        );
        chan.invited.insert(1);
        assert_eq!(chan.check_join(1, "a!b@c", Some("sesame")), Ok(()));

        // A full channel rejects before invite checks.
        chan.members.insert(9, MemberModes::default());
        assert_eq!(
            chan.check_join(1, "a!b@c", Some("sesame")),
            Err(ChannelError::ChannelIsFull)
        );
    }

    #[test]
    fn bans_respect_excepts() {
        let mut chan = channel();
        chan.bans.add(Name::new("*!*@evil.*"));
        assert_eq!(
            chan.check_join(1, "bob!x@evil.host", None),
            Err(ChannelError::BannedFromChan)
        );
        chan.excepts.add(Name::new("bob!*@*"));
        assert_eq!(chan.check_join(1, "bob!x@evil.host", None), Ok(()));
    }

    #[test]
    fn moderated_channels_require_voice() {
        let mut chan = channel();
        chan.members.insert(1, MemberModes::default());
        chan.modes.moderated = true;
        assert_eq!(chan.check_send(Some(1)), Err(ChannelError::CannotSendToChan));
        chan.members.get_mut(&1).unwrap().voice = true;
        assert_eq!(chan.check_send(Some(1)), Ok(()));
    }

    #[test]
    fn no_outside_blocks_non_members() {
        let mut chan = channel();
        chan.members.insert(1, MemberModes::default());
        assert_eq!(chan.check_send(None), Ok(()));
        chan.modes.no_outside = true;
        assert_eq!(chan.check_send(None), Err(ChannelError::CannotSendToChan));
        assert_eq!(chan.check_send(Some(1)), Ok(()));
    }

    #[test]
    fn mode_string_hides_key_from_outsiders() {
        let mut chan = channel();
        chan.modes.key = Some("sesame".into());
        chan.modes.topic_lock = true;
        let (flags, params) = chan.modes.to_mode_string(true);
        assert_eq!(flags, "+tk");
        assert_eq!(params, vec!["sesame"]);
        let (_, hidden) = chan.modes.to_mode_string(false);
        assert!(hidden.is_empty());
    }
}
