//! Multi-line reply blocks: the welcome burst, LUSERS, MOTD, NAMES, and
//! topic replies.

use limelight_proto::Response;

use super::{Server, VERSION};
use crate::state::ClientId;

impl Server {
    /// The full post-registration burst: 001-005, LUSERS, and the MOTD.
    pub fn send_welcome_burst(&mut self, id: ClientId) {
        let Some(client) = self.client(id) else {
            return;
        };
        let Some(userhost) = client.userhost() else {
            return;
        };

        self.numeric(
            id,
            Response::RPL_WELCOME,
            &[&format!("Welcome to the Internet Relay Network {userhost}")],
        );
        let yourhost = format!("Your host is {}, running version {}", self.name, VERSION);
        self.numeric(id, Response::RPL_YOURHOST, &[&yourhost]);
        let created = format!("This server was created {}", self.created.to_rfc2822());
        self.numeric(id, Response::RPL_CREATED, &[&created]);
        let name = self.name.clone();
        self.numeric(id, Response::RPL_MYINFO, &[&name, VERSION, "iorsw", "beIiklmnostv"]);
        self.numeric(
            id,
            Response::RPL_ISUPPORT,
            &[
                "CASEMAPPING=rfc1459",
                "CHANTYPES=#&",
                "CHANMODES=beI,k,l,imnst",
                "PREFIX=(ov)@+",
                "NICKLEN=31",
                "are supported by this server",
            ],
        );
        self.send_lusers(id);
        self.send_motd(id);
    }

    /// The LUSERS block: 251-255.
    pub fn send_lusers(&mut self, id: ClientId) {
        let users = self.lookup.len();
        let opers = self
            .clients
            .values()
            .filter(|c| c.modes.operator)
            .count();
        let unknown = self.clients.len().saturating_sub(users);
        let channels = self.channels.len();

        let line = format!("There are {users} users and 0 services on 1 servers");
        self.numeric(id, Response::RPL_LUSERCLIENT, &[&line]);
        self.numeric(
            id,
            Response::RPL_LUSEROP,
            &[&opers.to_string(), "operator(s) online"],
        );
        self.numeric(
            id,
            Response::RPL_LUSERUNKNOWN,
            &[&unknown.to_string(), "unknown connection(s)"],
        );
        self.numeric(
            id,
            Response::RPL_LUSERCHANNELS,
            &[&channels.to_string(), "channels formed"],
        );
        let me = format!("I have {} clients and 1 servers", self.clients.len());
        self.numeric(id, Response::RPL_LUSERME, &[&me]);
    }

    /// The MOTD block, or 422 when no MOTD is configured.
    pub fn send_motd(&mut self, id: ClientId) {
        if self.motd.is_empty() {
            self.numeric(id, Response::ERR_NOMOTD, &["MOTD File is missing"]);
            return;
        }
        let header = format!("- {} Message of the day - ", self.name);
        self.numeric(id, Response::RPL_MOTDSTART, &[&header]);
        for line in self.motd.clone() {
            self.numeric(id, Response::RPL_MOTD, &[&format!("- {line}")]);
        }
        self.numeric(id, Response::RPL_ENDOFMOTD, &["End of /MOTD command"]);
    }

    /// NAMES for one channel: 353 then 366. Secret channels are invisible
    /// to non-members, who get only the terminator.
    pub fn send_names(&mut self, id: ClientId, folded: &str) {
        let Some(chan) = self.channels.get(folded) else {
            return;
        };
        let chan_name = chan.name.as_str().to_string();
        let member = chan.is_member(id);
        let visible = member || !chan.modes.secret;
        let symbol = if chan.modes.secret { "@" } else { "=" };

        if visible {
            let (multi_prefix, userhost_in_names) = self
                .client(id)
                .map(|c| {
                    (
                        c.caps.contains("multi-prefix"),
                        c.caps.contains("userhost-in-names"),
                    )
                })
                .unwrap_or((false, false));

            let mut names = Vec::with_capacity(chan.members.len());
            for (&mid, modes) in &chan.members {
                let Some(peer) = self.clients.get(&mid) else {
                    continue;
                };
                let mut entry = if multi_prefix {
                    modes.all_prefix_chars()
                } else {
                    modes.prefix_char().map(String::from).unwrap_or_default()
                };
                if userhost_in_names {
                    entry.push_str(&peer.userhost().unwrap_or_else(|| peer.nick_str().to_string()));
                } else {
                    entry.push_str(peer.nick_str());
                }
                names.push(entry);
            }
            let names = names.join(" ");
            self.numeric(id, Response::RPL_NAMREPLY, &[symbol, &chan_name, &names]);
        }
        self.numeric(id, Response::RPL_ENDOFNAMES, &[&chan_name, "End of NAMES list"]);
    }

    /// The topic reply pair: 332 and 333, or 331 when no topic is set.
    pub fn send_topic_reply(&mut self, id: ClientId, folded: &str) {
        let Some(chan) = self.channels.get(folded) else {
            return;
        };
        let chan_name = chan.name.as_str().to_string();
        match chan.topic.clone() {
            Some(topic) => {
                self.numeric(id, Response::RPL_TOPIC, &[&chan_name, &topic.text]);
                self.numeric(
                    id,
                    Response::RPL_TOPICWHOTIME,
                    &[&chan_name, &topic.set_by, &topic.set_at.to_string()],
                );
            }
            None => {
                self.numeric(id, Response::RPL_NOTOPIC, &[&chan_name, "No topic is set"]);
            }
        }
    }
}
