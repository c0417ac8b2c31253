//! IRC numeric reply codes.
//!
//! The subset of RFC 2812 numerics this daemon emits. Numerics travel as
//! three-digit command tokens; [`Response::token`] produces the zero-padded
//! form used on the wire.

#![allow(non_camel_case_types)]

/// A numeric server reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Response {
    /// 001 - welcome to the network
    RPL_WELCOME = 1,
    /// 002 - your host is
    RPL_YOURHOST = 2,
    /// 003 - server creation time
    RPL_CREATED = 3,
    /// 004 - server name, version, modes
    RPL_MYINFO = 4,
    /// 005 - supported features
    RPL_ISUPPORT = 5,

    /// 221 - user mode string
    RPL_UMODEIS = 221,
    /// 251 - user count
    RPL_LUSERCLIENT = 251,
    /// 252 - operator count
    RPL_LUSEROP = 252,
    /// 253 - unknown connection count
    RPL_LUSERUNKNOWN = 253,
    /// 254 - channel count
    RPL_LUSERCHANNELS = 254,
    /// 255 - local client count
    RPL_LUSERME = 255,

    /// 301 - target is away
    RPL_AWAY = 301,
    /// 303 - ISON reply
    RPL_ISON = 303,
    /// 305 - no longer away
    RPL_UNAWAY = 305,
    /// 306 - now away
    RPL_NOWAWAY = 306,
    /// 311 - WHOIS user line
    RPL_WHOISUSER = 311,
    /// 312 - WHOIS server line
    RPL_WHOISSERVER = 312,
    /// 313 - WHOIS operator flag
    RPL_WHOISOPERATOR = 313,
    /// 315 - end of WHO
    RPL_ENDOFWHO = 315,
    /// 317 - WHOIS idle time
    RPL_WHOISIDLE = 317,
    /// 318 - end of WHOIS
    RPL_ENDOFWHOIS = 318,
    /// 319 - WHOIS channel list
    RPL_WHOISCHANNELS = 319,
    /// 321 - LIST header
    RPL_LISTSTART = 321,
    /// 322 - LIST entry
    RPL_LIST = 322,
    /// 323 - end of LIST
    RPL_LISTEND = 323,
    /// 324 - channel modes
    RPL_CHANNELMODEIS = 324,
    /// 331 - no topic set
    RPL_NOTOPIC = 331,
    /// 332 - channel topic
    RPL_TOPIC = 332,
    /// 333 - topic setter and time
    RPL_TOPICWHOTIME = 333,
    /// 341 - invite confirmation
    RPL_INVITING = 341,
    /// 346 - invite-exception list entry
    RPL_INVITELIST = 346,
    /// 347 - end of invite-exception list
    RPL_ENDOFINVITELIST = 347,
    /// 348 - ban-exception list entry
    RPL_EXCEPTLIST = 348,
    /// 349 - end of ban-exception list
    RPL_ENDOFEXCEPTLIST = 349,
    /// 351 - server version
    RPL_VERSION = 351,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - NAMES reply
    RPL_NAMREPLY = 353,
    /// 366 - end of NAMES
    RPL_ENDOFNAMES = 366,
    /// 367 - ban list entry
    RPL_BANLIST = 367,
    /// 368 - end of ban list
    RPL_ENDOFBANLIST = 368,
    /// 372 - MOTD line
    RPL_MOTD = 372,
    /// 375 - MOTD header
    RPL_MOTDSTART = 375,
    /// 376 - end of MOTD
    RPL_ENDOFMOTD = 376,
    /// 381 - you are now an operator
    RPL_YOUREOPER = 381,
    /// 391 - server time
    RPL_TIME = 391,

    /// 401 - no such nick/channel
    ERR_NOSUCHNICK = 401,
    /// 403 - no such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - cannot send to channel
    ERR_CANNOTSENDTOCHAN = 404,
    /// 421 - unknown command
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - no MOTD
    ERR_NOMOTD = 422,
    /// 431 - no nickname given
    ERR_NONICKNAMEGIVEN = 431,
    /// 432 - erroneous nickname
    ERR_ERRONEUSNICKNAME = 432,
    /// 433 - nickname in use
    ERR_NICKNAMEINUSE = 433,
    /// 441 - they aren't on that channel
    ERR_USERNOTINCHANNEL = 441,
    /// 442 - you're not on that channel
    ERR_NOTONCHANNEL = 442,
    /// 443 - already on channel
    ERR_USERONCHANNEL = 443,
    /// 451 - not registered
    ERR_NOTREGISTERED = 451,
    /// 461 - not enough parameters
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - already registered
    ERR_ALREADYREGISTRED = 462,
    /// 464 - password mismatch
    ERR_PASSWDMISMATCH = 464,
    /// 471 - channel is full
    ERR_CHANNELISFULL = 471,
    /// 472 - unknown mode character
    ERR_UNKNOWNMODE = 472,
    /// 473 - invite-only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - bad channel key
    ERR_BADCHANNELKEY = 475,
    /// 481 - operator privileges needed
    ERR_NOPRIVILEGES = 481,
    /// 482 - channel operator privileges needed
    ERR_CHANOPRIVSNEEDED = 482,
    /// 501 - unknown user mode flag
    ERR_UMODEUNKNOWNFLAG = 501,
    /// 502 - can't change modes for other users
    ERR_USERSDONTMATCH = 502,
}

impl Response {
    /// The numeric code.
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// The zero-padded command token, e.g. `"001"`.
    pub fn token(self) -> String {
        format!("{:03}", self.code())
    }

    /// Whether this is an error numeric (4xx/5xx).
    #[inline]
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }
}
