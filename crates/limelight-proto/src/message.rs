//! IRC message parsing and serialization.
//!
//! Grammar, per RFC 1459 with RFC 2812 refinements:
//!
//! ```text
//! message  = [ ":" prefix SPACE ] command [ params ] crlf
//! params   = *14( SPACE middle ) [ SPACE ":" trailing ]
//! middle   = nospcrlfcl *( ":" / nospcrlfcl )
//! trailing = *( ":" / " " / nospcrlfcl )
//! ```
//!
//! The round-trip law holds: for every message obtained from a successful
//! parse, rendering and re-parsing yields an equal message.

use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;
use crate::prefix::Prefix;

/// Maximum line length in bytes, including the trailing CR-LF.
pub const MAX_LINE_LEN: usize = 512;

/// Maximum number of message parameters.
pub const MAX_PARAMS: usize = 15;

/// A parsed IRC line: optional prefix, uppercase command token, parameters.
///
/// The last parameter may contain spaces (the "trailing" parameter); all
/// others are single tokens. Unknown commands parse successfully and are
/// rejected later by the dispatcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Origin of the message, set on server-originated lines.
    pub prefix: Option<Prefix>,
    /// Command token, normalized to uppercase ASCII.
    pub command: String,
    /// Parameters, at most [`MAX_PARAMS`].
    pub params: Vec<String>,
}

impl Message {
    /// Build a message from a command and parameters. The command is
    /// uppercased.
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        let mut command: String = command.into();
        command.make_ascii_uppercase();
        Message {
            prefix: None,
            command,
            params,
        }
    }

    /// Convenience constructor taking string slices.
    pub fn cmd<S: AsRef<str>>(command: &str, params: &[S]) -> Self {
        Message::new(
            command,
            params.iter().map(|p| p.as_ref().to_string()).collect(),
        )
    }

    /// Attach a prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Parameter at `i`, if present.
    pub fn param(&self, i: usize) -> Option<&str> {
        self.params.get(i).map(String::as_str)
    }

    /// The nickname of the originating user, if any.
    pub fn source_nick(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }
}

fn legal_char(c: char) -> bool {
    c != '\0' && c != '\r' && c != '\n'
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.len() + 2 > MAX_LINE_LEN {
            return Err(ProtocolError::LineTooLong {
                actual: line.len() + 2,
                limit: MAX_LINE_LEN,
            });
        }
        if let Some(c) = line.chars().find(|&c| !legal_char(c)) {
            return Err(ProtocolError::IllegalCharacter(c));
        }

        let mut rest = line;

        let prefix = if let Some(tail) = rest.strip_prefix(':') {
            let (prefix_text, tail) = tail
                .split_once(' ')
                .ok_or_else(|| ProtocolError::InvalidCommand(line.to_string()))?;
            rest = tail.trim_start_matches(' ');
            Some(Prefix::parse(prefix_text))
        } else {
            None
        };

        let (command, tail) = match rest.split_once(' ') {
            Some((c, t)) => (c, t),
            None => (rest, ""),
        };
        if command.is_empty() || !command.chars().all(|c| c.is_ascii_alphanumeric()) {
            if line.is_empty() {
                return Err(ProtocolError::EmptyMessage);
            }
            return Err(ProtocolError::InvalidCommand(line.to_string()));
        }
        let mut command = command.to_string();
        command.make_ascii_uppercase();

        let mut params = Vec::new();
        let mut rest = tail;
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            if params.len() == MAX_PARAMS - 1 {
                // The 15th parameter swallows the remainder.
                params.push(rest.to_string());
                break;
            }
            match rest.split_once(' ') {
                Some((middle, tail)) => {
                    params.push(middle.to_string());
                    rest = tail;
                }
                None => {
                    params.push(rest.to_string());
                    break;
                }
            }
        }

        Ok(Message {
            prefix,
            command,
            params,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        if let Some((last, middles)) = self.params.split_last() {
            for p in middles {
                write!(f, " {p}")?;
            }
            if last.is_empty() || last.starts_with(':') || last.contains(' ') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }
        Ok(())
    }
}
