//! # limelight-proto
//!
//! Wire-level building blocks for the limelight IRC daemon:
//!
//! - RFC 1459 case folding and the [`Name`] identifier type
//! - IRC message parsing and serialization ([`Message`], [`Prefix`])
//! - Numeric reply codes ([`Response`])
//! - A tokio line codec and TCP/TLS/WebSocket [`Transport`] (feature `tokio`)

#![deny(clippy::all)]

pub mod casemap;
pub mod error;
pub mod message;
pub mod name;
pub mod prefix;
pub mod response;

pub use self::casemap::{fold, fold_char, fold_eq};
pub use self::error::ProtocolError;
pub use self::message::{Message, MAX_LINE_LEN, MAX_PARAMS};
pub use self::name::Name;
pub use self::prefix::Prefix;
pub use self::response::Response;

#[cfg(feature = "tokio")]
pub mod codec;
#[cfg(feature = "tokio")]
pub use self::codec::{IrcCodec, LineCodec};

#[cfg(feature = "tokio")]
pub mod transport;
#[cfg(feature = "tokio")]
pub use self::transport::{Transport, TransportReader, TransportWriter};
