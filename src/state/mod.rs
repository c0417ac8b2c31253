//! Shared server state: clients, channels, masks, and the lookup set.
//!
//! Everything in this module is owned and mutated only by the server event
//! loop; per-connection tasks see none of it.

pub mod channel;
pub mod client;
pub mod lookup;
pub mod masks;

pub use channel::{Channel, ChannelModes, MemberModes, Topic};
pub use client::{Client, ClientId, Phase, UserModes};
pub use lookup::{ClientIndex, ClientLookupSet, LookupError};
pub use masks::{expand_userhost, has_wildcards, UserMaskSet};
