//! The network layer: listeners and per-connection task pairs.

mod connection;
mod gateway;

pub use connection::{Connection, SEND_QUEUE_DEPTH};
pub use gateway::{Gateway, GatewayError};
