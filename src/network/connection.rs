//! One accepted connection: a reader task and a writer task around a
//! bounded send queue.
//!
//! Neither task touches shared state. The reader parses lines and forwards
//! them to the server loop; the writer drains the send queue into the
//! transport. The server closes a connection by dropping its queue sender,
//! which lets the writer drain fully before the socket is released.

use std::net::SocketAddr;

use limelight_proto::{Message, Transport};
use tokio::sync::mpsc;
use tracing::debug;

use crate::server::ServerEvent;
use crate::state::ClientId;

/// Maximum lines queued toward one client before the connection is dropped
/// with `ERROR :Send queue exceeded`.
pub const SEND_QUEUE_DEPTH: usize = 1024;

/// A live client connection.
pub struct Connection {
    id: ClientId,
    transport: Transport,
    addr: SocketAddr,
    events: mpsc::Sender<ServerEvent>,
}

impl Connection {
    /// Wrap an accepted transport.
    pub fn new(
        id: ClientId,
        transport: Transport,
        addr: SocketAddr,
        events: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Connection {
            id,
            transport,
            addr,
            events,
        }
    }

    /// Drive the connection until either side closes.
    pub async fn run(self) {
        let id = self.id;
        let secure = self.transport.is_secure();
        let (outgoing, mut queue) = mpsc::channel::<Message>(SEND_QUEUE_DEPTH);

        if self
            .events
            .send(ServerEvent::Attach {
                id,
                outgoing,
                addr: self.addr,
                secure,
            })
            .await
            .is_err()
        {
            return;
        }

        let (mut reader, mut writer) = self.transport.split();

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = queue.recv().await {
                if let Err(e) = writer.write_message(msg).await {
                    debug!(id, error = %e, "write failed");
                    break;
                }
            }
            writer.close().await;
        });

        loop {
            match reader.read_message().await {
                Ok(Some(message)) => {
                    if self
                        .events
                        .send(ServerEvent::Command { id, message })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                Ok(None) => {
                    let _ = self
                        .events
                        .send(ServerEvent::Hangup {
                            id,
                            reason: "Client closed connection".to_string(),
                        })
                        .await;
                    break;
                }
                Err(e) => {
                    let _ = self
                        .events
                        .send(ServerEvent::Hangup {
                            id,
                            reason: e.to_string(),
                        })
                        .await;
                    break;
                }
            }
        }

        let _ = writer_task.await;
        debug!(id, "connection tasks finished");
    }
}
