//! Line-message transports over TCP, TLS, and WebSocket.
//!
//! Every transport presents the same interface: whole [`Message`] values in,
//! whole [`Message`] values out. For WebSocket connections each text frame
//! carries exactly one IRC line; control frames are handled inside the
//! transport and never surface.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::IrcCodec;
use crate::error::ProtocolError;
use crate::message::{Message, MAX_LINE_LEN};

/// A connected client transport, before the read/write split.
pub enum Transport {
    /// Plain TCP.
    Tcp(Framed<TcpStream, IrcCodec>),
    /// Server-side TLS.
    Tls(Framed<TlsStream<TcpStream>, IrcCodec>),
    /// WebSocket over plain TCP.
    Ws(WebSocketStream<TcpStream>),
    /// WebSocket over TLS.
    WsTls(WebSocketStream<TlsStream<TcpStream>>),
}

/// The read half of a split [`Transport`].
pub enum TransportReader {
    /// Plain TCP.
    Tcp(SplitStream<Framed<TcpStream, IrcCodec>>),
    /// Server-side TLS.
    Tls(SplitStream<Framed<TlsStream<TcpStream>, IrcCodec>>),
    /// WebSocket over plain TCP.
    Ws(SplitStream<WebSocketStream<TcpStream>>),
    /// WebSocket over TLS.
    WsTls(SplitStream<WebSocketStream<TlsStream<TcpStream>>>),
}

/// The write half of a split [`Transport`].
pub enum TransportWriter {
    /// Plain TCP.
    Tcp(SplitSink<Framed<TcpStream, IrcCodec>, Message>),
    /// Server-side TLS.
    Tls(SplitSink<Framed<TlsStream<TcpStream>, IrcCodec>, Message>),
    /// WebSocket over plain TCP.
    Ws(SplitSink<WebSocketStream<TcpStream>, WsMessage>),
    /// WebSocket over TLS.
    WsTls(SplitSink<WebSocketStream<TlsStream<TcpStream>>, WsMessage>),
}

impl Transport {
    /// Wrap a plain TCP stream.
    pub fn tcp(stream: TcpStream) -> Self {
        Transport::Tcp(Framed::new(stream, IrcCodec::new()))
    }

    /// Wrap an accepted server-side TLS stream.
    pub fn tls(stream: TlsStream<TcpStream>) -> Self {
        Transport::Tls(Framed::new(stream, IrcCodec::new()))
    }

    /// Wrap an accepted WebSocket stream.
    pub fn websocket(stream: WebSocketStream<TcpStream>) -> Self {
        Transport::Ws(stream)
    }

    /// Wrap an accepted WebSocket-over-TLS stream.
    pub fn websocket_tls(stream: WebSocketStream<TlsStream<TcpStream>>) -> Self {
        Transport::WsTls(stream)
    }

    /// Whether the connection is encrypted.
    pub fn is_secure(&self) -> bool {
        matches!(self, Transport::Tls(_) | Transport::WsTls(_))
    }

    /// Split into independently-driven read and write halves.
    pub fn split(self) -> (TransportReader, TransportWriter) {
        match self {
            Transport::Tcp(framed) => {
                let (sink, stream) = framed.split();
                (TransportReader::Tcp(stream), TransportWriter::Tcp(sink))
            }
            Transport::Tls(framed) => {
                let (sink, stream) = framed.split();
                (TransportReader::Tls(stream), TransportWriter::Tls(sink))
            }
            Transport::Ws(ws) => {
                let (sink, stream) = ws.split();
                (TransportReader::Ws(stream), TransportWriter::Ws(sink))
            }
            Transport::WsTls(ws) => {
                let (sink, stream) = ws.split();
                (TransportReader::WsTls(stream), TransportWriter::WsTls(sink))
            }
        }
    }
}

impl TransportReader {
    /// Read the next message. `Ok(None)` means the peer closed cleanly.
    pub async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        match self {
            TransportReader::Tcp(stream) => stream.next().await.transpose(),
            TransportReader::Tls(stream) => stream.next().await.transpose(),
            TransportReader::Ws(stream) => read_ws_message(stream).await,
            TransportReader::WsTls(stream) => read_ws_message(stream).await,
        }
    }
}

impl TransportWriter {
    /// Write one message to the transport.
    pub async fn write_message(&mut self, msg: Message) -> Result<(), ProtocolError> {
        match self {
            TransportWriter::Tcp(sink) => sink.send(msg).await,
            TransportWriter::Tls(sink) => sink.send(msg).await,
            TransportWriter::Ws(sink) => write_ws_message(sink, msg).await,
            TransportWriter::WsTls(sink) => write_ws_message(sink, msg).await,
        }
    }

    /// Flush and close, releasing the connection. Idempotent at the socket
    /// level: closing an already-closed transport is not an error we care
    /// about.
    pub async fn close(&mut self) {
        let result = match self {
            TransportWriter::Tcp(sink) => sink.close().await.map_err(|e| e.to_string()),
            TransportWriter::Tls(sink) => sink.close().await.map_err(|e| e.to_string()),
            TransportWriter::Ws(sink) => sink.close().await.map_err(|e| e.to_string()),
            TransportWriter::WsTls(sink) => sink.close().await.map_err(|e| e.to_string()),
        };
        if let Err(e) = result {
            debug!(error = %e, "transport close");
        }
    }
}

async fn read_ws_message<S>(
    stream: &mut SplitStream<WebSocketStream<S>>,
) -> Result<Option<Message>, ProtocolError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match stream.next().await {
            Some(Ok(WsMessage::Text(text))) => {
                if text.len() > MAX_LINE_LEN {
                    return Err(ProtocolError::LineTooLong {
                        actual: text.len(),
                        limit: MAX_LINE_LEN,
                    });
                }
                let line = text.trim_end_matches(['\r', '\n']);
                if line.is_empty() {
                    continue;
                }
                return line.parse::<Message>().map(Some);
            }
            Some(Ok(WsMessage::Close(_))) | None => return Ok(None),
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_))) => continue,
            Some(Ok(WsMessage::Binary(_))) => {
                debug!("ignoring binary WebSocket frame");
                continue;
            }
            Some(Err(e)) => return Err(ProtocolError::WebSocket(e.to_string())),
        }
    }
}

async fn write_ws_message<S>(
    sink: &mut SplitSink<WebSocketStream<S>, WsMessage>,
    msg: Message,
) -> Result<(), ProtocolError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    // One IRC line per text frame, without the CR-LF framing.
    sink.send(WsMessage::Text(msg.to_string()))
        .await
        .map_err(|e| ProtocolError::WebSocket(e.to_string()))
}
