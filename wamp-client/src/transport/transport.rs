use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

/// An event produced by a connected [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and messages may be sent.
    Connected,
    /// A text frame holding one serialized message.
    IncomingText(String),
}

/// Stream of events from a connected [`Transport`].
///
/// The stream ends when the connection closes. An error item reports a failed connection and is
/// the last item of the stream.
pub type TransportEventStream = BoxStream<'static, Result<TransportEvent>>;

/// A transport, over which serialized WAMP messages are sent and received as text frames.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the connection.
    ///
    /// May only be called once per transport.
    async fn connect(&self) -> Result<TransportEventStream>;

    /// Sends a text frame.
    async fn send(&self, text: String) -> Result<()>;

    /// Closes the connection, without waiting for the remote end.
    async fn close(&self) -> Result<()>;
}
