use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use futures_channel::mpsc::{
    UnboundedReceiver,
    UnboundedSender,
    unbounded,
};
use futures_util::{
    StreamExt,
    lock::Mutex,
};

use crate::transport::transport::{
    Transport,
    TransportEvent,
    TransportEventStream,
};

/// An in-process transport, connected directly to a [`DirectRemote`].
///
/// Useful for embedding a client next to a router in the same process, and for tests.
pub struct DirectTransport {
    events_rx: Mutex<Option<UnboundedReceiver<Result<TransportEvent>>>>,
    outgoing_tx: UnboundedSender<String>,
}

/// The remote half of a [`DirectTransport`], playing the role of the router's connection.
pub struct DirectRemote {
    events_tx: UnboundedSender<Result<TransportEvent>>,
    outgoing_rx: UnboundedReceiver<String>,
}

/// Creates a connected [`DirectTransport`] and its [`DirectRemote`].
pub fn direct_transport() -> (DirectTransport, DirectRemote) {
    let (events_tx, events_rx) = unbounded();
    let (outgoing_tx, outgoing_rx) = unbounded();
    (
        DirectTransport {
            events_rx: Mutex::new(Some(events_rx)),
            outgoing_tx,
        },
        DirectRemote {
            events_tx,
            outgoing_rx,
        },
    )
}

#[async_trait]
impl Transport for DirectTransport {
    async fn connect(&self) -> Result<TransportEventStream> {
        match self.events_rx.lock().await.take() {
            Some(events_rx) => Ok(events_rx.boxed()),
            None => Err(Error::msg("transport is already connected")),
        }
    }

    async fn send(&self, text: String) -> Result<()> {
        self.outgoing_tx
            .unbounded_send(text)
            .map_err(|_| Error::msg("remote end is disconnected"))
    }

    async fn close(&self) -> Result<()> {
        self.outgoing_tx.close_channel();
        Ok(())
    }
}

impl DirectRemote {
    fn emit(&self, event: Result<TransportEvent>) -> Result<()> {
        self.events_tx
            .unbounded_send(event)
            .map_err(|_| Error::msg("transport is disconnected"))
    }

    /// Signals that the connection is open.
    pub fn connected(&self) -> Result<()> {
        self.emit(Ok(TransportEvent::Connected))
    }

    /// Delivers a text frame to the transport.
    pub fn send_text<S>(&self, text: S) -> Result<()>
    where
        S: Into<String>,
    {
        self.emit(Ok(TransportEvent::IncomingText(text.into())))
    }

    /// Fails the connection with the given error.
    pub fn fail(&self, error: Error) -> Result<()> {
        self.emit(Err(error))?;
        self.disconnect();
        Ok(())
    }

    /// Closes the connection.
    pub fn disconnect(&self) {
        self.events_tx.close_channel();
    }

    /// Receives the next text frame sent by the transport.
    ///
    /// Returns [`None`] once the transport is closed or dropped.
    pub async fn recv(&mut self) -> Option<String> {
        self.outgoing_rx.next().await
    }
}
