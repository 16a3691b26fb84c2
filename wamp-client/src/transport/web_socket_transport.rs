use anyhow::{
    Error,
    Result,
};
use async_trait::async_trait;
use futures_util::{
    SinkExt,
    StreamExt,
    lock::Mutex,
    stream::{
        self,
        SplitSink,
    },
};
use log::debug;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream,
    WebSocketStream,
    connect_async,
    tungstenite::{
        ClientRequestBuilder,
        Message,
        http::header::SEC_WEBSOCKET_PROTOCOL,
    },
};

use crate::{
    core::hash::HashMap,
    serializer::serializer::SerializerType,
    transport::transport::{
        Transport,
        TransportEvent,
        TransportEventStream,
    },
};

type WebSocketSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Configuration for a [`WebSocketTransport`].
#[derive(Debug, Default, Clone)]
pub struct WebSocketConfig {
    /// URL of the router, such as `ws://127.0.0.1:8080/ws`.
    pub url: String,
    /// Serializer requested as the WebSocket subprotocol.
    pub serializer: SerializerType,
    /// Additional headers to include in the WebSocket handshake request.
    pub headers: HashMap<String, String>,
}

/// A transport over a TCP stream using the WebSocket protocol.
///
/// Messages are exchanged as text frames. Ping and pong frames are answered by the socket library.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    sink: Mutex<Option<WebSocketSink>>,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            sink: Mutex::new(None),
        }
    }
}

fn transport_event(
    message: tokio_tungstenite::tungstenite::Result<Message>,
) -> Option<Result<TransportEvent>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(TransportEvent::IncomingText(
            text.as_str().to_owned(),
        ))),
        Ok(Message::Binary(_)) => Some(Err(Error::msg(
            "expected text frame, received binary",
        ))),
        Ok(_) => None,
        Err(err) => Some(Err(err.into())),
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self) -> Result<TransportEventStream> {
        let mut sink = self.sink.lock().await;
        if sink.is_some() {
            return Err(Error::msg("transport is already connected"));
        }

        let mut request = ClientRequestBuilder::new(self.config.url.as_str().try_into()?)
            .with_sub_protocol(self.config.serializer.uri().to_string());
        for (key, value) in &self.config.headers {
            request = request.with_header(key, value);
        }

        let (stream, response) = connect_async(request).await?;
        match response.headers().get(SEC_WEBSOCKET_PROTOCOL) {
            Some(protocol) => {
                let protocol = SerializerType::try_from(protocol.to_str()?).map_err(Error::msg)?;
                if protocol != self.config.serializer {
                    return Err(Error::msg(format!(
                        "router selected unexpected subprotocol {}",
                        protocol.uri()
                    )));
                }
            }
            None => return Err(Error::msg("handshake did not produce a sub-protocol")),
        }
        debug!("WebSocket connection established with {}", self.config.url);

        let (write, read) = stream.split();
        *sink = Some(write);

        let events = stream::once(async { Ok(TransportEvent::Connected) })
            .chain(read.filter_map(|message| async move { transport_event(message) }));
        Ok(events.boxed())
    }

    async fn send(&self, text: String) -> Result<()> {
        match self.sink.lock().await.as_mut() {
            Some(sink) => sink.send(Message::Text(text.into())).await.map_err(Error::new),
            None => Err(Error::msg("transport is not connected")),
        }
    }

    async fn close(&self) -> Result<()> {
        match self.sink.lock().await.take() {
            Some(mut sink) => sink.close().await.map_err(Error::new),
            None => Ok(()),
        }
    }
}
