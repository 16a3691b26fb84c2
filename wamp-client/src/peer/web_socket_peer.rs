use anyhow::Result;

use crate::{
    peer::{
        client::Client,
        session::{
            Session,
            SessionConfig,
        },
    },
    serializer::serializer::new_serializer,
    transport::web_socket_transport::{
        WebSocketConfig,
        WebSocketTransport,
    },
};

/// Creates a new [`Client`] that connects to a router over a WebSocket.
pub fn new_web_socket_client(config: SessionConfig, web_socket: WebSocketConfig) -> Result<Client> {
    let serializer = new_serializer(web_socket.serializer);
    let session = Session::new(
        config,
        Box::new(WebSocketTransport::new(web_socket)),
        serializer,
    )?;
    Ok(Client::new(session))
}
