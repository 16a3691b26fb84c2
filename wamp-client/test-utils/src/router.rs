use std::time::Duration;

use anyhow::{
    Error,
    Result,
};
use wamp_client::{
    core::{
        id::Id,
        types::{
            Dictionary,
            Integer,
        },
    },
    message::message::{
        Message,
        WelcomeMessage,
    },
    peer::{
        Client,
        Session,
        SessionConfig,
    },
    serializer::{
        json::JsonSerializer,
        serializer::Serializer,
    },
    transport::direct_transport::{
        DirectRemote,
        direct_transport,
    },
};

/// The router side of a direct connection, driven step by step from a test.
pub struct ScriptedRouter {
    remote: DirectRemote,
    serializer: JsonSerializer,
}

impl ScriptedRouter {
    /// Receives the next frame sent by the client.
    ///
    /// Returns [`None`] once the client closes its transport.
    pub async fn next_text(&mut self) -> Option<String> {
        self.remote.recv().await
    }

    /// Receives and decodes the next message sent by the client.
    pub async fn recv(&mut self) -> Result<Message> {
        let text = self
            .next_text()
            .await
            .ok_or_else(|| Error::msg("client closed the connection"))?;
        self.serializer.deserialize(&text)
    }

    /// Receives the next message, if one arrives within `timeout`.
    pub async fn try_recv(&mut self, timeout: Duration) -> Option<Message> {
        let text = tokio::time::timeout(timeout, self.next_text())
            .await
            .ok()??;
        self.serializer.deserialize(&text).ok()
    }

    /// Sends a message to the client.
    pub fn send(&self, message: Message) -> Result<()> {
        self.remote.send_text(self.serializer.serialize(&message)?)
    }

    /// Sends a raw frame to the client.
    pub fn send_text(&self, text: &str) -> Result<()> {
        self.remote.send_text(text)
    }

    /// Closes the connection from the router side.
    pub fn disconnect(&self) {
        self.remote.disconnect();
    }
}

/// Creates a client over a direct transport that is connected, but has not joined a realm.
pub fn create_client(config: SessionConfig) -> Result<(Client, ScriptedRouter)> {
    let (transport, remote) = direct_transport();
    let session = Session::new(
        config,
        Box::new(transport),
        Box::new(JsonSerializer::default()),
    )?;
    remote.connected()?;
    Ok((
        Client::new(session),
        ScriptedRouter {
            remote,
            serializer: JsonSerializer::default(),
        },
    ))
}

/// Joins the realm by answering the client's HELLO with a WELCOME.
pub async fn establish(
    client: &Client,
    router: &mut ScriptedRouter,
    session_id: Integer,
) -> Result<()> {
    let session = client.session().clone();
    let connect = tokio::spawn(async move { session.connect().await });
    match router.recv().await? {
        Message::Hello(_) => (),
        message => {
            return Err(Error::msg(format!(
                "expected HELLO, received {}",
                message.message_name()
            )));
        }
    }
    router.send(Message::Welcome(WelcomeMessage {
        session: Id::from(session_id),
        details: Dictionary::default(),
    }))?;
    connect.await??;
    Ok(())
}

/// Creates a client with the default configuration that has joined the realm.
pub async fn connected_client() -> Result<(Client, ScriptedRouter)> {
    let (client, mut router) = create_client(SessionConfig::default())?;
    establish(&client, &mut router, 1).await?;
    Ok((client, router))
}
