use std::sync::{
    Arc,
    Mutex,
    Weak,
};

use anyhow::{
    Error,
    Result,
};
use futures_util::StreamExt;
use log::{
    error,
    info,
    trace,
    warn,
};
use tokio::{
    sync::{
        RwLock,
        broadcast::{
            self,
            error::RecvError,
        },
        oneshot,
    },
    task::JoinHandle,
};

use crate::{
    core::{
        close::CloseReason,
        error::{
            InteractionError,
            PeerError,
        },
        hash::HashSet,
        id::{
            Id,
            IdGenerator,
            IdGeneratorType,
            new_id_generator,
        },
        roles::{
            PeerRole,
            PeerRoles,
        },
        types::Integer,
        uri::Uri,
    },
    message::{
        common::{
            abort_message_for_error,
            goodbye_and_out,
            goodbye_with_close_reason,
            hello,
        },
        message::{
            GoodbyeMessage,
            Message,
            WelcomeMessage,
        },
    },
    serializer::serializer::Serializer,
    transport::transport::{
        Transport,
        TransportEvent,
        TransportEventStream,
    },
};

const DEFAULT_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));

/// Configuration for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name of the session, mostly for logging.
    pub name: String,
    /// Agent name, communicated to the router.
    pub agent: String,
    /// Realm to join.
    pub realm: Uri,
    /// Roles implemented by the client.
    pub roles: HashSet<PeerRole>,
    /// How request IDs are generated.
    pub request_ids: IdGeneratorType,
    /// Number of inbound messages buffered for each listener before it starts lagging.
    pub message_buffer: usize,
}

impl SessionConfig {
    fn validate(&self) -> Result<()> {
        if self.roles.is_empty() {
            return Err(Error::msg("at least one role is required"));
        }
        if self.realm.is_wildcard() {
            return Err(Error::msg("realm cannot be a wildcard URI"));
        }
        if self.message_buffer == 0 {
            return Err(Error::msg("message buffer must not be empty"));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT.to_owned(),
            agent: DEFAULT_AGENT.to_owned(),
            realm: Uri::from_known("realm1"),
            roles: HashSet::from_iter(PeerRole::ALL),
            request_ids: IdGeneratorType::default(),
            message_buffer: 256,
        }
    }
}

/// The lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, but not yet connected.
    Idle,
    /// The transport is connecting or the HELLO handshake is in progress.
    Connecting,
    /// The router welcomed the session.
    Established,
    /// A GOODBYE was sent and the session is waiting for the router's acknowledgement.
    Closing,
    /// The session ended. Sessions cannot be reused.
    Closed,
}

impl SessionState {
    fn allowed_state_transition(&self, next: &Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Connecting) => true,
            (Self::Connecting, Self::Established) => true,
            (Self::Connecting, Self::Closed) => true,
            (Self::Established, Self::Closing) => true,
            (Self::Established, Self::Closed) => true,
            (Self::Closing, Self::Closed) => true,
            _ => false,
        }
    }
}

struct SessionInner {
    config: SessionConfig,
    transport: Box<dyn Transport>,
    serializer: Box<dyn Serializer>,
    id_generator: Box<dyn IdGenerator>,

    state: RwLock<SessionState>,
    session_id: RwLock<Option<Id>>,

    // Moved into the reader task on connect, so that the channel closes when the task ends.
    message_tx: Mutex<Option<broadcast::Sender<Message>>>,
    message_rx: broadcast::Receiver<Message>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl SessionInner {
    fn stop_reader(&self) {
        if let Ok(mut reader) = self.reader.lock() {
            if let Some(reader) = reader.take() {
                reader.abort();
            }
        }
    }

    async fn transition_state(&self, next: SessionState) -> Result<(), PeerError> {
        let mut state = self.state.write().await;
        if !state.allowed_state_transition(&next) {
            return Err(PeerError::not_valid(format!(
                "session {} cannot move from {:?} to {next:?}",
                self.config.name, *state
            )));
        }
        trace!(
            "Session {} moved from {:?} to {next:?}",
            self.config.name, *state
        );
        *state = next;
        Ok(())
    }

    async fn close_state(&self) {
        let mut state = self.state.write().await;
        if *state != SessionState::Closed {
            trace!(
                "Session {} moved from {:?} to {:?}",
                self.config.name,
                *state,
                SessionState::Closed
            );
            *state = SessionState::Closed;
        }
    }

    async fn send_unchecked(&self, message: Message) -> Result<(), PeerError> {
        let text = self
            .serializer
            .serialize(&message)
            .map_err(PeerError::Serialization)?;
        trace!(
            "Session {} sending {} message",
            self.config.name,
            message.message_name()
        );
        self.transport.send(text).await.map_err(|err| {
            InteractionError::NetworkFailure(format!(
                "failed to send {} message: {err:#}",
                message.message_name()
            ))
            .into()
        })
    }

    async fn handle_text(&self, text: &str, message_tx: &broadcast::Sender<Message>) {
        let message = match self.serializer.deserialize(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    "Session {} dropped a message that failed to deserialize: {err:#}",
                    self.config.name
                );
                return;
            }
        };
        trace!(
            "Session {} received {} message",
            self.config.name,
            message.message_name()
        );

        let reply = match &message {
            Message::Goodbye(goodbye) => self.handle_goodbye(goodbye).await,
            _ => None,
        };

        if let Some(reply) = reply {
            if let Err(err) = self.send_unchecked(reply).await {
                error!(
                    "Session {} failed to acknowledge GOODBYE: {err}",
                    self.config.name
                );
            }
        }

        // Sending only fails when nobody is listening.
        message_tx.send(message).ok();
    }

    async fn handle_goodbye(&self, goodbye: &GoodbyeMessage) -> Option<Message> {
        let mut state = self.state.write().await;
        let awaiting_ack = *state == SessionState::Closing;
        let ack = CloseReason::from_uri(&goodbye.reason)
            .is_some_and(|reason| reason.acknowledges_goodbye(awaiting_ack));
        match *state {
            SessionState::Closing if ack => {
                trace!("Session {} received GOODBYE acknowledgement", self.config.name);
                *state = SessionState::Closed;
                None
            }
            SessionState::Established | SessionState::Closing => {
                info!(
                    "Router closed session {} with {}",
                    self.config.name, goodbye.reason
                );
                *state = SessionState::Closed;
                Some(goodbye_and_out())
            }
            _ => {
                warn!(
                    "Session {} ignored GOODBYE in state {:?}",
                    self.config.name, *state
                );
                None
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

async fn read_loop(
    session: Weak<SessionInner>,
    mut events: TransportEventStream,
    message_tx: broadcast::Sender<Message>,
    connected_tx: oneshot::Sender<Result<(), PeerError>>,
) {
    let mut connected_tx = Some(connected_tx);
    while let Some(event) = events.next().await {
        let session = match session.upgrade() {
            Some(session) => session,
            None => break,
        };
        match event {
            Ok(TransportEvent::Connected) => {
                if let Some(connected_tx) = connected_tx.take() {
                    connected_tx.send(Ok(())).ok();
                }
            }
            Ok(TransportEvent::IncomingText(text)) => {
                session.handle_text(&text, &message_tx).await;
            }
            Err(err) => {
                error!(
                    "Session {} transport failed: {err:#}",
                    session.config.name
                );
                if let Some(connected_tx) = connected_tx.take() {
                    connected_tx
                        .send(Err(InteractionError::NetworkFailure(format!("{err:#}")).into()))
                        .ok();
                }
                break;
            }
        }
    }

    if let Some(session) = session.upgrade() {
        info!("Session {} disconnected", session.config.name);
        session.close_state().await;
    }
}

/// Waits for the first message accepted by `matcher`.
///
/// Messages rejected by the matcher are skipped. Fails once the session's inbound channel closes.
pub(crate) async fn wait_for_reply<T, F>(
    receiver: &mut broadcast::Receiver<Message>,
    name: &str,
    mut matcher: F,
) -> Result<T, PeerError>
where
    F: FnMut(Message) -> Option<Result<T, PeerError>>,
{
    loop {
        match receiver.recv().await {
            Ok(message) => {
                if let Some(result) = matcher(message) {
                    return result;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("Session {name} skipped {skipped} message(s) while waiting for a reply");
            }
            Err(RecvError::Closed) => {
                return Err(PeerError::not_valid(format!(
                    "session {name} closed before a reply was received"
                )));
            }
        }
    }
}

/// Matches the reply to a request, or the ERROR rejecting it.
pub(crate) fn match_reply<T, F>(
    message: Message,
    request_type: Integer,
    request: Id,
    reply: F,
) -> Option<Result<T, PeerError>>
where
    F: FnOnce(Message) -> Option<T>,
{
    match message {
        Message::Error(error) if error.request_type == request_type && error.request == request => {
            Some(Err(PeerError::Command(error)))
        }
        message => reply(message).map(Ok),
    }
}

/// A WAMP session with a router.
///
/// Owns the transport and serializer, and republishes every inbound message to all listeners.
/// Cloning produces another handle to the same session. Once every handle is dropped, the session
/// stops reading from its transport and all pending requests and streams end.
///
/// A session is single-use: after it closes, a new session must be created to reconnect.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// A weak handle to a [`Session`], which does not keep the session alive.
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl Session {
    /// Creates a new session over the given transport.
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn Transport>,
        serializer: Box<dyn Serializer>,
    ) -> Result<Self> {
        config.validate()?;
        let (message_tx, message_rx) = broadcast::channel(config.message_buffer);
        let id_generator = new_id_generator(config.request_ids);
        Ok(Self {
            inner: Arc::new(SessionInner {
                config,
                transport,
                serializer,
                id_generator,
                state: RwLock::new(SessionState::Idle),
                session_id: RwLock::new(None),
                message_tx: Mutex::new(Some(message_tx)),
                message_rx,
                reader: Mutex::new(None),
            }),
        })
    }

    /// Name of the session, mostly for logging.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// The realm the session joins.
    pub fn realm(&self) -> &Uri {
        &self.inner.config.realm
    }

    /// The session's configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// The current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.inner.state.read().await
    }

    /// The session ID given by the router, once established.
    pub async fn session_id(&self) -> Option<Id> {
        *self.inner.session_id.read().await
    }

    /// Creates a weak handle to the session.
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribes to all inbound messages received from this point on.
    ///
    /// The receiver closes when the session stops reading from its transport.
    pub fn messages(&self) -> broadcast::Receiver<Message> {
        self.inner.message_rx.resubscribe()
    }

    /// Generates a new request ID.
    pub async fn next_request_id(&self) -> Result<Id, PeerError> {
        self.inner
            .id_generator
            .next_id()
            .await
            .ok_or_else(|| PeerError::not_valid("request ids are exhausted"))
    }

    /// Connects the transport and joins the realm.
    ///
    /// Sends HELLO as soon as the transport is connected and resolves with the router's WELCOME.
    /// An ABORT fails with [`PeerError::Aborted`]. Any other reply is a protocol violation, which
    /// aborts the session.
    pub async fn connect(&self) -> Result<WelcomeMessage, PeerError> {
        self.inner.transition_state(SessionState::Connecting).await?;
        let result = self.connect_internal().await;
        if let Err(err) = &result {
            warn!("Session {} failed to connect: {err}", self.name());
            self.shutdown().await;
        }
        result
    }

    async fn connect_internal(&self) -> Result<WelcomeMessage, PeerError> {
        let events = self.inner.transport.connect().await.map_err(|err| {
            PeerError::from(InteractionError::NetworkFailure(format!("{err:#}")))
        })?;
        let message_tx = self
            .inner
            .message_tx
            .lock()
            .ok()
            .and_then(|mut message_tx| message_tx.take())
            .ok_or_else(|| PeerError::not_valid("session was already connected"))?;

        let mut receiver = self.messages();
        let (connected_tx, connected_rx) = oneshot::channel();
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            events,
            message_tx,
            connected_tx,
        ));
        if let Ok(mut handle) = self.inner.reader.lock() {
            *handle = Some(reader);
        }

        connected_rx.await.map_err(|_| {
            PeerError::from(InteractionError::NetworkFailure(
                "transport closed before connecting".to_owned(),
            ))
        })??;

        let config = &self.inner.config;
        let message = hello(
            config.realm.clone(),
            PeerRoles::new(config.roles.iter().copied()),
            &config.agent,
        )
        .map_err(|err| PeerError::Serialization(err.into()))?;
        self.inner.send_unchecked(message).await?;

        let reply = loop {
            match receiver.recv().await {
                Ok(message) => break message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Session {} skipped {skipped} message(s) during the handshake",
                        self.name()
                    );
                }
                Err(RecvError::Closed) => {
                    return Err(InteractionError::NetworkFailure(
                        "transport closed during the handshake".to_owned(),
                    )
                    .into());
                }
            }
        };

        match reply {
            Message::Welcome(welcome) => {
                *self.inner.session_id.write().await = Some(welcome.session);
                self.inner
                    .transition_state(SessionState::Established)
                    .await?;
                info!(
                    "Session {} established with id {} in realm {}",
                    self.name(),
                    welcome.session,
                    self.realm()
                );
                Ok(welcome)
            }
            Message::Abort(abort) => {
                warn!(
                    "Router aborted session {} with {}",
                    self.name(),
                    abort.reason
                );
                Err(PeerError::Aborted(abort))
            }
            message => {
                let error = InteractionError::ProtocolViolation(format!(
                    "received {} message instead of WELCOME",
                    message.message_name()
                ));
                self.inner
                    .send_unchecked(abort_message_for_error(&error))
                    .await
                    .ok();
                Err(error.into())
            }
        }
    }

    /// Sends a message to the router.
    ///
    /// Fails if the session is not established.
    pub async fn send(&self, message: Message) -> Result<(), PeerError> {
        let state = self.state().await;
        if state != SessionState::Established {
            return Err(PeerError::not_valid(format!(
                "cannot send {} message while session {} is {state:?}",
                message.message_name(),
                self.name()
            )));
        }
        self.inner.send_unchecked(message).await
    }

    async fn start_request(
        &self,
        message: Message,
    ) -> Result<broadcast::Receiver<Message>, PeerError> {
        // Listen before sending, so that the reply cannot be missed.
        let receiver = self.messages();
        self.send(message).await?;
        Ok(receiver)
    }

    /// Sends a request and waits for the first inbound message accepted by `matcher`.
    ///
    /// Other messages are ignored, so concurrent requests may complete in any order.
    pub async fn request<T, F>(&self, message: Message, matcher: F) -> Result<T, PeerError>
    where
        F: FnMut(Message) -> Option<Result<T, PeerError>>,
    {
        let mut receiver = self.start_request(message).await?;
        wait_for_reply(&mut receiver, self.name(), matcher).await
    }

    /// Leaves the realm by sending GOODBYE and waiting for the router's GOODBYE.
    ///
    /// The router's reply is normally `wamp.close.goodbye_and_out`, though `wamp.close.normal` is
    /// also accepted as an acknowledgement. Any other GOODBYE means the router closed the session
    /// on its own, which fails with [`PeerError::Closed`].
    pub async fn say_goodbye(&self, reason: CloseReason) -> Result<GoodbyeMessage, PeerError> {
        let mut receiver = self.messages();
        self.inner.transition_state(SessionState::Closing).await?;
        if let Err(err) = self
            .inner
            .send_unchecked(goodbye_with_close_reason(reason))
            .await
        {
            self.shutdown().await;
            return Err(err);
        }
        // A GOODBYE that is not an acknowledgement was answered by the reader, and the session is
        // closed either way.
        let result = wait_for_reply(&mut receiver, self.name(), |message| match message {
            Message::Goodbye(goodbye)
                if CloseReason::from_uri(&goodbye.reason)
                    .is_some_and(|reason| reason.acknowledges_goodbye(true)) =>
            {
                Some(Ok(goodbye))
            }
            Message::Goodbye(goodbye) => Some(Err(PeerError::Closed(goodbye))),
            _ => None,
        })
        .await;
        if result.is_ok() {
            info!("Session {} left realm {}", self.name(), self.realm());
        }
        self.shutdown().await;
        result
    }

    async fn shutdown(&self) {
        self.inner.close_state().await;
        self.inner.stop_reader();
        if let Err(err) = self.inner.transport.close().await {
            warn!(
                "Session {} failed to close its transport: {err:#}",
                self.name()
            );
        }
    }

    /// Tears the session down without sending any further messages.
    ///
    /// Pending requests fail and open streams end.
    pub async fn cancel(&self) {
        info!("Session {} was cancelled", self.name());
        self.shutdown().await;
    }
}

impl WeakSession {
    /// Upgrades to a strong handle, if the session is still alive.
    pub fn upgrade(&self) -> Result<Session, PeerError> {
        self.inner
            .upgrade()
            .map(|inner| Session { inner })
            .ok_or_else(|| PeerError::not_valid("session was dropped"))
    }

    /// Sends a request and waits for the first inbound message accepted by `matcher`.
    ///
    /// The session is only kept alive while sending. The receiver is returned, so that streams
    /// can continue from the reply without missing messages.
    pub(crate) async fn request<T, F>(
        &self,
        message: Message,
        matcher: F,
    ) -> Result<(T, broadcast::Receiver<Message>), PeerError>
    where
        F: FnMut(Message) -> Option<Result<T, PeerError>>,
    {
        let (name, mut receiver) = {
            let session = self.upgrade()?;
            let receiver = session.start_request(message).await?;
            (session.name().to_owned(), receiver)
        };
        let value = wait_for_reply(&mut receiver, &name, matcher).await?;
        Ok((value, receiver))
    }

    /// Sends a message without waiting for any reply.
    pub(crate) async fn send(&self, message: Message) -> Result<(), PeerError> {
        self.upgrade()?.send(message).await
    }

    /// Generates a new request ID.
    pub(crate) async fn next_request_id(&self) -> Result<Id, PeerError> {
        self.upgrade()?.next_request_id().await
    }

    /// Name of the session, if it is still alive.
    pub(crate) fn name(&self) -> String {
        self.inner
            .upgrade()
            .map(|inner| inner.config.name.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod session_test {
    use crate::{
        core::{
            error::PeerError,
            hash::HashSet,
            uri::Uri,
        },
        message::{
            common::goodbye_and_out,
            message::Message,
        },
        peer::session::{
            Session,
            SessionConfig,
            SessionState,
        },
        serializer::serializer::{
            SerializerType,
            new_serializer,
        },
        transport::direct_transport::direct_transport,
    };

    #[test]
    fn default_config_is_valid() {
        let config = SessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.roles.len(), 4);
        assert!(config.agent.starts_with("wamp-client-"));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SessionConfig {
            roles: HashSet::default(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            realm: Uri::wildcard("com..realm").unwrap(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SessionConfig {
            message_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn allows_lifecycle_transitions() {
        assert!(SessionState::Idle.allowed_state_transition(&SessionState::Connecting));
        assert!(SessionState::Connecting.allowed_state_transition(&SessionState::Established));
        assert!(SessionState::Connecting.allowed_state_transition(&SessionState::Closed));
        assert!(SessionState::Established.allowed_state_transition(&SessionState::Closing));
        assert!(SessionState::Closing.allowed_state_transition(&SessionState::Closed));

        assert!(!SessionState::Idle.allowed_state_transition(&SessionState::Established));
        assert!(!SessionState::Closed.allowed_state_transition(&SessionState::Connecting));
        assert!(!SessionState::Closing.allowed_state_transition(&SessionState::Established));
    }

    #[tokio::test]
    async fn fails_to_send_before_established() {
        let (transport, _remote) = direct_transport();
        let session = Session::new(
            SessionConfig::default(),
            Box::new(transport),
            new_serializer(SerializerType::Json),
        )
        .unwrap();
        assert_eq!(session.state().await, SessionState::Idle);
        assert_matches::assert_matches!(
            session.send(goodbye_and_out()).await,
            Err(PeerError::NotValid(_))
        );
    }

    #[tokio::test]
    async fn cannot_say_goodbye_before_established() {
        let (transport, _remote) = direct_transport();
        let session = Session::new(
            SessionConfig::default(),
            Box::new(transport),
            new_serializer(SerializerType::Json),
        )
        .unwrap();
        assert_matches::assert_matches!(
            session.say_goodbye(Default::default()).await,
            Err(PeerError::NotValid(_))
        );
    }

    #[tokio::test]
    async fn messages_stream_closes_after_cancel() {
        let (transport, remote) = direct_transport();
        let session = Session::new(
            SessionConfig::default(),
            Box::new(transport),
            new_serializer(SerializerType::Json),
        )
        .unwrap();
        let mut messages = session.messages();

        remote.connected().unwrap();
        let connect = tokio::spawn({
            let session = session.clone();
            async move { session.connect().await }
        });
        remote.send_text(r#"[2,314,{}]"#).unwrap();
        assert_matches::assert_matches!(connect.await.unwrap(), Ok(welcome) => {
            assert_eq!(welcome.session.value(), 314);
        });
        assert_matches::assert_matches!(messages.recv().await, Ok(Message::Welcome(_)));

        session.cancel().await;
        assert_eq!(session.state().await, SessionState::Closed);
        assert_matches::assert_matches!(
            messages.recv().await,
            Err(tokio::sync::broadcast::error::RecvError::Closed)
        );
    }
}
