use std::{
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

use futures_util::Stream;
use log::{
    debug,
    warn,
};
use tokio::{
    sync::{
        broadcast::{
            self,
            error::RecvError,
        },
        mpsc,
    },
    task::JoinHandle,
};

use crate::{
    core::{
        error::PeerError,
        id::Id,
        types::{
            Dictionary,
            List,
        },
        uri::Uri,
    },
    message::message::{
        ErrorMessage,
        InvocationMessage,
        Message,
        RegisterMessage,
        UnregisterMessage,
        UnregisteredMessage,
        YieldMessage,
        tag,
    },
    peer::{
        cleanup::Cleanup,
        session::{
            WeakSession,
            match_reply,
        },
    },
};

/// The callee role, which registers procedures for other peers to call.
pub struct Callee {
    session: WeakSession,
}

impl Callee {
    pub(crate) fn new(session: WeakSession) -> Self {
        Self { session }
    }

    /// Registers a procedure.
    ///
    /// Invocations are delivered through the returned [`Registration`] until it is cancelled or
    /// dropped, at which point the callee unregisters in the background and reports the outcome
    /// to `on_unregister`.
    pub async fn register<F>(
        &self,
        procedure: Uri,
        on_unregister: F,
    ) -> Result<Registration, PeerError>
    where
        F: FnOnce(Result<UnregisteredMessage, PeerError>) + Send + 'static,
    {
        let request = self.session.next_request_id().await?;
        let message = Message::Register(RegisterMessage {
            request,
            options: Dictionary::default(),
            procedure: procedure.clone(),
        });
        let (registration, message_rx) = self
            .session
            .request(message, |message| {
                match_reply(message, tag::REGISTER, request, |message| match message {
                    Message::Registered(message) if message.register_request == request => {
                        Some(message.registration)
                    }
                    _ => None,
                })
            })
            .await?;
        debug!(
            "Session {} registered {procedure} with registration {registration}",
            self.session.name()
        );

        let (invocation_tx, invocation_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_invocations(
            self.session.clone(),
            registration,
            message_rx,
            invocation_tx,
        ));
        let cleanup = Cleanup::new(
            self.session.clone(),
            tag::UNREGISTER,
            move |request| {
                Message::Unregister(UnregisterMessage {
                    request,
                    registered_registration: registration,
                })
            },
            |message, request| match message {
                Message::Unregistered(message) if message.unregister_request == request => {
                    Some(message)
                }
                _ => None,
            },
            on_unregister,
        );
        Ok(Registration {
            id: registration,
            procedure,
            invocation_rx,
            forwarder,
            cleanup: Some(cleanup),
        })
    }
}

async fn forward_invocations(
    session: WeakSession,
    registration: Id,
    mut message_rx: broadcast::Receiver<Message>,
    invocation_tx: mpsc::UnboundedSender<Invocation>,
) {
    loop {
        match message_rx.recv().await {
            Ok(Message::Invocation(message)) if message.registered_registration == registration => {
                let responder = Responder {
                    session: session.clone(),
                    request: message.request,
                };
                if invocation_tx.send(Invocation { message, responder }).is_err() {
                    break;
                }
            }
            Ok(_) => (),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Registration {registration} skipped {skipped} message(s)");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// Sends the outcome of a single invocation back to the router.
///
/// Each responder answers exactly one invocation, so answering consumes it.
pub struct Responder {
    session: WeakSession,
    request: Id,
}

impl Responder {
    /// The request ID of the invocation being answered.
    pub fn request(&self) -> Id {
        self.request
    }

    /// Yields a result with positional arguments.
    pub async fn respond(self, arguments: List) -> Result<(), PeerError> {
        self.respond_with_keywords(Some(arguments), None).await
    }

    /// Yields a result with positional and keyword arguments.
    pub async fn respond_with_keywords(
        self,
        arguments: Option<List>,
        arguments_keyword: Option<Dictionary>,
    ) -> Result<(), PeerError> {
        self.session
            .send(Message::Yield(YieldMessage {
                invocation_request: self.request,
                options: Dictionary::default(),
                arguments,
                arguments_keyword,
            }))
            .await
    }

    /// Fails the invocation with an error URI.
    pub async fn reject(
        self,
        error: Uri,
        arguments: Option<List>,
        arguments_keyword: Option<Dictionary>,
    ) -> Result<(), PeerError> {
        self.session
            .send(Message::Error(ErrorMessage {
                request_type: tag::INVOCATION,
                request: self.request,
                details: Dictionary::default(),
                error,
                arguments,
                arguments_keyword,
            }))
            .await
    }
}

/// An invocation of a registered procedure, paired with its responder.
pub struct Invocation {
    pub message: InvocationMessage,
    pub responder: Responder,
}

/// A registration of a procedure, which is a stream of invocations.
///
/// The stream ends when the session closes. Cancelling or dropping the registration unregisters
/// the procedure.
pub struct Registration {
    id: Id,
    procedure: Uri,
    invocation_rx: mpsc::UnboundedReceiver<Invocation>,
    forwarder: JoinHandle<()>,
    cleanup: Option<Cleanup<UnregisteredMessage>>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("procedure", &self.procedure)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// The registration ID given by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The registered procedure.
    pub fn procedure(&self) -> &Uri {
        &self.procedure
    }

    /// Waits for the next invocation.
    ///
    /// Returns [`None`] once the registration is cancelled or the session closes.
    pub async fn next_invocation(&mut self) -> Option<Invocation> {
        if self.cleanup.is_none() {
            return None;
        }
        self.invocation_rx.recv().await
    }

    /// Stops delivering invocations and unregisters the procedure in the background.
    ///
    /// Only the first call has any effect.
    pub fn cancel(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            self.forwarder.abort();
            self.invocation_rx.close();
            cleanup.run();
        }
    }
}

impl Stream for Registration {
    type Item = Invocation;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cleanup.is_none() {
            return Poll::Ready(None);
        }
        self.invocation_rx.poll_recv(cx)
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.cancel();
    }
}
