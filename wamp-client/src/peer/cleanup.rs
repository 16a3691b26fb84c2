use log::{
    debug,
    error,
};
use tokio::runtime::Handle;

use crate::{
    core::{
        error::PeerError,
        id::Id,
        types::Integer,
    },
    message::message::Message,
    peer::session::{
        WeakSession,
        match_reply,
    },
};

type RequestBuilder = Box<dyn FnOnce(Id) -> Message + Send>;
type Completion<T> = Box<dyn FnOnce(Result<T, PeerError>) + Send>;

/// The request-response exchange that ends a subscription or registration.
///
/// Runs at most once, in the background, and reports its outcome to the completion callback.
pub(crate) struct Cleanup<T> {
    session: WeakSession,
    request_type: Integer,
    request: RequestBuilder,
    reply: fn(Message, Id) -> Option<T>,
    on_complete: Completion<T>,
}

impl<T> Cleanup<T>
where
    T: Send + 'static,
{
    pub fn new<R, F>(
        session: WeakSession,
        request_type: Integer,
        request: R,
        reply: fn(Message, Id) -> Option<T>,
        on_complete: F,
    ) -> Self
    where
        R: FnOnce(Id) -> Message + Send + 'static,
        F: FnOnce(Result<T, PeerError>) + Send + 'static,
    {
        Self {
            session,
            request_type,
            request: Box::new(request),
            reply,
            on_complete: Box::new(on_complete),
        }
    }

    /// Schedules the exchange on the current runtime.
    pub fn run(self) {
        let Self {
            session,
            request_type,
            request,
            reply,
            on_complete,
        } = self;
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = exchange(&session, request_type, request, reply).await;
                    if let Err(err) = &result {
                        error!(
                            "Session {} failed to clean up after stream: {err}",
                            session.name()
                        );
                    }
                    on_complete(result);
                });
            }
            Err(_) => {
                on_complete(Err(PeerError::not_valid(
                    "stream was dropped outside of an async runtime",
                )));
            }
        }
    }
}

async fn exchange<T>(
    session: &WeakSession,
    request_type: Integer,
    request: RequestBuilder,
    reply: fn(Message, Id) -> Option<T>,
) -> Result<T, PeerError> {
    let id = session.next_request_id().await?;
    let message = request(id);
    debug!(
        "Session {} sending {} to end stream",
        session.name(),
        message.message_name()
    );
    let (value, _) = session
        .request(message, |message| {
            match_reply(message, request_type, id, |message| reply(message, id))
        })
        .await?;
    Ok(value)
}
