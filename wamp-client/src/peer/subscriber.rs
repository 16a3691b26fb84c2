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
        types::Dictionary,
        uri::Uri,
    },
    message::message::{
        EventMessage,
        Message,
        SubscribeMessage,
        UnsubscribeMessage,
        UnsubscribedMessage,
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

/// The subscriber role, which receives events published to topics.
pub struct Subscriber {
    session: WeakSession,
}

impl Subscriber {
    pub(crate) fn new(session: WeakSession) -> Self {
        Self { session }
    }

    /// Subscribes to a topic.
    ///
    /// Events are delivered through the returned [`Subscription`] until it is cancelled or
    /// dropped, at which point the subscriber unsubscribes in the background and reports the
    /// outcome to `on_unsubscribe`.
    pub async fn subscribe<F>(&self, topic: Uri, on_unsubscribe: F) -> Result<Subscription, PeerError>
    where
        F: FnOnce(Result<UnsubscribedMessage, PeerError>) + Send + 'static,
    {
        let request = self.session.next_request_id().await?;
        let message = Message::Subscribe(SubscribeMessage {
            request,
            options: Dictionary::default(),
            topic: topic.clone(),
        });
        let (subscription, message_rx) = self
            .session
            .request(message, |message| {
                match_reply(message, tag::SUBSCRIBE, request, |message| match message {
                    Message::Subscribed(message) if message.subscribe_request == request => {
                        Some(message.subscription)
                    }
                    _ => None,
                })
            })
            .await?;
        debug!(
            "Session {} subscribed to {topic} with subscription {subscription}",
            self.session.name()
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_events(subscription, message_rx, event_tx));
        let cleanup = Cleanup::new(
            self.session.clone(),
            tag::UNSUBSCRIBE,
            move |request| {
                Message::Unsubscribe(UnsubscribeMessage {
                    request,
                    subscribed_subscription: subscription,
                })
            },
            |message, request| match message {
                Message::Unsubscribed(message) if message.unsubscribe_request == request => {
                    Some(message)
                }
                _ => None,
            },
            on_unsubscribe,
        );
        Ok(Subscription {
            id: subscription,
            topic,
            event_rx,
            forwarder,
            cleanup: Some(cleanup),
        })
    }
}

async fn forward_events(
    subscription: Id,
    mut message_rx: broadcast::Receiver<Message>,
    event_tx: mpsc::UnboundedSender<EventMessage>,
) {
    loop {
        match message_rx.recv().await {
            Ok(Message::Event(event)) if event.subscribed_subscription == subscription => {
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            Ok(_) => (),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Subscription {subscription} skipped {skipped} message(s)");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

/// A subscription to a topic, which is a stream of events.
///
/// The stream ends when the session closes. Cancelling or dropping the subscription unsubscribes
/// from the topic.
pub struct Subscription {
    id: Id,
    topic: Uri,
    event_rx: mpsc::UnboundedReceiver<EventMessage>,
    forwarder: JoinHandle<()>,
    cleanup: Option<Cleanup<UnsubscribedMessage>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// The subscription ID given by the router.
    pub fn id(&self) -> Id {
        self.id
    }

    /// The subscribed topic.
    pub fn topic(&self) -> &Uri {
        &self.topic
    }

    /// Waits for the next event.
    ///
    /// Returns [`None`] once the subscription is cancelled or the session closes.
    pub async fn next_event(&mut self) -> Option<EventMessage> {
        if self.cleanup.is_none() {
            return None;
        }
        self.event_rx.recv().await
    }

    /// Stops delivering events and unsubscribes from the topic in the background.
    ///
    /// Only the first call has any effect.
    pub fn cancel(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            self.forwarder.abort();
            self.event_rx.close();
            cleanup.run();
        }
    }
}

impl Stream for Subscription {
    type Item = EventMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cleanup.is_none() {
            return Poll::Ready(None);
        }
        self.event_rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
