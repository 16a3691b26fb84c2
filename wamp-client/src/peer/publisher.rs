use log::debug;

use crate::{
    core::{
        error::PeerError,
        types::{
            Dictionary,
            List,
            Value,
        },
        uri::Uri,
    },
    message::message::{
        Message,
        PublishMessage,
        PublishedMessage,
        tag,
    },
    peer::session::{
        WeakSession,
        match_reply,
    },
};

/// The publisher role, which publishes events to topics.
pub struct Publisher {
    session: WeakSession,
}

impl Publisher {
    pub(crate) fn new(session: WeakSession) -> Self {
        Self { session }
    }

    /// Publishes an event to a topic, asking the router to acknowledge the publication.
    ///
    /// Resolves with the router's PUBLISHED message.
    pub async fn publish(
        &self,
        topic: Uri,
        arguments: Option<List>,
        arguments_keyword: Option<Dictionary>,
    ) -> Result<PublishedMessage, PeerError> {
        let request = self.session.next_request_id().await?;
        let message = Message::Publish(PublishMessage {
            request,
            options: Dictionary::from_iter([("acknowledge".to_owned(), Value::Bool(true))]),
            topic,
            arguments,
            arguments_keyword,
        });
        let (published, _) = self
            .session
            .request(message, |message| {
                match_reply(message, tag::PUBLISH, request, |message| match message {
                    Message::Published(message) if message.publish_request == request => {
                        Some(message)
                    }
                    _ => None,
                })
            })
            .await?;
        debug!(
            "Session {} published {} to the router",
            self.session.name(),
            published.publication
        );
        Ok(published)
    }

    /// Publishes an event to a topic without asking for an acknowledgement.
    ///
    /// Resolves as soon as the message is sent.
    pub async fn publish_without_ack(
        &self,
        topic: Uri,
        arguments: Option<List>,
        arguments_keyword: Option<Dictionary>,
    ) -> Result<(), PeerError> {
        let request = self.session.next_request_id().await?;
        self.session
            .send(Message::Publish(PublishMessage {
                request,
                options: Dictionary::default(),
                topic,
                arguments,
                arguments_keyword,
            }))
            .await
    }
}
