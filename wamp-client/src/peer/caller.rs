use crate::{
    core::{
        error::PeerError,
        types::{
            Dictionary,
            List,
        },
        uri::Uri,
    },
    message::message::{
        CallMessage,
        Message,
        ResultMessage,
        tag,
    },
    peer::session::{
        WeakSession,
        match_reply,
    },
};

/// The caller role, which calls procedures registered by other peers.
pub struct Caller {
    session: WeakSession,
}

impl Caller {
    pub(crate) fn new(session: WeakSession) -> Self {
        Self { session }
    }

    /// Calls a procedure and waits for its result.
    ///
    /// An ERROR from the router or callee fails with [`PeerError::Command`].
    pub async fn call(
        &self,
        procedure: Uri,
        arguments: Option<List>,
        arguments_keyword: Option<Dictionary>,
    ) -> Result<ResultMessage, PeerError> {
        let request = self.session.next_request_id().await?;
        let message = Message::Call(CallMessage {
            request,
            options: Dictionary::default(),
            procedure,
            arguments,
            arguments_keyword,
        });
        let (result, _) = self
            .session
            .request(message, |message| {
                match_reply(message, tag::CALL, request, |message| match message {
                    Message::Result(message) if message.call_request == request => Some(message),
                    _ => None,
                })
            })
            .await?;
        Ok(result)
    }
}
