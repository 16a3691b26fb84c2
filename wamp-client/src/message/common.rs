use crate::{
    core::{
        close::CloseReason,
        error::InteractionError,
        roles::PeerRoles,
        types::{
            Dictionary,
            Value,
            WampSerialize,
            WampSerializeError,
        },
        uri::Uri,
    },
    message::message::{
        AbortMessage,
        GoodbyeMessage,
        HelloMessage,
        Message,
    },
};

/// Builds a HELLO message announcing the given roles.
///
/// The agent is only included when non-empty.
pub fn hello(realm: Uri, roles: PeerRoles, agent: &str) -> Result<Message, WampSerializeError> {
    let mut details = Dictionary::default();
    if !agent.is_empty() {
        details.insert("agent".to_owned(), Value::String(agent.to_owned()));
    }
    details.insert("roles".to_owned(), roles.wamp_serialize()?);
    Ok(Message::Hello(HelloMessage { realm, details }))
}

pub fn abort_message_for_error(error: &InteractionError) -> Message {
    Message::Abort(AbortMessage {
        details: Dictionary::from_iter([("message".to_owned(), Value::String(error.to_string()))]),
        reason: error.uri(),
    })
}

pub fn goodbye_with_close_reason(close_reason: CloseReason) -> Message {
    Message::Goodbye(GoodbyeMessage {
        details: Dictionary::default(),
        reason: close_reason.uri(),
    })
}

pub fn goodbye_and_out() -> Message {
    goodbye_with_close_reason(CloseReason::GoodbyeAndOut)
}

#[cfg(test)]
mod common_test {
    use crate::{
        core::{
            error::InteractionError,
            roles::{
                PeerRole,
                PeerRoles,
            },
            types::Value,
            uri::Uri,
        },
        message::{
            common::{
                abort_message_for_error,
                goodbye_and_out,
                hello,
            },
            message::Message,
        },
    };

    #[test]
    fn builds_hello_with_roles_and_agent() {
        let message = hello(
            Uri::strict("realm1").unwrap(),
            PeerRoles::new([PeerRole::Caller]),
            "test-agent",
        )
        .unwrap();
        assert_eq!(
            serde_json::to_string(&Value::List(message.encode())).unwrap(),
            r#"[1,"realm1",{"agent":"test-agent","roles":{"caller":{}}}]"#
        );

        let message = hello(
            Uri::strict("realm1").unwrap(),
            PeerRoles::new([PeerRole::Caller]),
            "",
        )
        .unwrap();
        assert_matches::assert_matches!(message, Message::Hello(message) => {
            assert!(!message.details.contains_key("agent"));
        });
    }

    #[test]
    fn builds_close_messages() {
        assert_matches::assert_matches!(goodbye_and_out(), Message::Goodbye(message) => {
            assert_eq!(message.reason.as_str(), "wamp.close.goodbye_and_out");
        });
        assert_matches::assert_matches!(
            abort_message_for_error(&InteractionError::ProtocolViolation("bad".to_owned())),
            Message::Abort(message) => {
                assert_eq!(message.reason.as_str(), "wamp.error.protocol_violation");
                assert_eq!(
                    message.details.get("message"),
                    Some(&Value::String("protocol violation: bad".to_owned()))
                );
            }
        );
    }
}
