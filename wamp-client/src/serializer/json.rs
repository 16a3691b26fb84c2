use anyhow::{
    Error,
    Result,
};

use crate::{
    core::types::Value,
    message::message::Message,
    serializer::serializer::Serializer,
};

/// A serializer implemented for JavaScript Object Notation.
#[derive(Debug, Default)]
pub struct JsonSerializer {}

impl Serializer for JsonSerializer {
    fn serialize(&self, message: &Message) -> Result<String> {
        serde_json::to_string(&Value::List(message.encode())).map_err(Error::new)
    }

    fn deserialize(&self, text: &str) -> Result<Message> {
        match serde_json::from_str::<Value>(text)? {
            Value::List(list) => Ok(Message::decode(list)?),
            value => Err(Error::msg(format!(
                "expected message to be a list, found {}",
                value.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod json_test {
    use crate::{
        core::{
            id::Id,
            types::{
                Dictionary,
                List,
                Value,
            },
        },
        message::message::{
            Message,
            ResultMessage,
            WelcomeMessage,
        },
        serializer::{
            json::JsonSerializer,
            serializer::Serializer,
        },
    };

    #[test]
    fn serializes_messages_to_text() {
        let serializer = JsonSerializer::default();
        assert_matches::assert_matches!(
            serializer.serialize(&Message::Result(ResultMessage {
                call_request: Id::from(7814135),
                details: Dictionary::default(),
                yield_arguments: Some(List::from_iter([Value::Integer(30)])),
                yield_arguments_keyword: None,
            })),
            Ok(text) => {
                assert_eq!(text, "[50,7814135,{},[30]]");
            }
        );
    }

    #[test]
    fn deserializes_messages_from_text() {
        let serializer = JsonSerializer::default();
        assert_matches::assert_matches!(
            serializer.deserialize(r#"[2, 314, {"roles": {"broker": {}}}]"#),
            Ok(Message::Welcome(WelcomeMessage { session, details })) => {
                assert_eq!(session, Id::from(314));
                assert!(details.contains_key("roles"));
            }
        );
    }

    #[test]
    fn fails_invalid_text() {
        let serializer = JsonSerializer::default();
        assert_matches::assert_matches!(serializer.deserialize("[2, 314"), Err(_));
        assert_matches::assert_matches!(serializer.deserialize(r#"{"type": 2}"#), Err(err) => {
            assert!(err.to_string().contains("expected message to be a list"));
        });
        assert_matches::assert_matches!(serializer.deserialize("[99, 1]"), Err(err) => {
            assert_eq!(err.to_string(), "unknown message tag 99");
        });
    }
}
