use std::fmt::Debug;

use anyhow::Result;

use crate::{
    core::uri::Uri,
    message::message::Message,
    serializer::json::JsonSerializer,
};

/// The type of serializer to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SerializerType {
    /// Serializes messages to and from JavaScript Object Notation.
    #[default]
    Json,
}

impl SerializerType {
    /// The protocol URI used during subprotocol negotiation.
    pub fn uri(&self) -> Uri {
        match self {
            Self::Json => Uri::from_known("wamp.2.json"),
        }
    }
}

impl TryFrom<&str> for SerializerType {
    type Error = &'static str;
    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        match value {
            "wamp.2.json" => Ok(Self::Json),
            _ => Err("unsupported serializer"),
        }
    }
}

/// A serializer, which serializes and deserializes WAMP messages to text frames that can be
/// passed over a transport.
///
/// Does not implement message batching.
pub trait Serializer: Send + Sync + Debug {
    /// Serializes the given message to text.
    fn serialize(&self, message: &Message) -> Result<String>;

    /// Deserializes text to a message.
    fn deserialize(&self, text: &str) -> Result<Message>;
}

/// Creates a new [`Serializer`] for the given type.
pub fn new_serializer(serializer_type: SerializerType) -> Box<dyn Serializer> {
    match serializer_type {
        SerializerType::Json => Box::new(JsonSerializer::default()),
    }
}

#[cfg(test)]
mod serializer_test {
    use crate::serializer::serializer::SerializerType;

    #[test]
    fn negotiates_by_subprotocol_uri() {
        assert_eq!(SerializerType::Json.uri().as_str(), "wamp.2.json");
        assert_matches::assert_matches!(SerializerType::try_from("wamp.2.json"), Ok(SerializerType::Json));
        assert_matches::assert_matches!(SerializerType::try_from("wamp.2.cbor"), Err(_));
    }
}
