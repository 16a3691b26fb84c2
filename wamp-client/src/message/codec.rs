use thiserror::Error;

use crate::{
    core::{
        id::Id,
        types::{
            Dictionary,
            Integer,
            List,
            Value,
        },
        uri::{
            InvalidUri,
            Uri,
        },
    },
    message::message::{
        AbortMessage,
        CallMessage,
        ErrorMessage,
        EventMessage,
        GoodbyeMessage,
        HelloMessage,
        InvocationMessage,
        Message,
        PublishMessage,
        PublishedMessage,
        RegisterMessage,
        RegisteredMessage,
        ResultMessage,
        SubscribeMessage,
        SubscribedMessage,
        UnregisterMessage,
        UnregisteredMessage,
        UnsubscribeMessage,
        UnsubscribedMessage,
        WelcomeMessage,
        YieldMessage,
        tag,
    },
};

/// Error for a list of values that does not decode to a message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("message is empty")]
    Empty,
    #[error("message tag must be an integer, found {0}")]
    InvalidTag(&'static str),
    #[error("unknown message tag {0}")]
    UnknownTag(Integer),
    #[error("expected {message} tag {expected}, found {found}")]
    TagMismatch {
        message: &'static str,
        expected: Integer,
        found: Integer,
    },
    #[error("{message} is missing {field}")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },
    #[error("{message} {field} must be a {expected}, found {found}")]
    InvalidField {
        message: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("{message} {field} is invalid: {error}")]
    InvalidUri {
        message: &'static str,
        field: &'static str,
        error: InvalidUri,
    },
}

/// Positional reader over the fields of an encoded message.
pub struct FieldReader {
    message: &'static str,
    values: std::vec::IntoIter<Value>,
}

impl FieldReader {
    fn new(message: &'static str, values: List) -> Self {
        Self {
            message,
            values: values.into_iter(),
        }
    }

    fn next(&mut self, field: &'static str) -> Result<Value, DecodeError> {
        self.values.next().ok_or(DecodeError::MissingField {
            message: self.message,
            field,
        })
    }

    fn invalid(&self, field: &'static str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::InvalidField {
            message: self.message,
            field,
            expected,
            found: found.type_name(),
        }
    }

    pub fn integer(&mut self, field: &'static str) -> Result<Integer, DecodeError> {
        match self.next(field)? {
            Value::Integer(value) => Ok(value),
            value => Err(self.invalid(field, "integer", &value)),
        }
    }

    pub fn id(&mut self, field: &'static str) -> Result<Id, DecodeError> {
        self.integer(field).map(Id::from)
    }

    pub fn dictionary(&mut self, field: &'static str) -> Result<Dictionary, DecodeError> {
        match self.next(field)? {
            Value::Dictionary(value) => Ok(value),
            value => Err(self.invalid(field, "dictionary", &value)),
        }
    }

    /// Reads a realm, topic, or procedure URI.
    pub fn resource_uri(&mut self, field: &'static str) -> Result<Uri, DecodeError> {
        match self.next(field)? {
            Value::String(value) => Uri::parse(value).map_err(|error| DecodeError::InvalidUri {
                message: self.message,
                field,
                error,
            }),
            value => Err(self.invalid(field, "string", &value)),
        }
    }

    /// Reads an error or close reason URI, which is not validated.
    pub fn reason_uri(&mut self, field: &'static str) -> Result<Uri, DecodeError> {
        match self.next(field)? {
            Value::String(value) => Ok(Uri::from_known(value)),
            value => Err(self.invalid(field, "string", &value)),
        }
    }

    /// Reads the optional trailing arguments.
    ///
    /// The first trailing list holds the positional arguments and the first trailing dictionary
    /// holds the keyword arguments, wherever they appear. Routers are inconsistent about emitting
    /// the empty list before keyword arguments.
    pub fn arguments(&mut self) -> (Option<List>, Option<Dictionary>) {
        let mut arguments = None;
        let mut arguments_keyword = None;
        for value in self.values.by_ref() {
            match value {
                Value::List(list) if arguments.is_none() => arguments = Some(list),
                Value::Dictionary(dictionary) if arguments_keyword.is_none() => {
                    arguments_keyword = Some(dictionary)
                }
                _ => (),
            }
        }
        (arguments, arguments_keyword)
    }
}

fn push_arguments(
    fields: &mut List,
    arguments: &Option<List>,
    arguments_keyword: &Option<Dictionary>,
) {
    if arguments.is_none() && arguments_keyword.is_none() {
        return;
    }
    fields.push(Value::List(arguments.clone().unwrap_or_default()));
    if let Some(arguments_keyword) = arguments_keyword {
        fields.push(Value::Dictionary(arguments_keyword.clone()));
    }
}

fn uri_value(uri: &Uri) -> Value {
    Value::String(uri.as_str().to_owned())
}

/// A message kind with a positional wire encoding.
pub trait MessageCodec: Sized {
    /// The message tag.
    const TAG: Integer;
    /// The message name, for errors.
    const NAME: &'static str;

    /// Appends the message's fields, in order, after the tag.
    fn encode_fields(&self, fields: &mut List);

    /// Reads the message's fields, in order, after the tag.
    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError>;

    /// Encodes the message as a list starting with its tag.
    fn encode(&self) -> List {
        let mut fields = List::from_iter([Value::Integer(Self::TAG)]);
        self.encode_fields(&mut fields);
        fields
    }

    /// Decodes the message from a list starting with its tag.
    fn decode(values: List) -> Result<Self, DecodeError> {
        let mut fields = FieldReader::new(Self::NAME, values);
        let found = fields.integer("tag")?;
        if found != Self::TAG {
            return Err(DecodeError::TagMismatch {
                message: Self::NAME,
                expected: Self::TAG,
                found,
            });
        }
        Self::decode_fields(&mut fields)
    }
}

impl MessageCodec for HelloMessage {
    const TAG: Integer = tag::HELLO;
    const NAME: &'static str = "HELLO";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(uri_value(&self.realm));
        fields.push(Value::Dictionary(self.details.clone()));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            realm: fields.resource_uri("realm")?,
            details: fields.dictionary("details")?,
        })
    }
}

impl MessageCodec for WelcomeMessage {
    const TAG: Integer = tag::WELCOME;
    const NAME: &'static str = "WELCOME";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.session.into());
        fields.push(Value::Dictionary(self.details.clone()));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            session: fields.id("session")?,
            details: fields.dictionary("details")?,
        })
    }
}

impl MessageCodec for AbortMessage {
    const TAG: Integer = tag::ABORT;
    const NAME: &'static str = "ABORT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(uri_value(&self.reason));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            details: fields.dictionary("details")?,
            reason: fields.reason_uri("reason")?,
        })
    }
}

impl MessageCodec for GoodbyeMessage {
    const TAG: Integer = tag::GOODBYE;
    const NAME: &'static str = "GOODBYE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(uri_value(&self.reason));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            details: fields.dictionary("details")?,
            reason: fields.reason_uri("reason")?,
        })
    }
}

impl MessageCodec for ErrorMessage {
    const TAG: Integer = tag::ERROR;
    const NAME: &'static str = "ERROR";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(Value::Integer(self.request_type));
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.details.clone()));
        fields.push(uri_value(&self.error));
        push_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let request_type = fields.integer("request type")?;
        let request = fields.id("request")?;
        let details = fields.dictionary("details")?;
        let error = fields.reason_uri("error")?;
        let (arguments, arguments_keyword) = fields.arguments();
        Ok(Self {
            request_type,
            request,
            details,
            error,
            arguments,
            arguments_keyword,
        })
    }
}

impl MessageCodec for PublishMessage {
    const TAG: Integer = tag::PUBLISH;
    const NAME: &'static str = "PUBLISH";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(uri_value(&self.topic));
        push_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let request = fields.id("request")?;
        let options = fields.dictionary("options")?;
        let topic = fields.resource_uri("topic")?;
        let (arguments, arguments_keyword) = fields.arguments();
        Ok(Self {
            request,
            options,
            topic,
            arguments,
            arguments_keyword,
        })
    }
}

impl MessageCodec for PublishedMessage {
    const TAG: Integer = tag::PUBLISHED;
    const NAME: &'static str = "PUBLISHED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.publish_request.into());
        fields.push(self.publication.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            publish_request: fields.id("request")?,
            publication: fields.id("publication")?,
        })
    }
}

impl MessageCodec for SubscribeMessage {
    const TAG: Integer = tag::SUBSCRIBE;
    const NAME: &'static str = "SUBSCRIBE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(uri_value(&self.topic));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: fields.id("request")?,
            options: fields.dictionary("options")?,
            topic: fields.resource_uri("topic")?,
        })
    }
}

impl MessageCodec for SubscribedMessage {
    const TAG: Integer = tag::SUBSCRIBED;
    const NAME: &'static str = "SUBSCRIBED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.subscribe_request.into());
        fields.push(self.subscription.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            subscribe_request: fields.id("request")?,
            subscription: fields.id("subscription")?,
        })
    }
}

impl MessageCodec for UnsubscribeMessage {
    const TAG: Integer = tag::UNSUBSCRIBE;
    const NAME: &'static str = "UNSUBSCRIBE";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.subscribed_subscription.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: fields.id("request")?,
            subscribed_subscription: fields.id("subscription")?,
        })
    }
}

impl MessageCodec for UnsubscribedMessage {
    const TAG: Integer = tag::UNSUBSCRIBED;
    const NAME: &'static str = "UNSUBSCRIBED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.unsubscribe_request.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            unsubscribe_request: fields.id("request")?,
        })
    }
}

impl MessageCodec for EventMessage {
    const TAG: Integer = tag::EVENT;
    const NAME: &'static str = "EVENT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.subscribed_subscription.into());
        fields.push(self.published_publication.into());
        fields.push(Value::Dictionary(self.details.clone()));
        push_arguments(
            fields,
            &self.publish_arguments,
            &self.publish_arguments_keyword,
        );
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let subscribed_subscription = fields.id("subscription")?;
        let published_publication = fields.id("publication")?;
        let details = fields.dictionary("details")?;
        let (publish_arguments, publish_arguments_keyword) = fields.arguments();
        Ok(Self {
            subscribed_subscription,
            published_publication,
            details,
            publish_arguments,
            publish_arguments_keyword,
        })
    }
}

impl MessageCodec for CallMessage {
    const TAG: Integer = tag::CALL;
    const NAME: &'static str = "CALL";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(uri_value(&self.procedure));
        push_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let request = fields.id("request")?;
        let options = fields.dictionary("options")?;
        let procedure = fields.resource_uri("procedure")?;
        let (arguments, arguments_keyword) = fields.arguments();
        Ok(Self {
            request,
            options,
            procedure,
            arguments,
            arguments_keyword,
        })
    }
}

impl MessageCodec for ResultMessage {
    const TAG: Integer = tag::RESULT;
    const NAME: &'static str = "RESULT";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.call_request.into());
        fields.push(Value::Dictionary(self.details.clone()));
        push_arguments(fields, &self.yield_arguments, &self.yield_arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let call_request = fields.id("request")?;
        let details = fields.dictionary("details")?;
        let (yield_arguments, yield_arguments_keyword) = fields.arguments();
        Ok(Self {
            call_request,
            details,
            yield_arguments,
            yield_arguments_keyword,
        })
    }
}

impl MessageCodec for RegisterMessage {
    const TAG: Integer = tag::REGISTER;
    const NAME: &'static str = "REGISTER";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        fields.push(uri_value(&self.procedure));
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: fields.id("request")?,
            options: fields.dictionary("options")?,
            procedure: fields.resource_uri("procedure")?,
        })
    }
}

impl MessageCodec for RegisteredMessage {
    const TAG: Integer = tag::REGISTERED;
    const NAME: &'static str = "REGISTERED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.register_request.into());
        fields.push(self.registration.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            register_request: fields.id("request")?,
            registration: fields.id("registration")?,
        })
    }
}

impl MessageCodec for UnregisterMessage {
    const TAG: Integer = tag::UNREGISTER;
    const NAME: &'static str = "UNREGISTER";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.registered_registration.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            request: fields.id("request")?,
            registered_registration: fields.id("registration")?,
        })
    }
}

impl MessageCodec for UnregisteredMessage {
    const TAG: Integer = tag::UNREGISTERED;
    const NAME: &'static str = "UNREGISTERED";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.unregister_request.into());
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        Ok(Self {
            unregister_request: fields.id("request")?,
        })
    }
}

impl MessageCodec for InvocationMessage {
    const TAG: Integer = tag::INVOCATION;
    const NAME: &'static str = "INVOCATION";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.request.into());
        fields.push(self.registered_registration.into());
        fields.push(Value::Dictionary(self.details.clone()));
        push_arguments(fields, &self.call_arguments, &self.call_arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let request = fields.id("request")?;
        let registered_registration = fields.id("registration")?;
        let details = fields.dictionary("details")?;
        let (call_arguments, call_arguments_keyword) = fields.arguments();
        Ok(Self {
            request,
            registered_registration,
            details,
            call_arguments,
            call_arguments_keyword,
        })
    }
}

impl MessageCodec for YieldMessage {
    const TAG: Integer = tag::YIELD;
    const NAME: &'static str = "YIELD";

    fn encode_fields(&self, fields: &mut List) {
        fields.push(self.invocation_request.into());
        fields.push(Value::Dictionary(self.options.clone()));
        push_arguments(fields, &self.arguments, &self.arguments_keyword);
    }

    fn decode_fields(fields: &mut FieldReader) -> Result<Self, DecodeError> {
        let invocation_request = fields.id("request")?;
        let options = fields.dictionary("options")?;
        let (arguments, arguments_keyword) = fields.arguments();
        Ok(Self {
            invocation_request,
            options,
            arguments,
            arguments_keyword,
        })
    }
}

impl Message {
    /// Encodes the message as a list starting with its tag.
    pub fn encode(&self) -> List {
        match self {
            Self::Hello(message) => message.encode(),
            Self::Welcome(message) => message.encode(),
            Self::Abort(message) => message.encode(),
            Self::Goodbye(message) => message.encode(),
            Self::Error(message) => message.encode(),
            Self::Publish(message) => message.encode(),
            Self::Published(message) => message.encode(),
            Self::Subscribe(message) => message.encode(),
            Self::Subscribed(message) => message.encode(),
            Self::Unsubscribe(message) => message.encode(),
            Self::Unsubscribed(message) => message.encode(),
            Self::Event(message) => message.encode(),
            Self::Call(message) => message.encode(),
            Self::Result(message) => message.encode(),
            Self::Register(message) => message.encode(),
            Self::Registered(message) => message.encode(),
            Self::Unregister(message) => message.encode(),
            Self::Unregistered(message) => message.encode(),
            Self::Invocation(message) => message.encode(),
            Self::Yield(message) => message.encode(),
        }
    }

    /// Decodes a message from a list, dispatching on the leading tag.
    pub fn decode(values: List) -> Result<Self, DecodeError> {
        let found = match values.first() {
            Some(Value::Integer(found)) => *found,
            Some(value) => return Err(DecodeError::InvalidTag(value.type_name())),
            None => return Err(DecodeError::Empty),
        };
        match found {
            tag::HELLO => HelloMessage::decode(values).map(Self::Hello),
            tag::WELCOME => WelcomeMessage::decode(values).map(Self::Welcome),
            tag::ABORT => AbortMessage::decode(values).map(Self::Abort),
            tag::GOODBYE => GoodbyeMessage::decode(values).map(Self::Goodbye),
            tag::ERROR => ErrorMessage::decode(values).map(Self::Error),
            tag::PUBLISH => PublishMessage::decode(values).map(Self::Publish),
            tag::PUBLISHED => PublishedMessage::decode(values).map(Self::Published),
            tag::SUBSCRIBE => SubscribeMessage::decode(values).map(Self::Subscribe),
            tag::SUBSCRIBED => SubscribedMessage::decode(values).map(Self::Subscribed),
            tag::UNSUBSCRIBE => UnsubscribeMessage::decode(values).map(Self::Unsubscribe),
            tag::UNSUBSCRIBED => UnsubscribedMessage::decode(values).map(Self::Unsubscribed),
            tag::EVENT => EventMessage::decode(values).map(Self::Event),
            tag::CALL => CallMessage::decode(values).map(Self::Call),
            tag::RESULT => ResultMessage::decode(values).map(Self::Result),
            tag::REGISTER => RegisterMessage::decode(values).map(Self::Register),
            tag::REGISTERED => RegisteredMessage::decode(values).map(Self::Registered),
            tag::UNREGISTER => UnregisterMessage::decode(values).map(Self::Unregister),
            tag::UNREGISTERED => UnregisteredMessage::decode(values).map(Self::Unregistered),
            tag::INVOCATION => InvocationMessage::decode(values).map(Self::Invocation),
            tag::YIELD => YieldMessage::decode(values).map(Self::Yield),
            _ => Err(DecodeError::UnknownTag(found)),
        }
    }
}
