use crate::core::{
    id::Id,
    types::{
        Dictionary,
        Integer,
        List,
    },
    uri::Uri,
};

/// Integer tags identifying each message kind on the wire.
pub mod tag {
    use crate::core::types::Integer;

    pub const HELLO: Integer = 1;
    pub const WELCOME: Integer = 2;
    pub const ABORT: Integer = 3;
    pub const GOODBYE: Integer = 6;
    pub const ERROR: Integer = 8;
    pub const PUBLISH: Integer = 16;
    pub const PUBLISHED: Integer = 17;
    pub const SUBSCRIBE: Integer = 32;
    pub const SUBSCRIBED: Integer = 33;
    pub const UNSUBSCRIBE: Integer = 34;
    pub const UNSUBSCRIBED: Integer = 35;
    pub const EVENT: Integer = 36;
    pub const CALL: Integer = 48;
    pub const RESULT: Integer = 50;
    pub const REGISTER: Integer = 64;
    pub const REGISTERED: Integer = 65;
    pub const UNREGISTER: Integer = 66;
    pub const UNREGISTERED: Integer = 67;
    pub const INVOCATION: Integer = 68;
    pub const YIELD: Integer = 70;
}

/// A HELLO message for a peer to initiate a WAMP session in a realm.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloMessage {
    pub realm: Uri,
    pub details: Dictionary,
}

/// A WELCOME message for a router to confirm a peer's WAMP session in a realm.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WelcomeMessage {
    pub session: Id,
    pub details: Dictionary,
}

/// An ABORT message for quickly terminating a WAMP session.
#[derive(Debug, Clone, PartialEq)]
pub struct AbortMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// A GOODBYE message for ending a WAMP session with a two-way handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct GoodbyeMessage {
    pub details: Dictionary,
    pub reason: Uri,
}

/// An ERROR message for communicating an error in response to a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMessage {
    pub request_type: Integer,
    pub request: Id,
    pub details: Dictionary,
    pub error: Uri,
    pub arguments: Option<List>,
    pub arguments_keyword: Option<Dictionary>,
}

/// A PUBLISH message for publishing an event to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
    pub arguments: Option<List>,
    pub arguments_keyword: Option<Dictionary>,
}

/// A PUBLISHED message for confirming an event was published.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishedMessage {
    pub publish_request: Id,
    pub publication: Id,
}

/// A SUBSCRIBE message for subscribing to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeMessage {
    pub request: Id,
    pub options: Dictionary,
    pub topic: Uri,
}

/// A SUBSCRIBED message for confirming a peer has subscribed to a topic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SubscribedMessage {
    pub subscribe_request: Id,
    pub subscription: Id,
}

/// An UNSUBSCRIBE message for unsubscribing from a topic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnsubscribeMessage {
    pub request: Id,
    pub subscribed_subscription: Id,
}

/// An UNSUBSCRIBED message for confirming a peer has unsubscribed from a topic.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnsubscribedMessage {
    pub unsubscribe_request: Id,
}

/// An EVENT message for relaying a published event to subscribers.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventMessage {
    pub subscribed_subscription: Id,
    pub published_publication: Id,
    pub details: Dictionary,
    pub publish_arguments: Option<List>,
    pub publish_arguments_keyword: Option<Dictionary>,
}

/// A CALL message for invoking a procedure.
#[derive(Debug, Clone, PartialEq)]
pub struct CallMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
    pub arguments: Option<List>,
    pub arguments_keyword: Option<Dictionary>,
}

/// A RESULT message for sending the result of a procedure call to the caller.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ResultMessage {
    pub call_request: Id,
    pub details: Dictionary,
    pub yield_arguments: Option<List>,
    pub yield_arguments_keyword: Option<Dictionary>,
}

/// A REGISTER message for registering a procedure in the realm.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterMessage {
    pub request: Id,
    pub options: Dictionary,
    pub procedure: Uri,
}

/// A REGISTERED message for confirming a procedure has been registered.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegisteredMessage {
    pub register_request: Id,
    pub registration: Id,
}

/// An UNREGISTER message for unregistering a procedure in the realm.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnregisterMessage {
    pub request: Id,
    pub registered_registration: Id,
}

/// An UNREGISTERED message for confirming a procedure has been unregistered.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UnregisteredMessage {
    pub unregister_request: Id,
}

/// An INVOCATION message for invoking a procedure on its callee.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InvocationMessage {
    pub request: Id,
    pub registered_registration: Id,
    pub details: Dictionary,
    pub call_arguments: Option<List>,
    pub call_arguments_keyword: Option<Dictionary>,
}

/// A YIELD message for yielding the result of an invocation from the callee.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct YieldMessage {
    pub invocation_request: Id,
    pub options: Dictionary,
    pub arguments: Option<List>,
    pub arguments_keyword: Option<Dictionary>,
}

/// A WAMP message.
///
/// Encoded on the wire as a list whose first element is the message tag. See
/// [`Message::encode`] and [`Message::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Hello(HelloMessage),
    Welcome(WelcomeMessage),
    Abort(AbortMessage),
    Goodbye(GoodbyeMessage),
    Error(ErrorMessage),
    Publish(PublishMessage),
    Published(PublishedMessage),
    Subscribe(SubscribeMessage),
    Subscribed(SubscribedMessage),
    Unsubscribe(UnsubscribeMessage),
    Unsubscribed(UnsubscribedMessage),
    Event(EventMessage),
    Call(CallMessage),
    Result(ResultMessage),
    Register(RegisterMessage),
    Registered(RegisteredMessage),
    Unregister(UnregisterMessage),
    Unregistered(UnregisteredMessage),
    Invocation(InvocationMessage),
    Yield(YieldMessage),
}

impl Message {
    /// The integer tag of the message.
    pub fn tag(&self) -> Integer {
        match self {
            Self::Hello(_) => tag::HELLO,
            Self::Welcome(_) => tag::WELCOME,
            Self::Abort(_) => tag::ABORT,
            Self::Goodbye(_) => tag::GOODBYE,
            Self::Error(_) => tag::ERROR,
            Self::Publish(_) => tag::PUBLISH,
            Self::Published(_) => tag::PUBLISHED,
            Self::Subscribe(_) => tag::SUBSCRIBE,
            Self::Subscribed(_) => tag::SUBSCRIBED,
            Self::Unsubscribe(_) => tag::UNSUBSCRIBE,
            Self::Unsubscribed(_) => tag::UNSUBSCRIBED,
            Self::Event(_) => tag::EVENT,
            Self::Call(_) => tag::CALL,
            Self::Result(_) => tag::RESULT,
            Self::Register(_) => tag::REGISTER,
            Self::Registered(_) => tag::REGISTERED,
            Self::Unregister(_) => tag::UNREGISTER,
            Self::Unregistered(_) => tag::UNREGISTERED,
            Self::Invocation(_) => tag::INVOCATION,
            Self::Yield(_) => tag::YIELD,
        }
    }

    /// The message name, mostly for logging.
    pub fn message_name(&self) -> &'static str {
        match self {
            Self::Hello(_) => "HELLO",
            Self::Welcome(_) => "WELCOME",
            Self::Abort(_) => "ABORT",
            Self::Goodbye(_) => "GOODBYE",
            Self::Error(_) => "ERROR",
            Self::Publish(_) => "PUBLISH",
            Self::Published(_) => "PUBLISHED",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::Subscribed(_) => "SUBSCRIBED",
            Self::Unsubscribe(_) => "UNSUBSCRIBE",
            Self::Unsubscribed(_) => "UNSUBSCRIBED",
            Self::Event(_) => "EVENT",
            Self::Call(_) => "CALL",
            Self::Result(_) => "RESULT",
            Self::Register(_) => "REGISTER",
            Self::Registered(_) => "REGISTERED",
            Self::Unregister(_) => "UNREGISTER",
            Self::Unregistered(_) => "UNREGISTERED",
            Self::Invocation(_) => "INVOCATION",
            Self::Yield(_) => "YIELD",
        }
    }

    /// The request ID on the message.
    pub fn request_id(&self) -> Option<Id> {
        match self {
            Self::Error(message) => Some(message.request),
            Self::Publish(message) => Some(message.request),
            Self::Published(message) => Some(message.publish_request),
            Self::Subscribe(message) => Some(message.request),
            Self::Subscribed(message) => Some(message.subscribe_request),
            Self::Unsubscribe(message) => Some(message.request),
            Self::Unsubscribed(message) => Some(message.unsubscribe_request),
            Self::Call(message) => Some(message.request),
            Self::Result(message) => Some(message.call_request),
            Self::Register(message) => Some(message.request),
            Self::Registered(message) => Some(message.register_request),
            Self::Unregister(message) => Some(message.request),
            Self::Unregistered(message) => Some(message.unregister_request),
            Self::Invocation(message) => Some(message.request),
            Self::Yield(message) => Some(message.invocation_request),
            _ => None,
        }
    }

    /// The details dictionary on the message.
    pub fn details(&self) -> Option<&Dictionary> {
        match self {
            Self::Hello(message) => Some(&message.details),
            Self::Welcome(message) => Some(&message.details),
            Self::Abort(message) => Some(&message.details),
            Self::Goodbye(message) => Some(&message.details),
            Self::Error(message) => Some(&message.details),
            Self::Event(message) => Some(&message.details),
            Self::Result(message) => Some(&message.details),
            Self::Invocation(message) => Some(&message.details),
            _ => None,
        }
    }

    /// The close or error reason on the message.
    pub fn reason(&self) -> Option<&Uri> {
        match self {
            Self::Abort(message) => Some(&message.reason),
            Self::Goodbye(message) => Some(&message.reason),
            Self::Error(message) => Some(&message.error),
            _ => None,
        }
    }

    /// Checks if the message is an ERROR responding to the request of the given type and ID.
    pub fn is_error_for(&self, request_type: Integer, request: Id) -> bool {
        match self {
            Self::Error(message) => {
                message.request_type == request_type && message.request == request
            }
            _ => false,
        }
    }
}
