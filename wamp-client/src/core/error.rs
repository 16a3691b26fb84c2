use thiserror::Error;

use crate::{
    core::uri::Uri,
    message::message::{
        AbortMessage,
        ErrorMessage,
        GoodbyeMessage,
    },
};

/// An interaction error defined by the WAMP standard.
///
/// Each variant maps to a well-known `wamp.error.*` URI, so that peers can parse the error easily.
/// Errors defined by applications use [`InteractionError::Application`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InteractionError {
    /// A URI is malformed.
    #[error("invalid uri")]
    InvalidUri,
    /// The procedure being called does not exist.
    #[error("no such procedure")]
    NoSuchProcedure,
    /// The procedure being registered already exists.
    #[error("procedure already exists")]
    ProcedureAlreadyExists,
    /// The registration being referenced does not exist.
    #[error("no such registration")]
    NoSuchRegistration,
    /// The subscription being referenced does not exist.
    #[error("no such subscription")]
    NoSuchSubscription,
    /// The arguments of a call or invocation are invalid.
    #[error("invalid argument")]
    InvalidArgument,
    /// A message violates the WAMP protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// The peer is not authorized for the action.
    #[error("not authorized")]
    NotAuthorized,
    /// The authorization check itself failed.
    #[error("authorization failed")]
    AuthorizationFailed,
    /// The realm being joined does not exist.
    #[error("no such realm")]
    NoSuchRealm,
    /// The role being referenced does not exist.
    #[error("no such role")]
    NoSuchRole,
    /// The request was canceled.
    #[error("canceled")]
    Canceled,
    /// An option in the request is not allowed.
    #[error("option not allowed")]
    OptionNotAllowed,
    /// No callee is eligible to receive the invocation.
    #[error("no eligible callee")]
    NoEligibleCallee,
    /// The router refused to disclose the caller or publisher.
    #[error("disclose_me option disallowed")]
    OptionDisallowedDiscloseMe,
    /// The network connection failed.
    #[error("network failure: {0}")]
    NetworkFailure(String),
    /// An error defined by an application.
    #[error("application error: {0}")]
    Application(Uri),
}

impl InteractionError {
    fn uri_component(&self) -> Option<&'static str> {
        match self {
            Self::InvalidUri => Some("invalid_uri"),
            Self::NoSuchProcedure => Some("no_such_procedure"),
            Self::ProcedureAlreadyExists => Some("procedure_already_exists"),
            Self::NoSuchRegistration => Some("no_such_registration"),
            Self::NoSuchSubscription => Some("no_such_subscription"),
            Self::InvalidArgument => Some("invalid_argument"),
            Self::ProtocolViolation(_) => Some("protocol_violation"),
            Self::NotAuthorized => Some("not_authorized"),
            Self::AuthorizationFailed => Some("authorization_failed"),
            Self::NoSuchRealm => Some("no_such_realm"),
            Self::NoSuchRole => Some("no_such_role"),
            Self::Canceled => Some("canceled"),
            Self::OptionNotAllowed => Some("option_not_allowed"),
            Self::NoEligibleCallee => Some("no_eligible_callee"),
            Self::OptionDisallowedDiscloseMe => Some("option_disallowed.disclose_me"),
            Self::NetworkFailure(_) => Some("network_failure"),
            Self::Application(_) => None,
        }
    }

    /// URI for the error.
    pub fn uri(&self) -> Uri {
        match (self, self.uri_component()) {
            (Self::Application(uri), _) => uri.clone(),
            (_, Some(component)) => Uri::from_known(format!("wamp.error.{component}")),
            (_, None) => Uri::from_known("wamp.error"),
        }
    }

    /// Looks up the error for a URI.
    ///
    /// URIs outside of the standard catalog produce [`InteractionError::Application`].
    pub fn from_uri(uri: &Uri) -> Self {
        match uri.as_str() {
            "wamp.error.invalid_uri" => Self::InvalidUri,
            "wamp.error.no_such_procedure" => Self::NoSuchProcedure,
            "wamp.error.procedure_already_exists" => Self::ProcedureAlreadyExists,
            "wamp.error.no_such_registration" => Self::NoSuchRegistration,
            "wamp.error.no_such_subscription" => Self::NoSuchSubscription,
            "wamp.error.invalid_argument" => Self::InvalidArgument,
            "wamp.error.protocol_violation" => Self::ProtocolViolation(String::default()),
            "wamp.error.not_authorized" => Self::NotAuthorized,
            "wamp.error.authorization_failed" => Self::AuthorizationFailed,
            "wamp.error.no_such_realm" => Self::NoSuchRealm,
            "wamp.error.no_such_role" => Self::NoSuchRole,
            "wamp.error.canceled" => Self::Canceled,
            "wamp.error.option_not_allowed" => Self::OptionNotAllowed,
            "wamp.error.no_eligible_callee" => Self::NoEligibleCallee,
            "wamp.error.option_disallowed.disclose_me" => Self::OptionDisallowedDiscloseMe,
            "wamp.error.network_failure" => Self::NetworkFailure(String::default()),
            _ => Self::Application(uri.clone()),
        }
    }
}

/// An error returned by session and role operations.
///
/// Distinguishes the router rejecting a request from the session being unusable and from local
/// encoding problems, so that callers can decide whether to retry.
#[derive(Debug, Error)]
pub enum PeerError {
    /// The router responded to the request with an ERROR.
    #[error("request failed with {}", .0.error)]
    Command(ErrorMessage),
    /// The router aborted the session during the handshake.
    #[error("session aborted with {}", .0.reason)]
    Aborted(AbortMessage),
    /// A protocol-level condition ended the operation.
    #[error(transparent)]
    Interaction(#[from] InteractionError),
    /// The session cannot be used.
    #[error("session is not valid: {0}")]
    NotValid(String),
    /// A message could not be serialized.
    #[error("failed to serialize message: {0:#}")]
    Serialization(anyhow::Error),
    /// The router closed the session with a GOODBYE that did not acknowledge ours.
    #[error("session closed by router with {}", .0.reason)]
    Closed(GoodbyeMessage),
}

impl PeerError {
    pub(crate) fn not_valid<S>(reason: S) -> Self
    where
        S: Into<String>,
    {
        Self::NotValid(reason.into())
    }

    /// The interaction error reported by the router, for [`PeerError::Command`] and
    /// [`PeerError::Aborted`].
    pub fn router_error(&self) -> Option<InteractionError> {
        match self {
            Self::Command(message) => Some(InteractionError::from_uri(&message.error)),
            Self::Aborted(message) => Some(InteractionError::from_uri(&message.reason)),
            _ => None,
        }
    }

    /// Checks if the operation may succeed when retried on a new session.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NotValid(_) => true,
            Self::Interaction(InteractionError::NetworkFailure(_)) => true,
            _ => false,
        }
    }
}
