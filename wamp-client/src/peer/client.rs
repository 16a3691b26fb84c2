use crate::{
    core::{
        close::CloseReason,
        error::PeerError,
        roles::PeerRole,
    },
    message::message::{
        GoodbyeMessage,
        WelcomeMessage,
    },
    peer::{
        callee::Callee,
        caller::Caller,
        publisher::Publisher,
        session::Session,
        subscriber::Subscriber,
    },
};

/// A WAMP client, composed of a [`Session`] and the role workflows it was configured with.
///
/// Roles missing from [`crate::peer::SessionConfig::roles`] are not available, and are not
/// announced to the router.
pub struct Client {
    session: Session,
    publisher: Option<Publisher>,
    subscriber: Option<Subscriber>,
    caller: Option<Caller>,
    callee: Option<Callee>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new client over the session.
    pub fn new(session: Session) -> Self {
        let roles = &session.config().roles;
        let weak = session.downgrade();
        let publisher = roles
            .contains(&PeerRole::Publisher)
            .then(|| Publisher::new(weak.clone()));
        let subscriber = roles
            .contains(&PeerRole::Subscriber)
            .then(|| Subscriber::new(weak.clone()));
        let caller = roles
            .contains(&PeerRole::Caller)
            .then(|| Caller::new(weak.clone()));
        let callee = roles
            .contains(&PeerRole::Callee)
            .then(|| Callee::new(weak.clone()));
        Self {
            session,
            publisher,
            subscriber,
            caller,
            callee,
        }
    }

    /// The underlying session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn publisher(&self) -> Option<&Publisher> {
        self.publisher.as_ref()
    }

    pub fn subscriber(&self) -> Option<&Subscriber> {
        self.subscriber.as_ref()
    }

    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn callee(&self) -> Option<&Callee> {
        self.callee.as_ref()
    }

    /// Connects to the router and joins the configured realm.
    pub async fn say_hello(&self) -> Result<WelcomeMessage, PeerError> {
        self.session.connect().await
    }

    /// Leaves the realm.
    pub async fn say_goodbye(&self) -> Result<GoodbyeMessage, PeerError> {
        self.say_goodbye_with_reason(CloseReason::SystemShutdown)
            .await
    }

    /// Leaves the realm with the given close reason.
    pub async fn say_goodbye_with_reason(
        &self,
        reason: CloseReason,
    ) -> Result<GoodbyeMessage, PeerError> {
        self.session.say_goodbye(reason).await
    }
}
