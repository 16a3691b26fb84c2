use crate::core::uri::Uri;

/// The reason for closing a WAMP session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    #[default]
    Normal,
    SystemShutdown,
    CloseRealm,
    Killed,
    TimedOut,
    GoodbyeAndOut,
}

impl CloseReason {
    fn uri_component(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::SystemShutdown => "system_shutdown",
            Self::CloseRealm => "close_realm",
            Self::Killed => "killed",
            Self::TimedOut => "timed_out",
            Self::GoodbyeAndOut => "goodbye_and_out",
        }
    }

    /// URI for the close reason.
    pub fn uri(&self) -> Uri {
        Uri::from_known(format!("wamp.close.{}", self.uri_component()))
    }

    /// Looks up the close reason for a URI.
    pub fn from_uri(uri: &Uri) -> Option<Self> {
        let component = uri.as_str().strip_prefix("wamp.close.")?;
        [
            Self::Normal,
            Self::SystemShutdown,
            Self::CloseRealm,
            Self::Killed,
            Self::TimedOut,
            Self::GoodbyeAndOut,
        ]
        .into_iter()
        .find(|reason| reason.uri_component() == component)
    }

    /// Checks if a GOODBYE with this reason acknowledges a GOODBYE sent by this peer.
    ///
    /// Some routers acknowledge with [`CloseReason::Normal`], so it counts as an acknowledgement
    /// when `awaiting_ack` is set.
    pub fn acknowledges_goodbye(&self, awaiting_ack: bool) -> bool {
        match self {
            Self::GoodbyeAndOut => true,
            Self::Normal => awaiting_ack,
            _ => false,
        }
    }
}

#[cfg(test)]
mod close_test {
    use crate::core::{
        close::CloseReason,
        uri::Uri,
    };

    #[test]
    fn maps_reasons_to_uris_and_back() {
        assert_eq!(
            CloseReason::GoodbyeAndOut.uri().as_str(),
            "wamp.close.goodbye_and_out"
        );
        assert_eq!(
            CloseReason::SystemShutdown.uri().as_str(),
            "wamp.close.system_shutdown"
        );
        assert_eq!(
            CloseReason::from_uri(&Uri::from_known("wamp.close.close_realm")),
            Some(CloseReason::CloseRealm)
        );
        assert_eq!(
            CloseReason::from_uri(&Uri::from_known("wamp.error.no_such_realm")),
            None
        );
        assert_eq!(CloseReason::from_uri(&Uri::from_known("wamp.close.unknown")), None);
    }

    #[test]
    fn classifies_acknowledgements() {
        assert!(CloseReason::GoodbyeAndOut.acknowledges_goodbye(false));
        assert!(CloseReason::GoodbyeAndOut.acknowledges_goodbye(true));
        assert!(CloseReason::Normal.acknowledges_goodbye(true));
        assert!(!CloseReason::Normal.acknowledges_goodbye(false));
        assert!(!CloseReason::SystemShutdown.acknowledges_goodbye(true));
    }
}
