use crate::core::{
    hash::HashSet,
    types::{
        Dictionary,
        Value,
        WampSerialize,
        WampSerializeError,
    },
};

/// A role a client peer can take on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeerRole {
    // Publishes events to topics.
    Publisher,
    // Subscribes to events for topics.
    Subscriber,
    // Calls RPC endpoints.
    Caller,
    // Registers RPC endpoints.
    Callee,
}

impl PeerRole {
    /// All client roles.
    pub const ALL: [PeerRole; 4] = [
        PeerRole::Publisher,
        PeerRole::Subscriber,
        PeerRole::Caller,
        PeerRole::Callee,
    ];
}

impl TryFrom<&str> for PeerRole {
    type Error = anyhow::Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "publisher" => Ok(Self::Publisher),
            "subscriber" => Ok(Self::Subscriber),
            "caller" => Ok(Self::Caller),
            "callee" => Ok(Self::Callee),
            _ => Err(Self::Error::msg(format!("invalid peer role: {value}"))),
        }
    }
}

impl From<PeerRole> for &'static str {
    fn from(value: PeerRole) -> Self {
        match value {
            PeerRole::Publisher => "publisher",
            PeerRole::Subscriber => "subscriber",
            PeerRole::Caller => "caller",
            PeerRole::Callee => "callee",
        }
    }
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).into())
    }
}

/// A role a router peer can take on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouterRole {
    // Routes pub/sub.
    Broker,
    // Routes RPC calls.
    Dealer,
}

impl TryFrom<&str> for RouterRole {
    type Error = anyhow::Error;
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "broker" => Ok(Self::Broker),
            "dealer" => Ok(Self::Dealer),
            _ => Err(Self::Error::msg(format!("invalid router role: {value}"))),
        }
    }
}

impl From<RouterRole> for &'static str {
    fn from(value: RouterRole) -> Self {
        match value {
            RouterRole::Broker => "broker",
            RouterRole::Dealer => "dealer",
        }
    }
}

impl std::fmt::Display for RouterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).into())
    }
}

/// The set of roles a client announces in its HELLO details.
///
/// Serializes to a dictionary with one empty feature dictionary per role, such as
/// `{"caller": {}, "subscriber": {}}`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PeerRoles {
    roles: HashSet<PeerRole>,
}

impl PeerRoles {
    pub fn new<I>(roles: I) -> Self
    where
        I: IntoIterator<Item = PeerRole>,
    {
        Self {
            roles: roles.into_iter().collect(),
        }
    }

    pub fn contains(&self, role: PeerRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Roles in a stable order.
    pub fn iter(&self) -> impl Iterator<Item = PeerRole> {
        let mut roles = self.roles.iter().copied().collect::<Vec<_>>();
        roles.sort();
        roles.into_iter()
    }
}

impl WampSerialize for PeerRoles {
    fn wamp_serialize(self) -> Result<Value, WampSerializeError> {
        Ok(Value::Dictionary(
            self.iter()
                .map(|role| {
                    (
                        Into::<&'static str>::into(role).to_owned(),
                        Value::Dictionary(Dictionary::default()),
                    )
                })
                .collect(),
        ))
    }
}

#[cfg(test)]
mod roles_test {
    use crate::core::{
        roles::{
            PeerRole,
            PeerRoles,
            RouterRole,
        },
        types::{
            Dictionary,
            Value,
            WampSerialize,
        },
    };

    #[test]
    fn converts_roles_to_and_from_names() {
        for role in PeerRole::ALL {
            let name: &'static str = role.into();
            assert_matches::assert_matches!(PeerRole::try_from(name), Ok(parsed) => {
                assert_eq!(parsed, role);
            });
        }
        assert_matches::assert_matches!(PeerRole::try_from("broker"), Err(_));
        assert_matches::assert_matches!(RouterRole::try_from("dealer"), Ok(RouterRole::Dealer));
        assert_eq!(RouterRole::Broker.to_string(), "broker");
    }

    #[test]
    fn serializes_roles_dictionary() {
        let roles = PeerRoles::new([PeerRole::Subscriber, PeerRole::Caller]);
        assert_matches::assert_matches!(roles.wamp_serialize(), Ok(Value::Dictionary(roles)) => {
            pretty_assertions::assert_eq!(roles, Dictionary::from_iter([
                ("subscriber".to_owned(), Value::Dictionary(Dictionary::default())),
                ("caller".to_owned(), Value::Dictionary(Dictionary::default())),
            ]));
            assert_eq!(roles.keys().collect::<Vec<_>>(), vec!["subscriber", "caller"]);
        });
    }
}
