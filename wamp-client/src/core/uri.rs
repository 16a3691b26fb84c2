use std::{
    fmt::Display,
    hash::Hash,
    sync::LazyLock,
};

use regex::Regex;
use thiserror::Error;

/// Prefix reserved for URIs defined by the protocol itself.
pub const RESERVED_PREFIX: &str = "wamp.";

/// Error for an invalid URI.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidUri {
    #[error("invalid URI: {0:?}")]
    Malformed(String),
    #[error("URI {0:?} uses the reserved \"wamp.\" prefix")]
    Reserved(String),
}

/// Validates a strict URI.
pub fn validate_strict_uri<S>(uri: S) -> Result<(), InvalidUri>
where
    S: AsRef<str>,
{
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^([0-9a-z_]+\.)*([0-9a-z_]+)$").expect("strict URI pattern is valid")
    });
    validate_with(&RE, uri.as_ref())
}

/// Validates a URI with wildcards.
///
/// Empty components are allowed anywhere in a wildcard URI.
pub fn validate_wildcard_uri<S>(uri: S) -> Result<(), InvalidUri>
where
    S: AsRef<str>,
{
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(([0-9a-z_]+\.)|\.)*([0-9a-z_]+)?$").expect("wildcard URI pattern is valid")
    });
    validate_with(&RE, uri.as_ref())
}

fn validate_with(re: &Regex, uri: &str) -> Result<(), InvalidUri> {
    if !re.is_match(uri) {
        return Err(InvalidUri::Malformed(uri.to_owned()));
    }
    if uri.starts_with(RESERVED_PREFIX) {
        return Err(InvalidUri::Reserved(uri.to_owned()));
    }
    Ok(())
}

/// The validation applied when a [`Uri`] was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriMode {
    /// Every component is non-empty.
    Strict,
    /// Empty components are allowed.
    Wildcard,
    /// No validation, for URIs defined by the protocol or received as error and close reasons.
    Known,
}

/// A uniform resource identifier, used in many aspects of WAMP messaging for identifying resources,
/// such as realms, topics, procedures, and errors.
///
/// Two URIs are equal if their text is equal, regardless of how they were validated.
#[derive(Debug, Clone)]
pub struct Uri {
    value: String,
    mode: UriMode,
    wildcard: bool,
}

impl Uri {
    /// Constructs a strict URI.
    pub fn strict<S>(value: S) -> Result<Self, InvalidUri>
    where
        S: Into<String>,
    {
        let value = value.into();
        validate_strict_uri(&value)?;
        Ok(Self {
            value,
            mode: UriMode::Strict,
            wildcard: false,
        })
    }

    /// Constructs a URI that may contain wildcard components.
    pub fn wildcard<S>(value: S) -> Result<Self, InvalidUri>
    where
        S: Into<String>,
    {
        let value = value.into();
        validate_wildcard_uri(&value)?;
        let wildcard = value.contains("..") || value.starts_with('.') || value.ends_with('.');
        Ok(Self {
            value,
            mode: UriMode::Wildcard,
            wildcard,
        })
    }

    /// Constructs a URI as strict if possible, falling back to wildcard validation.
    pub fn parse<S>(value: S) -> Result<Self, InvalidUri>
    where
        S: Into<String>,
    {
        let value = value.into();
        match validate_strict_uri(&value) {
            Ok(()) => Ok(Self {
                value,
                mode: UriMode::Strict,
                wildcard: false,
            }),
            Err(_) => Self::wildcard(value),
        }
    }

    /// Constructs a URI directly from a value known to be valid, skipping validation.
    pub(crate) fn from_known<S>(value: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            value: value.into(),
            mode: UriMode::Known,
            wildcard: false,
        }
    }

    /// The validation applied when the URI was constructed.
    pub fn mode(&self) -> UriMode {
        self.mode
    }

    /// Checks if the URI is a pattern with empty components.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// The URI text.
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Splits the URI into its components.
    pub fn split(&self) -> impl Iterator<Item = &str> {
        self.value.split('.')
    }
}

impl PartialEq for Uri {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Uri {}

impl Hash for Uri {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.value.fmt(f)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl TryFrom<String> for Uri {
    type Error = InvalidUri;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::strict(value)
    }
}

impl TryFrom<&str> for Uri {
    type Error = InvalidUri;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::strict(value)
    }
}

impl From<Uri> for String {
    fn from(value: Uri) -> Self {
        value.value
    }
}
