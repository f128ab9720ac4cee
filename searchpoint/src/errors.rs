use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by search endpoints and their collaborators.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A scope name was requested that the collection does not register.
    #[error("unknown scope '{name}'")]
    UnknownScope { name: String },

    /// An eager-load hint was requested that the collection does not register.
    #[error("unknown eager-load hint '{name}'")]
    UnknownInclude { name: String },

    /// A field was read that the record type does not expose.
    #[error("unknown field '{name}'")]
    UnknownField { name: String },

    /// No endpoint is registered under the requested name.
    #[error("no search endpoint registered as '{name}'")]
    UnknownEndpoint { name: String },

    /// Static options could not be turned into a usable configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The request asked the collection for something it cannot express.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Raised by authorizers when the principal may not search this collection.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Underlying Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl SearchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Developer-time mistakes: wiring that can never succeed no matter what the request holds.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownScope { .. }
                | Self::UnknownInclude { .. }
                | Self::UnknownField { .. }
                | Self::UnknownEndpoint { .. }
                | Self::InvalidConfig { .. }
        )
    }
}

impl From<toml::de::Error> for SearchError {
    fn from(err: toml::de::Error) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_configuration_errors() {
        assert!(SearchError::UnknownScope { name: "x".into() }.is_configuration());
        assert!(SearchError::config("bad order").is_configuration());
        assert!(!SearchError::invalid_request("nope").is_configuration());
        assert!(
            !SearchError::Forbidden {
                message: "denied".into()
            }
            .is_configuration()
        );
    }

    #[test]
    fn renders_messages() {
        let err = SearchError::UnknownScope {
            name: "published".into(),
        };
        assert_eq!(err.to_string(), "unknown scope 'published'");
    }
}
