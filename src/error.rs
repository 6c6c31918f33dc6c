use std::sync::Arc;

/// Represents a result type for operations in the Annecy SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Annecy SDK.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Invalid base URL configuration.
    #[error("invalid base_url configuration")]
    InvalidBaseUrl(#[source] url::ParseError),

    /// A lazy call URL returned by the server could not be parsed.
    #[error("invalid request url")]
    InvalidUrl(#[source] url::ParseError),

    /// Network error.
    #[error(transparent)]
    // reqwest::Error is not clonable, so we're wrapping it in an Arc.
    Network(Arc<reqwest::Error>),

    /// The server responded with a status code of 400 or above.
    #[error("HTTP {0}")]
    HttpStatus(u16),

    /// The response body is not a JSON object.
    #[error("response is not a structured record")]
    MalformedResponse,

    /// The response body is a JSON object, but its fields have unexpected shapes.
    #[error("error decoding response body")]
    Decode(#[source] Arc<serde_json::Error>),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Decode(Arc::new(value))
    }
}
