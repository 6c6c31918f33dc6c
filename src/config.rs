use std::{sync::Arc, time::Duration};

use crate::{transport::HttpTransport, Engine, Result};

/// Configuration for [`Engine`].
///
/// # Examples
/// ```
/// # use std::time::Duration;
/// # use annecy::ClientConfig;
/// let config = ClientConfig::new()
///     .with_platform("android")
///     .with_flush_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) api_version: String,
    pub(crate) platform: String,
    pub(crate) visibility_check_interval: Duration,
    pub(crate) flush_interval: Duration,
    pub(crate) flush_jitter: Duration,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.annecy.media";

    /// Default value of the `API-VERSION` header.
    pub const DEFAULT_API_VERSION: &'static str = "1.0";

    /// Default interval between visibility checks.
    pub const DEFAULT_VISIBILITY_CHECK_INTERVAL: Duration = Duration::from_millis(800);

    /// Default interval between view flushes.
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

    /// Create a default configuration.
    pub fn new() -> ClientConfig {
        ClientConfig::default()
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> ClientConfig {
        self.base_url = base_url.into();
        self
    }

    /// Override the API version sent with every request.
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> ClientConfig {
        self.api_version = api_version.into();
        self
    }

    /// Set the platform tag reported to the API (e.g., `"ios"` or `"android"`).
    ///
    /// Defaults to the name of the operating system the SDK was compiled for.
    pub fn with_platform(mut self, platform: impl Into<String>) -> ClientConfig {
        self.platform = platform.into();
        self
    }

    /// Update the interval between visibility checks.
    pub fn with_visibility_check_interval(mut self, interval: Duration) -> ClientConfig {
        self.visibility_check_interval = interval;
        self
    }

    /// Update the interval between view flushes.
    pub fn with_flush_interval(mut self, interval: Duration) -> ClientConfig {
        self.flush_interval = interval;
        self
    }

    /// Jitter subtracts a random duration from every flush wait. This helps to avoid many devices
    /// synchronizing and producing spiky load.
    ///
    /// Defaults to zero.
    pub fn with_flush_jitter(mut self, jitter: Duration) -> ClientConfig {
        self.flush_jitter = jitter;
        self
    }

    /// Create a new [`Engine`] that talks to the API over HTTP.
    ///
    /// ```
    /// # use annecy::ClientConfig;
    /// let engine = ClientConfig::new().to_engine().unwrap();
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`](crate::Error::InvalidBaseUrl) if the base URL does not parse.
    pub fn to_engine(self) -> Result<Engine> {
        let transport = HttpTransport::new(&self.base_url, &self.api_version)?;
        Ok(Engine::new(self, Arc::new(transport)))
    }
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            api_version: ClientConfig::DEFAULT_API_VERSION.to_owned(),
            platform: std::env::consts::OS.to_owned(),
            visibility_check_interval: ClientConfig::DEFAULT_VISIBILITY_CHECK_INTERVAL,
            flush_interval: ClientConfig::DEFAULT_FLUSH_INTERVAL,
            flush_jitter: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;
    use crate::Error;

    #[test]
    fn rejects_invalid_base_url() {
        let result = ClientConfig::new().with_base_url("not a url").to_engine();
        assert!(matches!(result, Err(Error::InvalidBaseUrl(_))));
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "https://api.annecy.media");
        assert_eq!(config.api_version, "1.0");
        assert_eq!(config.platform, std::env::consts::OS);
    }
}
