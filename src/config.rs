//! Fetcher and transport configuration.
//!
//! Both configs come with sensible defaults via [`Default`] and a fluent
//! builder that validates the values before handing out the final config.
//!
//! ```rust
//! use fetch_lite::config::{FetchConfig, TransportConfig};
//! use std::time::Duration;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = TransportConfig::builder()
//!     .user_agent("my-app/0.1")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let cfg = FetchConfig::builder()
//!     .transport(transport)
//!     .channel_capacity(16)
//!     .build()?;
//! assert_eq!(cfg.channel_capacity, 16);
//! # Ok(()) }
//! ```

use crate::errors::ConfigError;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("fetch-lite/", env!("CARGO_PKG_VERSION"));

/// Default capacity of the command channel of a fetch worker
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

/// Settings for the reqwest based transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// User agent string sent with every request
    pub user_agent: String,
    /// Timeout for a whole request, unless the request sets its own
    pub timeout: Option<Duration>,
    /// Timeout for establishing the connection
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
        }
    }
}

impl TransportConfig {
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransportConfigBuilder {
    inner: TransportConfig,
}

impl TransportConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut TransportConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }
    pub fn timeout(self, t: Duration) -> Self { self.map(|c| c.timeout = Some(t)) }
    pub fn no_timeout(self) -> Self { self.map(|c| c.timeout = None) }
    pub fn connect_timeout(self, t: Duration) -> Self { self.map(|c| c.connect_timeout = Some(t)) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<TransportConfig, ConfigError> {
        validate_transport(&self.inner)?;
        Ok(self.inner)
    }
}

/// Settings for a [`Fetcher`](crate::fetcher::Fetcher) and its worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub transport: TransportConfig,
    /// Capacity of the worker command channel
    pub channel_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl FetchConfig {
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchConfigBuilder {
    inner: FetchConfig,
}

impl FetchConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut FetchConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn transport(self, t: TransportConfig) -> Self { self.map(|c| c.transport = t) }
    pub fn channel_capacity(self, n: usize) -> Self { self.map(|c| c.channel_capacity = n) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut FetchConfig)) -> Self { self.map(f) }

    pub fn build(self) -> Result<FetchConfig, ConfigError> {
        validate_transport(&self.inner.transport)?;
        if self.inner.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(self.inner)
    }
}

// ---------- Validation ----------

fn validate_transport(c: &TransportConfig) -> Result<(), ConfigError> {
    if c.user_agent.trim().is_empty() {
        return Err(ConfigError::EmptyUserAgent);
    }
    if c.timeout == Some(Duration::ZERO) {
        return Err(ConfigError::ZeroTimeout { field: "timeout" });
    }
    if c.connect_timeout == Some(Duration::ZERO) {
        return Err(ConfigError::ZeroTimeout { field: "connect_timeout" });
    }
    Ok(())
}
