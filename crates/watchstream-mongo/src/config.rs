//! Connection configuration.

use std::time::Duration;

/// Default maximum number of pooled connections.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 200;

/// Default idle time before a pooled connection is closed (1 hour).
pub const DEFAULT_MAX_IDLE_TIME: Duration = Duration::from_secs(3600);

/// Default timeout for the initial ping.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(5);

/// MongoDB connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string (e.g., "mongodb://localhost:27017").
    pub url: String,

    /// Maximum number of pooled connections.
    pub max_pool_size: u32,

    /// Idle time before a pooled connection is closed.
    pub max_idle_time: Duration,

    /// Timeout for establishing a connection. `None` uses the driver default.
    pub connect_timeout: Option<Duration>,

    /// Timeout for the initial ping.
    pub ping_timeout: Duration,

    /// Application name reported to the server.
    pub app_name: Option<String>,
}

impl MongoConfig {
    /// Create a configuration for the given connection string.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            max_idle_time: DEFAULT_MAX_IDLE_TIME,
            connect_timeout: None,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            app_name: None,
        }
    }

    /// Set the maximum pool size.
    pub fn with_max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = size.max(1);
        self
    }

    /// Set the pooled connection idle time.
    pub fn with_max_idle_time(mut self, idle: Duration) -> Self {
        self.max_idle_time = idle;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the ping timeout.
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Set the application name.
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self::new("mongodb://localhost:27017")
    }
}
