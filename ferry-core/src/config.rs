use std::time::Duration;

/// Time-to-live applied to every entry unless configured otherwise (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval of the background sweep
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Longest TTL a store will apply (10 years); longer values are clamped
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Shortest sweep interval a store will use; shorter values are raised to it
pub const MIN_CLEANUP_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for a [`Store`](crate::Store)
///
/// # Example
///
/// ```rust
/// use ferry_core::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_ttl(Duration::from_secs(3600))
///     .with_cleanup_interval(Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long an entry stays observable after it is written (default: 24 hours)
    pub ttl: Duration,
    /// Interval between sweeps for expired entries (default: 60 seconds)
    pub cleanup_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry time-to-live
    ///
    /// The TTL is absolute from the moment of the write. Reads never extend it.
    /// Values above [`MAX_TTL`] are clamped when the store is built.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the cleanup interval
    ///
    /// Expired entries are normally removed by their own expiration task; the
    /// sweep only catches entries whose task never ran. Values below
    /// [`MIN_CLEANUP_INTERVAL`] (zero included) are raised when the store is built.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(86_400));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_builder_pattern_chaining() {
        let config = StoreConfig::new()
            .with_ttl(Duration::from_secs(5))
            .with_cleanup_interval(Duration::from_secs(120));
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.cleanup_interval, Duration::from_secs(120));
    }
}
