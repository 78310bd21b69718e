//! Content manager configuration

use std::time::Duration;

/// Configuration for the [`ContentManager`](super::ContentManager).
#[derive(Debug, Clone)]
pub struct ContentManagerConfig {
    /// Upper bound for one upstream audio fetch (default: 120s)
    pub fetch_timeout: Duration,

    /// Reject zero-length payloads from the upstream fetcher (default: true)
    pub reject_empty_payloads: bool,

    /// Publish `DownloadEvent::Progress` snapshots (default: true)
    pub emit_progress: bool,
}

impl Default for ContentManagerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(120),
            reject_empty_payloads: true,
            emit_progress: true,
        }
    }
}

impl ContentManagerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the upstream fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Accept or reject empty payloads.
    pub fn with_reject_empty_payloads(mut self, reject: bool) -> Self {
        self.reject_empty_payloads = reject;
        self
    }

    /// Enable or disable progress events.
    pub fn with_progress_events(mut self, enabled: bool) -> Self {
        self.emit_progress = enabled;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.fetch_timeout.is_zero() {
            return Err("fetch_timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContentManagerConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(120));
        assert!(config.reject_empty_payloads);
        assert!(config.emit_progress);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = ContentManagerConfig::new()
            .with_fetch_timeout(Duration::from_secs(5))
            .with_reject_empty_payloads(false)
            .with_progress_events(false);

        assert_eq!(config.fetch_timeout, Duration::from_secs(5));
        assert!(!config.reject_empty_payloads);
        assert!(!config.emit_progress);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = ContentManagerConfig::new().with_fetch_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
