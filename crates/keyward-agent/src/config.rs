//! Agent configuration

use std::env;
use std::time::Duration;

/// Default allowed skew between the workstation clock and ours
pub const DEFAULT_REQUEST_TIME_TOLERANCE_SECS: u64 = 180;

/// Runtime configuration for the agent
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum |now - request.unix_seconds| accepted
    pub request_time_tolerance: Duration,

    /// Identifier stamped on responses, if any
    pub tracking_id: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            request_time_tolerance: Duration::from_secs(DEFAULT_REQUEST_TIME_TOLERANCE_SECS),
            tracking_id: None,
        }
    }
}

impl AgentConfig {
    /// Read configuration from the environment
    ///
    /// - `KEYWARD_REQUEST_TIME_TOLERANCE_SECS` (default 180)
    /// - `KEYWARD_TRACKING_ID` (unset by default)
    pub fn from_env() -> Self {
        let tolerance = env::var("KEYWARD_REQUEST_TIME_TOLERANCE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIME_TOLERANCE_SECS);

        Self {
            request_time_tolerance: Duration::from_secs(tolerance),
            tracking_id: env::var("KEYWARD_TRACKING_ID").ok(),
        }
    }

    pub fn with_request_time_tolerance(mut self, tolerance: Duration) -> Self {
        self.request_time_tolerance = tolerance;
        self
    }

    pub fn with_tracking_id(mut self, tracking_id: impl Into<String>) -> Self {
        self.tracking_id = Some(tracking_id.into());
        self
    }

    /// Lifetime of cached responses and pending markers
    pub fn cache_ttl(&self) -> Duration {
        self.request_time_tolerance * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.request_time_tolerance, Duration::from_secs(180));
        assert_eq!(config.cache_ttl(), Duration::from_secs(360));
        assert!(config.tracking_id.is_none());
    }

    #[test]
    fn test_builders() {
        let config = AgentConfig::default()
            .with_request_time_tolerance(Duration::from_secs(5))
            .with_tracking_id("disabled");
        assert_eq!(config.cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.tracking_id.as_deref(), Some("disabled"));
    }
}
