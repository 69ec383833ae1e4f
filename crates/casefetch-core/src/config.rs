//! Runtime configuration for the portal client and resolver.

use std::time::Duration;

/// Case-search endpoint of the production portal.
pub const DEFAULT_SEARCH_URL: &str = "https://ammetadata.3shapecommunicate.com/api/cases/search";

/// Lifecycle states included in every case search.
pub const DEFAULT_CASE_STATES: &[&str] = &[
    "Sent",
    "Created",
    "Received",
    "Approved",
    "Rejected",
    "Designed",
    "Manufactured",
];

/// Configuration shared by [`AuthenticatedClient`](crate::client::AuthenticatedClient),
/// [`CasePortal`](crate::portal::CasePortal) and
/// [`PatientResolver`](crate::resolver::PatientResolver).
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Case-search endpoint.
    pub search_url: String,

    /// Values joined into the `caseStates` query parameter.
    pub case_states: Vec<String>,

    /// Per-request transport timeout (default: 30 seconds).
    pub request_timeout: Duration,

    /// Maximum number of order forms fetched at once (default: 16).
    pub fan_out_limit: usize,

    /// Maximum number of pages read by an unfiltered search (default: 20).
    pub max_pages: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            search_url: DEFAULT_SEARCH_URL.to_string(),
            case_states: DEFAULT_CASE_STATES.iter().map(|s| s.to_string()).collect(),
            request_timeout: Duration::from_secs(30),
            fan_out_limit: 16,
            max_pages: 20,
        }
    }
}

impl PortalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the case-search endpoint.
    #[must_use]
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// Sets the lifecycle states to search.
    #[must_use]
    pub fn with_case_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.case_states = states.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-request transport timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the order form fan-out limit. Zero is treated as one.
    #[must_use]
    pub fn with_fan_out_limit(mut self, limit: usize) -> Self {
        self.fan_out_limit = limit.max(1);
        self
    }

    /// Sets the page limit for unfiltered searches. Zero is treated as one.
    #[must_use]
    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    /// The `caseStates` query value.
    pub fn case_states_param(&self) -> String {
        self.case_states.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PortalConfig::default();
        assert_eq!(config.search_url, DEFAULT_SEARCH_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.fan_out_limit, 16);
        assert_eq!(config.max_pages, 20);
        assert_eq!(
            config.case_states_param(),
            "Sent,Created,Received,Approved,Rejected,Designed,Manufactured"
        );
    }

    #[test]
    fn test_config_builder() {
        let config = PortalConfig::new()
            .with_search_url("http://localhost:9000/api/cases/search")
            .with_case_states(["Sent", "Created"])
            .with_request_timeout(Duration::from_secs(5))
            .with_fan_out_limit(0)
            .with_max_pages(0);

        assert_eq!(config.search_url, "http://localhost:9000/api/cases/search");
        assert_eq!(config.case_states_param(), "Sent,Created");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.fan_out_limit, 1);
        assert_eq!(config.max_pages, 1);
    }
}
