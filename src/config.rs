//! Client configuration.
//!
//! Defaults suit a local agent server; everything can be overridden with
//! builder methods or `PARLEY_*` environment variables.

/// Configuration for the agent service client and stream controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the agent service.
    pub base_url: String,
    /// App name the sessions are scoped to.
    pub app_name: String,
    /// User id the sessions are scoped to.
    pub user_id: String,
    /// Per-request timeout for the session CRUD calls, in seconds.
    pub request_timeout_secs: u64,
    /// Optional overall bound on one streaming turn, in seconds.
    ///
    /// The protocol has no idle timeout of its own; this is a defensive
    /// limit. `None` means unbounded.
    pub stream_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            app_name: "sample_agent".to_string(),
            user_id: "user".to_string(),
            request_timeout_secs: 30,
            stream_timeout_secs: None,
        }
    }
}

impl Config {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the service base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the app name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Set the user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the CRUD request timeout in seconds.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set or clear the overall stream timeout in seconds.
    pub fn with_stream_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.stream_timeout_secs = secs;
        self
    }

    /// Build a config from `PARLEY_*` environment variables, falling back to
    /// defaults for anything unset. Unparseable numeric values are ignored
    /// with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("PARLEY_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(app) = std::env::var("PARLEY_APP") {
            if !app.trim().is_empty() {
                config.app_name = app;
            }
        }
        if let Ok(user) = std::env::var("PARLEY_USER") {
            if !user.trim().is_empty() {
                config.user_id = user;
            }
        }
        if let Ok(raw) = std::env::var("PARLEY_STREAM_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => config.stream_timeout_secs = Some(secs),
                _ => tracing::warn!(value = %raw, "ignoring invalid PARLEY_STREAM_TIMEOUT_SECS"),
            }
        }

        config
    }
}
