use std::time::Duration;

/// Env var naming the API base URL.
const API_BASE_VAR: &str = "ASSIST_API_BASE";
const DEFAULT_API_BASE: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Loads `.env` into the process environment.
pub fn init_env() {
    dotenvy::dotenv().ok();
}

/// Configuration for clients talking to the workspace backend.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Base URL of the backend (scheme + host, no trailing path).
    pub base_url: String,
    /// Default HTTP timeout for requests.
    pub timeout: Duration,
}

impl ApiConfig {
    /// Creates a config with defaults and an explicit base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Builds a config from `ASSIST_API_BASE`, falling back to the local
    /// development backend.
    pub fn from_env() -> Self {
        let base_url = std::env::var(API_BASE_VAR)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Self::new(base_url)
    }

    /// Overrides the default HTTP timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base())
    }

    pub(crate) fn conversations_url(&self) -> String {
        format!("{}/api/conversations", self.base())
    }

    pub(crate) fn conversation_url(&self, id: i64) -> String {
        format!("{}/api/conversations/{id}", self.base())
    }

    pub(crate) fn rename_url(&self, id: i64) -> String {
        format!("{}/api/conversations/{id}/rename", self.base())
    }

    pub(crate) fn delete_url(&self, id: i64) -> String {
        format!("{}/api/conversations/{id}/delete", self.base())
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
