use crate::constants::{BUILD_STATUS_PATH, DEFAULT_DELIVERY_TIMEOUT_SECS};
use crate::error::{HeraldError, Result};
use crate::host::Environment;
use reqwest::Url;
use secrecy::SecretString;
use std::time::Duration;

/// Operator-facing notifier settings. Nothing is enabled by default: without
/// a server URL and access token no status is ever sent.
#[derive(Debug)]
pub struct NotifierConfig {
    /// Base URL of the status collector
    pub server_url: Option<String>,
    pub access_token: Option<SecretString>,
    /// Name of the environment variable holding the semantic version
    pub version_parameter: Option<String>,
    /// Include sensitive host fields (tokens, credentials)
    pub enable_authorized_actions: bool,
    /// Print filtered host information instead of posting
    pub debug: bool,
    pub timeout: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            access_token: None,
            version_parameter: None,
            enable_authorized_actions: false,
            debug: false,
            timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECS),
        }
    }
}

impl NotifierConfig {
    /// Full status endpoint, validating the configured server URL
    pub fn endpoint(&self) -> Result<Option<String>> {
        let Some(server_url) = self.server_url.as_deref() else {
            return Ok(None);
        };

        let parsed = Url::parse(server_url).map_err(|e| HeraldError::Config {
            reason: format!("invalid server URL '{}': {}", server_url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HeraldError::Config {
                reason: format!("server URL '{}' must use http or https", server_url),
            });
        }

        Ok(Some(format!(
            "{}{}",
            server_url.trim_end_matches('/'),
            BUILD_STATUS_PATH
        )))
    }

    /// Resolve `Status.Version` from the configured environment variable
    pub fn version(&self, env: &dyn Environment) -> Option<String> {
        self.version_parameter
            .as_deref()
            .and_then(|name| env.var(name))
    }

    pub fn validate(&self) -> Result<()> {
        self.endpoint()?;
        if self.timeout.is_zero() {
            return Err(HeraldError::Config {
                reason: "delivery timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
