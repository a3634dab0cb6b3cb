//! Connection settings, read from the environment.

use std::time::Duration;

use tracing::warn;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const BASE_URL_VAR: &str = "RADIOPAD_API_BASE_URL";
pub const TIMEOUT_VAR: &str = "RADIOPAD_API_TIMEOUT_SECS";

/// Where the sound store lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl ApiConfig {
    /// Read `RADIOPAD_API_BASE_URL` and `RADIOPAD_API_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Bad values fall back to the
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
            match parse_base_url(&raw) {
                Some(url) => config.base_url = url,
                None => warn!("Ignoring invalid {BASE_URL_VAR}={raw:?}"),
            }
        }

        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring invalid {TIMEOUT_VAR}={raw:?}"),
            }
        }

        config
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

fn parse_base_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

#[allow(clippy::expect_used)]
fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}
