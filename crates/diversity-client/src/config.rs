//! Backend connection settings
//!
//! The only required setting is the base URL of the analysis service. It can
//! come from the environment (`DIVERSITY_API_URL`), a TOML file, or the CLI.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

pub const API_URL_ENV: &str = "DIVERSITY_API_URL";
pub const API_TIMEOUT_ENV: &str = "DIVERSITY_API_TIMEOUT_SECS";
pub const DEFAULT_API_URL: &str = "https://diversity-demo-backend-ykl7j.ondigitalocean.app";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the analysis service, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout; unset for streaming endpoints that run long
    #[serde(default, with = "optional_secs")]
    pub request_timeout: Option<Duration>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_user_agent() -> String {
    format!("diversity-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read settings from `DIVERSITY_API_URL` and `DIVERSITY_API_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(API_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!("{} must be a whole number of seconds", API_TIMEOUT_ENV))
            })?;
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(s).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "API URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "http://localhost:8000/"),
            (API_TIMEOUT_ENV, "45"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:8000/");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
        assert_eq!(
            config.endpoint("/analyze/patterns"),
            "http://localhost:8000/analyze/patterns"
        );
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let err = ClientConfig::from_lookup(lookup(&[(API_TIMEOUT_ENV, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = ClientConfig::from_lookup(lookup(&[(API_URL_ENV, "ftp://example.com")]))
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_toml_config() {
        let config = ClientConfig::from_toml_str(
            r#"
                base_url = "https://analysis.example.org"
                request_timeout = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://analysis.example.org");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with("diversity-client/"));
    }

    #[test]
    fn test_toml_rejects_bad_url() {
        assert!(ClientConfig::from_toml_str(r#"base_url = "localhost""#).is_err());
    }
}
