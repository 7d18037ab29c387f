//! Bridge configuration.
//!
//! The embedding host is injected rather than sniffed, so the dispatcher can
//! run outside a browser.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::envelope::TargetOrigin;

/// Production documentation host.
pub const STATIC_DOCS_HOST: &str = "staticdocs.thefacebook.com";

/// Local development host.
pub const LOCAL_HOST: &str = "localhost";

/// Origin of the production parent page.
pub const PARENT_ORIGIN: &str = "https://www.internalfb.com";

const HOST_VAR: &str = "DOCS_BRIDGE_HOST";
const PARENT_ORIGIN_VAR: &str = "DOCS_BRIDGE_PARENT_ORIGIN";
const TIMEOUT_VAR: &str = "DOCS_BRIDGE_TIMEOUT_MS";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Where the dispatcher runs and where it posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Hostname of the embedded page.
    pub host: String,

    /// Hosts on which calls are permitted.
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Hosts on which calls are posted to any origin.
    #[serde(default = "default_dev_hosts")]
    pub dev_hosts: Vec<String>,

    /// Origin calls are posted to outside dev hosts.
    #[serde(default = "default_parent_origin")]
    pub parent_origin: String,

    /// Per-call timeout. `None` waits forever.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
}

fn default_allowed_hosts() -> Vec<String> {
    vec![STATIC_DOCS_HOST.to_string(), LOCAL_HOST.to_string()]
}

fn default_dev_hosts() -> Vec<String> {
    vec![LOCAL_HOST.to_string()]
}

fn default_parent_origin() -> String {
    PARENT_ORIGIN.to_string()
}

impl BridgeConfig {
    /// Default configuration for a page served from `host`.
    #[must_use]
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            allowed_hosts: default_allowed_hosts(),
            dev_hosts: default_dev_hosts(),
            parent_origin: default_parent_origin(),
            call_timeout_ms: None,
        }
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Load from `DOCS_BRIDGE_*` environment variables.
    ///
    /// # Errors
    /// Returns error if the host is unset or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(HOST_VAR).ok_or(ConfigError::Missing(HOST_VAR))?;
        let mut config = Self::for_host(host);

        if let Some(origin) = lookup(PARENT_ORIGIN_VAR) {
            config.parent_origin = origin;
        }
        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let ms = raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: TIMEOUT_VAR,
                value: raw.clone(),
            })?;
            config.call_timeout_ms = Some(ms);
        }
        Ok(config)
    }

    /// Whether calls may be issued from this host.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        contains_host(&self.allowed_hosts, &self.host)
    }

    /// Whether this host is a local development host.
    #[must_use]
    pub fn is_dev_host(&self) -> bool {
        contains_host(&self.dev_hosts, &self.host)
    }

    /// Origin that calls are posted to.
    #[must_use]
    pub fn target_origin(&self) -> TargetOrigin {
        if self.is_dev_host() {
            TargetOrigin::Any
        } else {
            TargetOrigin::Exact(self.parent_origin.clone())
        }
    }

    /// Per-call timeout, if configured.
    #[must_use]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

fn contains_host(hosts: &[String], host: &str) -> bool {
    hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_posts_anywhere() {
        let config = BridgeConfig::for_host("localhost");
        assert!(config.is_allowed());
        assert_eq!(config.target_origin(), TargetOrigin::Any);
    }

    #[test]
    fn test_static_docs_posts_to_parent() {
        let config = BridgeConfig::for_host("StaticDocs.TheFacebook.com");
        assert!(config.is_allowed());
        assert_eq!(
            config.target_origin(),
            TargetOrigin::Exact(PARENT_ORIGIN.to_string())
        );
    }

    #[test]
    fn test_other_host_not_allowed() {
        assert!(!BridgeConfig::for_host("example.com").is_allowed());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: BridgeConfig = serde_json::from_str(r#"{"host": "localhost"}"#).unwrap();
        assert_eq!(config, BridgeConfig::for_host("localhost"));
        assert_eq!(config.call_timeout(), None);
    }

    #[test]
    fn test_from_lookup() {
        let config = BridgeConfig::from_lookup(|key| match key {
            "DOCS_BRIDGE_HOST" => Some("staticdocs.thefacebook.com".into()),
            "DOCS_BRIDGE_TIMEOUT_MS" => Some("1500".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.call_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.parent_origin, PARENT_ORIGIN);
    }

    #[test]
    fn test_from_lookup_errors() {
        assert!(matches!(
            BridgeConfig::from_lookup(|_| None),
            Err(ConfigError::Missing("DOCS_BRIDGE_HOST"))
        ));

        let err = BridgeConfig::from_lookup(|key| match key {
            "DOCS_BRIDGE_HOST" => Some("localhost".into()),
            "DOCS_BRIDGE_TIMEOUT_MS" => Some("soon".into()),
            _ => None,
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { value, .. } if value == "soon"));
    }

    #[test]
    fn test_with_call_timeout() {
        let config = BridgeConfig::for_host("localhost").with_call_timeout(Duration::from_secs(2));
        assert_eq!(config.call_timeout_ms, Some(2000));
    }
}
