//! Deployment and client configuration

use dagnet_core::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named deployment: the three endpoint URLs of one network instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Deployment name (`production`, `test`, `integration` or custom)
    pub name: String,
    /// Block explorer base URL
    pub be_url: String,
    /// Global consensus (L0) base URL
    pub l0_url: String,
    /// DAG token (L1) base URL
    pub l1_url: String,
}

impl Deployment {
    /// The production deployment
    pub fn production() -> Self {
        Self {
            name: "production".to_string(),
            be_url: "https://be.dagnet.network".to_string(),
            l0_url: "https://l0.dagnet.network".to_string(),
            l1_url: "https://l1.dagnet.network".to_string(),
        }
    }

    /// The test deployment
    pub fn test() -> Self {
        Self {
            name: "test".to_string(),
            be_url: "https://be-test.dagnet.network".to_string(),
            l0_url: "https://l0-test.dagnet.network".to_string(),
            l1_url: "https://l1-test.dagnet.network".to_string(),
        }
    }

    /// The integration deployment
    pub fn integration() -> Self {
        Self {
            name: "integration".to_string(),
            be_url: "https://be-integration.dagnet.network".to_string(),
            l0_url: "https://l0-integration.dagnet.network".to_string(),
            l1_url: "https://l1-integration.dagnet.network".to_string(),
        }
    }

    /// A deployment with caller-supplied URLs
    pub fn custom(
        name: impl Into<String>,
        be_url: impl Into<String>,
        l0_url: impl Into<String>,
        l1_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            be_url: trim_url(be_url.into()),
            l0_url: trim_url(l0_url.into()),
            l1_url: trim_url(l1_url.into()),
        }
    }

    /// Resolve one of the named deployments
    pub fn for_name(name: &str) -> Result<Self, ValidationError> {
        match name {
            "production" => Ok(Self::production()),
            "test" => Ok(Self::test()),
            "integration" => Ok(Self::integration()),
            other => Err(ValidationError::new(
                "deployment",
                format!("unknown deployment '{other}'"),
            )),
        }
    }

    /// The push-mode event endpoint derived from the L0 URL
    pub fn events_url(&self) -> String {
        let ws = if let Some(rest) = self.l0_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.l0_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.l0_url.clone()
        };
        format!("{ws}/events")
    }
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Transport-level settings shared by every request of a client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-request deadline
    pub timeout: Duration,
    /// TCP connect deadline
    pub connect_timeout: Duration,
    /// Total attempts for retryable failures (including the first)
    pub max_attempts: u32,
    /// Delay before the first retry; doubles per attempt
    pub retry_base_delay: Duration,
    /// Maximum pooled connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Keep-alive duration for idle pooled connections
    pub pool_idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            pool_max_idle_per_host: 30,
            pool_idle_timeout: Duration::from_secs(90),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_deployments() {
        for name in ["production", "test", "integration"] {
            let deployment = Deployment::for_name(name).unwrap();
            assert_eq!(deployment.name, name);
            assert!(deployment.be_url.starts_with("https://"));
            assert!(deployment.l0_url.starts_with("https://"));
            assert!(deployment.l1_url.starts_with("https://"));
        }
        assert!(Deployment::for_name("staging").is_err());
    }

    #[test]
    fn test_custom_deployment_trims_slashes() {
        let deployment = Deployment::custom(
            "local",
            "http://127.0.0.1:9000/",
            "http://127.0.0.1:9001/",
            "http://127.0.0.1:9002",
        );
        assert_eq!(deployment.be_url, "http://127.0.0.1:9000");
        assert_eq!(deployment.l0_url, "http://127.0.0.1:9001");
        assert_eq!(deployment.events_url(), "ws://127.0.0.1:9001/events");
    }

    #[test]
    fn test_events_url_upgrades_scheme() {
        assert_eq!(
            Deployment::production().events_url(),
            "wss://l0.dagnet.network/events"
        );
    }
}
