//! Agent Client
//!
//! HTTP client for the Consul agent's service registration endpoints.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Response, StatusCode, Url};
use tracing::{debug, info};

use crate::config::Settings;
use crate::definition::ServiceDefinition;
use crate::error::SyncError;

#[derive(Debug)]
pub struct AgentClient {
    client: reqwest::Client,
    base_url: Url,
}

impl AgentClient {
    /// Create from resolved settings
    pub fn new(settings: &Settings) -> Result<Self, SyncError> {
        Self::with_base_url(settings.base_url(), settings)
    }

    /// Create against an explicit base URL, e.g. `http://127.0.0.1:8500/v1`
    pub fn with_base_url(base_url: impl Into<String>, settings: &Settings) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|e| SyncError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(SyncError::InvalidUrl {
                url: base_url,
                reason: "not a base url".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL with `segments` appended, each percent-encoded as one segment
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor: the base url can always take segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Register (or re-register) the service with the agent
    pub async fn register(&self, definition: &ServiceDefinition) -> Result<(), SyncError> {
        definition.validate()?;

        let body = definition.to_json()?;
        let url = self.endpoint(&["agent", "service", "register"]);
        debug!(url = %url, name = %definition.name, "Registering service");

        let response = self.client.put(url).body(body).send().await?;
        check_status("register", response)?;

        info!(name = %definition.name, id = %definition.effective_id(), "Service registered");
        Ok(())
    }

    /// Remove the service instance from the agent
    pub async fn deregister(&self, definition: &ServiceDefinition) -> Result<(), SyncError> {
        definition.validate()?;

        let url = self.endpoint(&["agent", "service", "deregister", definition.effective_id()]);
        debug!(url = %url, "Deregistering service");

        let response = self.client.put(url).send().await?;
        check_status("deregister", response)?;

        info!(id = %definition.effective_id(), "Service deregistered");
        Ok(())
    }
}

fn check_status(operation: &'static str, response: Response) -> Result<(), SyncError> {
    let status = response.status();
    if status != StatusCode::OK {
        return Err(SyncError::Status {
            operation,
            status: status.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            host: "agent.local".to_string(),
            port: 8500,
            protocol: crate::config::Protocol::Http,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_base_url_from_settings() {
        let client = AgentClient::new(&settings()).unwrap();
        assert_eq!(client.base_url(), "http://agent.local:8500/v1");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = AgentClient::with_base_url("http://127.0.0.1:1/v1/", &settings()).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1/v1");
    }

    #[test]
    fn test_endpoint_encodes_each_segment() {
        let client = AgentClient::with_base_url("http://127.0.0.1:1/v1", &settings()).unwrap();
        let url = client.endpoint(&["agent", "service", "deregister", "a/b?x=1#2"]);
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:1/v1/agent/service/deregister/a%2Fb%3Fx=1%232"
        );
    }

    #[test]
    fn test_endpoint_on_bare_host() {
        let client = AgentClient::with_base_url("http://127.0.0.1:1", &settings()).unwrap();
        let url = client.endpoint(&["agent", "service", "register"]);
        assert_eq!(url.as_str(), "http://127.0.0.1:1/agent/service/register");
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let err = AgentClient::with_base_url("not a url", &settings()).unwrap_err();
        assert!(matches!(err, SyncError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_empty_name_rejected_before_request() {
        // Port 1 is never listening; a request would surface as a transport error
        let client = AgentClient::with_base_url("http://127.0.0.1:1/v1", &settings()).unwrap();
        let definition = ServiceDefinition::default();

        let err = client.register(&definition).await.unwrap_err();
        assert!(err.is_validation());

        let err = client.deregister(&definition).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_unreachable_agent_is_transport_error() {
        let client = AgentClient::with_base_url("http://127.0.0.1:1/v1", &settings()).unwrap();
        let err = client
            .register(&ServiceDefinition::new("web"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
