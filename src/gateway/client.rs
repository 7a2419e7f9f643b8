//! HTTP client for the ACL service
//!
//! The ACL service is not reached directly: every call goes through the tsuru
//! service proxy, `{host}/services/{service}/proxy/{instance}?callback={path}`,
//! authenticated with the caller's tsuru token.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, Response};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::wire::{CreatedRule, ServiceRuleData, WireRule};
use super::RuleGateway;
use crate::domain::rule::Rule;
use crate::errors::{AclError, Result};

/// Client identifier sent on every request
pub const CLIENT_USER_AGENT: &str = concat!("acl-rules/", env!("CARGO_PKG_VERSION"));

/// ACL service name used when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "acl";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// tsuru API address (e.g., "https://tsuru.example.com")
    pub host: String,

    /// tsuru token used as bearer credential
    pub token: String,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Accept invalid TLS certificates from the tsuru API
    pub skip_cert_verification: bool,

    /// Enable verbose request/response logging
    pub verbose: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            timeout: 30,
            skip_cert_verification: false,
            verbose: false,
        }
    }
}

/// A single call to the ACL service through the proxy
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub service: String,
    pub instance: String,
    /// Path on the ACL service, passed as the `callback` query parameter
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ProxyRequest {
    pub fn new(
        method: Method,
        service: impl Into<String>,
        instance: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            method,
            service: service.into(),
            instance: instance.into(),
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Authenticated client for the ACL service proxy
#[derive(Debug, Clone)]
pub struct AclClient {
    client: Client,
    config: ClientConfig,
}

impl AclClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.host.trim().is_empty() {
            return Err(AclError::config("tsuru host is not set"));
        }
        Url::parse(&config.host)
            .map_err(|e| AclError::config(format!("invalid tsuru host {:?}: {}", config.host, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .danger_accept_invalid_certs(config.skip_cert_verification)
            .build()
            .map_err(|e| AclError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Get the tsuru host
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Build the proxied URL for a path on an ACL instance
    pub fn proxy_url(&self, service: &str, instance: &str, path: &str) -> Result<Url> {
        let mut url = Url::parse(self.config.host.trim_end_matches('/'))
            .map_err(|e| AclError::config(format!("invalid tsuru host: {}", e)))?;

        url.path_segments_mut()
            .map_err(|_| AclError::config("tsuru host cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(["services", service, "proxy", instance]);
        url.query_pairs_mut().append_pair("callback", path);

        Ok(url)
    }

    /// Send a proxied request, failing on statuses outside [200, 400)
    pub async fn send(&self, request: ProxyRequest) -> Result<Response> {
        let url = self.proxy_url(&request.service, &request.instance, &request.path)?;
        debug!(method = %request.method, url = %url, "Sending proxied ACL request");

        let mut builder = self
            .client
            .request(request.method, url)
            .header(AUTHORIZATION, format!("bearer {}", self.config.token))
            .header(USER_AGENT, CLIENT_USER_AGENT);

        if let Some(body) = &request.body {
            if self.config.verbose {
                trace!("Request body:\n{}", body);
            }
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!("Response status: {}", status);

        if !(200..400).contains(&status.as_u16()) {
            let error_text =
                response.text().await.unwrap_or_else(|_| "<unable to read error>".to_string());

            if self.config.verbose {
                trace!("Error response:\n{}", error_text);
            }

            return Err(AclError::remote(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn read_body(&self, response: Response) -> Result<String> {
        let body = response.text().await?;

        if self.config.verbose {
            trace!("Response body:\n{}", body);
        }

        Ok(body)
    }
}

#[async_trait]
impl RuleGateway for AclClient {
    async fn create_rule(&self, service: &str, instance: &str, rule: &mut Rule) -> Result<()> {
        if service.is_empty() {
            return Err(AclError::missing_field("service name"));
        }
        if instance.is_empty() {
            return Err(AclError::missing_field("service instance"));
        }

        let body = serde_json::to_value(WireRule::from(&*rule))?;
        let request = ProxyRequest::new(Method::POST, service, instance, "/rule").with_body(body);
        let response = self.send(request).await?;
        let body = self.read_body(response).await?;

        let saved: CreatedRule = serde_json::from_str(&body)?;
        let rule_id = saved
            .into_rule()
            .rule_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AclError::protocol("rule id not found in response"))?;

        rule.rule_id = rule_id;
        Ok(())
    }

    async fn list_rules(&self, service: &str, instance: &str) -> Result<Vec<Rule>> {
        if service.is_empty() {
            return Err(AclError::missing_field("service name"));
        }
        if instance.is_empty() {
            return Err(AclError::missing_field("service instance"));
        }

        let request = ProxyRequest::new(Method::GET, service, instance, "/rule");
        let response = self.send(request).await?;
        let body = self.read_body(response).await?;

        let data: ServiceRuleData = serde_json::from_str(&body)?;
        Ok(data.into_rules())
    }

    async fn delete_rule(&self, rule_id: &str, service: &str, instance: &str) -> Result<()> {
        let service = if service.is_empty() { DEFAULT_SERVICE_NAME } else { service };
        if instance.is_empty() {
            return Err(AclError::missing_field("service instance"));
        }

        let path = format!("/rule/{}", rule_id);
        self.send(ProxyRequest::new(Method::DELETE, service, instance, path)).await?;
        Ok(())
    }
}
