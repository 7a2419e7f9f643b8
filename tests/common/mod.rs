//! Mock ACL service for integration tests
//!
//! Serves the tsuru service proxy surface,
//! `/services/{service}/proxy/{instance}?callback=/rule...`, on a wiremock server.

#![allow(dead_code)]

use std::time::Duration;

use acl_rules::{AclClient, ClientConfig, Reconciler, RetryPolicy};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockBuilder, MockServer};

pub const TEST_TOKEN: &str = "test-token";

/// Mock ACL service behind a tsuru proxy
pub struct MockAcl {
    pub server: MockServer,
}

impl MockAcl {
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    pub fn client(&self) -> AclClient {
        AclClient::new(ClientConfig {
            host: self.server.uri(),
            token: TEST_TOKEN.to_string(),
            timeout: 5,
            ..Default::default()
        })
        .expect("client")
    }

    /// Reconciler with retry windows short enough for tests
    pub fn reconciler(&self) -> Reconciler<AclClient> {
        Reconciler::new(self.client())
            .with_create_retry(fast_retry())
            .with_delete_retry(fast_retry())
    }
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(5),
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
        ..Default::default()
    }
}

/// Request matcher for a proxied call
pub fn proxied(http_method: &str, service: &str, instance: &str, callback: &str) -> MockBuilder {
    Mock::given(method(http_method))
        .and(path(format!("/services/{}/proxy/{}", service, instance)))
        .and(query_param("callback", callback))
}

/// Listing envelope as returned by `GET /rule`
pub fn rule_listing(rules: Vec<Value>) -> Value {
    json!({
        "ServiceInstance": {
            "InstanceName": "my-acl",
            "BaseRules": rules.into_iter().map(|rule| json!({"Rule": rule})).collect::<Vec<_>>()
        }
    })
}

pub fn app_rule(rule_id: &str, app: &str) -> Value {
    json!({
        "RuleID": rule_id,
        "Destination": {"TsuruApp": {"AppName": app, "PoolName": ""}}
    })
}

pub fn dns_rule(rule_id: &str, name: &str, ports: Value) -> Value {
    json!({
        "RuleID": rule_id,
        "Destination": {"ExternalDNS": {"Name": name, "Ports": ports}}
    })
}
