//! # Remote Rule Gateway
//!
//! Create, list and delete operations against the ACL service. Each call is a
//! single proxied HTTP round trip; retries are the caller's concern.

pub mod client;
pub mod wire;

use async_trait::async_trait;

use crate::domain::rule::Rule;
use crate::errors::Result;

pub use client::{AclClient, ClientConfig, ProxyRequest, CLIENT_USER_AGENT, DEFAULT_SERVICE_NAME};

/// Rule storage on an ACL service instance
#[async_trait]
pub trait RuleGateway: Send + Sync {
    /// Create `rule` and store the identifier assigned by the service in it
    async fn create_rule(&self, service: &str, instance: &str, rule: &mut Rule) -> Result<()>;

    /// List every rule of an instance
    async fn list_rules(&self, service: &str, instance: &str) -> Result<Vec<Rule>>;

    /// Delete a rule. An empty service falls back to the default one.
    async fn delete_rule(&self, rule_id: &str, service: &str, instance: &str) -> Result<()>;
}
