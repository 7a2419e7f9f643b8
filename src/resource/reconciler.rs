//! Lifecycle reconciliation of destination rules.
//!
//! Create and delete are wrapped in a [`RetryPolicy`] because the service
//! rejects writes while an instance is locked by another event. Reads are a
//! single listing bounded only by cancellation.

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::DestinationRuleResource;
use crate::domain::id::{split_id_parts, ParsedId};
use crate::domain::matcher::{find_rule_by_parsed_id, find_rule_by_rule_id};
use crate::domain::rule::Rule;
use crate::errors::{AclError, Result};
use crate::gateway::RuleGateway;
use crate::retry::{run_cancellable, RetryPolicy};

/// Outcome of refreshing a resource from the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The rule exists and the resource reflects it
    Present,
    /// The rule is gone and the resource identifier was cleared
    Gone,
}

/// A rule found on the service together with where it was found
#[derive(Debug, Clone)]
struct Located {
    service: String,
    instance: String,
    rule: Rule,
}

/// Drives destination rule resources through their lifecycle
pub struct Reconciler<G> {
    gateway: G,
    create_retry: RetryPolicy,
    delete_retry: RetryPolicy,
}

impl<G: RuleGateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway, create_retry: RetryPolicy::default(), delete_retry: RetryPolicy::default() }
    }

    pub fn with_create_retry(mut self, policy: RetryPolicy) -> Self {
        self.create_retry = policy;
        self
    }

    pub fn with_delete_retry(mut self, policy: RetryPolicy) -> Self {
        self.delete_retry = policy;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Create the declared rule, bind its identifier and refresh the resource
    #[instrument(skip(self, resource, cancel), fields(instance = %resource.instance))]
    pub async fn create(
        &self,
        resource: &mut DestinationRuleResource,
        cancel: &CancellationToken,
    ) -> Result<ReadStatus> {
        let rule = resource.to_rule()?;
        resource.service_name = resource.effective_service_name().to_string();

        let gateway = &self.gateway;
        let service: &str = &resource.service_name;
        let instance: &str = &resource.instance;
        let created = self
            .create_retry
            .run("create rule", cancel, || {
                let mut candidate = rule.clone();
                async move {
                    gateway.create_rule(service, instance, &mut candidate).await?;
                    Ok(candidate)
                }
            })
            .await?;

        info!(rule_id = %created.rule_id, service = %service, "Created destination rule");
        resource.id = created.rule_id;

        self.read(resource, cancel).await
    }

    /// Refresh the observed attributes from the service
    #[instrument(skip(self, resource, cancel), fields(id = %resource.id))]
    pub async fn read(
        &self,
        resource: &mut DestinationRuleResource,
        cancel: &CancellationToken,
    ) -> Result<ReadStatus> {
        match self.locate(resource, cancel).await? {
            Some(located) => {
                resource.service_name = located.service;
                resource.instance = located.instance;
                resource.apply_rule(&located.rule);
                Ok(ReadStatus::Present)
            }
            None => {
                warn!(id = %resource.id, "Destination rule no longer exists, clearing identifier");
                resource.id.clear();
                Ok(ReadStatus::Gone)
            }
        }
    }

    /// Delete the rule bound to the resource. A rule that is already gone is
    /// not an error.
    #[instrument(skip(self, resource, cancel), fields(id = %resource.id))]
    pub async fn delete(
        &self,
        resource: &mut DestinationRuleResource,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(located) = self.locate(resource, cancel).await? else {
            info!(id = %resource.id, "Destination rule already absent");
            resource.id.clear();
            return Ok(());
        };

        let gateway = &self.gateway;
        let rule_id: &str = &located.rule.rule_id;
        let service: &str = &located.service;
        let instance: &str = &located.instance;
        self.delete_retry
            .run("delete rule", cancel, || gateway.delete_rule(rule_id, service, instance))
            .await?;

        info!(rule_id = %rule_id, service = %service, instance = %instance, "Deleted destination rule");
        resource.id.clear();
        Ok(())
    }

    /// Adopt an existing rule from its typed or legacy identifier
    #[instrument(skip(self, cancel))]
    pub async fn import(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<DestinationRuleResource> {
        let parsed = ParsedId::decode(id)?;
        let rules = self.list(&parsed.service, &parsed.instance, cancel).await?;
        let rule = find_rule_by_parsed_id(&rules, &parsed)
            .ok_or_else(|| AclError::not_found("rule not found"))?;

        let mut resource = DestinationRuleResource::new(parsed.instance.clone());
        resource.service_name = parsed.service.clone();
        resource.id = rule.rule_id.clone();
        resource.apply_rule(rule);

        info!(rule_id = %resource.id, "Imported destination rule");
        Ok(resource)
    }

    /// Every rule on an instance
    pub async fn list(
        &self,
        service: &str,
        instance: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Rule>> {
        run_cancellable("list rules", cancel, self.gateway.list_rules(service, instance)).await
    }

    /// Resolve the resource identifier and find its rule. The identifier is
    /// either a bare rule id, looked up on the resource's own instance, or
    /// `service::instance::rule_id`.
    async fn locate(
        &self,
        resource: &DestinationRuleResource,
        cancel: &CancellationToken,
    ) -> Result<Option<Located>> {
        let parts = split_id_parts(&resource.id);
        let (service, instance, rule_id) = match parts.as_slice() {
            [rule_id] if !rule_id.is_empty() => {
                (resource.effective_service_name(), resource.instance.as_str(), *rule_id)
            }
            [service, instance, rule_id] if !rule_id.is_empty() => (*service, *instance, *rule_id),
            _ => {
                return Err(AclError::invalid_identifier(
                    &resource.id,
                    "expected rule_id or service::instance::rule_id",
                ))
            }
        };

        let rules = self.list(service, instance, cancel).await?;
        Ok(find_rule_by_rule_id(&rules, rule_id).map(|rule| Located {
            service: service.to_string(),
            instance: instance.to_string(),
            rule: rule.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::domain::rule::{AppDestination, Destination, ExternalIpDestination};

    /// In-memory rule storage keyed by instance
    #[derive(Default)]
    struct FakeGateway {
        rules: Mutex<Vec<(String, String, Rule)>>,
        create_failures: Mutex<VecDeque<AclError>>,
        calls: Mutex<Vec<String>>,
        next_id: Mutex<u32>,
    }

    impl FakeGateway {
        fn with_rule(self, service: &str, instance: &str, rule: Rule) -> Self {
            self.rules.lock().unwrap().push((service.to_string(), instance.to_string(), rule));
            self
        }

        fn fail_create_with(self, error: AclError) -> Self {
            self.create_failures.lock().unwrap().push_back(error);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RuleGateway for FakeGateway {
        async fn create_rule(&self, service: &str, instance: &str, rule: &mut Rule) -> Result<()> {
            self.calls.lock().unwrap().push(format!("create {}/{}", service, instance));
            if let Some(error) = self.create_failures.lock().unwrap().pop_front() {
                return Err(error);
            }
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            rule.rule_id = format!("rule-{}", next_id);
            self.rules.lock().unwrap().push((service.to_string(), instance.to_string(), rule.clone()));
            Ok(())
        }

        async fn list_rules(&self, service: &str, instance: &str) -> Result<Vec<Rule>> {
            self.calls.lock().unwrap().push(format!("list {}/{}", service, instance));
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|(s, i, _)| s == service && i == instance)
                .map(|(_, _, rule)| rule.clone())
                .collect())
        }

        async fn delete_rule(&self, rule_id: &str, service: &str, instance: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("delete {}/{}/{}", service, instance, rule_id));
            self.rules.lock().unwrap().retain(|(_, _, rule)| rule.rule_id != rule_id);
            Ok(())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            ..Default::default()
        }
    }

    fn reconciler(gateway: FakeGateway) -> Reconciler<FakeGateway> {
        Reconciler::new(gateway).with_create_retry(fast_retry()).with_delete_retry(fast_retry())
    }

    fn app_rule(id: &str, app: &str) -> Rule {
        Rule::with_id(id, Destination::App(AppDestination::app(app)))
    }

    #[tokio::test]
    async fn test_create_then_read_app_rule() {
        let reconciler = reconciler(FakeGateway::default());
        let mut resource = DestinationRuleResource::new("my-acl").with_app("my-destination-app");

        let status = reconciler.create(&mut resource, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, ReadStatus::Present);
        assert_eq!(resource.id, "rule-1");
        assert_eq!(resource.app, "my-destination-app");
        assert_eq!(resource.pool, "");
        assert_eq!(reconciler.gateway().calls(), vec!["create acl/my-acl", "list acl/my-acl"]);
    }

    #[tokio::test]
    async fn test_create_retries_while_event_locked() {
        let gateway = FakeGateway::default()
            .fail_create_with(AclError::remote(500, "event locked"))
            .fail_create_with(AclError::remote(500, "event locked"));
        let reconciler = reconciler(gateway);
        let mut resource = DestinationRuleResource::new("my-acl").with_ip("10.0.0.0/8");

        reconciler.create(&mut resource, &CancellationToken::new()).await.unwrap();

        assert_eq!(resource.id, "rule-1");
        let creates = reconciler.gateway().calls().iter().filter(|c| c.starts_with("create")).count();
        assert_eq!(creates, 3);
    }

    #[tokio::test]
    async fn test_create_stops_on_other_errors() {
        let gateway = FakeGateway::default().fail_create_with(AclError::remote(400, "bad rule"));
        let reconciler = reconciler(gateway);
        let mut resource = DestinationRuleResource::new("my-acl").with_ip("10.0.0.0/8");

        let error = reconciler.create(&mut resource, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(error, AclError::Remote { status: 400, .. }));
        assert!(!resource.exists());
        assert_eq!(reconciler.gateway().calls(), vec!["create acl/my-acl"]);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_resource_without_calls() {
        let reconciler = reconciler(FakeGateway::default());
        let mut resource = DestinationRuleResource::new("my-acl");

        assert!(reconciler.create(&mut resource, &CancellationToken::new()).await.is_err());
        assert!(reconciler.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_read_composite_id_overrides_coordinates() {
        let gateway = FakeGateway::default().with_rule("acl-v2", "other", app_rule("r1", "web"));
        let reconciler = reconciler(gateway);
        let mut resource = DestinationRuleResource::new("my-acl");
        resource.id = "acl-v2::other::r1".to_string();

        let status = reconciler.read(&mut resource, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, ReadStatus::Present);
        assert_eq!(resource.service_name, "acl-v2");
        assert_eq!(resource.instance, "other");
        assert_eq!(resource.app, "web");
        assert_eq!(reconciler.gateway().calls(), vec!["list acl-v2/other"]);
    }

    #[tokio::test]
    async fn test_read_missing_rule_clears_id() {
        let gateway = FakeGateway::default().with_rule("acl", "my-acl", app_rule("r1", "web"));
        let reconciler = reconciler(gateway);
        let mut resource = DestinationRuleResource::new("my-acl").with_app("web");
        resource.id = "r2".to_string();

        let status = reconciler.read(&mut resource, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, ReadStatus::Gone);
        assert!(!resource.exists());
    }

    #[tokio::test]
    async fn test_read_rejects_two_part_id() {
        let reconciler = reconciler(FakeGateway::default());
        let mut resource = DestinationRuleResource::new("my-acl");
        resource.id = "acl::r1".to_string();

        let error = reconciler.read(&mut resource, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(error, AclError::InvalidIdentifier { .. }));
        assert!(reconciler.gateway().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_absent_rule_is_noop() {
        let reconciler = reconciler(FakeGateway::default());
        let mut resource = DestinationRuleResource::new("my-acl").with_app("web");
        resource.id = "r1".to_string();

        reconciler.delete(&mut resource, &CancellationToken::new()).await.unwrap();

        assert!(!resource.exists());
        assert_eq!(reconciler.gateway().calls(), vec!["list acl/my-acl"]);
    }

    #[tokio::test]
    async fn test_delete_uses_located_coordinates() {
        let gateway = FakeGateway::default().with_rule("acl", "other", app_rule("r1", "web"));
        let reconciler = reconciler(gateway);
        let mut resource = DestinationRuleResource::new("my-acl");
        resource.id = "acl::other::r1".to_string();

        reconciler.delete(&mut resource, &CancellationToken::new()).await.unwrap();

        assert!(!resource.exists());
        assert_eq!(reconciler.gateway().calls(), vec!["list acl/other", "delete acl/other/r1"]);
    }

    #[tokio::test]
    async fn test_import_typed_id() {
        let gateway = FakeGateway::default()
            .with_rule("acl", "my-acl", app_rule("other", "web"))
            .with_rule("acl", "my-acl", app_rule("my-rule", "my-destination-app"));
        let reconciler = reconciler(gateway);

        let resource = reconciler
            .import("acl-rule::acl::my-acl::app::my-destination-app", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resource.id, "my-rule");
        assert_eq!(resource.service_name, "acl");
        assert_eq!(resource.instance, "my-acl");
        assert_eq!(resource.app, "my-destination-app");
    }

    #[tokio::test]
    async fn test_import_legacy_id() {
        let rule = Rule::with_id(
            "r9",
            Destination::ExternalIp(ExternalIpDestination {
                cidr: "10.0.0.0/8".to_string(),
                ports: vec![],
            }),
        );
        let reconciler = reconciler(FakeGateway::default().with_rule("acl", "my-acl", rule));

        let resource =
            reconciler.import("acl::my-acl::r9", &CancellationToken::new()).await.unwrap();

        assert_eq!(resource.id, "r9");
        assert_eq!(resource.ip, "10.0.0.0/8");
    }

    #[tokio::test]
    async fn test_import_unknown_rule_is_not_found() {
        let reconciler = reconciler(FakeGateway::default());

        let error = reconciler
            .import("acl-rule::acl::my-acl::dns::example.org", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, AclError::NotFound { .. }));
        assert_eq!(error.to_string(), "rule not found");
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let reconciler = reconciler(FakeGateway::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut resource = DestinationRuleResource::new("my-acl");
        resource.id = "r1".to_string();

        let error = reconciler.read(&mut resource, &cancel).await.unwrap_err();

        assert!(matches!(error, AclError::Cancelled { .. }));
        assert_eq!(resource.id, "r1");
    }
}
