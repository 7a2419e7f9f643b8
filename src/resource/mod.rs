//! # Destination Rule Resource
//!
//! The attribute set a consumer declares and observes for one destination
//! rule, and the lifecycle calls that reconcile it with the ACL service.

pub mod reconciler;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::domain::id::ParsedId;
use crate::domain::rule::{
    AppDestination, Destination, ExternalDnsDestination, ExternalIpDestination, ProtoPort,
    Protocol, RpaasDestination, Rule,
};
use crate::errors::{AclError, Result};
use crate::gateway::DEFAULT_SERVICE_NAME;

pub use reconciler::{ReadStatus, Reconciler};

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

/// rpaas instance targeted by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpaasAttributes {
    pub service_name: String,
    pub instance: String,
}

/// Protocol and port number pair, as written by the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAttributes {
    pub protocol: String,
    pub number: u32,
}

impl PortAttributes {
    pub fn new(protocol: impl Into<String>, number: u32) -> Self {
        Self { protocol: protocol.into(), number }
    }

    fn to_proto_port(&self) -> Result<ProtoPort> {
        let protocol: Protocol = self.protocol.parse()?;
        let port = u16::try_from(self.number).map_err(|_| {
            AclError::validation_field("port number must be between 1 and 65535", "port")
        })?;
        ProtoPort::new(protocol, port)
    }
}

impl From<&ProtoPort> for PortAttributes {
    fn from(port: &ProtoPort) -> Self {
        Self { protocol: port.protocol.to_string(), number: u32::from(port.port) }
    }
}

/// Declared and observed state of one destination rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRuleResource {
    /// Rule identifier, or `service::instance::rule_id`. Empty when absent.
    #[serde(default)]
    pub id: String,

    /// ACL service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// ACL instance name
    pub instance: String,

    /// Destination IP network in CIDR notation
    #[serde(default)]
    pub ip: String,

    /// Destination fully qualified domain name
    #[serde(default)]
    pub dns: String,

    /// Destination tsuru app name
    #[serde(default)]
    pub app: String,

    /// Destination tsuru pool name
    #[serde(default)]
    pub pool: String,

    /// Destination rpaas instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpaas: Option<RpaasAttributes>,

    /// Ports, only meaningful with `ip` or `dns`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port: Vec<PortAttributes>,
}

impl DestinationRuleResource {
    /// An empty resource on the default ACL service
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            service_name: default_service_name(),
            instance: instance.into(),
            ip: String::new(),
            dns: String::new(),
            app: String::new(),
            pool: String::new(),
            rpaas: None,
            port: Vec::new(),
        }
    }

    pub fn with_ip(mut self, cidr: impl Into<String>) -> Self {
        self.ip = cidr.into();
        self
    }

    pub fn with_dns(mut self, name: impl Into<String>) -> Self {
        self.dns = name.into();
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = app.into();
        self
    }

    pub fn with_pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = pool.into();
        self
    }

    pub fn with_rpaas(mut self, service_name: impl Into<String>, instance: impl Into<String>) -> Self {
        self.rpaas =
            Some(RpaasAttributes { service_name: service_name.into(), instance: instance.into() });
        self
    }

    pub fn with_port(mut self, protocol: impl Into<String>, number: u32) -> Self {
        self.port.push(PortAttributes::new(protocol, number));
        self
    }

    /// Service name, falling back to the default when unset
    pub fn effective_service_name(&self) -> &str {
        if self.service_name.is_empty() {
            DEFAULT_SERVICE_NAME
        } else {
            &self.service_name
        }
    }

    /// Whether the resource is bound to a remote rule
    pub fn exists(&self) -> bool {
        !self.id.is_empty()
    }

    /// Check the declared attributes before anything is sent to the service
    pub fn validate(&self) -> Result<()> {
        if self.instance.is_empty() {
            return Err(AclError::missing_field("instance"));
        }

        let declared = [
            !self.ip.is_empty(),
            !self.dns.is_empty(),
            !self.app.is_empty(),
            !self.pool.is_empty(),
            self.rpaas.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if declared != 1 {
            return Err(AclError::validation(
                "exactly one of ip, dns, app, pool or rpaas must be set",
            ));
        }

        if !self.ip.is_empty() && !is_cidr(&self.ip) {
            return Err(AclError::validation_field(
                format!("{:?} is not a valid CIDR", self.ip),
                "ip",
            ));
        }

        if let Some(rpaas) = &self.rpaas {
            if rpaas.service_name.is_empty() || rpaas.instance.is_empty() {
                return Err(AclError::validation_field(
                    "rpaas requires both service_name and instance",
                    "rpaas",
                ));
            }
        }

        if !self.port.is_empty() && self.ip.is_empty() && self.dns.is_empty() {
            return Err(AclError::validation_field("port is only allowed with ip or dns", "port"));
        }

        for port in &self.port {
            port.to_proto_port()?;
        }

        Ok(())
    }

    /// Build the rule to create from the declared attributes
    pub fn to_rule(&self) -> Result<Rule> {
        self.validate()?;

        let ports =
            self.port.iter().map(PortAttributes::to_proto_port).collect::<Result<Vec<_>>>()?;

        let destination = if !self.ip.is_empty() {
            Destination::ExternalIp(ExternalIpDestination { cidr: self.ip.clone(), ports })
        } else if !self.dns.is_empty() {
            Destination::ExternalDns(ExternalDnsDestination { name: self.dns.clone(), ports })
        } else if !self.app.is_empty() {
            Destination::App(AppDestination::app(&self.app))
        } else if !self.pool.is_empty() {
            Destination::App(AppDestination::pool(&self.pool))
        } else {
            let rpaas = self.rpaas.as_ref().ok_or_else(|| AclError::validation("no destination set"))?;
            Destination::RpaasInstance(RpaasDestination {
                service_name: rpaas.service_name.clone(),
                instance: rpaas.instance.clone(),
            })
        };

        Ok(Rule::new(destination))
    }

    /// Replace the observed destination attributes with those of `rule`,
    /// clearing the fields of every other destination kind.
    pub fn apply_rule(&mut self, rule: &Rule) {
        self.ip.clear();
        self.dns.clear();
        self.app.clear();
        self.pool.clear();
        self.rpaas = None;
        self.port = rule.destination.ports().iter().map(PortAttributes::from).collect();

        match &rule.destination {
            Destination::App(app) => {
                self.app = app.app_name.clone();
                self.pool = app.pool_name.clone();
            }
            Destination::ExternalIp(ip) => self.ip = ip.cidr.clone(),
            Destination::ExternalDns(dns) => self.dns = dns.name.clone(),
            Destination::RpaasInstance(rpaas) => {
                self.rpaas = Some(RpaasAttributes {
                    service_name: rpaas.service_name.clone(),
                    instance: rpaas.instance.clone(),
                })
            }
        }
    }

    /// Typed identifier that imports this rule back
    pub fn import_id(&self) -> Result<String> {
        let rule = self.to_rule()?;
        Ok(ParsedId::for_rule(self.effective_service_name(), &self.instance, &rule).encode())
    }
}

fn is_cidr(value: &str) -> bool {
    value.parse::<IpNet>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_resource_defaults_to_acl_service() {
        let resource = DestinationRuleResource::new("my-acl");
        assert_eq!(resource.service_name, "acl");
        assert!(!resource.exists());
    }

    #[test]
    fn test_deserialize_applies_default_service() {
        let resource: DestinationRuleResource =
            serde_json::from_str(r#"{"instance": "my-acl", "app": "web"}"#).unwrap();
        assert_eq!(resource.service_name, "acl");
        assert_eq!(resource.app, "web");
    }

    #[test]
    fn test_validate_requires_instance() {
        let error = DestinationRuleResource::new("").with_app("web").validate().unwrap_err();
        assert!(matches!(error, AclError::MissingField { field: "instance" }));
    }

    #[test]
    fn test_validate_exactly_one_destination() {
        assert!(DestinationRuleResource::new("my-acl").validate().is_err());
        assert!(DestinationRuleResource::new("my-acl")
            .with_app("web")
            .with_dns("example.org")
            .validate()
            .is_err());
        assert!(DestinationRuleResource::new("my-acl").with_pool("prod").validate().is_ok());
    }

    #[test]
    fn test_validate_cidr() {
        assert!(DestinationRuleResource::new("a").with_ip("10.0.0.0/6").validate().is_ok());
        assert!(DestinationRuleResource::new("a").with_ip("2001:db8::/32").validate().is_ok());
        assert!(DestinationRuleResource::new("a").with_ip("10.0.0.1").validate().is_err());
        assert!(DestinationRuleResource::new("a").with_ip("10.0.0.0/33").validate().is_err());
        assert!(DestinationRuleResource::new("a").with_ip("example.org/8").validate().is_err());
        assert!(DestinationRuleResource::new("a").with_ip("10.0.0.0/+8").validate().is_err());
        assert!(DestinationRuleResource::new("a").with_ip("10.0.0.0/").validate().is_err());
    }

    #[test]
    fn test_validate_ports() {
        let base = DestinationRuleResource::new("a").with_dns("example.org");
        assert!(base.clone().with_port("tcp", 80).with_port("UDP", 53).validate().is_ok());
        assert!(base.clone().with_port("icmp", 80).validate().is_err());
        assert!(base.clone().with_port("TCP", 0).validate().is_err());
        assert!(base.with_port("TCP", 70000).validate().is_err());

        let error =
            DestinationRuleResource::new("a").with_app("web").with_port("TCP", 80).validate().unwrap_err();
        assert!(matches!(error, AclError::Validation { field: Some(ref f), .. } if f == "port"));
    }

    #[test]
    fn test_validate_rpaas_needs_both_names() {
        let resource = DestinationRuleResource::new("a").with_rpaas("rpaasv2-be", "");
        assert!(resource.validate().is_err());
    }

    #[test]
    fn test_to_rule_attaches_ports_to_network_destinations() {
        let rule = DestinationRuleResource::new("a")
            .with_ip("10.0.0.0/6")
            .with_port("tcp", 80)
            .with_port("TCP", 443)
            .to_rule()
            .unwrap();

        assert_eq!(rule.rule_id, "");
        assert_eq!(
            rule.destination,
            Destination::ExternalIp(ExternalIpDestination {
                cidr: "10.0.0.0/6".to_string(),
                ports: vec![
                    ProtoPort { protocol: Protocol::Tcp, port: 80 },
                    ProtoPort { protocol: Protocol::Tcp, port: 443 },
                ],
            })
        );
    }

    #[test]
    fn test_apply_rule_clears_other_destinations() {
        let mut resource = DestinationRuleResource::new("a")
            .with_dns("example.org")
            .with_port("TCP", 443);
        resource.rpaas = Some(RpaasAttributes {
            service_name: "stale".to_string(),
            instance: "stale".to_string(),
        });

        resource.apply_rule(&Rule::with_id("r1", Destination::App(AppDestination::app("web"))));

        assert_eq!(resource.app, "web");
        assert_eq!(resource.pool, "");
        assert_eq!(resource.dns, "");
        assert!(resource.rpaas.is_none());
        assert!(resource.port.is_empty());
    }

    #[test]
    fn test_apply_rule_reports_ports() {
        let mut resource = DestinationRuleResource::new("a");
        resource.apply_rule(&Rule::with_id(
            "r1",
            Destination::ExternalDns(ExternalDnsDestination {
                name: "example.org".to_string(),
                ports: vec![ProtoPort { protocol: Protocol::Udp, port: 53 }],
            }),
        ));

        assert_eq!(resource.dns, "example.org");
        assert_eq!(resource.port, vec![PortAttributes::new("UDP", 53)]);
    }

    #[test]
    fn test_import_id() {
        let resource = DestinationRuleResource::new("my-acl").with_rpaas("rpaasv2-be", "my-rpaas");
        assert_eq!(
            resource.import_id().unwrap(),
            "acl-rule::acl::my-acl::rpaas::rpaasv2-be::my-rpaas"
        );
    }
}
