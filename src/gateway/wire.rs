//! JSON shapes exchanged with the ACL service.
//!
//! The service speaks its own field names (`RuleID`, `TsuruApp`, `ExternalIP`,
//! ...), and `null` for empty lists. These structs only exist to translate
//! between that format and `domain::Rule`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::rule::{
    AppDestination, Destination, ExternalDnsDestination, ExternalIpDestination, ProtoPort,
    Protocol, RpaasDestination, Rule,
};
use crate::errors::{AclError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireRule {
    #[serde(rename = "RuleID", default)]
    pub rule_id: Option<String>,
    #[serde(rename = "Destination", default)]
    pub destination: WireRuleType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireRuleType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsuru_app: Option<WireTsuruApp>,
    #[serde(rename = "ExternalIP", default, skip_serializing_if = "Option::is_none")]
    pub external_ip: Option<WireExternalIp>,
    #[serde(rename = "ExternalDNS", default, skip_serializing_if = "Option::is_none")]
    pub external_dns: Option<WireExternalDns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpaas_instance: Option<WireRpaasInstance>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireTsuruApp {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub pool_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireExternalIp {
    #[serde(rename = "IP", default)]
    pub ip: String,
    #[serde(rename = "Ports", default)]
    pub ports: Option<Vec<WireProtoPort>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireExternalDns {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ports: Option<Vec<WireProtoPort>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireProtoPort {
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub port: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireRpaasInstance {
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub instance: String,
}

/// Envelope returned by `GET /rule`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRuleData {
    #[serde(default)]
    pub service_instance: WireServiceInstance,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireServiceInstance {
    #[serde(default)]
    pub base_rules: Option<Vec<WireServiceRule>>,
}

/// One entry of the listing. Depending on the service version the rule is
/// either nested under `Rule` or inlined in the entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireServiceRule {
    #[serde(rename = "Rule", default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<WireRule>,
    #[serde(flatten)]
    pub inline: WireRule,
}

impl WireServiceRule {
    pub fn into_rule(self) -> WireRule {
        self.rule.unwrap_or(self.inline)
    }
}

/// Body returned by `POST /rule`, nested or inline like listing entries
pub type CreatedRule = WireServiceRule;

impl ServiceRuleData {
    /// Flatten the envelope into domain rules. Entries whose destination cannot
    /// be represented are logged and skipped rather than failing the listing.
    pub fn into_rules(self) -> Vec<Rule> {
        self.service_instance
            .base_rules
            .unwrap_or_default()
            .into_iter()
            .map(WireServiceRule::into_rule)
            .filter_map(|wire| {
                let rule_id = wire.rule_id.clone().unwrap_or_default();
                match Rule::try_from(wire) {
                    Ok(rule) => Some(rule),
                    Err(error) => {
                        warn!(rule_id = %rule_id, error = %error, "Skipping unsupported rule");
                        None
                    }
                }
            })
            .collect()
    }
}

fn ports_to_wire(ports: &[ProtoPort]) -> Option<Vec<WireProtoPort>> {
    if ports.is_empty() {
        return None;
    }
    Some(
        ports
            .iter()
            .map(|port| WireProtoPort { protocol: port.protocol.to_string(), port: u32::from(port.port) })
            .collect(),
    )
}

/// Ports the service reports are checked like declared ones, so a rule with an
/// unsupported protocol or port 0 fails conversion on its own.
fn ports_from_wire(ports: Option<Vec<WireProtoPort>>) -> Result<Vec<ProtoPort>> {
    ports
        .unwrap_or_default()
        .into_iter()
        .map(|port| {
            let number = u16::try_from(port.port).unwrap_or(0);
            port.protocol
                .parse::<Protocol>()
                .and_then(|protocol| ProtoPort::new(protocol, number))
                .map_err(|error| AclError::protocol(format!("unsupported port in rule: {}", error)))
        })
        .collect()
}

impl From<&Rule> for WireRule {
    fn from(rule: &Rule) -> Self {
        let mut destination = WireRuleType::default();
        match &rule.destination {
            Destination::App(app) => {
                destination.tsuru_app = Some(WireTsuruApp {
                    app_name: app.app_name.clone(),
                    pool_name: app.pool_name.clone(),
                })
            }
            Destination::ExternalIp(ip) => {
                destination.external_ip =
                    Some(WireExternalIp { ip: ip.cidr.clone(), ports: ports_to_wire(&ip.ports) })
            }
            Destination::ExternalDns(dns) => {
                destination.external_dns = Some(WireExternalDns {
                    name: dns.name.clone(),
                    ports: ports_to_wire(&dns.ports),
                })
            }
            Destination::RpaasInstance(rpaas) => {
                destination.rpaas_instance = Some(WireRpaasInstance {
                    service_name: rpaas.service_name.clone(),
                    instance: rpaas.instance.clone(),
                })
            }
        }

        let rule_id = (!rule.rule_id.is_empty()).then(|| rule.rule_id.clone());
        WireRule { rule_id, destination }
    }
}

impl TryFrom<WireRule> for Rule {
    type Error = AclError;

    fn try_from(wire: WireRule) -> Result<Self> {
        let WireRuleType { tsuru_app, external_ip, external_dns, rpaas_instance } =
            wire.destination;

        let mut destinations = Vec::with_capacity(1);
        if let Some(app) = tsuru_app {
            destinations.push(Destination::App(AppDestination {
                app_name: app.app_name,
                pool_name: app.pool_name,
            }));
        }
        if let Some(ip) = external_ip {
            destinations.push(Destination::ExternalIp(ExternalIpDestination {
                cidr: ip.ip,
                ports: ports_from_wire(ip.ports)?,
            }));
        }
        if let Some(dns) = external_dns {
            destinations.push(Destination::ExternalDns(ExternalDnsDestination {
                name: dns.name,
                ports: ports_from_wire(dns.ports)?,
            }));
        }
        if let Some(rpaas) = rpaas_instance {
            destinations.push(Destination::RpaasInstance(RpaasDestination {
                service_name: rpaas.service_name,
                instance: rpaas.instance,
            }));
        }

        if destinations.len() != 1 {
            return Err(AclError::protocol(format!(
                "rule must have exactly one destination, found {}",
                destinations.len()
            )));
        }

        Ok(Rule { rule_id: wire.rule_id.unwrap_or_default(), destination: destinations.remove(0) })
    }
}
