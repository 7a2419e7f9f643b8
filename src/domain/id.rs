//! Destination rule identifiers
//!
//! Rules are addressed from the outside by an opaque string made of segments
//! joined with `::`. Two layouts are accepted:
//!
//! ```text
//! {service}::{instance}::{rule_id}                          (legacy)
//! acl-rule::{service}::{instance}::{type}::{payload...}     (typed)
//! ```
//!
//! The legacy layout resolves by rule identifier only. The typed layout names
//! the destination, so a rule can be located before its identifier is known.

use std::fmt;
use std::str::FromStr;

use crate::domain::rule::{Destination, Rule};
use crate::errors::{AclError, Result};

/// Separator between identifier segments
pub const ID_SEPARATOR: &str = "::";

/// Leading segment of every typed identifier
pub const DESTINATION_RULE_KEY: &str = "acl-rule";

/// Destination tag carried in segment 3 of a typed identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    App,
    Pool,
    Ip,
    Dns,
    Rpaas,
}

impl DestinationKind {
    pub const ALL: [DestinationKind; 5] = [
        DestinationKind::App,
        DestinationKind::Pool,
        DestinationKind::Ip,
        DestinationKind::Dns,
        DestinationKind::Rpaas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DestinationKind::App => "app",
            DestinationKind::Pool => "pool",
            DestinationKind::Ip => "ip",
            DestinationKind::Dns => "dns",
            DestinationKind::Rpaas => "rpaas",
        }
    }
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationKind {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AclError::invalid_identifier(s, "unknown destination type"))
    }
}

/// Join the non-empty values with the identifier separator
pub fn generate_id<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|value| value.as_ref())
        .filter(|value| !value.is_empty())
        .collect::<Vec<&str>>()
        .join(ID_SEPARATOR)
        .trim()
        .to_string()
}

/// Split an identifier into its segments. An empty identifier has none.
pub fn split_id_parts(id: &str) -> Vec<&str> {
    if id.is_empty() {
        return Vec::new();
    }
    id.trim().split(ID_SEPARATOR).collect()
}

fn segment<'a>(parts: &[&'a str], index: usize) -> &'a str {
    parts.get(index).copied().unwrap_or_default()
}

/// Structured form of a rule identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedId {
    pub service: String,
    pub instance: String,
    /// Set by the legacy layout only
    pub rule_id: String,
    /// `None` for the legacy layout
    pub kind: Option<DestinationKind>,
    pub app_name: String,
    pub pool_name: String,
    pub cidr: String,
    pub dns: String,
    pub rpaas_service: String,
    pub rpaas_instance: String,
}

impl ParsedId {
    /// Identifier resolving by rule id within an instance
    pub fn legacy(
        service: impl Into<String>,
        instance: impl Into<String>,
        rule_id: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            instance: instance.into(),
            rule_id: rule_id.into(),
            ..Default::default()
        }
    }

    /// Typed identifier describing where `rule` points to
    pub fn for_rule(service: impl Into<String>, instance: impl Into<String>, rule: &Rule) -> Self {
        let mut parsed =
            Self { service: service.into(), instance: instance.into(), ..Default::default() };

        match &rule.destination {
            Destination::App(app) if app.app_name.is_empty() && !app.pool_name.is_empty() => {
                parsed.kind = Some(DestinationKind::Pool);
                parsed.pool_name = app.pool_name.clone();
            }
            Destination::App(app) => {
                parsed.kind = Some(DestinationKind::App);
                parsed.app_name = app.app_name.clone();
            }
            Destination::ExternalIp(ip) => {
                parsed.kind = Some(DestinationKind::Ip);
                parsed.cidr = ip.cidr.clone();
            }
            Destination::ExternalDns(dns) => {
                parsed.kind = Some(DestinationKind::Dns);
                parsed.dns = dns.name.clone();
            }
            Destination::RpaasInstance(rpaas) => {
                parsed.kind = Some(DestinationKind::Rpaas);
                parsed.rpaas_service = rpaas.service_name.clone();
                parsed.rpaas_instance = rpaas.instance.clone();
            }
        }

        parsed
    }

    /// Decode an opaque identifier in either layout
    pub fn decode(id: &str) -> Result<Self> {
        if id.is_empty() {
            return Err(AclError::invalid_identifier(id, "identifier is empty"));
        }

        let parts = split_id_parts(id);
        if parts.len() < 3 {
            return Err(AclError::invalid_identifier(id, "expected at least 3 segments"));
        }

        if parts.len() == 3 {
            return Ok(Self::legacy(parts[0], parts[1], parts[2]));
        }

        if segment(&parts, 0) != DESTINATION_RULE_KEY {
            return Err(AclError::invalid_identifier(id, "destination rule key invalid"));
        }

        let mut parsed = ParsedId { service: segment(&parts, 1).to_string(), ..Default::default() };
        if parsed.service.is_empty() {
            return Err(AclError::missing_field("service name"));
        }

        parsed.instance = segment(&parts, 2).to_string();
        if parsed.instance.is_empty() {
            return Err(AclError::missing_field("instance"));
        }

        let tag = segment(&parts, 3);
        if tag.is_empty() {
            return Err(AclError::missing_field("destination type"));
        }
        let kind = tag
            .parse::<DestinationKind>()
            .map_err(|_| AclError::invalid_identifier(id, format!("unknown destination type {:?}", tag)))?;
        parsed.kind = Some(kind);

        // Segments past the payload are ignored.
        let payload = segment(&parts, 4).to_string();
        match kind {
            DestinationKind::App => parsed.app_name = payload,
            DestinationKind::Pool => parsed.pool_name = payload,
            DestinationKind::Ip => parsed.cidr = payload,
            DestinationKind::Dns => parsed.dns = payload,
            DestinationKind::Rpaas => {
                parsed.rpaas_service = payload;
                parsed.rpaas_instance = segment(&parts, 5).to_string();
            }
        }

        Ok(parsed)
    }

    /// Render back to the opaque form. Empty segments are dropped.
    pub fn encode(&self) -> String {
        let Some(kind) = self.kind else {
            return generate_id(&[&self.service, &self.instance, &self.rule_id]);
        };

        let mut values: Vec<&str> =
            vec![DESTINATION_RULE_KEY, &self.service, &self.instance, kind.as_str()];
        match kind {
            DestinationKind::App => values.push(&self.app_name),
            DestinationKind::Pool => values.push(&self.pool_name),
            DestinationKind::Ip => values.push(&self.cidr),
            DestinationKind::Dns => values.push(&self.dns),
            DestinationKind::Rpaas => {
                values.push(&self.rpaas_service);
                values.push(&self.rpaas_instance);
            }
        }
        generate_id(&values)
    }

    /// Destination tag as text, empty for the legacy layout
    pub fn kind_str(&self) -> &'static str {
        self.kind.map(|kind| kind.as_str()).unwrap_or_default()
    }

    pub fn is_legacy(&self) -> bool {
        self.kind.is_none()
    }
}

impl FromStr for ParsedId {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl fmt::Display for ParsedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
