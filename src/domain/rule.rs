//! Destination rule domain types
//!
//! A rule grants an ACL instance access to exactly one destination. These types
//! carry no transport concerns; the wire shape lives in `gateway::wire`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{AclError, Result};

/// Transport protocol of a destination port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = AclError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("tcp") {
            Ok(Protocol::Tcp)
        } else if s.eq_ignore_ascii_case("udp") {
            Ok(Protocol::Udp)
        } else {
            Err(AclError::validation_field(
                format!("unsupported protocol {:?}, expected TCP or UDP", s),
                "protocol",
            ))
        }
    }
}

impl Serialize for Protocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Protocol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A protocol/port pair scoping an IP or DNS destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoPort {
    pub protocol: Protocol,
    pub port: u16,
}

impl ProtoPort {
    /// Build a pair, rejecting port 0
    pub fn new(protocol: Protocol, port: u16) -> Result<Self> {
        if port == 0 {
            return Err(AclError::validation_field("port number must be between 1 and 65535", "port"));
        }
        Ok(Self { protocol, port })
    }
}

/// Tsuru application destination. The ACL service targets either an app or a
/// whole pool; the two names are never both set on rules we create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDestination {
    pub app_name: String,
    pub pool_name: String,
}

impl AppDestination {
    pub fn app(name: impl Into<String>) -> Self {
        Self { app_name: name.into(), pool_name: String::new() }
    }

    pub fn pool(name: impl Into<String>) -> Self {
        Self { app_name: String::new(), pool_name: name.into() }
    }
}

/// External network destination given in CIDR notation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalIpDestination {
    pub cidr: String,
    pub ports: Vec<ProtoPort>,
}

/// External destination given by fully-qualified domain name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalDnsDestination {
    pub name: String,
    pub ports: Vec<ProtoPort>,
}

/// Managed reverse-proxy (rpaas) instance destination
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpaasDestination {
    pub service_name: String,
    pub instance: String,
}

/// Where a rule grants access to. Exactly one kind per rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    App(AppDestination),
    ExternalIp(ExternalIpDestination),
    ExternalDns(ExternalDnsDestination),
    RpaasInstance(RpaasDestination),
}

impl Destination {
    /// Ports attached to the destination. Only IP and DNS destinations carry them.
    pub fn ports(&self) -> &[ProtoPort] {
        match self {
            Destination::ExternalIp(ip) => &ip.ports,
            Destination::ExternalDns(dns) => &dns.ports,
            Destination::App(_) | Destination::RpaasInstance(_) => &[],
        }
    }
}

/// A destination rule as stored by the ACL service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Identifier assigned by the service, empty until created
    pub rule_id: String,
    pub destination: Destination,
}

impl Rule {
    /// A rule not yet known to the service
    pub fn new(destination: Destination) -> Self {
        Self { rule_id: String::new(), destination }
    }

    pub fn with_id(rule_id: impl Into<String>, destination: Destination) -> Self {
        Self { rule_id: rule_id.into(), destination }
    }
}
