//! Locating a remote rule from an identifier.

use crate::domain::id::ParsedId;
use crate::domain::rule::{Destination, Rule};

/// Find the rule an identifier refers to.
///
/// A rule identifier match anywhere in the list wins over destination matches.
/// Otherwise the first rule whose destination matches the identifier's
/// payload is returned. Empty payload fields never match.
pub fn find_rule_by_parsed_id<'a>(rules: &'a [Rule], id: &ParsedId) -> Option<&'a Rule> {
    if !id.rule_id.is_empty() {
        if let Some(rule) = find_rule_by_rule_id(rules, &id.rule_id) {
            return Some(rule);
        }
    }

    rules.iter().find(|rule| destination_matches(&rule.destination, id))
}

/// Find a rule by its service-assigned identifier
pub fn find_rule_by_rule_id<'a>(rules: &'a [Rule], rule_id: &str) -> Option<&'a Rule> {
    rules.iter().find(|rule| rule.rule_id == rule_id)
}

fn destination_matches(destination: &Destination, id: &ParsedId) -> bool {
    match destination {
        Destination::App(app) => {
            (!id.app_name.is_empty() && app.app_name == id.app_name)
                || (!id.pool_name.is_empty() && app.pool_name == id.pool_name)
        }
        Destination::RpaasInstance(rpaas) => {
            !id.rpaas_service.is_empty()
                && !id.rpaas_instance.is_empty()
                && rpaas.service_name == id.rpaas_service
                && rpaas.instance == id.rpaas_instance
        }
        Destination::ExternalIp(ip) => !id.cidr.is_empty() && ip.cidr == id.cidr,
        Destination::ExternalDns(dns) => !id.dns.is_empty() && dns.name == id.dns,
    }
}
