//! Output formatting for CLI commands
//!
//! Resources and rule listings can be printed as JSON, YAML, or a table.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::id::ParsedId;
use crate::domain::rule::{Destination, Rule};
use crate::resource::DestinationRuleResource;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

/// One row of `list` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub rule_id: String,
    pub kind: &'static str,
    pub destination: String,
    pub ports: String,
    pub import_id: String,
}

impl RuleSummary {
    pub fn new(service: &str, instance: &str, rule: &Rule) -> Self {
        let id = ParsedId::for_rule(service, instance, rule);
        let destination = match &rule.destination {
            Destination::App(app) if app.app_name.is_empty() => app.pool_name.clone(),
            Destination::App(app) => app.app_name.clone(),
            Destination::ExternalIp(ip) => ip.cidr.clone(),
            Destination::ExternalDns(dns) => dns.name.clone(),
            Destination::RpaasInstance(rpaas) => {
                format!("{}/{}", rpaas.service_name, rpaas.instance)
            }
        };
        let ports = rule
            .destination
            .ports()
            .iter()
            .map(|port| format!("{}:{}", port.protocol, port.port))
            .collect::<Vec<_>>()
            .join(",");

        Self {
            rule_id: rule.rule_id.clone(),
            kind: id.kind_str(),
            destination,
            ports,
            import_id: id.encode(),
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print a resource in the requested format
pub fn print_resource(resource: &DestinationRuleResource, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(resource),
        OutputFormat::Yaml => return print_yaml(resource),
        OutputFormat::Table => {}
    }

    let rows = [
        ("ID", resource.id.clone()),
        ("Service", resource.service_name.clone()),
        ("Instance", resource.instance.clone()),
        ("IP", resource.ip.clone()),
        ("DNS", resource.dns.clone()),
        ("App", resource.app.clone()),
        ("Pool", resource.pool.clone()),
        (
            "Rpaas",
            resource
                .rpaas
                .as_ref()
                .map(|rpaas| format!("{}/{}", rpaas.service_name, rpaas.instance))
                .unwrap_or_default(),
        ),
        (
            "Ports",
            resource
                .port
                .iter()
                .map(|port| format!("{}:{}", port.protocol, port.number))
                .collect::<Vec<_>>()
                .join(","),
        ),
    ];

    println!();
    for (name, value) in rows.iter().filter(|(_, value)| !value.is_empty()) {
        println!("{:<10} {}", name, value);
    }
    println!();
    Ok(())
}

/// Print a rule listing in the requested format
pub fn print_rules(rules: &[RuleSummary], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => return print_json(&rules),
        OutputFormat::Yaml => return print_yaml(&rules),
        OutputFormat::Table => {}
    }

    if rules.is_empty() {
        println!("No rules found");
        return Ok(());
    }

    print_table_header(&[("Rule ID", 38), ("Kind", 6), ("Destination", 40), ("Ports", 20)]);
    for rule in rules {
        println!(
            "{:<38} {:<6} {:<40} {:<20}",
            truncate(&rule.rule_id, 36),
            rule.kind,
            truncate(&rule.destination, 38),
            truncate(&rule.ports, 20)
        );
    }
    println!();
    Ok(())
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a table header
fn print_table_header(columns: &[(&str, usize)]) {
    println!();
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    println!("{}", "-".repeat(total_width.saturating_sub(1)));
}
