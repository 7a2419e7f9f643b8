//! # Command Line Interface
//!
//! Manages ACL destination rules through the tsuru service proxy. Each
//! subcommand is a thin wrapper around one [`Reconciler`] lifecycle call.

pub mod config;
pub mod output;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::gateway::{AclClient, ClientConfig, DEFAULT_SERVICE_NAME};
use crate::resource::{DestinationRuleResource, ReadStatus, Reconciler};
use crate::retry::RetryPolicy;
use config::CliConfig;
use output::{OutputFormat, RuleSummary};

#[derive(Parser)]
#[command(name = "acl-rules")]
#[command(about = "Manage tsuru ACL destination rules")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// tsuru API address
    #[arg(long, global = true, env = "TSURU_TARGET")]
    pub host: Option<String>,

    /// tsuru token for API authentication
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Path to file containing the tsuru token
    #[arg(long, global = true)]
    pub token_file: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Time window in seconds for retrying rule creation
    #[arg(long, global = true)]
    pub create_timeout: Option<u64>,

    /// Time window in seconds for retrying rule deletion
    #[arg(long, global = true)]
    pub delete_timeout: Option<u64>,

    /// Accept invalid TLS certificates from the tsuru API
    #[arg(long, global = true, env = "TSURU_SKIP_CERT_VERIFICATION")]
    pub skip_cert_verification: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// ACL instance a command operates on
#[derive(Args, Debug, Clone)]
pub struct InstanceArgs {
    /// ACL service instance name
    #[arg(long, value_name = "INSTANCE")]
    pub instance: Option<String>,

    /// ACL service name
    #[arg(long, value_name = "SERVICE", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a destination rule
    #[command(
        long_about = "Create a rule allowing an ACL instance to reach one destination.\n\nExactly one of --ip, --dns, --app, --pool or --rpaas-service/--rpaas-instance must be given.",
        after_help = "EXAMPLES:\n    acl-rules create --instance my-acl --app my-destination-app\n    acl-rules create --instance my-acl --ip 10.0.0.0/8 --port tcp:443 --port udp:53\n    acl-rules create --instance my-acl --rpaas-service rpaasv2-be --rpaas-instance my-rpaas"
    )]
    Create {
        #[command(flatten)]
        target: InstanceArgs,

        /// Destination IP network in CIDR notation
        #[arg(long, value_name = "CIDR")]
        ip: Option<String>,

        /// Destination domain name
        #[arg(long, value_name = "NAME")]
        dns: Option<String>,

        /// Destination tsuru app
        #[arg(long, value_name = "APP")]
        app: Option<String>,

        /// Destination tsuru pool
        #[arg(long, value_name = "POOL")]
        pool: Option<String>,

        /// Destination rpaas service name
        #[arg(long, value_name = "SERVICE", requires = "rpaas_instance")]
        rpaas_service: Option<String>,

        /// Destination rpaas instance name
        #[arg(long, value_name = "INSTANCE", requires = "rpaas_service")]
        rpaas_instance: Option<String>,

        /// Destination port as protocol:number, repeatable (ip and dns only)
        #[arg(long = "port", value_name = "PROTO:PORT")]
        ports: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Show a destination rule
    #[command(
        after_help = "EXAMPLES:\n    acl-rules get 5f0c... --instance my-acl\n    acl-rules get acl::my-acl::5f0c... --output json"
    )]
    Get {
        /// Rule id, or service::instance::rule_id
        #[arg(value_name = "ID")]
        id: String,

        #[command(flatten)]
        target: InstanceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Delete a destination rule
    Delete {
        /// Rule id, or service::instance::rule_id
        #[arg(value_name = "ID")]
        id: String,

        #[command(flatten)]
        target: InstanceArgs,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Look up an existing rule from its import identifier
    #[command(
        after_help = "EXAMPLES:\n    acl-rules import acl-rule::acl::my-acl::app::my-destination-app\n    acl-rules import acl-rule::acl::my-acl::rpaas::rpaasv2-be::my-rpaas\n    acl-rules import acl::my-acl::5f0c..."
    )]
    Import {
        /// Typed or legacy identifier
        #[arg(value_name = "ID")]
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// List every rule of an ACL instance
    List {
        #[command(flatten)]
        target: InstanceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    initialise_logging(cli.verbose, cli.log_format)?;

    let reconciler = create_reconciler(&cli)?;
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Commands::Create { target, ip, dns, app, pool, rpaas_service, rpaas_instance, ports, output } => {
            let mut resource = DestinationRuleResource::new(require_instance(&target)?);
            resource.service_name = target.service_name;
            resource.ip = ip.unwrap_or_default();
            resource.dns = dns.unwrap_or_default();
            resource.app = app.unwrap_or_default();
            resource.pool = pool.unwrap_or_default();
            if let (Some(service_name), Some(instance)) = (rpaas_service, rpaas_instance) {
                resource = resource.with_rpaas(service_name, instance);
            }
            for port in &ports {
                let (protocol, number) = parse_port(port)?;
                resource = resource.with_port(protocol, number);
            }

            reconciler.create(&mut resource, &cancel).await?;
            output::print_resource(&resource, output)?;
        }
        Commands::Get { id, target, output } => {
            let mut resource = resource_for_id(id, target);
            match reconciler.read(&mut resource, &cancel).await? {
                ReadStatus::Present => output::print_resource(&resource, output)?,
                ReadStatus::Gone => println!("Rule not found"),
            }
        }
        Commands::Delete { id, target, yes } => {
            if !yes && !confirm(&format!("Are you sure you want to delete rule '{}'? (y/N)", id))? {
                println!("Cancelled");
                return Ok(());
            }

            let mut resource = resource_for_id(id.clone(), target);
            reconciler.delete(&mut resource, &cancel).await?;
            println!("Rule '{}' deleted", id);
        }
        Commands::Import { id, output } => {
            let resource = reconciler.import(&id, &cancel).await?;
            output::print_resource(&resource, output)?;
        }
        Commands::List { target, output } => {
            let instance = require_instance(&target)?;
            let rules = reconciler.list(&target.service_name, &instance, &cancel).await?;
            let summaries: Vec<RuleSummary> = rules
                .iter()
                .map(|rule| RuleSummary::new(&target.service_name, &instance, rule))
                .collect();
            output::print_rules(&summaries, output)?;
        }
    }

    Ok(())
}

/// Build the reconciler with resolved client settings and retry windows
fn create_reconciler(cli: &Cli) -> anyhow::Result<Reconciler<AclClient>> {
    let file_config = CliConfig::load()?;
    let tsuru_dir = config::tsuru_dir().ok();

    let host = config::resolve_host(cli.host.clone(), &file_config, tsuru_dir.as_deref())?;
    let token = config::resolve_token(
        cli.token.clone(),
        cli.token_file.clone(),
        std::env::var("TSURU_TOKEN").ok(),
        &file_config,
        tsuru_dir.as_deref(),
    )?;

    let client = AclClient::new(ClientConfig {
        host,
        token,
        timeout: config::resolve_timeout(cli.timeout, &file_config),
        skip_cert_verification: config::resolve_skip_cert_verification(
            cli.skip_cert_verification,
            &file_config,
        ),
        verbose: cli.verbose,
    })?;

    let create_window = config::resolve_retry_window(cli.create_timeout, file_config.create_timeout);
    let delete_window = config::resolve_retry_window(cli.delete_timeout, file_config.delete_timeout);

    Ok(Reconciler::new(client)
        .with_create_retry(RetryPolicy::with_timeout(create_window))
        .with_delete_retry(RetryPolicy::with_timeout(delete_window)))
}

fn resource_for_id(id: String, target: InstanceArgs) -> DestinationRuleResource {
    let mut resource = DestinationRuleResource::new(target.instance.unwrap_or_default());
    resource.service_name = target.service_name;
    resource.id = id;
    resource
}

fn require_instance(target: &InstanceArgs) -> anyhow::Result<String> {
    target
        .instance
        .clone()
        .filter(|instance| !instance.is_empty())
        .context("--instance is required")
}

/// Parse `proto:number`, e.g. `tcp:443`
fn parse_port(value: &str) -> anyhow::Result<(String, u32)> {
    let (protocol, number) = value
        .split_once(':')
        .with_context(|| format!("Invalid port {:?}, expected PROTO:PORT", value))?;
    let number = number
        .parse::<u32>()
        .with_context(|| format!("Invalid port number in {:?}", value))?;
    Ok((protocol.to_string(), number))
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    println!("{}", prompt);
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// Cancel in-flight work on Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling");
                cancel.cancel();
            }
            Err(error) => info!(error = %error, "Unable to listen for interrupt signal"),
        }
    });
}

fn initialise_logging(verbose: bool, format: LogFormat) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    let builder = FmtSubscriber::builder().with_env_filter(filter).with_writer(std::io::stderr);
    // Subscriber already set elsewhere (e.g. integration tests); ignore.
    let _ = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
    Ok(())
}
