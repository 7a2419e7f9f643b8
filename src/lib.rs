//! # acl-rules
//!
//! Declarative management of ACL destination rules. A destination rule grants
//! an ACL service instance access to exactly one destination: a tsuru app, a
//! tsuru pool, an external IP network, an external DNS name, or an rpaas
//! instance. The ACL service is reached through the tsuru service proxy.
//!
//! ## Architecture
//!
//! ```text
//! CLI → Reconciler → RetryPolicy → RuleGateway (AclClient) → tsuru proxy → ACL service
//!            ↓
//!   identifier codec / rule matcher
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use acl_rules::{AclClient, ClientConfig, DestinationRuleResource, Reconciler};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> acl_rules::Result<()> {
//!     let client = AclClient::new(ClientConfig {
//!         host: "https://tsuru.example.com".to_string(),
//!         token: "my-token".to_string(),
//!         ..Default::default()
//!     })?;
//!     let reconciler = Reconciler::new(client);
//!
//!     let mut rule = DestinationRuleResource::new("my-acl").with_app("my-destination-app");
//!     reconciler.create(&mut rule, &CancellationToken::new()).await?;
//!     println!("created {}", rule.id);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod resource;
pub mod retry;

// Re-export commonly used types and traits
pub use domain::{DestinationKind, ParsedId, Rule};
pub use errors::{AclError, Result};
pub use gateway::{AclClient, ClientConfig, RuleGateway};
pub use resource::{DestinationRuleResource, ReadStatus, Reconciler};
pub use retry::RetryPolicy;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
