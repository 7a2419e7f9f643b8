//! Domain layer
//!
//! Pure destination rule entities and the logic that works on them, with no
//! transport dependencies:
//!
//! - `rule`: the rule entity and its destination variants
//! - `id`: opaque identifier encoding and decoding
//! - `matcher`: locating a rule from a decoded identifier

pub mod id;
pub mod matcher;
pub mod rule;

pub use id::{generate_id, split_id_parts, DestinationKind, ParsedId, DESTINATION_RULE_KEY};
pub use matcher::{find_rule_by_parsed_id, find_rule_by_rule_id};
pub use rule::{
    AppDestination, Destination, ExternalDnsDestination, ExternalIpDestination, ProtoPort,
    Protocol, RpaasDestination, Rule,
};
