// ============================================
// File: crates/amqptun-core/src/lib.rs
// ============================================
//! # amqptun Core - Routing Keys & Packet Decoding
//!
//! ## Creation Reason
//! Holds the pure, I/O-free logic of the tunnel: how IPv4 networks map to
//! AMQP topic routing keys, and how raw packets read from the TUN device
//! are classified before they are forwarded.
//!
//! ## Main Functionality
//!
//! ### Routing Module ([`routing`])
//! - `NetworkPrefix`: byte-aligned IPv4 network
//! - `RoutingKey`: four-segment topic key with trailing wildcards
//! - `routing_key()`: network → subscription key
//! - `topic_matches()`: AMQP topic pattern matching
//!
//! ### Packet Module ([`packet`])
//! - `DecodedPacket`: typed decode result (`Ipv4` / `Other` / `Malformed`)
//! - `Ipv4Header`: fields needed for routing and packet logging
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 amqptun-node                        │
//! │                      │                              │
//! │          ┌───────────┴───────────┐                  │
//! │          ▼                       ▼                  │
//! │    amqptun-core  ◄──     amqptun-transport          │
//! │    You are here                  │                  │
//! │          ▲                       │                  │
//! │          └───────────────────────┘                  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Routing Key Scheme
//! ```text
//! subscribe  10.2.0.0/16  →  "10.2.*.*"   (queue binding)
//! publish    dst 10.2.5.9 →  "10.2.5.9"   (message key)
//! ```
//! Topic exchanges match per dot-delimited segment, so only whole-octet
//! prefixes (/0, /8, /16, /24, /32) can be expressed.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Publish keys are NEVER wildcarded; wildcards live only in bindings
//! - Non-aligned prefixes are rejected, never rounded
//! - Keep this crate free of async and I/O
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod packet;
pub mod routing;

// Re-export commonly used items
pub use error::{CoreError, Result};
pub use packet::{DecodedPacket, IpProtocol, Ipv4Header};
pub use routing::{routing_key, topic_matches, NetworkPrefix, RoutingKey, Segment};
