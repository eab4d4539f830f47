// ============================================
// File: crates/amqptun-transport/src/lib.rs
// ============================================
//! # amqptun Transport - Interface & Broker I/O
//!
//! ## Creation Reason
//! Provides the two I/O endpoints of the tunnel behind traits: the TUN
//! device that carries raw IP packets, and the AMQP broker channel that
//! carries them between nodes.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `TunDevice` trait and `TunConfig`
//! - [`tun`]: TUN device implementations (Linux, mock)
//! - [`broker`]: `Broker` trait, AMQP implementation, in-memory exchange
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 amqptun-node                        │
//! │                      │                              │
//! │          ┌───────────┴───────────┐                  │
//! │          ▼                       ▼                  │
//! │    amqptun-core          amqptun-transport          │
//! │                          You are here ◄──           │
//! │          ▲                       │                  │
//! │          └───────────────────────┘                  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! ┌──────────────┐  raw IPv4   ┌──────────────┐  key=dst   ┌──────────────┐
//! │  TUN device  │ ──────────► │    node      │ ─────────► │ topic        │
//! │  (amqp-tun0) │ ◄────────── │  (pump)      │ ◄───────── │ exchange     │
//! └──────────────┘  body       └──────────────┘  queue     └──────────────┘
//! ```
//!
//! ## Platform Support
//! | Platform | AMQP | TUN |
//! |----------|------|-----|
//! | Linux | ✅ | ✅ |
//! | macOS | ✅ | ❌ |
//! | Windows | ✅ | ❌ |
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN operations require elevated privileges
//! - Always program against the traits; mocks live behind the `mock` feature
//! - Platform-specific code must be isolated
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod broker;
pub mod error;
pub mod traits;
pub mod tun;

// Re-export primary types
pub use broker::{AmqpBroker, Broker, BrokerConfig, Delivery, DeliveryStream};
pub use error::{Result, TransportError};
pub use traits::{TunConfig, TunDevice};

#[cfg(target_os = "linux")]
pub use tun::linux::LinuxTun;

#[cfg(any(test, feature = "mock"))]
pub use broker::mock::{MockBroker, MockExchange};
#[cfg(any(test, feature = "mock"))]
pub use tun::mock::MockTun;
