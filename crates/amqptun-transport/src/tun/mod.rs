// ============================================
// File: crates/amqptun-transport/src/tun/mod.rs
// ============================================
//! # TUN Device Module
//!
//! ## Platform Implementations
//! - `linux`: `/dev/net/tun` with `IFF_TUN | IFF_NO_PI`, configured via `ip`
//! - `mock`: In-memory implementation for testing
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     User Space                            │
//! │  ┌────────────────┐          ┌────────────────────────┐  │
//! │  │  Application   │          │     amqptun node       │  │
//! │  └───────┬────────┘          └───────────┬────────────┘  │
//! │          │ IP packets                    │ read/write    │
//! │          ▼                               ▼               │
//! ├──────────────────────────────────────────────────────────┤
//! │                     Kernel Space                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │             TUN Device (amqp-tun0)                  │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN operations require root or CAP_NET_ADMIN capability
//! - Device names are limited to 15 characters on Linux

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(target_os = "linux")]
pub use linux::LinuxTun;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockTun;
