// ============================================
// File: crates/amqptun-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the interface side of the tunnel as a trait so the packet pump
//! can run against a real TUN device or an in-memory one.
//!
//! ## Main Functionality
//! - `TunDevice`: TUN device read/write interface
//! - `TunConfig`: device name, optional address, persistence
//!
//! The broker side lives in [`crate::broker`].
//!
//! ## ⚠️ Important Note for Next Developer
//! - `read` and `write` are called concurrently from different tasks;
//!   implementations must allow that through `&self`
//! - Buffer management is caller's responsibility
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;
use ipnet::Ipv4Net;

use crate::error::{Result, TransportError};

// ============================================
// TunDevice Trait
// ============================================

/// Abstract interface for TUN device operations.
///
/// # Data Format
/// Data read from and written to the TUN device is raw IP packets
/// (no Ethernet headers, no packet information prefix).
///
/// # Example
/// ```ignore
/// async fn forward_packets<T: TunDevice>(tun: &T) -> Result<()> {
///     let mut buf = [0u8; 2000];
///     loop {
///         let len = tun.read(&mut buf).await?;
///         // Process IP packet in buf[..len]
///     }
/// }
/// ```
#[async_trait]
pub trait TunDevice: Send + Sync {
    /// Reads one IP packet from the TUN device.
    ///
    /// # Errors
    /// Returns error if read fails
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Writes one complete IP packet to the TUN device.
    ///
    /// # Errors
    /// Returns error if write fails
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Returns the device name.
    fn name(&self) -> &str;
}

// ============================================
// TunConfig
// ============================================

/// Maximum interface name length on Linux (IFNAMSIZ - 1).
pub const MAX_NAME_LEN: usize = 15;

/// Configuration for TUN device creation.
///
/// # Example
/// ```
/// use amqptun_transport::traits::TunConfig;
///
/// let config = TunConfig::new("amqp-tun0")
///     .with_address("10.1.0.1/24".parse().unwrap());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunConfig {
    /// Device name (e.g., "amqp-tun0").
    pub name: String,
    /// Address and mask to assign, if any.
    pub address: Option<Ipv4Net>,
    /// Whether to persist the device after process exit.
    pub persist: bool,
}

impl TunConfig {
    /// Creates a new TUN configuration without an address.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            persist: false,
        }
    }

    /// Sets the interface address.
    #[must_use]
    pub const fn with_address(mut self, address: Ipv4Net) -> Self {
        self.address = Some(address);
        self
    }

    /// Sets whether the device should persist.
    #[must_use]
    pub const fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns error if the name is empty or too long.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(TransportError::invalid_config(
                "name",
                "device name cannot be empty",
            ));
        }

        if self.name.len() > MAX_NAME_LEN {
            return Err(TransportError::invalid_config(
                "name",
                format!("device name cannot exceed {MAX_NAME_LEN} characters"),
            ));
        }

        Ok(())
    }
}

// ============================================
// Tests
// ============================================
