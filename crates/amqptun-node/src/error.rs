// ============================================
// File: crates/amqptun-node/src/error.rs
// ============================================
//! # Tunnel Error Types
//!
//! ## Creation Reason
//! One error type for everything a node can fail at: configuration, the
//! routing-key codec, and either transport endpoint.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Nothing here is retried. `Tunnel::run` surfaces exactly one of these
//! - Non-IPv4 packets are NOT errors; they are skipped in the handlers
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use amqptun_core::CoreError;
use amqptun_transport::TransportError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, TunnelError>;

/// Node error types.
#[derive(Error, Debug)]
pub enum TunnelError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File path
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// A configuration value is invalid.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// Routing key encoding failed.
    #[error(transparent)]
    Codec(#[from] CoreError),

    /// Broker or interface failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl TunnelError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration problems.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` if this error came from the broker side.
    #[must_use]
    pub const fn is_broker_error(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_broker_error(),
            _ => false,
        }
    }

    /// Returns `true` if this error came from the TUN device.
    #[must_use]
    pub const fn is_tun_error(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_tun_error(),
            _ => false,
        }
    }
}
