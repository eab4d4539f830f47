// ============================================
// File: crates/amqptun-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines the errors raised while turning networks into routing keys.
//!
//! ## Error Categories
//! 1. **Address family**: only IPv4 networks can be routed
//! 2. **Prefix**: only whole-octet prefixes map onto topic segments
//! 3. **Parsing**: malformed network or routing-key text
//!
//! Malformed packets are NOT errors; see [`crate::packet::DecodedPacket`].
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Errors produced by the routing-key codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The network is not an IPv4 network.
    #[error("only ipv4 networks are supported, got {addr}")]
    NotIpv4 {
        /// The offending address
        addr: String,
    },

    /// The prefix length does not fall on an octet boundary.
    #[error("only subnets divisible by 8 are supported: /0, /8, /16, /24 and /32 (got /{prefix_len})")]
    UnalignedPrefix {
        /// The rejected prefix length
        prefix_len: u8,
    },

    /// The prefix length exceeds the IPv4 address width.
    #[error("prefix length /{prefix_len} exceeds 32")]
    PrefixTooLong {
        /// The rejected prefix length
        prefix_len: u8,
    },

    /// Network text could not be parsed.
    #[error("invalid network '{input}': {reason}")]
    InvalidNetwork {
        /// The input text
        input: String,
        /// Why parsing failed
        reason: String,
    },

    /// Routing key text violates the key format.
    #[error("invalid routing key '{key}': {reason}")]
    InvalidRoutingKey {
        /// The input text
        key: String,
        /// Which rule was violated
        reason: String,
    },
}

impl CoreError {
    /// Creates an `InvalidNetwork` error.
    pub fn invalid_network(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNetwork {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidRoutingKey` error.
    pub fn invalid_routing_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRoutingKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the prefix length was the problem.
    #[must_use]
    pub const fn is_prefix_error(&self) -> bool {
        matches!(
            self,
            Self::UnalignedPrefix { .. } | Self::PrefixTooLong { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::UnalignedPrefix { prefix_len: 12 };
        assert!(err.to_string().contains("/12"));
        assert!(err.to_string().contains("/0, /8, /16, /24 and /32"));

        let err = CoreError::NotIpv4 { addr: "fd00::1".into() };
        assert!(err.to_string().contains("fd00::1"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::UnalignedPrefix { prefix_len: 20 }.is_prefix_error());
        assert!(CoreError::PrefixTooLong { prefix_len: 40 }.is_prefix_error());
        assert!(!CoreError::NotIpv4 { addr: "::1".into() }.is_prefix_error());
    }
}
