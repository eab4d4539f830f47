// ============================================
// File: crates/amqptun-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for the two transport endpoints: the AMQP broker
//! and the TUN device.
//!
//! ## Error Categories
//! 1. **Broker Errors**: connect, channel, declare, bind, publish, consume
//! 2. **TUN Errors**: device creation, configuration, read/write failures
//! 3. **Configuration Errors**: invalid device settings
//! 4. **System Errors**: permission denied
//!
//! ## ⚠️ Important Note for Next Developer
//! - None of these errors are retried; each one ends the tunnel run
//! - Never put the broker URI in a message, it may carry credentials
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Broker Errors
    // ========================================

    /// Could not connect to the broker.
    #[error("Failed to connect to AMQP broker: {reason}")]
    ConnectFailed {
        /// Why the connection failed
        reason: String,
    },

    /// Could not open a channel on the connection.
    #[error("Failed to open AMQP channel: {reason}")]
    ChannelFailed {
        /// Why the channel failed
        reason: String,
    },

    /// Exchange or queue declaration failed.
    #[error("Failed to declare {kind} '{name}': {reason}")]
    DeclareFailed {
        /// "exchange" or "queue"
        kind: &'static str,
        /// Requested name (empty for server-named queues)
        name: String,
        /// Why the declaration failed
        reason: String,
    },

    /// Queue binding failed.
    #[error("Failed to bind '{routing_key}' on exchange '{exchange}': {reason}")]
    BindFailed {
        /// Exchange name
        exchange: String,
        /// Routing key
        routing_key: String,
        /// Why binding failed
        reason: String,
    },

    /// Queue unbinding failed.
    #[error("Failed to unbind '{routing_key}' on exchange '{exchange}': {reason}")]
    UnbindFailed {
        /// Exchange name
        exchange: String,
        /// Routing key
        routing_key: String,
        /// Why unbinding failed
        reason: String,
    },

    /// Publishing a message failed.
    #[error("Failed to publish message with key '{routing_key}': {reason}")]
    PublishFailed {
        /// Routing key of the message
        routing_key: String,
        /// Why publishing failed
        reason: String,
    },

    /// Registering or reading from the consumer failed.
    #[error("Failed to consume from queue '{queue}': {reason}")]
    ConsumeFailed {
        /// Queue name
        queue: String,
        /// Why consuming failed
        reason: String,
    },

    /// The delivery stream ended (consumer cancelled or channel closed).
    #[error("Consumer on queue '{queue}' was closed by the broker")]
    ConsumerClosed {
        /// Queue name
        queue: String,
    },

    // ========================================
    // TUN Device Errors
    // ========================================

    /// Failed to create TUN device.
    #[error("Failed to create TUN device '{name}': {reason}")]
    TunCreateFailed {
        /// Requested device name
        name: String,
        /// Why creation failed
        reason: String,
    },

    /// Failed to configure TUN device.
    #[error("Failed to configure TUN device '{name}': {reason}")]
    TunConfigFailed {
        /// Device name
        name: String,
        /// Why configuration failed
        reason: String,
    },

    /// TUN device read failed.
    #[error("TUN read failed: {reason}")]
    TunReadFailed {
        /// Why read failed
        reason: String,
    },

    /// TUN device write failed.
    #[error("TUN write failed: {reason}")]
    TunWriteFailed {
        /// Why write failed
        reason: String,
    },

    // ========================================
    // Configuration / System Errors
    // ========================================

    /// Invalid configuration.
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfig {
        /// Configuration field name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// Permission denied for operation.
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// What operation was denied
        operation: String,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(reason: impl ToString) -> Self {
        Self::ConnectFailed {
            reason: reason.to_string(),
        }
    }

    /// Creates a `DeclareFailed` error.
    pub fn declare_failed(kind: &'static str, name: impl Into<String>, reason: impl ToString) -> Self {
        Self::DeclareFailed {
            kind,
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `BindFailed` error.
    pub fn bind_failed(exchange: impl Into<String>, routing_key: impl Into<String>, reason: impl ToString) -> Self {
        Self::BindFailed {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an `UnbindFailed` error.
    pub fn unbind_failed(exchange: impl Into<String>, routing_key: impl Into<String>, reason: impl ToString) -> Self {
        Self::UnbindFailed {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `PublishFailed` error.
    pub fn publish_failed(routing_key: impl Into<String>, reason: impl ToString) -> Self {
        Self::PublishFailed {
            routing_key: routing_key.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `ConsumeFailed` error.
    pub fn consume_failed(queue: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConsumeFailed {
            queue: queue.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `ConsumerClosed` error.
    pub fn consumer_closed(queue: impl Into<String>) -> Self {
        Self::ConsumerClosed {
            queue: queue.into(),
        }
    }

    /// Creates a `TunCreateFailed` error.
    pub fn tun_create_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunCreateFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `TunConfigFailed` error.
    pub fn tun_config_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TunConfigFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidConfig` error.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error came from the broker side.
    #[must_use]
    pub const fn is_broker_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed { .. }
                | Self::ChannelFailed { .. }
                | Self::DeclareFailed { .. }
                | Self::BindFailed { .. }
                | Self::UnbindFailed { .. }
                | Self::PublishFailed { .. }
                | Self::ConsumeFailed { .. }
                | Self::ConsumerClosed { .. }
        )
    }

    /// Returns `true` if this is a TUN device error.
    #[must_use]
    pub const fn is_tun_error(&self) -> bool {
        matches!(
            self,
            Self::TunCreateFailed { .. }
                | Self::TunConfigFailed { .. }
                | Self::TunReadFailed { .. }
                | Self::TunWriteFailed { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
