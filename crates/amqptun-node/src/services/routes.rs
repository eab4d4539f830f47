// ============================================
// File: crates/amqptun-node/src/services/routes.rs
// ============================================
//! # Route Manager
//!
//! ## Creation Reason
//! A "route" on this tunnel is a binding between the node's queue and the
//! exchange. Adding a route for a network makes every packet addressed
//! into that network arrive at this node.
//!
//! ## Route Table Example
//! ```text
//! ┌──────────────────┬────────────────┐
//! │  Network         │  Binding key   │
//! ├──────────────────┼────────────────┤
//! │  10.1.0.1/32     │  10.1.0.1      │
//! │  10.2.0.0/16     │  10.2.*.*      │
//! │  0.0.0.0/0       │  *.*.*.*       │
//! └──────────────────┴────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No local route table is kept. Binding the same key twice is a no-op
//!   at the broker, and so is unbinding a key that was never bound
//! - Encoding errors are returned before the broker is contacted
//!
//! ## Last Modified
//! v0.1.0 - Initial route manager

use std::sync::Arc;

use ipnet::IpNet;
use tracing::{debug, info};

use amqptun_core::{routing_key, RoutingKey};
use amqptun_transport::Broker;

use crate::error::Result;

/// Binds and unbinds networks on a broker session.
pub struct RouteManager<B> {
    broker: Arc<B>,
}

impl<B: Broker> RouteManager<B> {
    /// Creates a route manager for `broker`'s queue.
    #[must_use]
    pub const fn new(broker: Arc<B>) -> Self {
        Self { broker }
    }

    /// Subscribes the queue to `network`. Returns the binding key.
    ///
    /// # Errors
    /// - `Codec` if the network cannot be encoded
    /// - `Transport(BindFailed)` if the broker refuses
    pub async fn add_route(&self, network: &IpNet) -> Result<RoutingKey> {
        let key = routing_key(network)?;
        self.broker.bind(&key.to_string()).await?;

        info!(
            "Route added: {} -> queue {} (key {})",
            network,
            self.broker.queue_name(),
            key
        );
        Ok(key)
    }

    /// Removes the subscription created by [`RouteManager::add_route`].
    ///
    /// # Errors
    /// - `Codec` if the network cannot be encoded
    /// - `Transport(UnbindFailed)` if the broker refuses
    pub async fn remove_route(&self, network: &IpNet) -> Result<RoutingKey> {
        let key = routing_key(network)?;
        self.broker.unbind(&key.to_string()).await?;

        info!("Route removed: {} (key {})", network, key);
        Ok(key)
    }

    /// Adds routes in order, stopping at the first failure.
    ///
    /// # Errors
    /// The first error from [`RouteManager::add_route`].
    pub async fn add_routes<'a, I>(&self, networks: I) -> Result<Vec<RoutingKey>>
    where
        I: IntoIterator<Item = &'a IpNet>,
    {
        let mut keys = Vec::new();
        for network in networks {
            keys.push(self.add_route(network).await?);
        }
        debug!("{} route(s) added", keys.len());
        Ok(keys)
    }
}

impl<B> std::fmt::Debug for RouteManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteManager").finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
