// ============================================
// File: crates/amqptun-node/src/handlers/subscriber.rs
// ============================================
//! # Subscriber (receive path)
//!
//! Consumes the node's queue and writes every IPv4 body to the TUN device.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The consumer runs in no-ack mode, so a dropped body is simply gone
//! - The stream ending is an error: it means the broker cancelled the
//!   consumer or the channel died, and nothing would arrive any more
//!
//! ## Last Modified
//! v0.1.0 - Initial subscriber

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use amqptun_core::DecodedPacket;
use amqptun_transport::{Broker, TransportError, TunDevice};

use super::{log_packet, Direction};
use crate::error::Result;

/// Queue → TUN pump.
pub struct Subscriber<B, T> {
    broker: Arc<B>,
    tun: Arc<T>,
    debug_packets: bool,
}

impl<B: Broker, T: TunDevice> Subscriber<B, T> {
    /// Creates a subscriber.
    #[must_use]
    pub const fn new(broker: Arc<B>, tun: Arc<T>, debug_packets: bool) -> Self {
        Self {
            broker,
            tun,
            debug_packets,
        }
    }

    /// Registers the consumer and pumps deliveries until `token` is
    /// cancelled or an error occurs.
    ///
    /// # Errors
    /// - `ConsumeFailed` if the consumer cannot be registered or a delivery
    ///   fails
    /// - `ConsumerClosed` if the delivery stream ends
    /// - `TunWriteFailed` if a packet cannot be written
    pub async fn run(&self, token: &CancellationToken) -> Result<()> {
        let mut deliveries = self.broker.consume().await?;
        debug!("Consuming from {}", self.broker.queue_name());

        loop {
            let next = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("Receive path cancelled");
                    return Ok(());
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(delivery) => {
                    self.deliver(&delivery?.body).await?;
                }
                None => {
                    return Err(TransportError::consumer_closed(self.broker.queue_name()).into());
                }
            }
        }
    }

    /// Writes one message body to the interface. Returns `false` if it was
    /// dropped.
    ///
    /// # Errors
    /// `Transport(TunWriteFailed)` if the write fails.
    pub async fn deliver(&self, body: &[u8]) -> Result<bool> {
        let Some(header) = DecodedPacket::decode(body).ipv4().copied() else {
            trace!("Dropping non-IPv4 message ({} bytes)", body.len());
            return Ok(false);
        };

        self.tun.write(body).await?;

        if self.debug_packets {
            log_packet(Direction::Recv, &header, body.len());
        }

        Ok(true)
    }
}

// ============================================
// Tests
// ============================================
