// ============================================
// File: crates/amqptun-node/src/handlers/publisher.rs
// ============================================
//! # Publisher (send path)
//!
//! Reads packets from the TUN device and publishes each IPv4 packet to the
//! exchange under its destination address.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The publish key is always four concrete octets; wildcards only ever
//!   appear in bindings
//! - The buffer is larger than any MTU the interface is created with, so
//!   one read is always one whole packet
//!
//! ## Last Modified
//! v0.1.0 - Initial publisher

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use amqptun_core::DecodedPacket;
use amqptun_transport::{Broker, TunDevice};

use super::{log_packet, Direction};
use crate::error::Result;

/// Size of the TUN read buffer.
pub const PACKET_BUFFER_SIZE: usize = 2000;

/// TUN → exchange pump.
pub struct Publisher<B, T> {
    broker: Arc<B>,
    tun: Arc<T>,
    debug_packets: bool,
}

impl<B: Broker, T: TunDevice> Publisher<B, T> {
    /// Creates a publisher.
    #[must_use]
    pub const fn new(broker: Arc<B>, tun: Arc<T>, debug_packets: bool) -> Self {
        Self {
            broker,
            tun,
            debug_packets,
        }
    }

    /// Pumps packets until `token` is cancelled or an I/O error occurs.
    ///
    /// # Errors
    /// The first TUN read or publish failure.
    pub async fn run(&self, token: &CancellationToken) -> Result<()> {
        let mut buf = vec![0u8; PACKET_BUFFER_SIZE];

        loop {
            let len = tokio::select! {
                biased;
                () = token.cancelled() => {
                    debug!("Send path cancelled");
                    return Ok(());
                }
                result = self.tun.read(&mut buf) => result?,
            };

            self.forward(&buf[..len]).await?;
        }
    }

    /// Publishes one packet. Returns `false` if it was skipped.
    ///
    /// # Errors
    /// `Transport(PublishFailed)` if the broker rejects the message.
    pub async fn forward(&self, packet: &[u8]) -> Result<bool> {
        let header = match DecodedPacket::decode(packet) {
            DecodedPacket::Ipv4(header) => header,
            DecodedPacket::Other { version } => {
                trace!("Skipping non-IPv4 packet (version {}, {} bytes)", version, packet.len());
                return Ok(false);
            }
            DecodedPacket::Malformed => {
                trace!("Skipping malformed packet ({} bytes)", packet.len());
                return Ok(false);
            }
        };

        let key = header.routing_key().to_string();
        self.broker.publish(&key, packet).await?;

        if self.debug_packets {
            log_packet(Direction::Send, &header, packet.len());
        }

        Ok(true)
    }
}

// ============================================
// Tests
// ============================================
