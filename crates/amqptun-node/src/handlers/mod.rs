// ============================================
// File: crates/amqptun-node/src/handlers/mod.rs
// ============================================
//! # Packet Handlers
//!
//! ## Creation Reason
//! The two halves of the packet pump.
//!
//! ### Submodules
//! - [`publisher`]: TUN → exchange
//! - [`subscriber`]: queue → TUN
//!
//! ## Data Flow
//! ```text
//! Send path:
//!   1. Read one packet from TUN
//!   2. Decode; drop anything that is not IPv4
//!   3. Publish with key = destination address
//!
//! Receive path:
//!   1. Take the next delivery from the queue (auto-acked)
//!   2. Decode; drop anything that is not IPv4
//!   3. Write the body to TUN unchanged
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Both loops give up on the first I/O error; `Tunnel::run` turns that
//!   into the terminal result and stops the other loop
//! - Cancellation is only observed while waiting for input. A publish or
//!   TUN write in progress is allowed to finish
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers

pub mod publisher;
pub mod subscriber;

pub use publisher::Publisher;
pub use subscriber::Subscriber;

use std::fmt;

use tracing::info;

use amqptun_core::Ipv4Header;

/// Direction of a packet relative to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Send,
    Recv,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => f.write_str("SEND"),
            Self::Recv => f.write_str("RECV"),
        }
    }
}

/// Formats the per-packet debug line.
pub(crate) fn packet_line(direction: Direction, header: &Ipv4Header, len: usize) -> String {
    format!(
        "{direction}: {} -> {} PROTO: {} LEN: {len}",
        header.src, header.dst, header.protocol
    )
}

/// Emits the per-packet debug line at info level.
pub(crate) fn log_packet(direction: Direction, header: &Ipv4Header, len: usize) {
    info!("{}", packet_line(direction, header, len));
}


#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use amqptun_core::DecodedPacket;

    use super::testing::ipv4_packet;
    use super::*;

    #[test]
    fn test_packet_line_format() {
        let packet = ipv4_packet(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b"hi");
        let header = *DecodedPacket::decode(&packet).ipv4().unwrap();

        assert_eq!(
            packet_line(Direction::Send, &header, packet.len()),
            "SEND: 10.1.0.1 -> 10.2.5.9 PROTO: UDP LEN: 22"
        );
        assert!(packet_line(Direction::Recv, &header, 22).starts_with("RECV: "));
    }
}
