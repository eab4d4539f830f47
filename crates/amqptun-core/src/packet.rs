// ============================================
// File: crates/amqptun-core/src/packet.rs
// ============================================
//! # Packet Decoding
//!
//! ## Creation Reason
//! Both pump directions need to know whether a buffer is an IPv4 packet
//! and, if so, where it is going. This module classifies raw buffers
//! into a typed result instead of probing layers at runtime.
//!
//! ## Main Functionality
//! - `DecodedPacket::decode()`: classify a raw buffer
//! - `Ipv4Header`: parsed fixed header fields
//! - `IpProtocol`: protocol number with well-known names
//!
//! ## IPv4 Header (fixed part)
//! ```text
//!  0               1               2               3
//! ┌───────┬───────┬───────────────┬───────────────────────────────┐
//! │Version│  IHL  │   DSCP/ECN    │         Total Length          │
//! ├───────┴───────┴───────────────┼─────┬─────────────────────────┤
//! │        Identification         │Flags│     Fragment Offset     │
//! ├───────────────┬───────────────┼─────┴─────────────────────────┤
//! │      TTL      │   Protocol    │        Header Checksum        │
//! ├───────────────┴───────────────┴───────────────────────────────┤
//! │                        Source Address                         │
//! ├───────────────────────────────────────────────────────────────┤
//! │                     Destination Address                       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Decoding never fails: anything unusable is `Other` or `Malformed`
//!   and is dropped by the caller without raising an error
//! - The checksum is not verified; the kernel already did on egress
//!
//! ## Last Modified
//! v0.1.0 - Initial packet decoding

use std::fmt;
use std::net::Ipv4Addr;

use crate::routing::RoutingKey;

// ============================================
// Constants
// ============================================

/// Minimum IPv4 header size.
pub const IPV4_HEADER_MIN_SIZE: usize = 20;

/// Offset of the total length field.
const IPV4_TOTAL_LEN_OFFSET: usize = 2;

/// Offset of the TTL field.
const IPV4_TTL_OFFSET: usize = 8;

/// Offset of the protocol field.
const IPV4_PROTOCOL_OFFSET: usize = 9;

/// Offset of source IP in IPv4 header.
const IPV4_SRC_OFFSET: usize = 12;

/// Offset of destination IP in IPv4 header.
const IPV4_DST_OFFSET: usize = 16;

// ============================================
// IpProtocol
// ============================================

/// IP protocol number carried in the IPv4 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpProtocol(pub u8);

impl IpProtocol {
    /// Internet Control Message Protocol.
    pub const ICMP: Self = Self(1);
    /// Internet Group Management Protocol.
    pub const IGMP: Self = Self(2);
    /// Transmission Control Protocol.
    pub const TCP: Self = Self(6);
    /// User Datagram Protocol.
    pub const UDP: Self = Self(17);
    /// Generic Routing Encapsulation.
    pub const GRE: Self = Self(47);
    /// Encapsulating Security Payload.
    pub const ESP: Self = Self(50);
    /// Authentication Header.
    pub const AH: Self = Self(51);
    /// ICMP for IPv6.
    pub const ICMPV6: Self = Self(58);
    /// Stream Control Transmission Protocol.
    pub const SCTP: Self = Self(132);

    /// Well-known name, if any.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("ICMPv4"),
            2 => Some("IGMP"),
            6 => Some("TCP"),
            17 => Some("UDP"),
            47 => Some("GRE"),
            50 => Some("ESP"),
            51 => Some("AH"),
            58 => Some("ICMPv6"),
            132 => Some("SCTP"),
            _ => None,
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.0),
        }
    }
}

// ============================================
// Ipv4Header
// ============================================

/// Fixed IPv4 header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in bytes (IHL * 4).
    pub header_len: usize,
    /// Total length field as carried in the header.
    pub total_len: u16,
    /// Time to live.
    pub ttl: u8,
    /// Encapsulated protocol.
    pub protocol: IpProtocol,
    /// Source address.
    pub src: Ipv4Addr,
    /// Destination address.
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    /// The concrete publish key for this packet's destination.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::for_destination(self.dst)
    }
}

// ============================================
// DecodedPacket
// ============================================

/// Result of classifying a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedPacket {
    /// A well-formed IPv4 header.
    Ipv4(Ipv4Header),
    /// Some other IP version (or a non-IP frame).
    Other {
        /// The version nibble found in the first byte
        version: u8,
    },
    /// Claims to be IPv4 but the header is truncated or inconsistent.
    Malformed,
}

impl DecodedPacket {
    /// Classifies `buf`.
    ///
    /// # Example
    /// ```
    /// use amqptun_core::DecodedPacket;
    ///
    /// assert_eq!(DecodedPacket::decode(&[]), DecodedPacket::Malformed);
    /// assert_eq!(DecodedPacket::decode(&[0x60; 40]), DecodedPacket::Other { version: 6 });
    /// ```
    #[must_use]
    pub fn decode(buf: &[u8]) -> Self {
        let Some(&first) = buf.first() else {
            return Self::Malformed;
        };

        let version = first >> 4;
        if version != 4 {
            return Self::Other { version };
        }

        if buf.len() < IPV4_HEADER_MIN_SIZE {
            return Self::Malformed;
        }

        let header_len = usize::from(first & 0x0f) * 4;
        if header_len < IPV4_HEADER_MIN_SIZE || header_len > buf.len() {
            return Self::Malformed;
        }

        let total_len = u16::from_be_bytes([
            buf[IPV4_TOTAL_LEN_OFFSET],
            buf[IPV4_TOTAL_LEN_OFFSET + 1],
        ]);
        if usize::from(total_len) < header_len {
            return Self::Malformed;
        }

        Self::Ipv4(Ipv4Header {
            header_len,
            total_len,
            ttl: buf[IPV4_TTL_OFFSET],
            protocol: IpProtocol(buf[IPV4_PROTOCOL_OFFSET]),
            src: read_addr(buf, IPV4_SRC_OFFSET),
            dst: read_addr(buf, IPV4_DST_OFFSET),
        })
    }

    /// The IPv4 header, if this is an IPv4 packet.
    #[must_use]
    pub const fn ipv4(&self) -> Option<&Ipv4Header> {
        match self {
            Self::Ipv4(header) => Some(header),
            _ => None,
        }
    }
}

fn read_addr(buf: &[u8], offset: usize) -> Ipv4Addr {
    let mut octets = [0u8; 4];
    octets.copy_from_slice(&buf[offset..offset + 4]);
    Ipv4Addr::from(octets)
}

// ============================================
// Tests
// ============================================
