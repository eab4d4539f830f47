// ============================================
// File: crates/amqptun-core/src/routing.rs
// ============================================
//! # Routing Keys
//!
//! ## Creation Reason
//! Maps IPv4 networks onto AMQP topic routing keys so that a topic
//! exchange can act as the tunnel's router.
//!
//! ## Main Functionality
//! - `NetworkPrefix`: IPv4 network restricted to whole-octet prefixes
//! - `RoutingKey`: four segments, each an octet or the `*` wildcard
//! - `routing_key()`: codec entry point used for queue bindings
//! - `RoutingKey::for_destination()`: concrete key used for publishing
//! - `topic_matches()`: the exchange's segment-wise matching rule
//!
//! ## Key Layout
//! ```text
//! ┌──────────────┬───────────┐
//! │ Network      │ Key       │
//! ├──────────────┼───────────┤
//! │ 0.0.0.0/0    │ *.*.*.*   │
//! │ 10.0.0.0/8   │ 10.*.*.*  │
//! │ 10.2.0.0/16  │ 10.2.*.*  │
//! │ 10.2.5.0/24  │ 10.2.5.*  │
//! │ 10.2.5.9/32  │ 10.2.5.9  │
//! └──────────────┴───────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Topic wildcards cannot match part of a segment, hence the /8 alignment
//! - Host bits of the address are kept as given; only the leading
//!   `prefix/8` octets reach the key
//!
//! ## Last Modified
//! v0.1.0 - Initial routing key codec

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use ipnet::IpNet;

use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Number of segments in every routing key.
pub const SEGMENT_COUNT: usize = 4;

/// Single-segment wildcard marker.
pub const WILDCARD: &str = "*";

/// Multi-segment wildcard marker (bindings only, never produced by the codec).
pub const MULTI_WILDCARD: &str = "#";

/// Separator between routing key segments.
pub const SEPARATOR: char = '.';

// ============================================
// NetworkPrefix
// ============================================

/// An IPv4 network whose prefix length is a multiple of 8.
///
/// # Example
/// ```
/// use amqptun_core::routing::NetworkPrefix;
///
/// let net: NetworkPrefix = "10.2.0.0/16".parse().unwrap();
/// assert_eq!(net.routing_key().to_string(), "10.2.*.*");
///
/// assert!("10.2.0.0/12".parse::<NetworkPrefix>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkPrefix {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl NetworkPrefix {
    /// Creates a prefix from any IP address.
    ///
    /// # Errors
    /// - `NotIpv4` for IPv6 addresses
    /// - `PrefixTooLong` / `UnalignedPrefix` for unsupported lengths
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self> {
        match addr {
            IpAddr::V4(v4) => Self::from_ipv4(v4, prefix_len),
            IpAddr::V6(v6) => Err(CoreError::NotIpv4 {
                addr: v6.to_string(),
            }),
        }
    }

    /// Creates a prefix from an IPv4 address.
    ///
    /// # Errors
    /// `PrefixTooLong` above 32, `UnalignedPrefix` when not divisible by 8.
    pub fn from_ipv4(addr: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(CoreError::PrefixTooLong { prefix_len });
        }
        if prefix_len % 8 != 0 {
            return Err(CoreError::UnalignedPrefix { prefix_len });
        }
        Ok(Self { addr, prefix_len })
    }

    /// A single-host (/32) prefix.
    #[must_use]
    pub const fn host(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            prefix_len: 32,
        }
    }

    /// The address as given (not masked).
    #[must_use]
    pub const fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The prefix length in bits.
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Number of leading octets that are significant.
    #[must_use]
    pub const fn significant_octets(&self) -> usize {
        (self.prefix_len / 8) as usize
    }

    /// Encodes this network as a (possibly wildcarded) routing key.
    #[must_use]
    pub fn routing_key(&self) -> RoutingKey {
        let kept = self.significant_octets();
        let octets = self.addr.octets();
        let mut segments = [Segment::Wildcard; SEGMENT_COUNT];
        for (segment, octet) in segments.iter_mut().zip(octets).take(kept) {
            *segment = Segment::Octet(octet);
        }
        RoutingKey { segments }
    }
}

impl TryFrom<IpNet> for NetworkPrefix {
    type Error = CoreError;

    fn try_from(net: IpNet) -> Result<Self> {
        Self::new(net.addr(), net.prefix_len())
    }
}

impl TryFrom<&IpNet> for NetworkPrefix {
    type Error = CoreError;

    fn try_from(net: &IpNet) -> Result<Self> {
        Self::try_from(*net)
    }
}

impl FromStr for NetworkPrefix {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let net: IpNet = s
            .trim()
            .parse()
            .map_err(|e: ipnet::AddrParseError| CoreError::invalid_network(s, e.to_string()))?;
        Self::try_from(net)
    }
}

impl fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

// ============================================
// RoutingKey
// ============================================

/// One segment of a routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A concrete address octet.
    Octet(u8),
    /// Matches any single segment.
    Wildcard,
}

impl Segment {
    /// Returns `true` for a concrete octet.
    #[must_use]
    pub const fn is_concrete(&self) -> bool {
        matches!(self, Self::Octet(_))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Octet(octet) => write!(f, "{octet}"),
            Self::Wildcard => f.write_str(WILDCARD),
        }
    }
}

/// A four-segment routing key. Wildcards only appear as a trailing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingKey {
    segments: [Segment; SEGMENT_COUNT],
}

impl RoutingKey {
    /// The publish key for a packet destination: four concrete octets.
    #[must_use]
    pub fn for_destination(dst: Ipv4Addr) -> Self {
        NetworkPrefix::host(dst).routing_key()
    }

    /// The key's segments.
    #[must_use]
    pub const fn segments(&self) -> &[Segment; SEGMENT_COUNT] {
        &self.segments
    }

    /// Number of leading concrete segments.
    #[must_use]
    pub fn concrete_len(&self) -> usize {
        self.segments.iter().take_while(|s| s.is_concrete()).count()
    }

    /// Returns `true` when the key contains no wildcard.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.concrete_len() == SEGMENT_COUNT
    }

    /// Returns `true` if a message published with `key` would be delivered
    /// to a queue bound with `self`.
    #[must_use]
    pub fn matches(&self, key: &RoutingKey) -> bool {
        self.segments
            .iter()
            .zip(key.segments.iter())
            .all(|(pattern, seg)| *pattern == Segment::Wildcard || pattern == seg)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for RoutingKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(SEPARATOR).collect();
        if parts.len() != SEGMENT_COUNT {
            return Err(CoreError::invalid_routing_key(
                s,
                format!("expected {SEGMENT_COUNT} segments, got {}", parts.len()),
            ));
        }

        let mut segments = [Segment::Wildcard; SEGMENT_COUNT];
        let mut seen_wildcard = false;
        for (slot, part) in segments.iter_mut().zip(parts) {
            if part == WILDCARD {
                seen_wildcard = true;
                continue;
            }
            if seen_wildcard {
                return Err(CoreError::invalid_routing_key(
                    s,
                    "wildcards must form a trailing run",
                ));
            }
            *slot = Segment::Octet(parse_octet(part).ok_or_else(|| {
                CoreError::invalid_routing_key(s, format!("'{part}' is not an octet"))
            })?);
        }

        Ok(Self { segments })
    }
}

/// Parses a canonical decimal octet ("0".."255", no sign, no leading zero).
fn parse_octet(part: &str) -> Option<u8> {
    if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

// ============================================
// Codec Entry Point
// ============================================

/// Encodes a network into its subscription routing key.
///
/// # Errors
/// - `NotIpv4` for IPv6 networks
/// - `UnalignedPrefix` for prefixes not divisible by 8
///
/// # Example
/// ```
/// use amqptun_core::routing_key;
///
/// let net = "10.2.0.0/16".parse().unwrap();
/// assert_eq!(routing_key(&net).unwrap().to_string(), "10.2.*.*");
/// ```
pub fn routing_key(network: &IpNet) -> Result<RoutingKey> {
    Ok(NetworkPrefix::try_from(network)?.routing_key())
}

// ============================================
// Topic Matching
// ============================================

/// AMQP topic matching: `*` matches exactly one segment, `#` zero or more.
#[must_use]
pub fn topic_matches(pattern: &str, key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split(SEPARATOR).collect();
    let key: Vec<&str> = key.split(SEPARATOR).collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&MULTI_WILDCARD, rest)) => (0..=key.len()).any(|skip| match_segments(rest, &key[skip..])),
        Some((&WILDCARD, rest)) => !key.is_empty() && match_segments(rest, &key[1..]),
        Some((literal, rest)) => key.first() == Some(literal) && match_segments(rest, &key[1..]),
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn key(net: &str) -> Result<RoutingKey> {
        routing_key(&net.parse().unwrap())
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(key("10.2.0.0/16").unwrap().to_string(), "10.2.*.*");
        assert_eq!(key("10.1.0.1/32").unwrap().to_string(), "10.1.0.1");
        assert_eq!(key("0.0.0.0/0").unwrap().to_string(), "*.*.*.*");
        assert_eq!(key("192.168.7.0/24").unwrap().to_string(), "192.168.7.*");
        assert_eq!(key("172.0.0.0/8").unwrap().to_string(), "172.*.*.*");
    }

    #[test]
    fn test_host_bits_kept_verbatim() {
        // Only the first prefix/8 octets survive, whatever the host bits are.
        assert_eq!(key("10.2.3.4/16").unwrap().to_string(), "10.2.*.*");
        assert_eq!(key("10.1.0.1/24").unwrap().to_string(), "10.1.0.*");
    }

    #[test]
    fn test_unaligned_prefix_rejected() {
        for net in ["10.0.0.0/12", "10.2.0.0/20", "10.0.0.0/1", "10.2.5.8/31"] {
            let err = key(net).unwrap_err();
            assert!(matches!(err, CoreError::UnalignedPrefix { .. }), "{net}: {err}");
        }
    }

    #[test]
    fn test_ipv6_rejected_distinctly() {
        let err = key("fd00::/8").unwrap_err();
        assert!(matches!(err, CoreError::NotIpv4 { .. }));
        assert!(!err.is_prefix_error());

        // Alignment is irrelevant for non-IPv4 networks.
        let err = key("fd00::/12").unwrap_err();
        assert!(matches!(err, CoreError::NotIpv4 { .. }));
    }

    #[test]
    fn test_prefix_too_long() {
        let err = NetworkPrefix::from_ipv4(Ipv4Addr::new(10, 0, 0, 0), 40).unwrap_err();
        assert_eq!(err, CoreError::PrefixTooLong { prefix_len: 40 });
    }

    #[test]
    fn test_network_prefix_parse() {
        let net: NetworkPrefix = "10.2.0.0/16".parse().unwrap();
        assert_eq!(net.addr(), Ipv4Addr::new(10, 2, 0, 0));
        assert_eq!(net.prefix_len(), 16);
        assert_eq!(net.to_string(), "10.2.0.0/16");

        assert!(matches!(
            "not-a-network".parse::<NetworkPrefix>(),
            Err(CoreError::InvalidNetwork { .. })
        ));
    }

    #[test]
    fn test_publish_key_is_concrete() {
        let key = RoutingKey::for_destination(Ipv4Addr::new(10, 2, 5, 9));
        assert_eq!(key.to_string(), "10.2.5.9");
        assert!(key.is_concrete());
    }

    #[test]
    fn test_routing_key_parse() {
        let key: RoutingKey = "10.2.*.*".parse().unwrap();
        assert_eq!(key.concrete_len(), 2);
        assert_eq!(key.to_string(), "10.2.*.*");

        assert!("10.2.*".parse::<RoutingKey>().is_err());
        assert!("10.*.2.*".parse::<RoutingKey>().is_err());
        assert!("10.2.256.1".parse::<RoutingKey>().is_err());
        assert!("10.02.1.1".parse::<RoutingKey>().is_err());
        assert!("10.+2.1.1".parse::<RoutingKey>().is_err());
        assert!("10.2.#.1".parse::<RoutingKey>().is_err());
    }

    #[test]
    fn test_binding_matches_publish_key() {
        let binding = key("10.2.0.0/16").unwrap();
        let inside = RoutingKey::for_destination(Ipv4Addr::new(10, 2, 5, 9));
        let outside = RoutingKey::for_destination(Ipv4Addr::new(10, 3, 0, 1));

        assert!(binding.matches(&inside));
        assert!(!binding.matches(&outside));
        assert!(topic_matches("10.2.*.*", "10.2.5.9"));
        assert!(!topic_matches("10.2.*.*", "10.3.0.1"));
    }

    #[test]
    fn test_topic_matches_amqp_semantics() {
        assert!(topic_matches("*.*.*.*", "1.2.3.4"));
        assert!(!topic_matches("*.*.*", "1.2.3.4"));
        assert!(topic_matches("#", "1.2.3.4"));
        assert!(topic_matches("#", ""));
        assert!(topic_matches("10.#", "10.2.5.9"));
        assert!(topic_matches("10.#.9", "10.2.5.9"));
        assert!(!topic_matches("10.#.8", "10.2.5.9"));
        assert!(topic_matches("10.1.0.1", "10.1.0.1"));
        assert!(!topic_matches("10.1.0.1", "10.1.0.10"));
    }

    proptest! {
        #[test]
        fn prop_aligned_prefix_shape(octets in any::<[u8; 4]>(), idx in 0u8..=4) {
            let prefix_len = idx * 8;
            let net = NetworkPrefix::from_ipv4(Ipv4Addr::from(octets), prefix_len).unwrap();
            let first = net.routing_key();
            let second = net.routing_key();
            prop_assert_eq!(first, second);

            let kept = usize::from(idx);
            prop_assert_eq!(first.concrete_len(), kept);
            for (i, segment) in first.segments().iter().enumerate() {
                if i < kept {
                    prop_assert_eq!(*segment, Segment::Octet(octets[i]));
                } else {
                    prop_assert_eq!(*segment, Segment::Wildcard);
                }
            }

            let text = first.to_string();
            prop_assert_eq!(text.parse::<RoutingKey>().unwrap(), first);
        }

        #[test]
        fn prop_unaligned_prefix_never_rounds(octets in any::<[u8; 4]>(), prefix_len in 0u8..=32) {
            prop_assume!(prefix_len % 8 != 0);
            let result = NetworkPrefix::from_ipv4(Ipv4Addr::from(octets), prefix_len);
            prop_assert_eq!(result, Err(CoreError::UnalignedPrefix { prefix_len }));
        }

        #[test]
        fn prop_ipv6_always_rejected(segments in any::<[u16; 8]>(), prefix_len in 0u8..=128) {
            let addr = IpAddr::from(segments);
            let result = NetworkPrefix::new(addr, prefix_len);
            prop_assert!(matches!(result, Err(CoreError::NotIpv4 { .. })), "expected NotIpv4");
        }

        #[test]
        fn prop_publish_key_delivered_to_covering_binding(dst in any::<[u8; 4]>(), idx in 0u8..=4) {
            let dst = Ipv4Addr::from(dst);
            let binding = NetworkPrefix::from_ipv4(dst, idx * 8).unwrap().routing_key();
            let publish = RoutingKey::for_destination(dst);
            prop_assert!(binding.matches(&publish));
            prop_assert!(topic_matches(&binding.to_string(), &publish.to_string()));
        }
    }
}
