// ============================================
// File: crates/amqptun-node/tests/tunnel.rs
// ============================================
//! End-to-end runs of the packet pump over the in-memory exchange and
//! mock TUN devices.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ipnet::IpNet;
use tokio_util::sync::CancellationToken;

use amqptun_node::{Tunnel, TunnelConfig, TunnelError};
use amqptun_transport::{
    Broker, DeliveryStream, MockBroker, MockExchange, MockTun, TransportError, TunConfig,
};

const TIMEOUT: Duration = Duration::from_secs(2);

type MockTunnel = Tunnel<MockBroker, MockTun>;

fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let total_len = u16::try_from(20 + payload.len()).unwrap();
    let mut packet = vec![0u8; 20];
    packet[0] = 0x45;
    packet[2..4].copy_from_slice(&total_len.to_be_bytes());
    packet[8] = 64;
    packet[9] = 1;
    packet[12..16].copy_from_slice(&src.octets());
    packet[16..20].copy_from_slice(&dst.octets());
    packet.extend_from_slice(payload);
    packet
}

fn node(exchange: &Arc<MockExchange>, name: &str) -> Arc<MockTunnel> {
    let config = TunnelConfig::new("amqp://test")
        .with_exchange(exchange.name())
        .with_interface_name(name)
        .with_debug_packets(true);
    Arc::new(Tunnel::with_parts(
        config,
        Arc::new(MockBroker::connect(exchange)),
        Arc::new(MockTun::new(TunConfig::new(name))),
    ))
}

fn net(s: &str) -> IpNet {
    s.parse().unwrap()
}

fn spawn_run(
    tunnel: &Arc<MockTunnel>,
    token: &CancellationToken,
) -> tokio::task::JoinHandle<amqptun_node::Result<()>> {
    let tunnel = Arc::clone(tunnel);
    let token = token.clone();
    tokio::spawn(async move { tunnel.run(&token).await })
}

async fn join(handle: tokio::task::JoinHandle<amqptun_node::Result<()>>) -> amqptun_node::Result<()> {
    tokio::time::timeout(TIMEOUT, handle)
        .await
        .expect("run did not finish in time")
        .expect("run task panicked")
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================
// Send path
// ============================================

#[tokio::test]
async fn test_packet_published_under_destination_key() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let token = CancellationToken::new();
    let handle = spawn_run(&a, &token);

    let packet = ipv4_packet(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b"ping");
    a.interface().inject_packet(packet.clone());

    wait_until(|| !exchange.published().is_empty()).await;
    token.cancel();
    join(handle).await.unwrap();

    let published = exchange.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "10.2.5.9");
    assert_eq!(&published[0].1[..], &packet[..]);
}

#[tokio::test]
async fn test_non_ipv4_frames_never_published() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let token = CancellationToken::new();
    let handle = spawn_run(&a, &token);

    let mut ipv6 = vec![0u8; 40];
    ipv6[0] = 0x60;
    let marker = ipv4_packet(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 9, 9, 9), b"");
    a.interface().inject_packets(vec![ipv6, vec![0x45, 0x00], marker]);

    // The IPv4 marker goes out only after the junk has been read and skipped
    wait_until(|| !exchange.published().is_empty()).await;
    token.cancel();
    join(handle).await.unwrap();

    let keys: Vec<String> = exchange.published().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["10.9.9.9"]);
}

#[tokio::test]
async fn test_publish_failure_ends_run() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    a.broker().set_publish_failure(true);
    let token = CancellationToken::new();
    let handle = spawn_run(&a, &token);

    a.interface()
        .inject_packet(ipv4_packet(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b""));

    let err = join(handle).await.unwrap_err();
    assert!(matches!(err, TunnelError::Transport(TransportError::PublishFailed { .. })));

    // The receive path was stopped too, even though nobody cancelled the token
    assert!(!token.is_cancelled());
}

#[tokio::test]
async fn test_tun_read_failure_ends_run() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let handle = spawn_run(&a, &CancellationToken::new());

    a.interface().set_read_failure(true);

    let err = join(handle).await.unwrap_err();
    assert!(err.is_tun_error());
}

// ============================================
// Cancellation
// ============================================

#[tokio::test]
async fn test_already_cancelled_token_returns_ok() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let token = CancellationToken::new();
    token.cancel();

    let result = tokio::time::timeout(TIMEOUT, a.run(&token)).await.unwrap();
    assert!(result.is_ok());
}

/// A broker whose publish is interrupted by shutdown: it cancels the run
/// token, then fails the way a closing connection would.
struct ShutdownDuringPublish {
    inner: MockBroker,
    token: CancellationToken,
}

#[async_trait]
impl Broker for ShutdownDuringPublish {
    fn queue_name(&self) -> &str {
        self.inner.queue_name()
    }

    fn exchange_name(&self) -> &str {
        self.inner.exchange_name()
    }

    async fn bind(&self, routing_key: &str) -> amqptun_transport::Result<()> {
        self.inner.bind(routing_key).await
    }

    async fn unbind(&self, routing_key: &str) -> amqptun_transport::Result<()> {
        self.inner.unbind(routing_key).await
    }

    async fn publish(&self, routing_key: &str, _body: &[u8]) -> amqptun_transport::Result<()> {
        self.token.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err(TransportError::publish_failed(routing_key, "connection closed"))
    }

    async fn consume(&self) -> amqptun_transport::Result<DeliveryStream> {
        self.inner.consume().await
    }

    async fn close(&self) -> amqptun_transport::Result<()> {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_error_after_cancellation_is_clean_shutdown() {
    let exchange = MockExchange::new("ip-router");
    let token = CancellationToken::new();
    let broker = ShutdownDuringPublish {
        inner: MockBroker::connect(&exchange),
        token: token.clone(),
    };
    let tun = Arc::new(MockTun::new(TunConfig::new("tun-a")));
    let tunnel = Tunnel::with_parts(
        TunnelConfig::new("amqp://test").with_exchange(exchange.name()),
        Arc::new(broker),
        Arc::clone(&tun),
    );

    tun.inject_packet(ipv4_packet(Ipv4Addr::new(10, 1, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b""));

    let result = tokio::time::timeout(TIMEOUT, tunnel.run(&token)).await.unwrap();
    assert!(token.is_cancelled());
    assert!(result.is_ok(), "expected clean shutdown, got {result:?}");
}

#[tokio::test]
async fn test_cancel_while_idle_returns_ok() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let token = CancellationToken::new();
    let handle = spawn_run(&a, &token);

    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    join(handle).await.unwrap();
}

// ============================================
// Two nodes
// ============================================

#[tokio::test]
async fn test_two_nodes_exchange_packets_by_route() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let b = node(&exchange, "tun-b");

    a.add_routes(&[net("10.1.0.1/32"), net("10.2.0.0/16")]).await.unwrap();
    b.add_route(&net("10.3.0.1/32")).await.unwrap();

    let token = CancellationToken::new();
    let handle_a = spawn_run(&a, &token);
    let handle_b = spawn_run(&b, &token);

    let to_a = ipv4_packet(Ipv4Addr::new(10, 3, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b"for a");
    let to_b = ipv4_packet(Ipv4Addr::new(10, 3, 0, 1), Ipv4Addr::new(10, 3, 0, 1), b"for b");
    let nobody = ipv4_packet(Ipv4Addr::new(10, 3, 0, 1), Ipv4Addr::new(10, 4, 0, 1), b"lost");
    b.interface().inject_packets(vec![nobody, to_a.clone(), to_b.clone()]);

    wait_until(|| a.interface().written_count() == 1 && b.interface().written_count() == 1).await;
    token.cancel();
    join(handle_a).await.unwrap();
    join(handle_b).await.unwrap();

    assert_eq!(a.interface().take_written_packets(), vec![to_a]);
    assert_eq!(b.interface().take_written_packets(), vec![to_b]);
    assert_eq!(exchange.published().len(), 3);
}

#[tokio::test]
async fn test_removed_route_stops_delivery() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    a.add_route(&net("10.2.0.0/16")).await.unwrap();
    a.remove_route(&net("10.2.0.0/16")).await.unwrap();

    assert_eq!(exchange.publish("10.2.5.9", b"x"), 0);
}

// ============================================
// Receive path
// ============================================

#[tokio::test]
async fn test_subscriber_drops_non_ipv4_bodies() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    a.add_route(&net("0.0.0.0/0")).await.unwrap();
    let token = CancellationToken::new();
    let handle = spawn_run(&a, &token);
    wait_until(|| a.broker().consume_registered()).await;

    let valid = ipv4_packet(Ipv4Addr::new(10, 3, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b"ok");
    exchange.publish("10.2.5.9", b"\x60 not ipv4");
    exchange.publish("10.2.5.9", &valid);

    wait_until(|| a.interface().written_count() == 1).await;
    token.cancel();
    join(handle).await.unwrap();

    assert_eq!(a.interface().take_written_packets(), vec![valid]);
}

#[tokio::test]
async fn test_consume_registration_failure_is_fatal() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    a.broker().set_consume_failure(true);

    let err = join(spawn_run(&a, &CancellationToken::new())).await.unwrap_err();
    assert!(matches!(err, TunnelError::Transport(TransportError::ConsumeFailed { .. })));
}

#[tokio::test]
async fn test_consumer_closed_is_fatal() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let handle = spawn_run(&a, &CancellationToken::new());
    wait_until(|| a.broker().consume_registered()).await;

    a.broker().close().await.unwrap();

    let err = join(handle).await.unwrap_err();
    assert!(matches!(err, TunnelError::Transport(TransportError::ConsumerClosed { .. })));
}

#[tokio::test]
async fn test_delivery_error_is_fatal() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    let handle = spawn_run(&a, &CancellationToken::new());
    wait_until(|| a.broker().consume_registered()).await;

    a.broker().fail_delivery("connection reset by peer");

    let err = join(handle).await.unwrap_err();
    assert!(matches!(err, TunnelError::Transport(TransportError::ConsumeFailed { .. })));
}

#[tokio::test]
async fn test_tun_write_failure_is_fatal() {
    let exchange = MockExchange::new("ip-router");
    let a = node(&exchange, "tun-a");
    a.add_route(&net("10.2.0.0/16")).await.unwrap();
    a.interface().set_write_failure(true);
    let handle = spawn_run(&a, &CancellationToken::new());
    wait_until(|| a.broker().consume_registered()).await;

    exchange.publish(
        "10.2.5.9",
        &ipv4_packet(Ipv4Addr::new(10, 3, 0, 1), Ipv4Addr::new(10, 2, 5, 9), b""),
    );

    let err = join(handle).await.unwrap_err();
    assert!(err.is_tun_error());
}
