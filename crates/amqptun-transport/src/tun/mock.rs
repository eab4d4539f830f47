// ============================================
// File: crates/amqptun-transport/src/tun/mock.rs
// ============================================
//! # Mock TUN Device Implementation
//!
//! ## Creation Reason
//! Lets the packet pump be exercised without creating a real interface
//! or holding CAP_NET_ADMIN.
//!
//! ## Main Functionality
//! - Injected packets are handed out by `read()` in order
//! - Written packets are captured for verification
//! - Read and write failures can be switched on to drive error paths
//!
//! ## Usage in Tests
//! ```ignore
//! let tun = MockTun::new(TunConfig::new("mock0"));
//! tun.inject_packet(b"test packet".to_vec());
//!
//! let mut buf = [0u8; 1500];
//! let len = tun.read(&mut buf).await?;
//! assert_eq!(&buf[..len], b"test packet");
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//! - `read()` parks until something is injected; wrap it in a timeout
//!   or a cancellation `select!` in tests
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice};

/// Maximum number of packets to queue in either direction.
const MAX_QUEUE_SIZE: usize = 1000;

// ============================================
// MockTun
// ============================================

/// Mock TUN device for testing.
pub struct MockTun {
    /// Device configuration
    config: TunConfig,
    /// Packets waiting to be read (injected for testing)
    read_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Packets that have been written (captured for verification)
    write_queue: Mutex<VecDeque<Vec<u8>>>,
    /// Notify when new packets are available
    read_notify: Notify,
    /// Make `read()` fail
    fail_reads: AtomicBool,
    /// Make `write()` fail
    fail_writes: AtomicBool,
}

impl MockTun {
    /// Creates a new mock TUN device.
    #[must_use]
    pub fn new(config: TunConfig) -> Self {
        Self {
            config,
            read_queue: Mutex::new(VecDeque::new()),
            write_queue: Mutex::new(VecDeque::new()),
            read_notify: Notify::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Injects a packet to be returned by a later `read()` call.
    ///
    /// # Panics
    /// Panics if the queue is full (> `MAX_QUEUE_SIZE` packets).
    pub fn inject_packet(&self, packet: Vec<u8>) {
        let mut queue = self.read_queue.lock();
        assert!(queue.len() < MAX_QUEUE_SIZE, "Mock TUN read queue overflow");
        queue.push_back(packet);
        drop(queue);
        self.read_notify.notify_one();
    }

    /// Injects multiple packets at once.
    ///
    /// # Panics
    /// Panics if the queue overflows.
    pub fn inject_packets(&self, packets: impl IntoIterator<Item = Vec<u8>>) {
        for packet in packets {
            self.inject_packet(packet);
        }
    }

    /// Makes subsequent reads fail (or succeed again).
    pub fn set_read_failure(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
        self.read_notify.notify_one();
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Takes all packets that have been written to the device.
    ///
    /// This clears the write queue.
    #[must_use]
    pub fn take_written_packets(&self) -> Vec<Vec<u8>> {
        self.write_queue.lock().drain(..).collect()
    }

    /// Returns the number of packets waiting to be read.
    #[must_use]
    pub fn pending_read_count(&self) -> usize {
        self.read_queue.lock().len()
    }

    /// Returns the number of packets that have been written.
    #[must_use]
    pub fn written_count(&self) -> usize {
        self.write_queue.lock().len()
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.fail_reads.load(Ordering::Acquire) {
                return Err(TransportError::TunReadFailed {
                    reason: "injected read failure".into(),
                });
            }

            {
                let mut queue = self.read_queue.lock();
                if let Some(packet) = queue.pop_front() {
                    let len = packet.len().min(buf.len());
                    buf[..len].copy_from_slice(&packet[..len]);
                    return Ok(len);
                }
            }

            self.read_notify.notified().await;
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(TransportError::TunWriteFailed {
                reason: "injected write failure".into(),
            });
        }

        let mut queue = self.write_queue.lock();
        if queue.len() >= MAX_QUEUE_SIZE {
            return Err(TransportError::TunWriteFailed {
                reason: "Write queue full".into(),
            });
        }
        queue.push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

impl std::fmt::Debug for MockTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTun")
            .field("name", &self.config.name)
            .field("address", &self.config.address)
            .field("pending_reads", &self.pending_read_count())
            .field("written_packets", &self.written_count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_mock_tun_inject_read() {
        let tun = MockTun::new(TunConfig::new("mock0"));
        assert_eq!(tun.name(), "mock0");

        tun.inject_packet(b"test packet".to_vec());
        assert_eq!(tun.pending_read_count(), 1);

        let mut buf = [0u8; 100];
        let len = tun.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..len], b"test packet");
        assert_eq!(tun.pending_read_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_tun_read_waits_for_injection() {
        let tun = std::sync::Arc::new(MockTun::new(TunConfig::new("mock0")));

        let reader = {
            let tun = tun.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 100];
                let len = tun.read(&mut buf).await.unwrap();
                buf[..len].to_vec()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        tun.inject_packet(b"late".to_vec());

        let packet = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(packet, b"late");
    }

    #[tokio::test]
    async fn test_mock_tun_write_capture() {
        let tun = MockTun::new(TunConfig::new("mock0"));

        tun.write(b"packet 1").await.unwrap();
        tun.write(b"packet 2").await.unwrap();
        assert_eq!(tun.written_count(), 2);

        let captured = tun.take_written_packets();

        assert_eq!(captured, vec![b"packet 1".to_vec(), b"packet 2".to_vec()]);
        assert_eq!(tun.written_count(), 0);
    }

    #[tokio::test]
    async fn test_mock_tun_multiple_packets_in_order() {
        let tun = MockTun::new(TunConfig::new("mock0"));

        tun.inject_packets(vec![
            b"packet 1".to_vec(),
            b"packet 2".to_vec(),
            b"packet 3".to_vec(),
        ]);
        assert_eq!(tun.pending_read_count(), 3);

        let mut buf = [0u8; 100];
        for expected in [&b"packet 1"[..], b"packet 2", b"packet 3"] {
            let len = tun.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..len], expected);
        }
    }

    #[tokio::test]
    async fn test_mock_tun_injected_failures() {
        let tun = MockTun::new(TunConfig::new("mock0"));

        tun.set_write_failure(true);
        let err = tun.write(b"x").await.unwrap_err();
        assert!(matches!(err, TransportError::TunWriteFailed { .. }));
        assert_eq!(tun.written_count(), 0);

        tun.set_write_failure(false);
        assert!(tun.write(b"x").await.is_ok());

        tun.set_read_failure(true);
        let mut buf = [0u8; 16];
        let err = tun.read(&mut buf).await.unwrap_err();
        assert!(err.is_tun_error());
    }

    #[tokio::test]
    async fn test_mock_tun_buffer_truncation() {
        let tun = MockTun::new(TunConfig::new("mock0"));

        tun.inject_packet(vec![0x42; 1000]);

        let mut buf = [0u8; 10];
        let len = tun.read(&mut buf).await.unwrap();

        assert_eq!(len, 10);
        assert_eq!(buf, [0x42; 10]);
    }
}
