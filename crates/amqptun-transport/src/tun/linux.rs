// ============================================
// File: crates/amqptun-transport/src/tun/linux.rs
// ============================================
//! # Linux TUN Device Implementation
//!
//! ## Creation Reason
//! Creates (or attaches to) the node's point-to-point IP interface through
//! `/dev/net/tun` and exposes it as an async [`TunDevice`].
//!
//! ## Setup Sequence
//! 1. Open `/dev/net/tun`
//! 2. `TUNSETIFF` with `IFF_TUN | IFF_NO_PI` (attaches if the name exists)
//! 3. Optionally `TUNSETPERSIST`
//! 4. Switch the descriptor to non-blocking and register it with Tokio
//! 5. [`LinuxTun::up`]: `ip link set up`, then `ip addr add` unless the
//!    address is already present
//!
//! ## Required Capabilities
//! - `CAP_NET_ADMIN`: For creating and configuring TUN devices
//! - Or run as root
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always set IFF_NO_PI, the pump expects bare IP packets
//! - Dropping the device closes the descriptor; the kernel removes
//!   non-persistent devices at that point
//!
//! ## Last Modified
//! v0.1.0 - Initial Linux TUN implementation

#![cfg(target_os = "linux")]

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};

use async_trait::async_trait;
use ipnet::Ipv4Net;
use nix::libc;
use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{TunConfig, TunDevice};

// ============================================
// Constants
// ============================================

/// Path to the TUN device clone device.
const TUN_DEVICE_PATH: &str = "/dev/net/tun";

/// IFF_TUN flag - TUN device (no Ethernet headers).
const IFF_TUN: libc::c_short = 0x0001;

/// IFF_NO_PI flag - Do not provide packet information.
const IFF_NO_PI: libc::c_short = 0x1000;

/// TUNSETIFF ioctl number.
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

/// TUNSETPERSIST ioctl number.
const TUNSETPERSIST: libc::c_ulong = 0x4004_54cb;

/// `ip addr add` failure text when the address is already assigned.
const ADDRESS_EXISTS: &str = "File exists";

// ============================================
// ifreq Structure
// ============================================

/// Interface request structure for ioctl calls.
#[repr(C)]
struct IfReq {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_flags: libc::c_short,
    _padding: [u8; 22],
}

impl IfReq {
    fn new(name: &str, flags: libc::c_short) -> Self {
        let mut ifr = Self {
            ifr_name: [0; libc::IFNAMSIZ],
            ifr_flags: flags,
            _padding: [0; 22],
        };

        // Leave room for the terminating NUL
        for (slot, &byte) in ifr
            .ifr_name
            .iter_mut()
            .zip(name.as_bytes())
            .take(libc::IFNAMSIZ - 1)
        {
            *slot = byte as libc::c_char;
        }

        ifr
    }

    fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .ifr_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

// ============================================
// Descriptor Helpers
// ============================================

fn open_clone_device(name: &str) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(TUN_DEVICE_PATH)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                TransportError::PermissionDenied {
                    operation: format!("open {TUN_DEVICE_PATH}"),
                }
            } else {
                TransportError::tun_create_failed(name, e.to_string())
            }
        })
}

/// Binds the descriptor to the named interface, returning the kernel's name.
fn attach(fd: RawFd, name: &str) -> Result<String> {
    let mut ifr = IfReq::new(name, IFF_TUN | IFF_NO_PI);

    let result = unsafe { libc::ioctl(fd, TUNSETIFF as libc::c_ulong, &mut ifr) };
    if result < 0 {
        let err = std::io::Error::last_os_error();
        return Err(TransportError::tun_create_failed(
            name,
            format!("TUNSETIFF failed: {err}"),
        ));
    }

    Ok(ifr.name())
}

fn set_nonblocking(fd: RawFd, name: &str) -> Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(TransportError::tun_create_failed(
            name,
            "Failed to get file flags",
        ));
    }

    let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if result < 0 {
        return Err(TransportError::tun_create_failed(
            name,
            "Failed to set non-blocking mode",
        ));
    }

    Ok(())
}

// ============================================
// LinuxTun
// ============================================

/// Linux TUN device implementation.
///
/// # Example
/// ```ignore
/// use amqptun_transport::{LinuxTun, TunConfig, TunDevice};
///
/// let config = TunConfig::new("amqp-tun0").with_address("10.1.0.1/24".parse()?);
/// let tun = LinuxTun::create(config).await?;
/// tun.up().await?;
///
/// let mut buf = [0u8; 2000];
/// let len = tun.read(&mut buf).await?;
/// ```
pub struct LinuxTun {
    /// Async file descriptor wrapper
    async_fd: AsyncFd<File>,
    /// Name assigned by the kernel
    name: String,
    /// Address to assign when brought up
    address: Option<Ipv4Net>,
}

impl LinuxTun {
    /// Creates the TUN device, or attaches to it if it already exists.
    ///
    /// # Errors
    /// - `TunCreateFailed`: If device creation fails
    /// - `PermissionDenied`: If lacking CAP_NET_ADMIN
    pub async fn create(config: TunConfig) -> Result<Self> {
        config.validate()?;

        info!("Creating TUN device: {}", config.name);

        let file = open_clone_device(&config.name)?;
        let fd = file.as_raw_fd();

        let name = attach(fd, &config.name)?;
        debug!("TUN device attached: {}", name);

        if config.persist {
            let result = unsafe { libc::ioctl(fd, TUNSETPERSIST as libc::c_ulong, 1) };
            if result < 0 {
                warn!("Failed to set TUN persistence: {}", std::io::Error::last_os_error());
            }
        }

        set_nonblocking(fd, &name)?;

        let async_fd = AsyncFd::new(file).map_err(|e| {
            TransportError::tun_create_failed(&name, format!("AsyncFd creation failed: {e}"))
        })?;

        Ok(Self {
            async_fd,
            name,
            address: config.address,
        })
    }

    /// Brings the link up and assigns the configured address.
    ///
    /// An address that is already assigned is left in place.
    ///
    /// # Errors
    /// `TunConfigFailed` if an `ip` invocation fails.
    pub async fn up(&self) -> Result<()> {
        info!("Bringing up TUN device: {}", self.name);

        self.ip(&["link", "set", "dev", &self.name, "up"]).await?;

        if let Some(address) = self.address {
            let cidr = address.to_string();
            match self.ip(&["addr", "add", &cidr, "dev", &self.name]).await {
                Ok(()) => info!("TUN device {} assigned {}", self.name, cidr),
                Err(TransportError::TunConfigFailed { ref reason, .. })
                    if reason.contains(ADDRESS_EXISTS) =>
                {
                    debug!("Address {} already present on {}", cidr, self.name);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Runs `ip <args>`, mapping any failure to `TunConfigFailed`.
    async fn ip(&self, args: &[&str]) -> Result<()> {
        debug!("ip {}", args.join(" "));

        let output = Command::new("ip").args(args).output().await.map_err(|e| {
            TransportError::tun_config_failed(&self.name, format!("Failed to run ip command: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::tun_config_failed(
                &self.name,
                format!("ip {} failed: {}", args.join(" "), stderr.trim()),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl TunDevice for LinuxTun {
    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let mut guard = self
                .async_fd
                .ready(Interest::READABLE)
                .await
                .map_err(|e| TransportError::TunReadFailed {
                    reason: e.to_string(),
                })?;

            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(buf)
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => {
                    return Err(TransportError::TunReadFailed {
                        reason: e.to_string(),
                    })
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<usize> {
        loop {
            let mut guard = self
                .async_fd
                .ready(Interest::WRITABLE)
                .await
                .map_err(|e| TransportError::TunWriteFailed {
                    reason: e.to_string(),
                })?;

            match guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(buf)
            }) {
                Ok(Ok(len)) => return Ok(len),
                Ok(Err(e)) => {
                    return Err(TransportError::TunWriteFailed {
                        reason: e.to_string(),
                    })
                }
                Err(_would_block) => continue,
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LinuxTun {
    fn drop(&mut self) {
        debug!("Closing TUN device: {}", self.name);
    }
}

impl std::fmt::Debug for LinuxTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxTun")
            .field("name", &self.name)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
