//! Async UDP transport for WS-Discovery probes

use anyhow::{Context, Result};
use scout_core::{envelope, ProbeRequest, RawReply, Transport, TransportError};
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, trace, warn};

/// WS-Discovery IPv4 multicast group
pub const WS_DISCOVERY_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// WS-Discovery port
pub const WS_DISCOVERY_PORT: u16 = 3702;

/// Largest UDP payload over IPv4
const MAX_DATAGRAM: usize = 65_507;

/// Pause after a receive error so a failing socket cannot spin the loop
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpTransportConfig {
    /// Where probes are sent (multicast group or a single device)
    pub target: SocketAddr,
    /// Local address replies arrive on
    pub bind: SocketAddr,
    /// Outgoing interface for multicast probes
    pub interface: Option<Ipv4Addr>,
    /// Multicast TTL (1 keeps probes on the local segment)
    pub ttl: u32,
    /// Receive our own multicast probes
    pub multicast_loop: bool,
    /// Receive buffer size
    pub max_datagram: usize,
    /// Log every received payload at debug level
    pub dump_payloads: bool,
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            target: SocketAddr::new(IpAddr::V4(WS_DISCOVERY_GROUP), WS_DISCOVERY_PORT),
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            interface: None,
            ttl: 1,
            multicast_loop: false,
            max_datagram: MAX_DATAGRAM,
            dump_payloads: false,
        }
    }
}

impl UdpTransportConfig {
    /// Directed probing of a single host instead of the multicast group
    pub fn unicast(target: SocketAddr) -> Self {
        let bind_ip = if target.ip().is_loopback() {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        };
        Self {
            target,
            bind: SocketAddr::new(bind_ip, 0),
            ..Self::default()
        }
    }

    fn is_multicast(&self) -> bool {
        self.target.ip().is_multicast()
    }
}

/// Create the probe socket with multicast options applied
fn create_socket(config: &UdpTransportConfig) -> std::io::Result<std::net::UdpSocket> {
    let domain = if config.bind.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    if config.is_multicast() && config.bind.is_ipv4() {
        socket.set_multicast_ttl_v4(config.ttl)?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;
        if let Some(interface) = config.interface {
            socket.set_multicast_if_v4(&interface)?;
        }
    }

    socket.bind(&config.bind.into())?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Async UDP transport for WS-Discovery
pub struct UdpMulticastTransport {
    socket: UdpSocket,
    config: UdpTransportConfig,
    /// Receive buffer, reused across polls
    buf: Mutex<Vec<u8>>,
}

impl UdpMulticastTransport {
    /// Bind a new transport
    pub async fn bind(config: UdpTransportConfig) -> Result<Self> {
        let std_socket = create_socket(&config)
            .with_context(|| format!("Failed to create UDP socket on {}", config.bind))?;
        let socket = UdpSocket::from_std(std_socket)?;

        debug!(
            local = %socket.local_addr()?,
            dest = %config.target,
            interface = ?config.interface,
            "UDP transport bound"
        );

        let buf = Mutex::new(vec![0u8; config.max_datagram]);
        Ok(Self {
            socket,
            config,
            buf,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn config(&self) -> &UdpTransportConfig {
        &self.config
    }
}

impl Transport for UdpMulticastTransport {
    async fn send(&self, probe: ProbeRequest) -> Result<(), TransportError> {
        let xml = envelope::encode_probe(&probe)?;

        trace!(
            dest = %self.config.target,
            type_filter = %probe.type_filter(),
            id = %probe.correlation_id(),
            len = xml.len(),
            "Sending probe"
        );

        let sent = self.socket.send_to(xml.as_bytes(), self.config.target).await?;
        if sent != xml.len() {
            return Err(TransportError::Refused(format!(
                "short send: {} of {} bytes",
                sent,
                xml.len()
            )));
        }

        Ok(())
    }

    async fn poll_receive(&self, deadline: Instant) -> Option<RawReply> {
        let mut buf = self.buf.lock().await;

        loop {
            match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, source))) => {
                    trace!(source = %source, len = len, "Received datagram");
                    if self.config.dump_payloads {
                        debug!(
                            source = %source,
                            payload = %String::from_utf8_lossy(&buf[..len]),
                            "Raw reply"
                        );
                    }
                    return Some(RawReply::new(&buf[..len], Some(source)));
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "UDP receive error");
                    let retry_at = Instant::now() + RECEIVE_ERROR_BACKOFF;
                    if retry_at >= deadline {
                        sleep_until(deadline).await;
                        return None;
                    }
                    sleep_until(retry_at).await;
                }
                // Deadline reached
                Err(_) => return None,
            }
        }
    }
}
