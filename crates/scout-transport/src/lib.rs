//! Scout Transport - UDP multicast transport for WS-Discovery
//!
//! Owns the socket a discovery session borrows: multicast TTL, loopback and
//! outgoing interface are configured here, never by the session.

pub mod udp;

pub use udp::{
    UdpMulticastTransport, UdpTransportConfig, WS_DISCOVERY_GROUP, WS_DISCOVERY_PORT,
};
