//! Transport trait consumed by the discovery session
//!
//! Socket setup, multicast group configuration and envelope framing belong
//! to the implementation; the session only sends probes and polls replies.

use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::time::Instant;

use crate::envelope::{self, EnvelopeError};
use crate::probe::ProbeRequest;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to encode probe: {0}")]
    Encode(#[from] EnvelopeError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Send refused: {0}")]
    Refused(String),
}

/// A datagram received while collecting, not yet correlated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub payload: Vec<u8>,
    pub source: Option<SocketAddr>,
}

impl RawReply {
    pub fn new(payload: impl Into<Vec<u8>>, source: Option<SocketAddr>) -> Self {
        Self {
            payload: payload.into(),
            source,
        }
    }

    /// Correlation id carried in the reply's `RelatesTo` header
    pub fn carried_correlation_id(&self) -> Result<Option<String>, EnvelopeError> {
        envelope::relates_to(&self.payload)
    }
}

/// Multicast send/receive primitive
pub trait Transport: Send + Sync {
    /// Send one probe; no acknowledgment of remote receipt
    fn send(
        &self,
        probe: ProbeRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next received datagram, or `None` once `deadline` has passed
    ///
    /// Implementations must not block past `deadline`.
    fn poll_receive(&self, deadline: Instant) -> impl Future<Output = Option<RawReply>> + Send;
}
