//! Probe requests sent to the WS-Discovery multicast group

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correlation::CorrelationId;
use crate::envelope::{self, EnvelopeError};

/// ONVIF device management service type
pub const DEVICE_TYPE: &str = "tds:Device";

/// ONVIF network video transmitter type
pub const NETWORK_VIDEO_TRANSMITTER_TYPE: &str = "dn:NetworkVideoTransmitter";

/// Types probed when the caller does not name any
pub const DEFAULT_TYPE_FILTERS: [&str; 2] = [DEVICE_TYPE, NETWORK_VIDEO_TRANSMITTER_TYPE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// A single typed probe, immutable once built
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    type_filter: String,
    correlation_id: CorrelationId,
}

impl ProbeRequest {
    /// Build a probe for `type_filter` (e.g. `tds:Device`) tagged with `correlation_id`
    pub fn build(
        type_filter: impl Into<String>,
        correlation_id: impl Into<CorrelationId>,
    ) -> Result<Self, ProbeError> {
        let type_filter = type_filter.into();
        let correlation_id = correlation_id.into();

        if type_filter.trim().is_empty() {
            return Err(ProbeError::InvalidArgument("type filter must not be empty"));
        }
        if correlation_id.is_empty() {
            return Err(ProbeError::InvalidArgument("correlation id must not be empty"));
        }

        Ok(Self {
            type_filter,
            correlation_id,
        })
    }

    pub fn type_filter(&self) -> &str {
        &self.type_filter
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Encode as a SOAP `Probe` envelope
    pub fn to_xml(&self) -> Result<String, EnvelopeError> {
        envelope::encode_probe(self)
    }
}
