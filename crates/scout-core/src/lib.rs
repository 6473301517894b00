//! Scout Core - Core types, WS-Discovery envelopes, and reply correlation
//!
//! This crate provides the building blocks of a discovery session:
//! - Correlation identifiers tagging outgoing probes
//! - Probe requests and their SOAP envelope encoding
//! - Reply correlation against the set of awaited probes
//! - Match parsing of `ProbeMatches` replies
//! - The transport trait the discovery session drives

pub mod correlation;
pub mod correlator;
pub mod envelope;
pub mod matches;
pub mod probe;
pub mod result;
pub mod transport;

pub use correlation::CorrelationId;
pub use correlator::{accept, Correlator, RejectReason, Verdict};
pub use envelope::EnvelopeError;
pub use matches::{parse_matches, MatchRecord};
pub use probe::{ProbeError, ProbeRequest, DEFAULT_TYPE_FILTERS};
pub use result::{DiscoveredMatch, DiscoveryResult, ProbeFailure};
pub use transport::{RawReply, Transport, TransportError};
