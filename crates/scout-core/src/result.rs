//! Discovery session results

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use crate::correlation::CorrelationId;
use crate::matches::MatchRecord;

/// A match together with where and when it arrived
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredMatch {
    /// Receive-order index of the reply that carried this match
    pub reply_index: usize,
    /// Probe the reply answered
    pub correlation_id: CorrelationId,
    /// Sender of the reply, when the transport knows it
    pub source: Option<SocketAddr>,
    #[serde(flatten)]
    pub record: MatchRecord,
}

/// A probe that could not be built or sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeFailure {
    pub type_filter: String,
    pub correlation_id: Option<CorrelationId>,
    pub reason: String,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "probe for {} failed: {}", self.type_filter, self.reason)
    }
}

/// Final, immutable outcome of one discovery session
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryResult {
    pub requested_type_filters: BTreeSet<String>,
    /// Matches in receive order
    pub matches: Vec<DiscoveredMatch>,
    /// Probes that failed while others were sent
    pub probe_failures: Vec<ProbeFailure>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Monotonic length of the collection window
    pub elapsed: Duration,
}

impl DiscoveryResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Match records without their arrival metadata
    pub fn records(&self) -> impl Iterator<Item = &MatchRecord> {
        self.matches.iter().map(|m| &m.record)
    }

    /// Matches grouped by device identity (`EndpointReference`), first sighting kept
    ///
    /// Devices commonly answer each probed type separately; `matches` keeps
    /// every advertisement, this view collapses repeats for display.
    pub fn unique_devices(&self) -> Vec<&DiscoveredMatch> {
        let mut seen = BTreeSet::new();
        self.matches
            .iter()
            .filter(|m| match m.record.reference_address.as_deref() {
                Some(reference) => seen.insert(reference),
                None => true,
            })
            .collect()
    }
}
