//! Informational events raised while a session runs
//!
//! Events never change a session's outcome; they only report what happened
//! to each probe and reply.

use scout_core::{CorrelationId, DiscoveredMatch, RejectReason};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Discovery event for real-time updates
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// Probe handed to the transport
    ProbeSent {
        type_filter: String,
        correlation_id: CorrelationId,
    },
    /// Probe could not be built or sent
    ProbeFailed { type_filter: String, reason: String },
    /// Reply did not relate to any awaited probe
    ReplyRejected {
        source: Option<SocketAddr>,
        reason: RejectReason,
    },
    /// Correlated reply whose body could not be decoded
    ReplyMalformed {
        source: Option<SocketAddr>,
        error: String,
    },
    /// Match accepted into the result
    MatchFound(DiscoveredMatch),
    /// Collection window closed
    WindowClosed { replies: usize, matches: usize },
}

/// Receiver of session events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DiscoveryEvent);
}

impl<F> EventSink for F
where
    F: Fn(&DiscoveryEvent) + Send + Sync,
{
    fn emit(&self, event: &DiscoveryEvent) {
        self(event)
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::ProbeSent {
                type_filter,
                correlation_id,
            } => debug!(type_filter = %type_filter, id = %correlation_id, "Probe sent"),
            DiscoveryEvent::ProbeFailed {
                type_filter,
                reason,
            } => warn!(type_filter = %type_filter, reason = %reason, "Probe send failed"),
            DiscoveryEvent::ReplyRejected { source, reason } => {
                debug!(source = ?source, reason = %reason, "Skipping non related message")
            }
            DiscoveryEvent::ReplyMalformed { source, error } => {
                debug!(source = ?source, error = %error, "Dropping malformed reply")
            }
            DiscoveryEvent::MatchFound(found) => trace!(
                source = ?found.source,
                types = %found.record.types,
                "Found match"
            ),
            DiscoveryEvent::WindowClosed { replies, matches } => {
                info!(replies = replies, matches = matches, "Collection window closed")
            }
        }
    }
}

/// Forwards events to a broadcast channel; dropped when nobody listens
#[derive(Debug, Clone)]
pub struct ChannelSink(pub broadcast::Sender<DiscoveryEvent>);

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<DiscoveryEvent>) {
        let (tx, rx) = broadcast::channel(capacity);
        (Self(tx), rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiscoveryEvent> {
        self.0.subscribe()
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &DiscoveryEvent) {
        let _ = self.0.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &DiscoveryEvent| {
            if let DiscoveryEvent::WindowClosed { matches, .. } = event {
                seen.lock().unwrap().push(*matches);
            }
        };

        sink.emit(&DiscoveryEvent::WindowClosed {
            replies: 3,
            matches: 2,
        });
        assert_eq!(*seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_channel_sink() {
        let (sink, mut rx) = ChannelSink::new(8);
        sink.emit(&DiscoveryEvent::ProbeFailed {
            type_filter: "tds:Device".to_string(),
            reason: "network unreachable".to_string(),
        });

        match rx.try_recv().unwrap() {
            DiscoveryEvent::ProbeFailed { type_filter, .. } => assert_eq!(type_filter, "tds:Device"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_sink_without_listeners() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.emit(&DiscoveryEvent::WindowClosed {
            replies: 0,
            matches: 0,
        });
    }
}
