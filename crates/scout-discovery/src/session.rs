//! Discovery session: probe dispatch and the bounded collection loop
//!
//! `DiscoverySession` (idle) -> `start` -> `CollectingSession` (probes sent,
//! then collecting) -> `collect` -> `DiscoveryResult` (finalized). Both steps
//! consume the session, so every session runs exactly once.

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use scout_core::{
    parse_matches, CorrelationId, Correlator, DiscoveredMatch, DiscoveryResult, ProbeFailure,
    ProbeRequest, RawReply, Transport, Verdict,
};
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::events::{DiscoveryEvent, EventSink, TracingSink};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("No type filters to probe for")]
    NoTypeFilters,
    #[error("All {count} probes failed", count = .failures.len())]
    AllProbesFailed { failures: Vec<ProbeFailure> },
}

/// Upper bound on a collection window, so the deadline never overflows
pub const MAX_WINDOW: Duration = Duration::from_secs(86400 * 365 * 30);

/// An idle session borrowing its transport
pub struct DiscoverySession<'t, T> {
    transport: &'t T,
    sink: Box<dyn EventSink + 't>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<'t, T: Transport> DiscoverySession<'t, T> {
    /// Create a session that reports events through `tracing`
    pub fn new(transport: &'t T) -> Self {
        Self {
            transport,
            sink: Box::new(TracingSink),
            shutdown: None,
        }
    }

    /// Report events to `sink` instead of the log
    pub fn with_sink(mut self, sink: impl EventSink + 't) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Close the collection window early once `shutdown` turns true
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Send one probe per type filter and open the collection window
    ///
    /// Probes that fail to build or send are recorded and skipped; the
    /// session only fails when no probe at all went out.
    pub async fn start<I, S>(
        self,
        type_filters: I,
        window: Duration,
    ) -> Result<CollectingSession<'t, T>, DiscoveryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filters: Vec<String> = type_filters.into_iter().map(Into::into).collect();
        if filters.is_empty() {
            return Err(DiscoveryError::NoTypeFilters);
        }

        let mut failures = Vec::new();
        let mut probes = Vec::with_capacity(filters.len());

        for filter in &filters {
            match ProbeRequest::build(filter.as_str(), CorrelationId::generate()) {
                Ok(probe) => probes.push(probe),
                Err(e) => {
                    let failure = ProbeFailure {
                        type_filter: filter.clone(),
                        correlation_id: None,
                        reason: e.to_string(),
                    };
                    self.report_failure(&failure);
                    failures.push(failure);
                }
            }
        }

        // Each probe carries its own id, so sends are independent
        let transport = self.transport;
        let sends = probes.into_iter().map(|probe| {
            let type_filter = probe.type_filter().to_string();
            let correlation_id = probe.correlation_id().clone();
            async move {
                let outcome = transport.send(probe).await;
                (type_filter, correlation_id, outcome)
            }
        });

        let mut awaited = Vec::new();
        for (type_filter, correlation_id, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => {
                    self.sink.emit(&DiscoveryEvent::ProbeSent {
                        type_filter,
                        correlation_id: correlation_id.clone(),
                    });
                    awaited.push(correlation_id);
                }
                Err(e) => {
                    let failure = ProbeFailure {
                        type_filter,
                        correlation_id: Some(correlation_id),
                        reason: e.to_string(),
                    };
                    self.report_failure(&failure);
                    failures.push(failure);
                }
            }
        }

        if awaited.is_empty() {
            warn!(failed = failures.len(), "No probe could be sent");
            return Err(DiscoveryError::AllProbesFailed { failures });
        }

        info!(
            sent = awaited.len(),
            failed = failures.len(),
            window_ms = window.as_millis() as u64,
            "Probes sent, collecting replies"
        );

        let started = Instant::now();
        Ok(CollectingSession {
            transport: self.transport,
            sink: self.sink,
            shutdown: self.shutdown,
            correlator: Correlator::new(awaited),
            requested: filters.into_iter().collect(),
            failures,
            matches: Vec::new(),
            replies: 0,
            window_start: Utc::now(),
            started,
            deadline: started + window.min(MAX_WINDOW),
        })
    }

    fn report_failure(&self, failure: &ProbeFailure) {
        debug!(type_filter = %failure.type_filter, reason = %failure.reason, "Probe failed");
        self.sink.emit(&DiscoveryEvent::ProbeFailed {
            type_filter: failure.type_filter.clone(),
            reason: failure.reason.clone(),
        });
    }
}

/// A session whose probes are out, accumulating matches until its deadline
pub struct CollectingSession<'t, T> {
    transport: &'t T,
    sink: Box<dyn EventSink + 't>,
    shutdown: Option<watch::Receiver<bool>>,
    correlator: Correlator,
    requested: BTreeSet<String>,
    failures: Vec<ProbeFailure>,
    matches: Vec<DiscoveredMatch>,
    replies: usize,
    window_start: DateTime<Utc>,
    started: Instant,
    deadline: Instant,
}

impl<'t, T: Transport> CollectingSession<'t, T> {
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Correlation ids of the probes that were sent
    pub fn awaited(&self) -> &HashSet<CorrelationId> {
        self.correlator.awaited()
    }

    /// Probes that failed while others went out
    pub fn probe_failures(&self) -> &[ProbeFailure] {
        &self.failures
    }

    /// Matches accumulated so far, in receive order
    pub fn matches(&self) -> &[DiscoveredMatch] {
        &self.matches
    }

    /// Collect replies until the deadline (or shutdown) and finalize
    pub async fn collect(mut self) -> DiscoveryResult {
        trace!("Collecting replies");

        let transport = self.transport;
        let deadline = self.deadline;

        while Instant::now() < deadline {
            let reply = match self.shutdown.as_mut() {
                Some(shutdown) => tokio::select! {
                    reply = transport.poll_receive(deadline) => reply,
                    _ = shutdown_requested(shutdown) => {
                        info!("Shutdown requested, closing collection window early");
                        break;
                    }
                },
                None => transport.poll_receive(deadline).await,
            };

            if let Some(reply) = reply {
                self.handle_reply(reply);
            }
        }

        self.finalize()
    }

    /// Correlate, parse and accumulate one reply
    fn handle_reply(&mut self, reply: RawReply) {
        let reply_index = self.replies;
        self.replies += 1;

        let correlation_id = match self.correlator.inspect(&reply) {
            Verdict::Accepted(id) => id,
            Verdict::Rejected(reason) => {
                self.sink.emit(&DiscoveryEvent::ReplyRejected {
                    source: reply.source,
                    reason,
                });
                return;
            }
        };

        let records = match parse_matches(&reply.payload) {
            Ok(records) => records,
            Err(e) => {
                self.sink.emit(&DiscoveryEvent::ReplyMalformed {
                    source: reply.source,
                    error: e.to_string(),
                });
                return;
            }
        };

        trace!(
            source = ?reply.source,
            relates_to = %correlation_id,
            entries = records.len(),
            "Accepted reply"
        );

        for record in records {
            let found = DiscoveredMatch {
                reply_index,
                correlation_id: correlation_id.clone(),
                source: reply.source,
                record,
            };
            self.sink.emit(&DiscoveryEvent::MatchFound(found.clone()));
            self.matches.push(found);
        }
    }

    fn finalize(self) -> DiscoveryResult {
        let elapsed = self.started.elapsed();
        trace!(
            elapsed_ms = elapsed.as_millis() as u64,
            "Session finalized"
        );

        self.sink.emit(&DiscoveryEvent::WindowClosed {
            replies: self.replies,
            matches: self.matches.len(),
        });

        DiscoveryResult {
            requested_type_filters: self.requested,
            matches: self.matches,
            probe_failures: self.failures,
            window_start: self.window_start,
            window_end: Utc::now(),
            elapsed,
        }
    }
}

/// Resolves once the shutdown flag is set; never if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Optional hooks for [`discover_with`]
#[derive(Default)]
pub struct DiscoveryOptions<'s> {
    /// Where events go, the log when unset
    pub sink: Option<Box<dyn EventSink + 's>>,
    /// Closes the collection window early once it turns true
    pub shutdown: Option<watch::Receiver<bool>>,
}

impl<'s> DiscoveryOptions<'s> {
    pub fn with_sink(mut self, sink: impl EventSink + 's) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }
}

/// Probe for `type_filters` and collect matches for `window`
pub async fn discover<T, I, S>(
    transport: &T,
    type_filters: I,
    window: Duration,
) -> Result<DiscoveryResult, DiscoveryError>
where
    T: Transport,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    discover_with(transport, type_filters, window, DiscoveryOptions::default()).await
}

/// [`discover`] reporting to a caller-supplied sink and honoring a shutdown signal
pub async fn discover_with<'t, T, I, S>(
    transport: &'t T,
    type_filters: I,
    window: Duration,
    options: DiscoveryOptions<'t>,
) -> Result<DiscoveryResult, DiscoveryError>
where
    T: Transport,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut session = DiscoverySession::new(transport);
    if let Some(sink) = options.sink {
        session.sink = sink;
    }
    if let Some(shutdown) = options.shutdown {
        session = session.with_shutdown(shutdown);
    }

    let session = session.start(type_filters, window).await?;
    Ok(session.collect().await)
}
