//! Reply filter: accepts only replies relating to an awaited probe

use serde::Serialize;
use std::collections::HashSet;
use tracing::trace;

use crate::correlation::CorrelationId;
use crate::transport::RawReply;

/// Why a reply was excluded from the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Payload is not a SOAP envelope, so no id could be read
    Unreadable { error: String },
    /// Envelope carries no `RelatesTo` header
    MissingRelatesTo,
    /// `RelatesTo` names a probe this session did not send
    Unrelated { relates_to: String },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreadable { error } => write!(f, "unreadable correlation id: {}", error),
            Self::MissingRelatesTo => write!(f, "no correlation id"),
            Self::Unrelated { relates_to } => {
                write!(f, "unrelated correlation id: {}", relates_to)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Reply answers the probe with this id
    Accepted(CorrelationId),
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

/// Holds the ids of the probes a session is waiting on
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    awaited: HashSet<CorrelationId>,
}

impl Correlator {
    pub fn new(awaited: impl IntoIterator<Item = CorrelationId>) -> Self {
        Self {
            awaited: awaited.into_iter().collect(),
        }
    }

    pub fn awaited(&self) -> &HashSet<CorrelationId> {
        &self.awaited
    }

    /// Classify a reply against the awaited ids
    pub fn inspect(&self, reply: &RawReply) -> Verdict {
        inspect(reply, &self.awaited)
    }

    pub fn accept(&self, reply: &RawReply) -> bool {
        self.inspect(reply).is_accepted()
    }
}

/// Whether `reply` relates to one of `awaited`
pub fn accept(reply: &RawReply, awaited: &HashSet<CorrelationId>) -> bool {
    inspect(reply, awaited).is_accepted()
}

fn inspect(reply: &RawReply, awaited: &HashSet<CorrelationId>) -> Verdict {
    let relates_to = match reply.carried_correlation_id() {
        Ok(Some(id)) => id,
        Ok(None) => return Verdict::Rejected(RejectReason::MissingRelatesTo),
        Err(e) => {
            return Verdict::Rejected(RejectReason::Unreadable {
                error: e.to_string(),
            })
        }
    };

    match awaited.get(relates_to.as_str()) {
        Some(id) => {
            trace!(relates_to = %id, "Reply correlated");
            Verdict::Accepted(id.clone())
        }
        None => Verdict::Rejected(RejectReason::Unrelated { relates_to }),
    }
}
