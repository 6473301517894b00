//! Scout Discovery - Correlated WS-Discovery probe sessions
//!
//! A session sends one probe per type filter, then collects replies for a
//! fixed window, keeping only those that relate to its own probes.

pub mod events;
pub mod session;

pub use events::{ChannelSink, DiscoveryEvent, EventSink, TracingSink};
pub use session::{
    discover, discover_with, CollectingSession, DiscoveryError, DiscoveryOptions, DiscoverySession,
    MAX_WINDOW,
};
