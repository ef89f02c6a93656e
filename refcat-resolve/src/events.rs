//! Resolution progress events
//!
//! Events are fire-and-forget: a missing receiver, or a lagging one, never affects
//! resolution. Consumers subscribe through [`ProgressBroadcaster::subscribe`].

use crate::types::ResolutionStatus;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Progress event emitted while a batch is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ResolutionEvent {
    BatchStarted {
        run_id: Uuid,
        total: usize,
    },
    ReferenceStarted {
        index: usize,
        trace_id: Uuid,
    },
    CandidatesFound {
        index: usize,
        /// Cascade stage label ("1a" .. "2b"), absent when every stage was empty
        stage: Option<String>,
        count: usize,
    },
    MatchSelected {
        index: usize,
        work_id: String,
    },
    FallbackUsed {
        index: usize,
        found: bool,
    },
    ReferenceCompleted {
        index: usize,
        status: ResolutionStatus,
    },
    ReferenceFailed {
        index: usize,
        error: String,
    },
    BatchCompleted {
        run_id: Uuid,
        total: usize,
        failed: usize,
        duration_ms: u64,
    },
}

#[derive(Clone)]
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<ResolutionEvent>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn from_sender(tx: broadcast::Sender<ResolutionEvent>) -> Self {
        Self { tx }
    }

    /// Returns true if at least one receiver got the event
    pub fn emit(&self, event: ResolutionEvent) -> bool {
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(receivers, "Progress event broadcast");
                true
            }
            Err(broadcast::error::SendError(event)) => {
                // No receivers
                debug!(?event, "Progress event dropped");
                false
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolutionEvent> {
        self.tx.subscribe()
    }
}
