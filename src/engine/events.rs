// Engine → foreground event delivery
//
// Everything sent through here is an owned, immutable value. The engine never
// hands out references into its own state.

use super::CommandKind;
use crate::metrics::BridgeMetrics;
use crate::models::{TorrentId, TorrentSnapshot};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notification delivered to the foreground
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// A torrent appeared (added by the user or restored from saved state)
    Added(TorrentSnapshot),
    /// A known torrent's state changed; replaces the previous snapshot
    Changed(TorrentSnapshot),
    /// A torrent was removed; no further events follow for this id
    Removed(TorrentId),
    /// A submitted command failed with a user-visible error
    CommandFailed { command: CommandKind, message: String },
}

impl BridgeEvent {
    pub fn torrent_id(&self) -> Option<TorrentId> {
        match self {
            BridgeEvent::Added(snapshot) | BridgeEvent::Changed(snapshot) => Some(snapshot.id),
            BridgeEvent::Removed(id) => Some(*id),
            BridgeEvent::CommandFailed { .. } => None,
        }
    }
}

type Deliver = dyn Fn(BridgeEvent) -> bool + Send + Sync;

/// Thread-safe handle that marshals events into a foreground queue
#[derive(Clone)]
pub(crate) struct EventTarget {
    deliver: Arc<Deliver>,
    metrics: Arc<BridgeMetrics>,
}

impl EventTarget {
    pub(crate) fn new<M>(sender: mpsc::UnboundedSender<M>, metrics: Arc<BridgeMetrics>) -> Self
    where
        M: From<BridgeEvent> + Send + 'static,
    {
        Self {
            deliver: Arc::new(move |event| sender.send(M::from(event)).is_ok()),
            metrics,
        }
    }

    pub(crate) fn send(&self, event: BridgeEvent) {
        if (self.deliver)(event) {
            self.metrics.record_delivered();
        } else {
            self.metrics.record_undeliverable();
            tracing::debug!("foreground queue closed - dropping event");
        }
    }
}

/// The engine's outlet for torrent events.
///
/// Sending never blocks. The sink also guards per-torrent ordering: a
/// `changed` for an id that has no preceding `added`, anything after
/// `removed`, and a second `added` for a live id are all dropped, so the
/// foreground never sees them out of order.
pub struct EventSink {
    target: EventTarget,
    live: HashSet<TorrentId>,
}

impl EventSink {
    /// Create a sink feeding `sender`.
    ///
    /// The bridge builds one for its engine; this constructor exists for engines
    /// driven directly, e.g. in tests.
    pub fn new<M>(sender: mpsc::UnboundedSender<M>) -> Self
    where
        M: From<BridgeEvent> + Send + 'static,
    {
        Self::from_target(EventTarget::new(sender, Arc::new(BridgeMetrics::new())))
    }

    pub(crate) fn from_target(target: EventTarget) -> Self {
        Self {
            target,
            live: HashSet::new(),
        }
    }

    pub fn added(&mut self, snapshot: TorrentSnapshot) {
        if !self.live.insert(snapshot.id) {
            self.reject("added", snapshot.id);
            return;
        }
        self.target.send(BridgeEvent::Added(snapshot));
    }

    pub fn changed(&mut self, snapshot: TorrentSnapshot) {
        if !self.live.contains(&snapshot.id) {
            self.reject("changed", snapshot.id);
            return;
        }
        self.target.send(BridgeEvent::Changed(snapshot));
    }

    pub fn removed(&mut self, id: TorrentId) {
        if !self.live.remove(&id) {
            self.reject("removed", id);
            return;
        }
        self.target.send(BridgeEvent::Removed(id));
    }

    /// Whether `added` has been published for `id` and `removed` has not
    pub fn is_live(&self, id: &TorrentId) -> bool {
        self.live.contains(id)
    }

    fn reject(&self, kind: &'static str, id: TorrentId) {
        self.target.metrics.record_out_of_order();
        tracing::warn!(%id, event = kind, "dropping out-of-order torrent event");
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}
