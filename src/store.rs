/// Event store seam.
///
/// The engines never talk to storage. Whatever owns the historical events
/// (a database, an app's persistence layer, a JSON dump) hands over an
/// immutable snapshot through `EventStore`, and the engines work on that copy.

use crate::model::BridgeEvent;

/// Supplier of historical bridge events.
pub trait EventStore {
    /// A point-in-time copy of every known event, in any order.
    fn snapshot(&self) -> Vec<BridgeEvent>;
}

/// In-memory event store backed by a fixed list of events.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    events: Vec<BridgeEvent>,
}

impl SnapshotStore {
    pub fn new(events: Vec<BridgeEvent>) -> Self {
        Self { events }
    }
}

impl EventStore for SnapshotStore {
    fn snapshot(&self) -> Vec<BridgeEvent> {
        self.events.clone()
    }
}

impl From<Vec<BridgeEvent>> for SnapshotStore {
    fn from(events: Vec<BridgeEvent>) -> Self {
        Self::new(events)
    }
}
