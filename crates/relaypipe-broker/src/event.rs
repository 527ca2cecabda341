use std::any::Any;

use tokio::sync::{mpsc, oneshot};

/// What the dispatch loop hands a name's relay task.
///
/// `Barrier` is how `flush()` gets a deterministic answer to "has everything
/// ahead of this been delivered": it rides the same per-destination channel
/// as real items, so a relay task only acks it once every item queued ahead
/// of it has actually been pushed into the destination's queue — unlike
/// racing a separate channel, which would only prove the broker's dispatch
/// loop had *seen* the prior sends, not that they'd landed.
pub(crate) enum RelayMessage {
    Item(Box<dyn Any + Send>),
    Barrier(oneshot::Sender<()>),
    Sentinel,
}

pub(crate) type RelaySender = mpsc::UnboundedSender<RelayMessage>;

/// A control message enqueued on the broker's single incoming channel.
///
/// Processed strictly in arrival order by the dispatch loop — the directory's
/// only writer — so two events from the same sender are always dispatched in
/// the order they were sent.
pub(crate) enum BrokerEvent {
    Register { name: String, relay: RelaySender },
    Send { dest: String, payload: Box<dyn Any + Send> },
    Forget { name: String },
    /// Fans a [`RelayMessage::Barrier`] out to every currently-live relay and
    /// reports back once all of them have acked it.
    Flush { done: oneshot::Sender<()> },
    Shutdown,
}

/// A directory entry: either a live relay or a tombstone left by `forget`.
///
/// Once tombstoned a name stays tombstoned — `register` is the only thing
/// that installs a live entry, and nothing in this crate clears a tombstone.
pub(crate) enum Entry {
    Live(RelaySender),
    Tombstone,
}
